//! Artifact installation with verified backups.
//!
//! Platform mechanics differ (a running Windows exe is locked; a macOS
//! bundle can be swapped in place), so the flow is polymorphic over
//! [`PlatformInstaller`] implementations selected once from the detected
//! [`PlatformKind`]. The driver sequence is fixed: plan → backup → verify
//! → replace. Replacement never begins without a verified, non-empty
//! backup on disk, and the backup is retained indefinitely afterwards.

mod macos;
mod windows;

pub use macos::MacInstaller;
pub use windows::WindowsInstaller;

use crate::config::UpdateConfig;
use crate::error::{Result, UpdateError};
use crate::platform::{ArtifactKind, PlatformKind};
use crate::progress::ProgressEvent;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Everything the replace step needs, derived immediately before install
/// and discarded with it.
#[derive(Debug, Clone)]
pub struct InstallPlan {
    /// The downloaded artifact.
    pub artifact: PathBuf,
    /// Classified artifact format.
    pub kind: ArtifactKind,
    /// Path of the currently running executable/bundle (resolved by the
    /// caller, never by the installer).
    pub install_path: PathBuf,
    /// Where the pre-replacement backup is written.
    pub backup_path: PathBuf,
    /// Scratch directory for extraction and staging, sibling to the
    /// install path so renames stay on one filesystem.
    pub staging_dir: PathBuf,
}

/// A verified copy of the pre-update install.
///
/// Created before any destructive file operation and retained after a
/// successful install; recovery from it is manual by design.
#[derive(Debug, Clone)]
pub struct BackupRecord {
    /// Backup location on disk.
    pub path: PathBuf,
    /// Verified size in bytes.
    pub bytes: u64,
}

/// How the replacement finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    /// Files were swapped in place; relaunch the install path.
    Swapped,
    /// Replacement is deferred to a helper that runs after this process
    /// exits (Windows locked-exe strategy).
    Deferred {
        /// The helper script to hand to the restart launcher.
        helper_script: PathBuf,
    },
}

/// Platform-specific install mechanics: the backup/verify/replace
/// capability set.
pub trait PlatformInstaller: Send + Sync {
    /// Derive the install plan for an artifact.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::UnsupportedArtifact`] when the artifact kind
    /// is unknown or not installable on this platform.
    fn plan(
        &self,
        artifact: &Path,
        install_path: &Path,
        backup_suffix: &str,
    ) -> Result<InstallPlan>;

    /// Copy the current install to the backup path.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::BackupFailed`] when the copy cannot be
    /// completed.
    fn backup(&self, plan: &InstallPlan) -> Result<BackupRecord>;

    /// Check the backup is readable and non-empty on disk.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::BackupFailed`] when verification fails; the
    /// driver never proceeds to [`PlatformInstaller::replace`] in that
    /// case.
    fn verify(&self, record: &BackupRecord) -> Result<()> {
        let measured = verify_backup(&record.path)?;
        if measured != record.bytes {
            warn!(
                "backup at {} re-measured {measured} bytes, recorded {}",
                record.path.display(),
                record.bytes
            );
        }
        Ok(())
    }

    /// Replace the install with the artifact contents.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::ReplaceFailed`] or
    /// [`UpdateError::UnsupportedArtifact`]. On `ReplaceFailed` the
    /// install path must be left exactly as it was before the attempt.
    fn replace(&self, plan: &InstallPlan) -> Result<InstallOutcome>;
}

/// Select the installer for a platform.
#[must_use]
pub fn installer_for(platform: PlatformKind) -> Box<dyn PlatformInstaller> {
    match platform {
        PlatformKind::Windows => Box::new(WindowsInstaller),
        PlatformKind::Mac => Box::new(MacInstaller),
    }
}

/// Install `artifact` over `install_path`: plan → backup → verify →
/// replace.
///
/// # Errors
///
/// Propagates installer errors unmodified. [`UpdateError::BackupFailed`]
/// always aborts before any replacement; [`UpdateError::ReplaceFailed`]
/// leaves the previous install runnable with the backup on disk.
pub fn install(
    platform: PlatformKind,
    artifact: &Path,
    install_path: &Path,
    config: &UpdateConfig,
    mut on_progress: impl FnMut(ProgressEvent),
) -> Result<(InstallOutcome, BackupRecord)> {
    let meta = std::fs::metadata(artifact).map_err(|e| {
        UpdateError::UnsupportedArtifact(format!(
            "artifact {} is missing: {e}",
            artifact.display()
        ))
    })?;
    if meta.is_file() && meta.len() == 0 {
        return Err(UpdateError::UnsupportedArtifact(format!(
            "artifact {} is empty",
            artifact.display()
        )));
    }

    let installer = installer_for(platform);
    let plan = installer.plan(artifact, install_path, &config.backup_suffix)?;
    std::fs::create_dir_all(&plan.staging_dir)?;

    let record = installer.backup(&plan)?;
    installer.verify(&record)?;
    info!(
        "backup of {} verified at {} ({} bytes)",
        plan.install_path.display(),
        record.path.display(),
        record.bytes
    );
    on_progress(ProgressEvent::BackupTaken {
        backup_path: record.path.clone(),
        bytes: record.bytes,
    });

    on_progress(ProgressEvent::InstallStarted {
        install_path: plan.install_path.clone(),
    });
    let outcome = installer.replace(&plan)?;

    // Deferred replacement keeps its staged binary and helper script; a
    // completed swap has no further use for the scratch space.
    if outcome == InstallOutcome::Swapped {
        let _ = std::fs::remove_dir_all(&plan.staging_dir);
    }

    Ok((outcome, record))
}

/// Backup path: the install path plus a suffix (`Wren.app` → `Wren.app.bak`).
pub(crate) fn path_with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "install".to_owned());
    match path.parent() {
        Some(parent) => parent.join(format!("{name}.{suffix}")),
        None => PathBuf::from(format!("{name}.{suffix}")),
    }
}

/// Scratch directory for one install attempt, sibling to the target.
pub(crate) fn staging_dir_for(install_path: &Path) -> PathBuf {
    install_path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(".wren-staging")
}

/// Total size in bytes of a file or directory tree.
pub(crate) fn tree_size(path: &Path) -> std::io::Result<u64> {
    let meta = std::fs::symlink_metadata(path)?;
    if !meta.is_dir() {
        return Ok(meta.len());
    }
    let mut total = 0;
    for entry in std::fs::read_dir(path)? {
        total += tree_size(&entry?.path())?;
    }
    Ok(total)
}

/// Recursively copy a directory tree, returning the bytes copied.
pub(crate) fn copy_dir_recursive(src: &Path, dst: &Path) -> std::io::Result<u64> {
    std::fs::create_dir_all(dst)?;
    let mut total = 0;
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let from = entry.path();
        let to = dst.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            total += copy_dir_recursive(&from, &to)?;
        } else {
            total += std::fs::copy(&from, &to)?;
        }
    }
    Ok(total)
}

/// Check a backup is present, readable, and non-empty; returns its size.
pub(crate) fn verify_backup(path: &Path) -> Result<u64> {
    let unreadable = |e: std::io::Error| {
        UpdateError::BackupFailed(format!("backup at {} unreadable: {e}", path.display()))
    };

    let meta = std::fs::metadata(path).map_err(unreadable)?;
    if meta.is_dir() {
        // Probing the directory listing is the readability check.
        std::fs::read_dir(path).map_err(unreadable)?;
    } else {
        std::fs::File::open(path).map_err(unreadable)?;
    }

    let bytes = tree_size(path).map_err(unreadable)?;
    if bytes == 0 {
        return Err(UpdateError::BackupFailed(format!(
            "backup at {} is empty",
            path.display()
        )));
    }
    Ok(bytes)
}

/// Extract a zip artifact into `dest`.
pub(crate) fn extract_zip(archive: &Path, dest: &Path) -> Result<()> {
    let file = std::fs::File::open(archive).map_err(|e| {
        UpdateError::UnsupportedArtifact(format!("cannot open {}: {e}", archive.display()))
    })?;
    let mut zip = zip::ZipArchive::new(file).map_err(|e| {
        UpdateError::UnsupportedArtifact(format!(
            "{} is not a readable zip archive: {e}",
            archive.display()
        ))
    })?;
    zip.extract(dest).map_err(|e| {
        UpdateError::UnsupportedArtifact(format!(
            "cannot extract {}: {e}",
            archive.display()
        ))
    })?;
    Ok(())
}

/// Depth-first search for the first entry with the given extension.
/// Matches directories too (an `.app` bundle is a directory).
pub(crate) fn find_by_extension(root: &Path, ext: &str) -> Option<PathBuf> {
    let entries = std::fs::read_dir(root).ok()?;
    let mut dirs = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().is_some_and(|e| e.eq_ignore_ascii_case(ext)) {
            return Some(path);
        }
        if path.is_dir() {
            dirs.push(path);
        }
    }
    dirs.iter().find_map(|d| find_by_extension(d, ext))
}

/// Set the executable bit on Unix platforms.
pub(crate) fn set_executable(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).map_err(|e| {
            UpdateError::ReplaceFailed(format!(
                "cannot set executable permission on {}: {e}",
                path.display()
            ))
        })?;
    }
    let _ = path; // Suppress unused warning on Windows.
    Ok(())
}
