//! macOS install mechanics.
//!
//! A bundle can be replaced while the app runs from inside it. The new
//! bundle is staged beside the target, the current one renamed aside, the
//! staged one renamed into place, and the aside copy dropped. A failed
//! swap restores the aside copy, leaving the install path exactly as it
//! was. Disk images are mounted with `hdiutil`; `.pkg` installers are
//! handed to the system `installer` tool.

use super::{
    BackupRecord, InstallOutcome, InstallPlan, PlatformInstaller, copy_dir_recursive,
    extract_zip, find_by_extension, path_with_suffix, set_executable, staging_dir_for,
};
use crate::error::{Result, UpdateError};
use crate::platform::{ArtifactKind, PlatformKind};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::info;

pub struct MacInstaller;

impl PlatformInstaller for MacInstaller {
    fn plan(
        &self,
        artifact: &Path,
        install_path: &Path,
        backup_suffix: &str,
    ) -> Result<InstallPlan> {
        let kind = ArtifactKind::classify(artifact)?;
        if !PlatformKind::Mac.accepts(kind) {
            return Err(UpdateError::UnsupportedArtifact(format!(
                "'{}' artifacts cannot be installed on mac",
                kind.as_str()
            )));
        }
        Ok(InstallPlan {
            artifact: artifact.to_path_buf(),
            kind,
            install_path: install_path.to_path_buf(),
            backup_path: path_with_suffix(install_path, backup_suffix),
            staging_dir: staging_dir_for(install_path),
        })
    }

    fn backup(&self, plan: &InstallPlan) -> Result<BackupRecord> {
        let src = &plan.install_path;
        if !src.exists() {
            return Err(UpdateError::BackupFailed(format!(
                "current install {} not found",
                src.display()
            )));
        }

        // A stale backup from an earlier attempt is replaced wholesale.
        if plan.backup_path.is_dir() {
            let _ = std::fs::remove_dir_all(&plan.backup_path);
        } else if plan.backup_path.exists() {
            let _ = std::fs::remove_file(&plan.backup_path);
        }

        let copied = if src.is_dir() {
            copy_dir_recursive(src, &plan.backup_path)
        } else {
            std::fs::copy(src, &plan.backup_path)
        };
        let bytes = copied.map_err(|e| {
            UpdateError::BackupFailed(format!(
                "cannot copy {} to {}: {e}",
                src.display(),
                plan.backup_path.display()
            ))
        })?;

        Ok(BackupRecord {
            path: plan.backup_path.clone(),
            bytes,
        })
    }

    fn replace(&self, plan: &InstallPlan) -> Result<InstallOutcome> {
        match plan.kind {
            ArtifactKind::AppBundle => {
                let staged = stage_bundle(&plan.artifact, &plan.staging_dir)?;
                swap(&staged, &plan.install_path)
            }
            ArtifactKind::Zip => {
                let extract_dir = plan.staging_dir.join("extract");
                extract_zip(&plan.artifact, &extract_dir)?;
                let staged = find_by_extension(&extract_dir, "app")
                    .or_else(|| find_executable_file(&extract_dir))
                    .ok_or_else(|| {
                        UpdateError::UnsupportedArtifact(format!(
                            "{} contains no .app bundle or executable",
                            plan.artifact.display()
                        ))
                    })?;
                swap(&staged, &plan.install_path)
            }
            ArtifactKind::Dmg => {
                let staged = copy_app_from_dmg(&plan.artifact, &plan.staging_dir)?;
                swap(&staged, &plan.install_path)
            }
            ArtifactKind::Pkg => install_pkg(&plan.artifact),
            other => Err(UpdateError::UnsupportedArtifact(format!(
                "'{}' artifacts cannot be installed on mac",
                other.as_str()
            ))),
        }
    }
}

/// Copy a downloaded `.app` into staging. The artifact must be a bundle
/// directory; anything else cannot be staged.
fn stage_bundle(artifact: &Path, staging_dir: &Path) -> Result<PathBuf> {
    let name = artifact.file_name().ok_or_else(|| {
        UpdateError::ReplaceFailed(format!("{} has no file name", artifact.display()))
    })?;
    let staged = staging_dir.join(name);

    if !artifact.is_dir() {
        return Err(UpdateError::ReplaceFailed(format!(
            "{} is not a bundle directory",
            artifact.display()
        )));
    }
    copy_dir_recursive(artifact, &staged).map_err(|e| {
        UpdateError::ReplaceFailed(format!(
            "cannot stage {} at {}: {e}",
            artifact.display(),
            staged.display()
        ))
    })?;
    Ok(staged)
}

/// Swap the staged install into place: current → aside, staged → current.
/// On failure the aside copy is restored so the install path is untouched.
fn swap(staged: &Path, install_path: &Path) -> Result<InstallOutcome> {
    let aside = path_with_suffix(install_path, "old");
    if aside.is_dir() {
        let _ = std::fs::remove_dir_all(&aside);
    } else if aside.exists() {
        let _ = std::fs::remove_file(&aside);
    }

    let had_previous = install_path.exists();
    if had_previous {
        std::fs::rename(install_path, &aside).map_err(|e| {
            UpdateError::ReplaceFailed(format!(
                "cannot move current install aside: {e}"
            ))
        })?;
    }

    if let Err(e) = std::fs::rename(staged, install_path) {
        // Put the previous install back; the attempt failed but the app
        // must stay runnable.
        if had_previous {
            let _ = std::fs::rename(&aside, install_path);
        }
        return Err(UpdateError::ReplaceFailed(format!(
            "cannot move new install into place at {}: {e}",
            install_path.display()
        )));
    }

    if install_path.is_file() {
        set_executable(install_path)?;
    }
    clear_quarantine(install_path);

    if aside.is_dir() {
        let _ = std::fs::remove_dir_all(&aside);
    } else if aside.exists() {
        let _ = std::fs::remove_file(&aside);
    }

    info!("install swapped at {}", install_path.display());
    Ok(InstallOutcome::Swapped)
}

/// Mount a disk image, copy the contained `.app` into staging, unmount.
fn copy_app_from_dmg(dmg: &Path, staging_dir: &Path) -> Result<PathBuf> {
    let mount = staging_dir.join("mount");
    std::fs::create_dir_all(&mount)?;

    let status = Command::new("hdiutil")
        .arg("attach")
        .arg(dmg)
        .arg("-nobrowse")
        .arg("-mountpoint")
        .arg(&mount)
        .status()
        .map_err(|e| {
            UpdateError::UnsupportedArtifact(format!("cannot mount {}: {e}", dmg.display()))
        })?;
    if !status.success() {
        return Err(UpdateError::UnsupportedArtifact(format!(
            "hdiutil attach failed for {}",
            dmg.display()
        )));
    }

    let staged = (|| -> Result<PathBuf> {
        let app = find_by_extension(&mount, "app").ok_or_else(|| {
            UpdateError::UnsupportedArtifact(format!(
                "{} contains no .app bundle",
                dmg.display()
            ))
        })?;
        let staged = staging_dir.join(app.file_name().unwrap_or_default());
        copy_dir_recursive(&app, &staged).map_err(|e| {
            UpdateError::ReplaceFailed(format!(
                "cannot copy {} out of disk image: {e}",
                app.display()
            ))
        })?;
        Ok(staged)
    })();

    let _ = Command::new("hdiutil").arg("detach").arg(&mount).status();
    staged
}

/// Hand a `.pkg` to the system installer. Requires install privileges.
fn install_pkg(pkg: &Path) -> Result<InstallOutcome> {
    let status = Command::new("installer")
        .arg("-pkg")
        .arg(pkg)
        .args(["-target", "/"])
        .status()
        .map_err(|e| UpdateError::ReplaceFailed(format!("cannot run installer: {e}")))?;
    if !status.success() {
        return Err(UpdateError::ReplaceFailed(format!(
            "installer exited with {status}"
        )));
    }
    Ok(InstallOutcome::Swapped)
}

/// First regular file with the executable bit set (zip artifacts that ship
/// a bare binary instead of a bundle).
fn find_executable_file(root: &Path) -> Option<PathBuf> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let entries = std::fs::read_dir(root).ok()?;
        let mut dirs = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                dirs.push(path);
                continue;
            }
            let Ok(meta) = path.metadata() else {
                continue;
            };
            if meta.permissions().mode() & 0o111 != 0 {
                return Some(path);
            }
        }
        return dirs.iter().find_map(|d| find_executable_file(d));
    }
    #[cfg(not(unix))]
    {
        let _ = root;
        None
    }
}

/// Best-effort removal of the quarantine attribute Gatekeeper stamps onto
/// downloaded code.
fn clear_quarantine(path: &Path) {
    #[cfg(target_os = "macos")]
    {
        let _ = Command::new("xattr")
            .args(["-cr", &path.to_string_lossy()])
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status();
    }
    let _ = path;
}
