//! Windows install mechanics.
//!
//! The OS locks a running `.exe` against writes, so the replacement itself
//! is deferred: the installer stages the new binary beside the target and
//! writes a helper `.bat` that waits for this process to exit, copies the
//! staged file over the install path, relaunches, and deletes itself. The
//! backup is still taken up front; reading a running exe is permitted,
//! only writes are locked.

use super::{
    BackupRecord, InstallOutcome, InstallPlan, PlatformInstaller, extract_zip,
    find_by_extension, path_with_suffix, staging_dir_for,
};
use crate::error::{Result, UpdateError};
use crate::platform::{ArtifactKind, PlatformKind};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::info;

pub struct WindowsInstaller;

impl PlatformInstaller for WindowsInstaller {
    fn plan(
        &self,
        artifact: &Path,
        install_path: &Path,
        backup_suffix: &str,
    ) -> Result<InstallPlan> {
        let kind = ArtifactKind::classify(artifact)?;
        if !PlatformKind::Windows.accepts(kind) {
            return Err(UpdateError::UnsupportedArtifact(format!(
                "'{}' artifacts cannot be installed on windows",
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
        let bytes = std::fs::copy(&plan.install_path, &plan.backup_path).map_err(|e| {
            UpdateError::BackupFailed(format!(
                "cannot copy {} to {}: {e}",
                plan.install_path.display(),
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
            ArtifactKind::Exe => stage_and_defer(&plan.artifact, plan),
            ArtifactKind::Zip => {
                let extract_dir = plan.staging_dir.join("extract");
                extract_zip(&plan.artifact, &extract_dir)?;
                let exe = find_by_extension(&extract_dir, "exe").ok_or_else(|| {
                    UpdateError::UnsupportedArtifact(format!(
                        "{} contains no .exe",
                        plan.artifact.display()
                    ))
                })?;
                stage_and_defer(&exe, plan)
            }
            ArtifactKind::Msi => install_msi(&plan.artifact),
            other => Err(UpdateError::UnsupportedArtifact(format!(
                "'{}' artifacts cannot be installed on windows",
                other.as_str()
            ))),
        }
    }
}

/// Copy the new exe into staging and write the deferred-replacement helper.
fn stage_and_defer(new_exe: &Path, plan: &InstallPlan) -> Result<InstallOutcome> {
    let staged_name = new_exe
        .file_name()
        .map(|n| format!("new-{}", n.to_string_lossy()))
        .unwrap_or_else(|| "new-wren.exe".to_owned());
    let staged = plan.staging_dir.join(staged_name);

    std::fs::copy(new_exe, &staged).map_err(|e| {
        UpdateError::ReplaceFailed(format!(
            "cannot stage {} at {}: {e}",
            new_exe.display(),
            staged.display()
        ))
    })?;

    let helper_script = write_helper_script(&staged, &plan.install_path, &plan.staging_dir)?;
    info!(
        "replacement deferred: helper at {}",
        helper_script.display()
    );
    Ok(InstallOutcome::Deferred { helper_script })
}

/// Write the `.bat` that performs the copy after this process exits.
fn write_helper_script(
    staged: &Path,
    install_path: &Path,
    staging_dir: &Path,
) -> Result<PathBuf> {
    let script_path = staging_dir.join("wren-update.bat");
    let script = format!(
        r#"@echo off
echo Updating Wren...
timeout /t 2 /nobreak >nul
copy /y "{new}" "{current}" >nul
if errorlevel 1 (
    echo Update failed.
    pause
    exit /b 1
)
echo Update complete. Restarting...
start "" "{current}"
del "%~f0"
"#,
        new = staged.display(),
        current = install_path.display()
    );

    std::fs::write(&script_path, script).map_err(|e| {
        UpdateError::ReplaceFailed(format!(
            "cannot write update helper to {}: {e}",
            script_path.display()
        ))
    })?;
    Ok(script_path)
}

/// Hand an `.msi` to the Windows installer service.
fn install_msi(msi: &Path) -> Result<InstallOutcome> {
    let status = Command::new("msiexec")
        .arg("/i")
        .arg(msi)
        .args(["/quiet", "/norestart"])
        .status()
        .map_err(|e| UpdateError::ReplaceFailed(format!("cannot run msiexec: {e}")))?;
    if !status.success() {
        return Err(UpdateError::ReplaceFailed(format!(
            "msiexec exited with {status}"
        )));
    }
    Ok(InstallOutcome::Swapped)
}
