//! Process restart after a completed install.
//!
//! The only observable contract across the process boundary is: the old
//! process exits, the new one starts. Everything else (exit codes of the
//! helper, timing of the deferred copy) is deliberately unobserved.

use crate::error::{Result, UpdateError};
use crate::install::InstallOutcome;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::info;

/// How the new build comes up after this process exits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestartPlan {
    /// Spawn the installed executable or bundle directly.
    Relaunch {
        /// The freshly installed executable/bundle path.
        target: PathBuf,
    },
    /// Run the helper script that finishes a deferred replacement and
    /// relaunches on its own (Windows locked-exe path).
    RunHelper {
        /// Path to the helper script.
        script: PathBuf,
    },
}

impl RestartPlan {
    /// Build the restart plan from an install outcome.
    #[must_use]
    pub fn from_outcome(outcome: &InstallOutcome, install_path: &Path) -> Self {
        match outcome {
            InstallOutcome::Swapped => Self::Relaunch {
                target: install_path.to_path_buf(),
            },
            InstallOutcome::Deferred { helper_script } => Self::RunHelper {
                script: helper_script.clone(),
            },
        }
    }
}

/// Launches the replacement process.
///
/// The orchestrator hands off here after a successful install; the shell
/// exits once the launch succeeds. Test doubles implement this to observe
/// the handoff without ending the test process.
pub trait RestartLauncher: Send + Sync {
    /// Start the new process (or the deferred-replacement helper).
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::Restart`] when the child cannot be spawned.
    fn launch(&self, plan: &RestartPlan) -> Result<()>;
}

/// Real launcher: spawns the replacement as a detached OS process.
pub struct ProcessRestart;

impl RestartLauncher for ProcessRestart {
    fn launch(&self, plan: &RestartPlan) -> Result<()> {
        match plan {
            RestartPlan::Relaunch { target } => {
                info!("relaunching {}", target.display());
                // An .app bundle is a directory; hand it to Launch Services
                // instead of exec'ing it.
                if target.extension().is_some_and(|e| e == "app") {
                    Command::new("open")
                        .arg("-n")
                        .arg(target)
                        .spawn()
                        .map_err(|e| {
                            UpdateError::Restart(format!(
                                "cannot open {}: {e}",
                                target.display()
                            ))
                        })?;
                } else {
                    Command::new(target).spawn().map_err(|e| {
                        UpdateError::Restart(format!(
                            "cannot spawn {}: {e}",
                            target.display()
                        ))
                    })?;
                }
                Ok(())
            }
            RestartPlan::RunHelper { script } => {
                info!("handing off to update helper {}", script.display());
                Command::new("cmd")
                    .arg("/C")
                    .arg(script)
                    .spawn()
                    .map_err(|e| {
                        UpdateError::Restart(format!(
                            "cannot run update helper {}: {e}",
                            script.display()
                        ))
                    })?;
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    #[test]
    fn swapped_outcome_relaunches_install_path() {
        let plan = RestartPlan::from_outcome(
            &InstallOutcome::Swapped,
            Path::new("/Applications/Wren.app"),
        );
        assert_eq!(
            plan,
            RestartPlan::Relaunch {
                target: PathBuf::from("/Applications/Wren.app")
            }
        );
    }

    #[test]
    fn deferred_outcome_runs_helper() {
        let outcome = InstallOutcome::Deferred {
            helper_script: PathBuf::from("C:\\cache\\wren-update.bat"),
        };
        let plan = RestartPlan::from_outcome(&outcome, Path::new("C:\\Wren\\wren.exe"));
        assert_eq!(
            plan,
            RestartPlan::RunHelper {
                script: PathBuf::from("C:\\cache\\wren-update.bat")
            }
        );
    }
}
