//! Wren: a desktop build-bench shell with an industrial-grade self-update
//! client.
//!
//! The interesting subsystem is the updater: it streams a new build from a
//! fixed per-platform URL, takes a verified backup of the current install,
//! replaces it with platform-appropriate mechanics (deferred helper on
//! Windows, in-place bundle swap on macOS), and restarts into the new
//! build. There is deliberately no version comparison: the shell always
//! offers whatever the configured URL serves.
//!
//! # Architecture
//!
//! Independent components sequenced by the orchestrator, with the UI layer
//! on the far side of a delegate seam:
//! - **Transfer fetcher**: streamed download with progress, staging, and
//!   cooperative cancellation
//! - **Artifact installer**: plan → verified backup → platform-specific
//!   replace
//! - **Update orchestrator**: the state machine, one worker thread per
//!   attempt
//! - **Restart launcher**: process handoff to the new build

pub mod app_dirs;
pub mod config;
pub mod error;
pub mod install;
pub mod platform;
pub mod progress;
pub mod restart;
pub mod transfer;
pub mod updater;
pub mod version;

pub use config::{ShellConfig, UpdateConfig};
pub use error::{Result, UpdateError};
pub use install::{BackupRecord, InstallOutcome, InstallPlan, PlatformInstaller};
pub use platform::{ArtifactKind, PlatformKind};
pub use progress::{ConfirmPoint, ProgressEvent, UpdateDelegate, UpdateOutcome};
pub use restart::{ProcessRestart, RestartLauncher, RestartPlan};
pub use transfer::CancelFlag;
pub use updater::{UpdatePhase, Updater};
