//! Progress and delegate types for the update flow.
//!
//! Provides the callback seam that decouples the update core from UI
//! presentation (console indicatif bar vs native window). The GUI layer
//! implements [`UpdateDelegate`]; the core never touches UI state.

use crate::restart::RestartPlan;
use std::path::PathBuf;

/// Lifecycle status of one transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStatus {
    /// Created but no bytes requested yet.
    Pending,
    /// Bytes are streaming to disk.
    InProgress,
    /// Transfer finished and the size check passed.
    Completed,
    /// Transfer failed or was cancelled.
    Failed,
}

/// Progress events emitted during an update attempt.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// The artifact download has started.
    FetchStarted {
        /// Source URL.
        url: String,
        /// Total size in bytes, if the server advertised one.
        total_bytes: Option<u64>,
    },

    /// Download progress update. Byte counts are monotonically
    /// non-decreasing; the last event of a successful fetch carries the
    /// full byte count.
    FetchProgress {
        /// Bytes received so far.
        bytes_received: u64,
        /// Total size in bytes, if known.
        total_bytes: Option<u64>,
    },

    /// The artifact download completed and passed the size check.
    FetchComplete {
        /// Total bytes received.
        bytes_received: u64,
    },

    /// The pre-replacement backup has been written and verified.
    BackupTaken {
        /// Where the backup lives.
        backup_path: PathBuf,
        /// Verified backup size in bytes.
        bytes: u64,
    },

    /// Replacement of the current install has started. Cancellation is no
    /// longer honored past this point.
    InstallStarted {
        /// The install path being replaced.
        install_path: PathBuf,
    },
}

/// The two explicit user confirmation gates.
///
/// Downloading and installing are confirmed separately: installation is
/// destructive, so agreeing to fetch the artifact never implies agreeing
/// to install it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmPoint {
    /// Asked before any network traffic.
    Download,
    /// Asked after the artifact is on disk, before the backup/replace.
    Install,
}

impl ConfirmPoint {
    /// Human-readable prompt shown to the user.
    #[must_use]
    pub fn prompt(self) -> &'static str {
        match self {
            Self::Download => {
                "Download the latest build and prepare it for installation?"
            }
            Self::Install => {
                "Download complete. Install the update now? The application will restart."
            }
        }
    }
}

/// Terminal result of one update attempt.
#[derive(Debug, Clone)]
pub enum UpdateOutcome {
    /// Installation succeeded; `restart` describes how the new build comes
    /// up once this process exits.
    Installed {
        /// Relaunch target or deferred-replacement helper.
        restart: RestartPlan,
    },

    /// The attempt failed. `kind` is the stable error tag, `reason` the
    /// human-readable message surfaced verbatim from the failing component.
    Failed {
        /// Stable error kind tag (e.g. `"ReplaceFailed"`).
        kind: &'static str,
        /// Human-readable reason shown to the user.
        reason: String,
    },

    /// The user cancelled before replacement began.
    Cancelled,
}

/// Callbacks the GUI layer implements to observe and steer an update.
///
/// Implementations must be thread-safe: the update worker invokes these
/// from its own thread. [`UpdateDelegate::on_confirm`] may block on a user
/// decision.
pub trait UpdateDelegate: Send + Sync {
    /// A progress or stage event occurred.
    fn on_progress(&self, event: ProgressEvent);

    /// Ask the user to confirm the given gate. Returning `false` declines.
    fn on_confirm(&self, point: ConfirmPoint) -> bool;

    /// The attempt reached a terminal state.
    fn on_terminal(&self, outcome: &UpdateOutcome);
}
