//! Error types for the update pipeline.

/// Top-level error type for the self-update system.
#[derive(Debug, thiserror::Error)]
pub enum UpdateError {
    /// Connection could not be established, or the stream stalled past the
    /// configured idle timeout.
    #[error("network unavailable: {0}")]
    NetworkUnavailable(String),

    /// The stream ended before the advertised byte count arrived.
    #[error("fetch incomplete: {0}")]
    FetchIncomplete(String),

    /// The download destination could not be created or written.
    #[error("destination unwritable: {0}")]
    DestinationUnwritable(String),

    /// The pre-replacement backup could not be completed or verified.
    /// Always fatal to the attempt: replacement never starts without one.
    #[error("backup failed: {0}")]
    BackupFailed(String),

    /// Replacement failed after a good backup. The previous version is
    /// still runnable and the backup stays on disk.
    #[error("replace failed: {0}")]
    ReplaceFailed(String),

    /// The artifact format is unknown, corrupt, or not installable on the
    /// current platform.
    #[error("unsupported artifact: {0}")]
    UnsupportedArtifact(String),

    /// The user cancelled the attempt or declined installation.
    #[error("cancelled by user")]
    UserCancelled,

    /// `start_update` was called while an attempt is already running.
    #[error("an update attempt is already in progress")]
    AttemptInProgress,

    /// The relaunch of the new build could not be started.
    #[error("restart error: {0}")]
    Restart(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl UpdateError {
    /// Stable tag for this error kind, used in terminal state reporting.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NetworkUnavailable(_) => "NetworkUnavailable",
            Self::FetchIncomplete(_) => "FetchIncomplete",
            Self::DestinationUnwritable(_) => "DestinationUnwritable",
            Self::BackupFailed(_) => "BackupFailed",
            Self::ReplaceFailed(_) => "ReplaceFailed",
            Self::UnsupportedArtifact(_) => "UnsupportedArtifact",
            Self::UserCancelled => "UserCancelled",
            Self::AttemptInProgress => "AttemptInProgress",
            Self::Restart(_) => "Restart",
            Self::Config(_) => "Config",
            Self::Io(_) => "Io",
        }
    }
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, UpdateError>;
