//! Update orchestration state machine.
//!
//! Drives one attempt end-to-end: offer → download → offer → install →
//! restart handoff. Exactly one attempt runs at a time; the blocking work
//! happens on a dedicated worker thread and every crossing back to the UI
//! layer goes through the [`UpdateDelegate`] callbacks. Lower components
//! never retry on their own; their errors surface here unmodified and
//! this is the single place that turns them into terminal outcomes.

use crate::config::UpdateConfig;
use crate::error::{Result, UpdateError};
use crate::install;
use crate::platform::PlatformKind;
use crate::progress::{ConfirmPoint, UpdateDelegate, UpdateOutcome};
use crate::restart::{RestartLauncher, RestartPlan};
use crate::transfer::{self, CancelFlag};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use tracing::{info, warn};

/// Externally observable phase of the update state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdatePhase {
    /// No attempt in flight.
    Idle,
    /// Waiting on the first confirmation gate (the offer).
    AwaitingConfirmDownload,
    /// The fetcher is streaming the artifact.
    Downloading,
    /// Artifact on disk; waiting on the second confirmation gate.
    AwaitingConfirmInstall,
    /// Backup and replacement in progress. Cancellation is no longer
    /// honored.
    Installing,
    /// Install finished; restart handoff pending.
    AwaitingRestart,
    /// Handed off to the restart launcher; the process is about to end.
    Restarting,
    /// Terminal: the attempt failed with the given error kind tag.
    Failed(String),
    /// Terminal: the user cancelled before replacement began.
    Cancelled,
}

impl UpdatePhase {
    /// Whether an attempt is currently in flight. `Failed` and `Cancelled`
    /// are terminal, not busy: a new attempt (retry) may start from them.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            Self::AwaitingConfirmDownload
                | Self::Downloading
                | Self::AwaitingConfirmInstall
                | Self::Installing
                | Self::AwaitingRestart
                | Self::Restarting
        )
    }
}

struct Inner {
    config: UpdateConfig,
    platform: PlatformKind,
    install_path: PathBuf,
    delegate: Arc<dyn UpdateDelegate>,
    restart: Arc<dyn RestartLauncher>,
    phase: Mutex<UpdatePhase>,
    cancel: CancelFlag,
}

/// The update orchestrator.
///
/// Construct once at startup with the immutable configuration and detected
/// platform, then drive it from the UI layer via [`Updater::start_update`]
/// / [`Updater::cancel_update`] / [`Updater::current_phase`].
pub struct Updater {
    inner: Arc<Inner>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Updater {
    /// Create an orchestrator.
    ///
    /// `install_path` is the path of the currently running
    /// executable/bundle, resolved by the caller.
    #[must_use]
    pub fn new(
        config: UpdateConfig,
        platform: PlatformKind,
        install_path: PathBuf,
        delegate: Arc<dyn UpdateDelegate>,
        restart: Arc<dyn RestartLauncher>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                platform,
                install_path,
                delegate,
                restart,
                phase: Mutex::new(UpdatePhase::Idle),
                cancel: CancelFlag::new(),
            }),
            worker: Mutex::new(None),
        }
    }

    /// Begin an update attempt on a worker thread.
    ///
    /// There is deliberately no version check first: the shell always
    /// offers whatever the configured URL serves.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError::AttemptInProgress`] when an attempt is
    /// already in flight; never starts a second parallel flow.
    pub fn start_update(&self) -> Result<()> {
        {
            let mut phase = lock_ignoring_poison(&self.inner.phase);
            if phase.is_busy() {
                return Err(UpdateError::AttemptInProgress);
            }
            *phase = UpdatePhase::AwaitingConfirmDownload;
        }
        self.inner.cancel.reset();

        // Reap the previous attempt's worker before spawning a new one.
        if let Some(handle) = lock_ignoring_poison(&self.worker).take() {
            let _ = handle.join();
        }

        let inner = Arc::clone(&self.inner);
        let spawned = std::thread::Builder::new()
            .name("wren-update".to_owned())
            .spawn(move || run_attempt(&inner));
        match spawned {
            Ok(handle) => {
                *lock_ignoring_poison(&self.worker) = Some(handle);
                Ok(())
            }
            Err(e) => {
                *lock_ignoring_poison(&self.inner.phase) = UpdatePhase::Idle;
                Err(UpdateError::Io(e))
            }
        }
    }

    /// Request cancellation of the in-flight attempt.
    ///
    /// Cooperative: the worker checks the flag between chunks and between
    /// stages, cleaning up partial state before reporting `Cancelled`.
    /// Ignored once replacement has started.
    pub fn cancel_update(&self) {
        info!("cancellation requested");
        self.inner.cancel.cancel();
    }

    /// Current phase of the state machine.
    #[must_use]
    pub fn current_phase(&self) -> UpdatePhase {
        lock_ignoring_poison(&self.inner.phase).clone()
    }

    /// Block until the in-flight attempt (if any) reaches a terminal
    /// phase or hands off to the restart launcher.
    pub fn wait(&self) {
        if let Some(handle) = lock_ignoring_poison(&self.worker).take() {
            let _ = handle.join();
        }
    }
}

fn lock_ignoring_poison<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn set_phase(inner: &Inner, phase: UpdatePhase) {
    let mut guard = lock_ignoring_poison(&inner.phase);
    info!(from = ?*guard, to = ?phase, "update phase");
    *guard = phase;
}

/// How a worker run ended without an error.
enum AttemptEnd {
    /// The user declined the offer; back to `Idle`.
    Declined,
    /// Install finished and the restart launcher took over.
    RestartHandedOff,
}

fn run_attempt(inner: &Inner) {
    match attempt(inner) {
        Ok(AttemptEnd::Declined | AttemptEnd::RestartHandedOff) => {}
        Err(UpdateError::UserCancelled) => {
            set_phase(inner, UpdatePhase::Cancelled);
            inner.delegate.on_terminal(&UpdateOutcome::Cancelled);
        }
        Err(e) => {
            let kind = e.kind();
            warn!("update attempt failed: {e}");
            set_phase(inner, UpdatePhase::Failed(kind.to_owned()));
            inner.delegate.on_terminal(&UpdateOutcome::Failed {
                kind,
                reason: e.to_string(),
            });
        }
    }
}

fn attempt(inner: &Inner) -> Result<AttemptEnd> {
    // Gate 1: the offer. Declining is not a cancellation, just "not now".
    if !inner.delegate.on_confirm(ConfirmPoint::Download) {
        info!("update offer declined");
        set_phase(inner, UpdatePhase::Idle);
        return Ok(AttemptEnd::Declined);
    }
    if inner.cancel.is_cancelled() {
        return Err(UpdateError::UserCancelled);
    }

    set_phase(inner, UpdatePhase::Downloading);
    let url = inner.config.source_for(inner.platform)?.to_owned();
    let dest = inner
        .config
        .resolved_download_dir()
        .join(transfer::artifact_filename(&url));
    {
        let delegate = Arc::clone(&inner.delegate);
        transfer::fetch(&url, &dest, &inner.config, &inner.cancel, move |event| {
            delegate.on_progress(event);
        })?;
    }
    if inner.cancel.is_cancelled() {
        discard_artifact(&dest);
        return Err(UpdateError::UserCancelled);
    }

    set_phase(inner, UpdatePhase::AwaitingConfirmInstall);
    // Gate 2: installation is destructive and confirmed separately from
    // the download.
    if !inner.delegate.on_confirm(ConfirmPoint::Install) {
        info!("installation declined, discarding artifact");
        discard_artifact(&dest);
        return Err(UpdateError::UserCancelled);
    }
    if inner.cancel.is_cancelled() {
        discard_artifact(&dest);
        return Err(UpdateError::UserCancelled);
    }

    set_phase(inner, UpdatePhase::Installing);
    let (outcome, _backup) = {
        let delegate = Arc::clone(&inner.delegate);
        install::install(
            inner.platform,
            &dest,
            &inner.install_path,
            &inner.config,
            move |event| delegate.on_progress(event),
        )?
    };
    // The artifact has served its purpose; the backup is what we keep.
    discard_artifact(&dest);

    set_phase(inner, UpdatePhase::AwaitingRestart);
    let plan = RestartPlan::from_outcome(&outcome, &inner.install_path);
    inner.delegate.on_terminal(&UpdateOutcome::Installed {
        restart: plan.clone(),
    });

    set_phase(inner, UpdatePhase::Restarting);
    if let Err(e) = inner.restart.launch(&plan) {
        // The new build is installed but did not come up; the user has to
        // relaunch by hand.
        warn!("restart launch failed: {e}");
        set_phase(inner, UpdatePhase::Failed(e.kind().to_owned()));
        inner.delegate.on_terminal(&UpdateOutcome::Failed {
            kind: e.kind(),
            reason: e.to_string(),
        });
    }
    Ok(AttemptEnd::RestartHandedOff)
}

fn discard_artifact(dest: &Path) {
    if dest.exists() {
        let _ = std::fs::remove_file(dest);
    }
}
