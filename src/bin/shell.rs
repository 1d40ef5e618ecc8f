//! Console shell for Wren.
//!
//! Stands in for the native window: shows the installed version and drives
//! the self-update client through the same delegate seam a GUI would use.
//! Tracing output goes to stderr so stdout stays a clean prompt/status
//! stream.

use anyhow::Context;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::Write as _;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use wren::{
    ConfirmPoint, PlatformKind, ProcessRestart, ProgressEvent, ShellConfig, UpdateDelegate,
    UpdateOutcome, UpdatePhase, Updater,
};

/// Console implementation of the update delegate: an indicatif bar for
/// download progress, stdin prompts for the confirmation gates.
struct ConsoleDelegate {
    bar: Mutex<Option<ProgressBar>>,
}

impl ConsoleDelegate {
    fn new() -> Self {
        Self {
            bar: Mutex::new(None),
        }
    }
}

impl UpdateDelegate for ConsoleDelegate {
    fn on_progress(&self, event: ProgressEvent) {
        let Ok(mut bar) = self.bar.lock() else {
            return;
        };
        match event {
            ProgressEvent::FetchStarted { url, total_bytes } => {
                let pb = ProgressBar::new(total_bytes.unwrap_or(0));
                if let Ok(style) = ProgressStyle::with_template(
                    "  {msg} [{bar:30}] {bytes}/{total_bytes} {bytes_per_sec} ETA {eta}",
                ) {
                    pb.set_style(style);
                }
                pb.set_message(url);
                *bar = Some(pb);
            }
            ProgressEvent::FetchProgress {
                bytes_received,
                total_bytes,
            } => {
                if let Some(pb) = bar.as_ref() {
                    if let Some(total) = total_bytes {
                        pb.set_length(total);
                    }
                    pb.set_position(bytes_received);
                }
            }
            ProgressEvent::FetchComplete { bytes_received } => {
                if let Some(pb) = bar.take() {
                    pb.finish();
                }
                println!("Downloaded {bytes_received} bytes.");
            }
            ProgressEvent::BackupTaken { backup_path, .. } => {
                println!("Backup written to {}.", backup_path.display());
            }
            ProgressEvent::InstallStarted { install_path } => {
                println!("Installing over {}...", install_path.display());
            }
        }
    }

    fn on_confirm(&self, point: ConfirmPoint) -> bool {
        print!("{} [y/N] ", point.prompt());
        let _ = std::io::stdout().flush();
        let mut line = String::new();
        if std::io::stdin().read_line(&mut line).is_err() {
            return false;
        }
        matches!(line.trim(), "y" | "Y" | "yes")
    }

    fn on_terminal(&self, outcome: &UpdateOutcome) {
        if let Ok(mut bar) = self.bar.lock() {
            if let Some(pb) = bar.take() {
                pb.abandon();
            }
        }
        match outcome {
            UpdateOutcome::Installed { .. } => {
                println!("Update installed. Restarting...");
            }
            UpdateOutcome::Failed { kind, reason } => {
                println!("Update failed ({kind}): {reason}");
                println!("The previous version remains installed and runnable.");
            }
            UpdateOutcome::Cancelled => println!("Update cancelled."),
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let mut config_path: Option<PathBuf> = None;
    let mut command = String::from("update");
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                config_path =
                    Some(PathBuf::from(args.next().context("--config needs a path")?));
            }
            other => command = other.to_owned(),
        }
    }

    let config = match config_path {
        Some(path) => ShellConfig::from_file(&path)?,
        None => {
            let default = ShellConfig::default_config_path();
            if default.exists() {
                ShellConfig::from_file(&default)?
            } else {
                ShellConfig::default()
            }
        }
    };

    let install_path =
        std::env::current_exe().context("cannot determine current executable path")?;
    let install_dir = install_path
        .parent()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    let version = wren::version::installed_version(&install_dir);

    println!("Wren build bench");
    println!("Version: {version}");

    match command.as_str() {
        "version" => Ok(()),
        "update" => run_update(config, install_path),
        other => anyhow::bail!("unknown command '{other}' (expected 'update' or 'version')"),
    }
}

fn run_update(config: ShellConfig, install_path: PathBuf) -> anyhow::Result<()> {
    let platform =
        PlatformKind::detect().context("self-update supports Windows and macOS hosts only")?;

    let updater = Updater::new(
        config.update,
        platform,
        install_path,
        Arc::new(ConsoleDelegate::new()),
        Arc::new(ProcessRestart),
    );

    updater.start_update()?;
    updater.wait();

    if updater.current_phase() == UpdatePhase::Restarting {
        // The launcher has spawned the replacement (or its helper); this
        // process gets out of its way.
        std::process::exit(0);
    }
    Ok(())
}
