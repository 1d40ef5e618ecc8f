//! Streamed artifact download with progress and cooperative cancellation.
//!
//! The fetcher is deliberately blocking: the orchestrator runs it on a
//! dedicated worker thread and progress crosses back to the UI layer via
//! the delegate callbacks. Bytes are staged to a `.part` sibling and only
//! renamed onto the destination once the size check passes, so a failed or
//! cancelled transfer never leaves a plausible-looking artifact behind.

use crate::config::UpdateConfig;
use crate::error::{Result, UpdateError};
use crate::progress::{ProgressEvent, TransferStatus};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info};

const USER_AGENT: &str = concat!("wren/", env!("CARGO_PKG_VERSION"), " (self-update)");

/// Cooperative cancellation flag shared between the orchestrator and its
/// worker. Checked between chunks and between stages; never preemptive.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// One in-flight transfer. Owned by the fetcher for its duration and
/// discarded when the transfer completes or fails.
#[derive(Debug)]
pub struct DownloadTask {
    /// Source URL.
    pub url: String,
    /// Local destination path.
    pub dest: PathBuf,
    /// Total size in bytes, if the server advertised one.
    pub total_bytes: Option<u64>,
    /// Bytes received so far.
    pub received: u64,
    /// Current transfer status.
    pub status: TransferStatus,
}

impl DownloadTask {
    #[must_use]
    pub fn new(url: &str, dest: &Path) -> Self {
        Self {
            url: url.to_owned(),
            dest: dest.to_owned(),
            total_bytes: None,
            received: 0,
            status: TransferStatus::Pending,
        }
    }
}

/// Derive the local artifact filename from its URL.
#[must_use]
pub fn artifact_filename(url: &str) -> String {
    url.rsplit('/')
        .next()
        .filter(|s| !s.is_empty())
        .unwrap_or("artifact.bin")
        .to_owned()
}

/// Download `url` to `dest`, streaming to disk with bounded-cadence
/// progress callbacks.
///
/// On success `dest` contains the complete artifact and, when the server
/// advertised a `Content-Length`, the byte count has been verified against
/// it. Cancellation (via `cancel`) removes the partial file before
/// returning, leaving nothing on disk.
///
/// # Errors
///
/// - [`UpdateError::NetworkUnavailable`]: connection failure, HTTP error
///   status, or an idle stream exceeding the configured timeout.
/// - [`UpdateError::FetchIncomplete`]: the stream ended early or the byte
///   count disagrees with `Content-Length`.
/// - [`UpdateError::DestinationUnwritable`]: local filesystem failure.
/// - [`UpdateError::UserCancelled`]: the cancel flag was set mid-transfer.
pub fn fetch(
    url: &str,
    dest: &Path,
    config: &UpdateConfig,
    cancel: &CancelFlag,
    mut on_progress: impl FnMut(ProgressEvent),
) -> Result<PathBuf> {
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            UpdateError::DestinationUnwritable(format!(
                "cannot create {}: {e}",
                parent.display()
            ))
        })?;
    }

    let agent = ureq::AgentBuilder::new()
        .timeout_connect(Duration::from_secs(config.connect_timeout_secs))
        .timeout_read(Duration::from_secs(config.idle_timeout_secs))
        .build();

    info!("downloading {url}");
    let resp = agent
        .get(url)
        .set("User-Agent", USER_AGENT)
        .call()
        .map_err(|e| match e {
            ureq::Error::Status(code, _) => UpdateError::NetworkUnavailable(format!(
                "server returned HTTP {code} for {url}"
            )),
            other => UpdateError::NetworkUnavailable(format!("cannot reach {url}: {other}")),
        })?;

    let mut task = DownloadTask::new(url, dest);
    task.total_bytes = resp
        .header("content-length")
        .and_then(|v| v.parse::<u64>().ok());
    task.status = TransferStatus::InProgress;

    on_progress(ProgressEvent::FetchStarted {
        url: url.to_owned(),
        total_bytes: task.total_bytes,
    });

    stream_to_file(resp.into_reader(), &mut task, config, cancel, &mut on_progress)?;

    debug!(
        "fetched {} bytes to {}",
        task.received,
        task.dest.display()
    );
    Ok(task.dest.clone())
}

/// Core streaming loop: reader → `.part` staging file → rename onto the
/// destination once the size check passes.
fn stream_to_file(
    mut reader: impl Read,
    task: &mut DownloadTask,
    config: &UpdateConfig,
    cancel: &CancelFlag,
    on_progress: &mut impl FnMut(ProgressEvent),
) -> Result<()> {
    let staged = task.dest.with_extension("part");
    let mut file = std::fs::File::create(&staged).map_err(|e| {
        task.status = TransferStatus::Failed;
        UpdateError::DestinationUnwritable(format!("cannot create {}: {e}", staged.display()))
    })?;

    let interval = Duration::from_millis(config.progress_interval_ms);
    let mut last_emit: Option<Instant> = None;
    let mut buf = [0u8; 64 * 1024];

    loop {
        if cancel.is_cancelled() {
            drop(file);
            let _ = std::fs::remove_file(&staged);
            task.status = TransferStatus::Failed;
            info!("download cancelled after {} bytes, partial removed", task.received);
            return Err(UpdateError::UserCancelled);
        }

        let n = match reader.read(&mut buf) {
            Ok(n) => n,
            Err(e) => {
                drop(file);
                let _ = std::fs::remove_file(&staged);
                task.status = TransferStatus::Failed;
                let kind = e.kind();
                return Err(
                    if kind == std::io::ErrorKind::TimedOut
                        || kind == std::io::ErrorKind::WouldBlock
                    {
                        UpdateError::NetworkUnavailable(format!(
                            "no bytes received within {}s idle timeout",
                            config.idle_timeout_secs
                        ))
                    } else {
                        UpdateError::FetchIncomplete(format!(
                            "stream failed after {} bytes: {e}",
                            task.received
                        ))
                    },
                );
            }
        };
        if n == 0 {
            break;
        }

        if let Err(e) = file.write_all(&buf[..n]) {
            drop(file);
            let _ = std::fs::remove_file(&staged);
            task.status = TransferStatus::Failed;
            return Err(UpdateError::DestinationUnwritable(format!(
                "write to {} failed: {e}",
                staged.display()
            )));
        }
        task.received += n as u64;

        if last_emit.is_none_or(|t| t.elapsed() >= interval) {
            on_progress(ProgressEvent::FetchProgress {
                bytes_received: task.received,
                total_bytes: task.total_bytes,
            });
            last_emit = Some(Instant::now());
        }
    }

    if let Err(e) = file.sync_all() {
        drop(file);
        let _ = std::fs::remove_file(&staged);
        task.status = TransferStatus::Failed;
        return Err(UpdateError::DestinationUnwritable(format!(
            "flush of {} failed: {e}",
            staged.display()
        )));
    }
    drop(file);

    if let Some(total) = task.total_bytes {
        if task.received != total {
            let _ = std::fs::remove_file(&staged);
            task.status = TransferStatus::Failed;
            return Err(UpdateError::FetchIncomplete(format!(
                "expected {total} bytes, received {}",
                task.received
            )));
        }
    }

    std::fs::rename(&staged, &task.dest).map_err(|e| {
        let _ = std::fs::remove_file(&staged);
        task.status = TransferStatus::Failed;
        UpdateError::DestinationUnwritable(format!(
            "cannot move download into place at {}: {e}",
            task.dest.display()
        ))
    })?;
    task.status = TransferStatus::Completed;

    // The last progress report always carries the final byte count, even
    // when the cadence throttle swallowed intermediate updates.
    on_progress(ProgressEvent::FetchProgress {
        bytes_received: task.received,
        total_bytes: task.total_bytes,
    });
    on_progress(ProgressEvent::FetchComplete {
        bytes_received: task.received,
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use std::io::Cursor;

    fn zero_interval_config() -> UpdateConfig {
        UpdateConfig {
            progress_interval_ms: 0,
            ..UpdateConfig::default()
        }
    }

    fn progress_counts(events: &[ProgressEvent]) -> Vec<u64> {
        events
            .iter()
            .filter_map(|e| match e {
                ProgressEvent::FetchProgress { bytes_received, .. } => Some(*bytes_received),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn artifact_filename_from_url() {
        assert_eq!(
            artifact_filename("https://releases.example.com/wren/Wren.exe"),
            "Wren.exe"
        );
        assert_eq!(artifact_filename("https://example.com/a/b/c.zip"), "c.zip");
        assert_eq!(artifact_filename("https://example.com/"), "artifact.bin");
    }

    #[test]
    fn cancel_flag_round_trip() {
        let flag = CancelFlag::new();
        assert!(!flag.is_cancelled());
        flag.cancel();
        assert!(flag.is_cancelled());
        flag.reset();
        assert!(!flag.is_cancelled());
    }

    #[test]
    fn stream_reports_monotonic_progress_with_final_total() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("Wren.exe");
        let body = vec![7u8; 1_000_000];

        let mut task = DownloadTask::new("https://example.com/Wren.exe", &dest);
        task.total_bytes = Some(body.len() as u64);

        let mut events = Vec::new();
        stream_to_file(
            Cursor::new(body.clone()),
            &mut task,
            &zero_interval_config(),
            &CancelFlag::new(),
            &mut |e| events.push(e),
        )
        .unwrap();

        let counts = progress_counts(&events);
        assert!(!counts.is_empty());
        assert!(counts.windows(2).all(|w| w[0] <= w[1]), "non-decreasing");
        assert_eq!(*counts.last().unwrap(), body.len() as u64);
        assert!(matches!(
            events.last(),
            Some(ProgressEvent::FetchComplete { bytes_received }) if *bytes_received == body.len() as u64
        ));
        assert_eq!(task.status, TransferStatus::Completed);
        assert_eq!(std::fs::read(&dest).unwrap(), body);
        assert!(!dest.with_extension("part").exists());
    }

    #[test]
    fn content_length_mismatch_fails_and_removes_partial() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("Wren.exe");

        let mut task = DownloadTask::new("https://example.com/Wren.exe", &dest);
        // Server claims more bytes than the stream delivers.
        task.total_bytes = Some(10_000);

        let result = stream_to_file(
            Cursor::new(vec![0u8; 4_000]),
            &mut task,
            &zero_interval_config(),
            &CancelFlag::new(),
            &mut |_| {},
        );

        assert!(matches!(result, Err(UpdateError::FetchIncomplete(_))));
        assert_eq!(task.status, TransferStatus::Failed);
        assert!(!dest.exists());
        assert!(!dest.with_extension("part").exists());
    }

    /// Reader that trips the cancel flag after a number of reads, then
    /// keeps serving data (the loop must notice the flag, not the reader).
    struct CancellingReader {
        inner: Cursor<Vec<u8>>,
        flag: CancelFlag,
        reads_before_cancel: usize,
        reads: usize,
    }

    impl Read for CancellingReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.reads += 1;
            if self.reads > self.reads_before_cancel {
                self.flag.cancel();
            }
            self.inner.read(buf)
        }
    }

    #[test]
    fn cancellation_mid_stream_leaves_no_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("Wren-mac.zip");
        let flag = CancelFlag::new();

        let reader = CancellingReader {
            inner: Cursor::new(vec![1u8; 1_000_000]),
            flag: flag.clone(),
            reads_before_cancel: 2,
            reads: 0,
        };

        let mut task = DownloadTask::new("https://example.com/Wren-mac.zip", &dest);
        let result = stream_to_file(
            reader,
            &mut task,
            &zero_interval_config(),
            &flag,
            &mut |_| {},
        );

        assert!(matches!(result, Err(UpdateError::UserCancelled)));
        assert!(!dest.exists());
        assert!(!dest.with_extension("part").exists());
    }

    #[test]
    fn unwritable_destination_is_reported() {
        let dest = Path::new("/nonexistent-wren-dir/Wren.exe");
        let mut task = DownloadTask::new("https://example.com/Wren.exe", dest);

        let result = stream_to_file(
            Cursor::new(vec![0u8; 16]),
            &mut task,
            &zero_interval_config(),
            &CancelFlag::new(),
            &mut |_| {},
        );
        assert!(matches!(result, Err(UpdateError::DestinationUnwritable(_))));
    }

    #[test]
    fn cadence_throttle_suppresses_intermediate_events() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("Wren.exe");
        let body = vec![9u8; 512 * 1024];

        let mut task = DownloadTask::new("https://example.com/Wren.exe", &dest);
        task.total_bytes = Some(body.len() as u64);

        let config = UpdateConfig {
            // Effectively infinite: only the first chunk and the final
            // report should emit.
            progress_interval_ms: 3_600_000,
            ..UpdateConfig::default()
        };

        let mut events = Vec::new();
        stream_to_file(
            Cursor::new(body.clone()),
            &mut task,
            &config,
            &CancelFlag::new(),
            &mut |e| events.push(e),
        )
        .unwrap();

        let counts = progress_counts(&events);
        assert_eq!(counts.len(), 2);
        assert_eq!(*counts.last().unwrap(), body.len() as u64);
    }
}
