//! Transfer fetcher contract tests against a mock HTTP server.
//!
//! The fetcher itself is blocking; wiremock needs an async harness, so
//! each test drives the fetch through `spawn_blocking`.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use wren::config::UpdateConfig;
use wren::error::UpdateError;
use wren::progress::ProgressEvent;
use wren::transfer::{CancelFlag, fetch};

fn test_config() -> UpdateConfig {
    UpdateConfig {
        progress_interval_ms: 0,
        connect_timeout_secs: 5,
        idle_timeout_secs: 5,
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

async fn run_fetch(
    url: String,
    dest: PathBuf,
    cancel: CancelFlag,
) -> (Result<PathBuf, UpdateError>, Vec<ProgressEvent>) {
    let events: Arc<Mutex<Vec<ProgressEvent>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    let result = tokio::task::spawn_blocking(move || {
        fetch(&url, &dest, &test_config(), &cancel, |e| {
            if let Ok(mut guard) = sink.lock() {
                guard.push(e);
            }
        })
    })
    .await
    .expect("fetch task panicked");

    let collected = events.lock().expect("events poisoned").clone();
    (result, collected)
}

#[tokio::test(flavor = "multi_thread")]
async fn ten_megabyte_artifact_downloads_with_monotonic_progress() {
    let server = MockServer::start().await;
    let body = vec![0xA5u8; 10 * 1024 * 1024];
    Mock::given(method("GET"))
        .and(path("/Wren.exe"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().expect("tempdir");
    let dest = dir.path().join("Wren.exe");
    let (result, events) = run_fetch(
        format!("{}/Wren.exe", server.uri()),
        dest.clone(),
        CancelFlag::new(),
    )
    .await;

    let downloaded = result.expect("fetch should succeed");
    assert_eq!(downloaded, dest);
    assert_eq!(std::fs::read(&dest).expect("read artifact"), body);

    // Progress is monotonically non-decreasing and the final report
    // carries the exact advertised byte count.
    let counts = progress_counts(&events);
    assert!(!counts.is_empty());
    assert!(counts.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(*counts.last().expect("final count"), 10_485_760);
    assert!(matches!(
        events.first(),
        Some(ProgressEvent::FetchStarted {
            total_bytes: Some(10_485_760),
            ..
        })
    ));
    assert!(matches!(
        events.last(),
        Some(ProgressEvent::FetchComplete {
            bytes_received: 10_485_760
        })
    ));
    assert!(!dest.with_extension("part").exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn unreachable_server_is_network_unavailable() {
    // Port 1 is never serving; the connection is refused outright.
    let dir = tempfile::tempdir().expect("tempdir");
    let dest = dir.path().join("Wren.exe");
    let (result, _events) = run_fetch(
        "http://127.0.0.1:1/Wren.exe".to_owned(),
        dest.clone(),
        CancelFlag::new(),
    )
    .await;

    assert!(matches!(result, Err(UpdateError::NetworkUnavailable(_))));
    assert!(!dest.exists());
    assert!(!dest.with_extension("part").exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn http_error_status_is_network_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/Wren.exe"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().expect("tempdir");
    let dest = dir.path().join("Wren.exe");
    let (result, _events) = run_fetch(
        format!("{}/Wren.exe", server.uri()),
        dest.clone(),
        CancelFlag::new(),
    )
    .await;

    match result {
        Err(UpdateError::NetworkUnavailable(reason)) => {
            assert!(reason.contains("404"), "reason: {reason}");
        }
        other => panic!("expected NetworkUnavailable, got {other:?}"),
    }
    assert!(!dest.exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn pre_cancelled_fetch_leaves_nothing_behind() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/Wren-mac.zip"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8; 1024 * 1024]))
        .mount(&server)
        .await;

    let cancel = CancelFlag::new();
    cancel.cancel();

    let dir = tempfile::tempdir().expect("tempdir");
    let dest = dir.path().join("Wren-mac.zip");
    let (result, _events) =
        run_fetch(format!("{}/Wren-mac.zip", server.uri()), dest.clone(), cancel).await;

    assert!(matches!(result, Err(UpdateError::UserCancelled)));
    assert!(!dest.exists());
    assert!(!dest.with_extension("part").exists());
}

#[tokio::test(flavor = "multi_thread")]
async fn destination_under_a_file_is_unwritable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/Wren.exe"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"new build".to_vec()))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().expect("tempdir");
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, b"a file, not a directory").expect("write blocker");

    // Parent of the destination is a regular file; the directory cannot
    // be created no matter the privileges.
    let dest = blocker.join("downloads/Wren.exe");
    let (result, _events) =
        run_fetch(format!("{}/Wren.exe", server.uri()), dest, CancelFlag::new()).await;

    assert!(matches!(
        result,
        Err(UpdateError::DestinationUnwritable(_))
    ));
}
