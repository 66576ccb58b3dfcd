//! Integration tests for the AlphaFold fetcher against a mock server.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use pdb_downloader_core::dispatch::Task;
use pdb_downloader_core::fetch::{Fetch, FetchError};
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

mod support;
use support::fixtures::{
    FlakyResponder, fetcher_for, mount_structure, mount_structure_file, pdb_body, prediction_json,
};
use support::socket_guard::start_mock_server_or_skip;

macro_rules! require_mock_server {
    () => {{
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        mock_server
    }};
}

fn task(accession: &str, dir: &Path) -> Task {
    Task::new(0, accession, Arc::from(dir))
}

#[tokio::test]
async fn test_fetch_writes_structure_named_after_accession() {
    let server = require_mock_server!();
    mount_structure(&server, "P69905").await;
    let temp = TempDir::new().unwrap();

    let written = fetcher_for(&server, 1)
        .fetch(&task("P69905", temp.path()))
        .await
        .unwrap();

    assert_eq!(written, temp.path().join("P69905.pdb"));
    let content = std::fs::read_to_string(&written).unwrap();
    assert_eq!(content, pdb_body("P69905"));
    assert!(!temp.path().join("P69905.pdb.part").exists());
}

#[tokio::test]
async fn test_fetch_404_is_http_status_error_without_retry() {
    let server = require_mock_server!();
    Mock::given(method("GET"))
        .and(path("/api/prediction/NOPE01"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    let temp = TempDir::new().unwrap();

    let err = fetcher_for(&server, 3)
        .fetch(&task("NOPE01", temp.path()))
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(404));
    assert!(!temp.path().join("NOPE01.pdb").exists());
}

#[tokio::test]
async fn test_fetch_empty_prediction_list_is_missing_structure() {
    let server = require_mock_server!();
    Mock::given(method("GET"))
        .and(path("/api/prediction/EMPTY1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    let temp = TempDir::new().unwrap();

    let err = fetcher_for(&server, 1)
        .fetch(&task("EMPTY1", temp.path()))
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::MissingStructure { ref accession } if accession == "EMPTY1"));
}

#[tokio::test]
async fn test_fetch_malformed_prediction_is_decode_error() {
    let server = require_mock_server!();
    Mock::given(method("GET"))
        .and(path("/api/prediction/BAD001"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;
    let temp = TempDir::new().unwrap();

    let err = fetcher_for(&server, 1)
        .fetch(&task("BAD001", temp.path()))
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::Decode { .. }));
}

#[tokio::test]
async fn test_fetch_retries_transient_server_errors() {
    let server = require_mock_server!();
    let responder = FlakyResponder::new(
        2,
        503,
        ResponseTemplate::new(200).set_body_json(prediction_json(&server, "Q8W3K0")),
    );
    let attempts = responder.counter();
    Mock::given(method("GET"))
        .and(path("/api/prediction/Q8W3K0"))
        .respond_with(responder)
        .mount(&server)
        .await;
    mount_structure_file(&server, "Q8W3K0").await;
    let temp = TempDir::new().unwrap();
    let fetcher = fetcher_for(&server, 3);

    let written = fetcher
        .fetch(&task("Q8W3K0", temp.path()))
        .await
        .unwrap();

    assert!(written.exists());
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
    assert_eq!(fetcher.session().retries(), 2);
}

#[tokio::test]
async fn test_fetch_gives_up_after_max_attempts() {
    let server = require_mock_server!();
    Mock::given(method("GET"))
        .and(path("/api/prediction/DOWN01"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&server)
        .await;
    let temp = TempDir::new().unwrap();

    let err = fetcher_for(&server, 2)
        .fetch(&task("DOWN01", temp.path()))
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(500));
}

#[tokio::test]
async fn test_fetch_honors_retry_after_on_429() {
    let server = require_mock_server!();
    let responder = FlakyResponder::new(
        1,
        429,
        ResponseTemplate::new(200).set_body_json(prediction_json(&server, "P68871")),
    )
    .with_retry_after("1");
    Mock::given(method("GET"))
        .and(path("/api/prediction/P68871"))
        .respond_with(responder)
        .mount(&server)
        .await;
    mount_structure_file(&server, "P68871").await;
    let temp = TempDir::new().unwrap();

    let start = Instant::now();
    let written = fetcher_for(&server, 3)
        .fetch(&task("P68871", temp.path()))
        .await
        .unwrap();

    assert!(written.exists());
    assert!(
        start.elapsed() >= Duration::from_millis(900),
        "Retry-After should delay the second attempt, took {:?}",
        start.elapsed()
    );
}

#[tokio::test]
async fn test_fetch_structure_download_failure_leaves_no_file() {
    let server = require_mock_server!();
    Mock::given(method("GET"))
        .and(path("/api/prediction/GONE01"))
        .respond_with(ResponseTemplate::new(200).set_body_json(prediction_json(&server, "GONE01")))
        .mount(&server)
        .await;
    let temp = TempDir::new().unwrap();

    let err = fetcher_for(&server, 1)
        .fetch(&task("GONE01", temp.path()))
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(404));
    assert!(!temp.path().join("GONE01.pdb").exists());
    assert!(!temp.path().join("GONE01.pdb.part").exists());
}

#[tokio::test]
async fn test_fetch_rejects_path_like_accession_without_request() {
    let server = require_mock_server!();
    let temp = TempDir::new().unwrap();

    let err = fetcher_for(&server, 1)
        .fetch(&task("../escape", temp.path()))
        .await
        .unwrap_err();

    assert!(matches!(err, FetchError::InvalidAccession { .. }));
    assert!(server.received_requests().await.unwrap().is_empty());
}
