//! AlphaFold-shaped mock endpoints and fetcher builders.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use pdb_downloader_core::fetch::{AlphaFoldFetcher, FetchSession, RetryPolicy};
use serde_json::json;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// Minimal PDB body served for every structure.
pub fn pdb_body(accession: &str) -> String {
    format!("HEADER    PREDICTED MODEL {accession}\nATOM      1  N   MET A   1\nEND\n")
}

/// Retry policy with short delays and no jitter.
pub fn fast_policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy::new(
        max_attempts,
        Duration::from_millis(10),
        Duration::from_millis(50),
        2.0,
    )
    .with_max_jitter(Duration::ZERO)
}

/// Fetcher pointed at `server`.
pub fn fetcher_for(server: &MockServer, max_attempts: u32) -> AlphaFoldFetcher {
    let session = FetchSession::new(fast_policy(max_attempts)).unwrap();
    AlphaFoldFetcher::new(session, Url::parse(&server.uri()).unwrap())
}

/// Prediction payload listing one model whose file lives on `server`.
pub fn prediction_json(server: &MockServer, accession: &str) -> serde_json::Value {
    json!([{
        "entryId": format!("AF-{accession}-F1"),
        "uniprotAccession": accession,
        "pdbUrl": format!("{}{}", server.uri(), structure_path(accession)),
    }])
}

pub fn structure_path(accession: &str) -> String {
    format!("/files/AF-{accession}-F1-model_v4.pdb")
}

/// Serves a prediction entry and its PDB file for `accession`.
pub async fn mount_structure(server: &MockServer, accession: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/api/prediction/{accession}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(prediction_json(server, accession)))
        .mount(server)
        .await;
    mount_structure_file(server, accession).await;
}

/// Serves only the PDB file for `accession`.
pub async fn mount_structure_file(server: &MockServer, accession: &str) {
    Mock::given(method("GET"))
        .and(path(structure_path(accession)))
        .respond_with(ResponseTemplate::new(200).set_body_string(pdb_body(accession)))
        .mount(server)
        .await;
}

/// Answers the prediction endpoint for `accession` with a bare status.
pub async fn mount_status(server: &MockServer, accession: &str, status: u16) {
    Mock::given(method("GET"))
        .and(path(format!("/api/prediction/{accession}")))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

/// Fails the first `fail_count` requests with `fail_status`, then returns
/// `success`.
pub struct FlakyResponder {
    request_count: Arc<AtomicUsize>,
    fail_count: usize,
    fail_status: u16,
    retry_after: Option<&'static str>,
    success: ResponseTemplate,
}

impl FlakyResponder {
    pub fn new(fail_count: usize, fail_status: u16, success: ResponseTemplate) -> Self {
        Self {
            request_count: Arc::new(AtomicUsize::new(0)),
            fail_count,
            fail_status,
            retry_after: None,
            success,
        }
    }

    pub fn with_retry_after(mut self, value: &'static str) -> Self {
        self.retry_after = Some(value);
        self
    }

    pub fn counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.request_count)
    }
}

impl Respond for FlakyResponder {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let seen = self.request_count.fetch_add(1, Ordering::SeqCst);
        if seen < self.fail_count {
            let mut response = ResponseTemplate::new(self.fail_status);
            if let Some(value) = self.retry_after {
                response = response.insert_header("Retry-After", value);
            }
            response
        } else {
            self.success.clone()
        }
    }
}
