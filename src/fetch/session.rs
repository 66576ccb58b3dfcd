//! Shared HTTP session with transport-level retry.
//!
//! One [`FetchSession`] is built per run and cloned into every worker; the
//! underlying reqwest client pools connections across clones.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, Response};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, instrument};

use super::FetchError;
use super::retry::{RetryDecision, RetryPolicy, classify_error, retry_after_delay};

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default HTTP read timeout (5 minutes).
pub const READ_TIMEOUT_SECS: u64 = 300;

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// HTTP client plus the retry policy applied to every request it sends.
#[derive(Debug, Clone)]
pub struct FetchSession {
    client: Client,
    policy: RetryPolicy,
    retries: Arc<AtomicUsize>,
}

impl FetchSession {
    /// Builds a session with default timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::ClientBuild`] if the HTTP client cannot be built.
    pub fn new(policy: RetryPolicy) -> Result<Self, FetchError> {
        Self::with_timeouts(policy, CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS)
    }

    /// Builds a session with explicit timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::ClientBuild`] if the HTTP client cannot be built.
    #[instrument(level = "debug", skip(policy), fields(max_attempts = policy.max_attempts()))]
    pub fn with_timeouts(
        policy: RetryPolicy,
        connect_timeout_secs: u64,
        read_timeout_secs: u64,
    ) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(connect_timeout_secs))
            .read_timeout(Duration::from_secs(read_timeout_secs))
            .gzip(true)
            .build()
            .map_err(|source| FetchError::ClientBuild { source })?;
        Ok(Self {
            client,
            policy,
            retries: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Retry policy applied to each request.
    #[must_use]
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Retry attempts made so far across all clones of this session.
    #[must_use]
    pub fn retries(&self) -> usize {
        self.retries.load(Ordering::SeqCst)
    }

    /// Sends a GET request, retrying transient failures.
    ///
    /// Only a successful (2xx) response is returned.
    ///
    /// # Errors
    ///
    /// Returns the last [`FetchError`] once the policy gives up.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn get(&self, url: &str) -> Result<Response, FetchError> {
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            debug!(attempt, "sending request");

            let error = match self.client.get(url).send().await {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) => {
                    let retry_after = response
                        .headers()
                        .get(RETRY_AFTER)
                        .and_then(|value| value.to_str().ok())
                        .map(str::to_string);
                    FetchError::http_status_with_retry_after(
                        url,
                        response.status().as_u16(),
                        retry_after,
                    )
                }
                Err(e) if e.is_timeout() => FetchError::timeout(url),
                Err(e) => FetchError::network(url, e),
            };

            match self.policy.should_retry(classify_error(&error), attempt) {
                RetryDecision::Retry {
                    delay: backoff_delay,
                    attempt: next_attempt,
                } => {
                    let retry_after = retry_after_delay(&error);
                    let delay = retry_after.unwrap_or(backoff_delay);
                    info!(
                        url,
                        attempt = next_attempt,
                        max_attempts = self.policy.max_attempts(),
                        delay_ms = delay.as_millis(),
                        using_retry_after = retry_after.is_some(),
                        error = %error,
                        "retrying request"
                    );
                    self.retries.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(delay).await;
                }
                RetryDecision::DoNotRetry { reason } => {
                    debug!(url, %reason, "not retrying request");
                    return Err(error);
                }
            }
        }
    }

    /// Fetches `url` and returns the body as text.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] if the request or body read fails.
    pub async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        let response = self.get(url).await?;
        response
            .text()
            .await
            .map_err(|e| FetchError::network(url, e))
    }

    /// Streams the body of `url` into `destination`.
    ///
    /// The body is written to a `.part` sibling first and renamed into place
    /// once complete, so `destination` only ever holds a whole file.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] on request, stream or file system failure.
    #[instrument(skip(self), fields(url = %url, path = %destination.display()))]
    pub async fn download_to(&self, url: &str, destination: &Path) -> Result<u64, FetchError> {
        let response = self.get(url).await?;
        let partial = partial_path(destination);

        let written = match write_body(response, url, &partial).await {
            Ok(written) => written,
            Err(e) => {
                let _ = tokio::fs::remove_file(&partial).await;
                return Err(e);
            }
        };

        tokio::fs::rename(&partial, destination)
            .await
            .map_err(|e| FetchError::io(destination, e))?;
        debug!(bytes = written, "structure written");
        Ok(written)
    }
}

async fn write_body(response: Response, url: &str, path: &Path) -> Result<u64, FetchError> {
    let file = File::create(path)
        .await
        .map_err(|e| FetchError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    let mut stream = response.bytes_stream();
    let mut written = 0u64;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| FetchError::network(url, e))?;
        writer
            .write_all(&chunk)
            .await
            .map_err(|e| FetchError::io(path, e))?;
        written += chunk.len() as u64;
    }

    writer.flush().await.map_err(|e| FetchError::io(path, e))?;
    Ok(written)
}

fn partial_path(destination: &Path) -> PathBuf {
    let mut name = destination.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    destination.with_file_name(name)
}
