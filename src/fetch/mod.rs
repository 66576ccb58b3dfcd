//! Fetch operation: turns one accession into a structure file on disk.
//!
//! The dispatcher only sees the [`Fetch`] trait. The production
//! implementation, [`AlphaFoldFetcher`], resolves each accession through the
//! AlphaFold prediction API and streams the PDB file through a shared
//! [`FetchSession`], which owns connection pooling and transport retries.
//!
//! # Example
//!
//! ```no_run
//! use pdb_downloader_core::fetch::{AlphaFoldFetcher, DEFAULT_BASE_URL, FetchSession, RetryPolicy};
//! use url::Url;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let session = FetchSession::new(RetryPolicy::default())?;
//! let fetcher = AlphaFoldFetcher::new(session, Url::parse(DEFAULT_BASE_URL)?);
//! # Ok(())
//! # }
//! ```

mod alphafold;
mod error;
mod retry;
mod session;

use std::path::PathBuf;

use async_trait::async_trait;

pub use alphafold::{AlphaFoldFetcher, DEFAULT_BASE_URL};
pub use error::FetchError;
pub use retry::{
    DEFAULT_MAX_ATTEMPTS, FailureType, RetryDecision, RetryPolicy, classify_error,
    parse_retry_after,
};
pub use session::{CONNECT_TIMEOUT_SECS, FetchSession, READ_TIMEOUT_SECS};

use crate::dispatch::Task;

/// Fetches the resource named by one task.
///
/// Implementations must be shareable across workers. Each call handles
/// exactly one task and keeps no reference to it after returning.
#[async_trait]
pub trait Fetch: Send + Sync {
    /// Fetches `task` and returns the path the result was written to.
    async fn fetch(&self, task: &Task) -> Result<PathBuf, FetchError>;
}
