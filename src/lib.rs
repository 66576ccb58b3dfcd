//! PDB Downloader Core Library
//!
//! Fetches predicted protein structures for a list of accessions while
//! keeping upstream requests under a sliding-window rate limit and
//! in-flight work under a fixed worker count.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`rate_limit`] - Sliding-window rate limiter with blocking and async adapters
//! - [`dispatch`] - Bounded worker pool, per-task results and progress reporting
//! - [`fetch`] - AlphaFold fetch operation over a retrying HTTP session
//! - [`batch`] - Line-delimited accession lists
//! - [`config`] - Run options and their validation
//! - [`pipeline`] - Wires the above into a single batch run

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod batch;
pub mod config;
pub mod dispatch;
pub mod fetch;
pub mod pipeline;
pub mod rate_limit;

// Re-export commonly used types
pub use batch::{Batch, BatchError};
pub use config::{ConfigurationError, FetchConfig};
pub use dispatch::{
    BatchReport, DEFAULT_WORKER_COUNT, Dispatcher, Outcome, ProgressObserver, ProgressReporter,
    Task, TaskError, TaskResult, dispatch_blocking,
};
pub use fetch::{AlphaFoldFetcher, Fetch, FetchError, FetchSession, RetryPolicy};
pub use pipeline::{PipelineError, run_batch};
pub use rate_limit::{BlockingRateLimiter, RateLimitConfig, RateLimiter};
