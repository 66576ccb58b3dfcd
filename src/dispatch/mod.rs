//! Bounded, rate-limited dispatch of a batch of fetches.
//!
//! Two flavors share one contract (every task yields exactly one
//! [`TaskResult`], results are consumed as they complete, failures are
//! isolated):
//!
//! - [`Dispatcher`] runs an async [`Fetch`](crate::fetch::Fetch) on tokio
//!   workers behind a cooperative [`RateLimiter`](crate::rate_limit::RateLimiter).
//! - [`dispatch_blocking`] runs a blocking closure on scoped OS threads
//!   behind a [`BlockingRateLimiter`](crate::rate_limit::BlockingRateLimiter).
//!
//! Progress goes to a [`ProgressObserver`]; the aggregate is a [`BatchReport`].

mod engine;
mod progress;
mod report;
mod task;
mod threaded;

pub use engine::Dispatcher;
pub use progress::{PROGRESS_DESCRIPTION, ProgressObserver, ProgressReporter};
pub use report::BatchReport;
pub use task::{Outcome, Task, TaskError, TaskResult};
pub use threaded::dispatch_blocking;

use crate::config::ConfigurationError;

/// Minimum allowed worker count.
pub const MIN_WORKERS: usize = 1;

/// Default worker count.
pub const DEFAULT_WORKER_COUNT: usize = 20;

pub(crate) fn validate_worker_count(worker_count: usize) -> Result<(), ConfigurationError> {
    if worker_count >= MIN_WORKERS {
        Ok(())
    } else {
        Err(ConfigurationError::InvalidWorkerCount {
            value: worker_count,
        })
    }
}
