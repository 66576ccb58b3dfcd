//! Async dispatcher: a bounded pool of tokio workers behind one rate limiter.
//!
//! # Overview
//!
//! The [`Dispatcher`] runs every accession of a [`Batch`] through a
//! [`Fetch`] implementation. At most `worker_count` fetches are in flight at
//! once and every fetch first acquires the shared [`RateLimiter`].
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//! use pdb_downloader_core::batch::Batch;
//! use pdb_downloader_core::dispatch::{Dispatcher, ProgressReporter};
//! use pdb_downloader_core::fetch::{AlphaFoldFetcher, DEFAULT_BASE_URL, FetchSession, RetryPolicy};
//! use pdb_downloader_core::rate_limit::RateLimitConfig;
//! use url::Url;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let limiter = Arc::new(RateLimitConfig::new(100, 1.0)?.cooperative());
//! let dispatcher = Dispatcher::new(20, limiter)?;
//! let session = FetchSession::new(RetryPolicy::default())?;
//! let fetcher = Arc::new(AlphaFoldFetcher::new(session, Url::parse(DEFAULT_BASE_URL)?));
//!
//! let batch = Batch::new(["P69905", "P68871"]);
//! let mut progress = ProgressReporter::new();
//! let report = dispatcher.run(&batch, Path::new("./pdbs"), fetcher, &mut progress).await;
//! println!("{} fetched, {} failed", report.succeeded(), report.failed());
//! # Ok(())
//! # }
//! ```

use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures_util::FutureExt;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use super::progress::ProgressObserver;
use super::report::{BatchReport, ResultCollector};
use super::task::{Outcome, Task, TaskError, TaskResult, panic_message};
use super::validate_worker_count;
use crate::batch::Batch;
use crate::config::ConfigurationError;
use crate::fetch::Fetch;
use crate::rate_limit::RateLimiter;

/// Bounded pool of tokio workers sharing one [`RateLimiter`].
///
/// # Concurrency Model
///
/// - `min(worker_count, batch length)` workers are spawned into a `JoinSet`
/// - Workers claim tasks in input order from a shared atomic cursor
/// - Each fetch runs between a limiter acquire and release
/// - Results flow back over a channel and are consumed as they complete
///
/// # Failure Isolation
///
/// - A fetch error becomes a failed [`TaskResult`]; the batch continues
/// - A panicking fetch is caught and reported as [`TaskError::Panicked`]
/// - The dispatcher never retries; retrying is the fetch operation's job
#[derive(Debug, Clone)]
pub struct Dispatcher {
    worker_count: usize,
    limiter: Arc<RateLimiter>,
}

impl Dispatcher {
    /// Creates a dispatcher with `worker_count` workers.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::InvalidWorkerCount`] if `worker_count`
    /// is zero. Counts above the batch size are fine; only `min(W, K)`
    /// workers are ever spawned.
    #[instrument(level = "debug", skip(limiter))]
    pub fn new(worker_count: usize, limiter: Arc<RateLimiter>) -> Result<Self, ConfigurationError> {
        validate_worker_count(worker_count)?;
        debug!(
            worker_count,
            max_calls = limiter.max_calls(),
            period_ms = limiter.period().as_millis(),
            "creating dispatcher"
        );
        Ok(Self {
            worker_count,
            limiter,
        })
    }

    /// Configured worker count.
    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Limiter every fetch goes through.
    #[must_use]
    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Fetches every accession of `batch` into `output_dir`.
    ///
    /// Returns once each task has produced exactly one result. Individual
    /// failures never abort the run; they are logged, shown to `observer`
    /// and recorded in the report.
    #[instrument(skip(self, batch, fetcher, observer), fields(total = batch.len(), output_dir = %output_dir.display()))]
    pub async fn run(
        &self,
        batch: &Batch,
        output_dir: &Path,
        fetcher: Arc<dyn Fetch>,
        observer: &mut dyn ProgressObserver,
    ) -> BatchReport {
        let started = Instant::now();
        let tasks: Arc<[Task]> = batch.tasks(output_dir).into();
        let total = tasks.len();
        let mut collector = ResultCollector::new(total, observer);

        if total == 0 {
            debug!("empty batch, nothing to dispatch");
            return collector.finish(&tasks, started.elapsed());
        }

        let workers = self.worker_count.min(total);
        info!(total, workers, "starting dispatch");

        let cursor = Arc::new(AtomicUsize::new(0));
        let (sender, mut receiver) = mpsc::unbounded_channel();
        let mut pool = JoinSet::new();
        for worker in 0..workers {
            pool.spawn(worker_loop(
                worker,
                Arc::clone(&tasks),
                Arc::clone(&cursor),
                Arc::clone(&self.limiter),
                Arc::clone(&fetcher),
                sender.clone(),
            ));
        }
        // Only workers hold senders now; the channel closes when the last exits.
        drop(sender);

        while let Some(result) = receiver.recv().await {
            collector.record(result);
        }

        while let Some(joined) = pool.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "dispatch worker ended abnormally");
            }
        }

        let report = collector.finish(&tasks, started.elapsed());
        info!(
            succeeded = report.succeeded(),
            failed = report.failed(),
            elapsed_ms = report.elapsed().as_millis(),
            "dispatch complete"
        );
        report
    }
}

async fn worker_loop(
    worker: usize,
    tasks: Arc<[Task]>,
    cursor: Arc<AtomicUsize>,
    limiter: Arc<RateLimiter>,
    fetcher: Arc<dyn Fetch>,
    results: UnboundedSender<TaskResult>,
) {
    loop {
        let index = cursor.fetch_add(1, Ordering::Relaxed);
        let Some(task) = tasks.get(index) else {
            break;
        };
        debug!(worker, index, accession = task.accession(), "claimed task");

        let outcome = execute(task, &limiter, fetcher.as_ref()).await;
        if results.send(TaskResult::new(task, outcome)).is_err() {
            debug!(worker, "result channel closed, stopping");
            break;
        }
    }
}

async fn execute(task: &Task, limiter: &RateLimiter, fetcher: &dyn Fetch) -> Outcome {
    let permit = limiter.acquire().await;
    let result = AssertUnwindSafe(fetcher.fetch(task)).catch_unwind().await;
    permit.release();

    match result {
        Ok(Ok(path)) => Outcome::Fetched(path),
        Ok(Err(error)) => Outcome::Failed(TaskError::Fetch(error)),
        Err(payload) => Outcome::Failed(TaskError::Panicked {
            message: panic_message(&*payload),
        }),
    }
}
