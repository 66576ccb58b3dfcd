//! Thread-pool dispatch for blocking fetch operations.

use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::Instant;

use tracing::{debug, info, instrument};

use super::progress::ProgressObserver;
use super::report::{BatchReport, ResultCollector};
use super::task::{Outcome, Task, TaskError, TaskResult, panic_message};
use super::validate_worker_count;
use crate::batch::Batch;
use crate::config::ConfigurationError;
use crate::fetch::FetchError;
use crate::rate_limit::BlockingRateLimiter;

/// Runs `fetch` for every accession of `batch` on up to `worker_count` OS
/// threads, each call gated by `limiter`.
///
/// Same contract as [`Dispatcher::run`](super::Dispatcher::run): one result
/// per task, consumed in completion order, failures and panics isolated.
/// Worker threads are scoped to this call, so `fetch` may borrow from the
/// caller.
///
/// # Errors
///
/// Returns [`ConfigurationError::InvalidWorkerCount`] if `worker_count` is
/// zero. Nothing runs in that case.
#[instrument(skip(batch, limiter, fetch, observer), fields(total = batch.len(), output_dir = %output_dir.display()))]
pub fn dispatch_blocking<F>(
    batch: &Batch,
    output_dir: &Path,
    worker_count: usize,
    limiter: &BlockingRateLimiter,
    fetch: F,
    observer: &mut dyn ProgressObserver,
) -> Result<BatchReport, ConfigurationError>
where
    F: Fn(&Task) -> Result<PathBuf, FetchError> + Sync,
{
    validate_worker_count(worker_count)?;

    let started = Instant::now();
    let tasks = batch.tasks(output_dir);
    let total = tasks.len();
    let mut collector = ResultCollector::new(total, observer);

    if total == 0 {
        debug!("empty batch, nothing to dispatch");
        return Ok(collector.finish(&tasks, started.elapsed()));
    }

    let workers = worker_count.min(total);
    info!(total, workers, "starting threaded dispatch");

    let cursor = AtomicUsize::new(0);
    thread::scope(|scope| {
        let (sender, receiver) = mpsc::channel();
        for worker in 0..workers {
            let sender = sender.clone();
            let (tasks, cursor, fetch) = (&tasks, &cursor, &fetch);
            scope.spawn(move || {
                loop {
                    let index = cursor.fetch_add(1, Ordering::Relaxed);
                    let Some(task) = tasks.get(index) else {
                        break;
                    };
                    debug!(worker, index, accession = task.accession(), "claimed task");

                    let outcome = execute(task, limiter, fetch);
                    if sender.send(TaskResult::new(task, outcome)).is_err() {
                        break;
                    }
                }
            });
        }
        drop(sender);

        for result in receiver {
            collector.record(result);
        }
    });

    let report = collector.finish(&tasks, started.elapsed());
    info!(
        succeeded = report.succeeded(),
        failed = report.failed(),
        elapsed_ms = report.elapsed().as_millis(),
        "threaded dispatch complete"
    );
    Ok(report)
}

fn execute<F>(task: &Task, limiter: &BlockingRateLimiter, fetch: &F) -> Outcome
where
    F: Fn(&Task) -> Result<PathBuf, FetchError> + Sync,
{
    let permit = limiter.acquire();
    let result = panic::catch_unwind(AssertUnwindSafe(|| fetch(task)));
    permit.release();

    match result {
        Ok(Ok(path)) => Outcome::Fetched(path),
        Ok(Err(error)) => Outcome::Failed(TaskError::Fetch(error)),
        Err(payload) => Outcome::Failed(TaskError::Panicked {
            message: panic_message(&*payload),
        }),
    }
}
