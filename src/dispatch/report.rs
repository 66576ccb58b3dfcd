//! Aggregate outcome of a dispatched batch.

use std::time::Duration;

use tracing::{debug, warn};

use super::progress::ProgressObserver;
use super::task::{Outcome, Task, TaskError, TaskResult};

/// Every [`TaskResult`] of a run, in completion order.
#[derive(Debug, Default)]
pub struct BatchReport {
    results: Vec<TaskResult>,
    elapsed: Duration,
}

impl BatchReport {
    /// Builds a report from collected results.
    #[must_use]
    pub fn new(results: Vec<TaskResult>, elapsed: Duration) -> Self {
        Self { results, elapsed }
    }

    /// All results, in the order they completed.
    #[must_use]
    pub fn results(&self) -> &[TaskResult] {
        &self.results
    }

    /// Consumes the report, returning its results.
    #[must_use]
    pub fn into_results(self) -> Vec<TaskResult> {
        self.results
    }

    /// Number of tasks reported.
    #[must_use]
    pub fn total(&self) -> usize {
        self.results.len()
    }

    /// Number of tasks that produced a file.
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    /// Number of failed tasks.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.total() - self.succeeded()
    }

    /// Failed results only.
    pub fn failures(&self) -> impl Iterator<Item = &TaskResult> {
        self.results.iter().filter(|r| !r.is_success())
    }

    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.results.iter().any(|r| !r.is_success())
    }

    /// Wall time from dispatch start to the last result.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }
}

/// Consumes results as they complete and feeds the observer.
///
/// Shared by both dispatch flavors so that logging, progress counting and
/// the one-result-per-task guarantee behave identically.
pub(crate) struct ResultCollector<'o> {
    observer: &'o mut dyn ProgressObserver,
    reported: Vec<bool>,
    results: Vec<TaskResult>,
}

impl<'o> ResultCollector<'o> {
    pub(crate) fn new(total: usize, observer: &'o mut dyn ProgressObserver) -> Self {
        observer.on_start(total);
        Self {
            observer,
            reported: vec![false; total],
            results: Vec::with_capacity(total),
        }
    }

    pub(crate) fn record(&mut self, result: TaskResult) {
        match self.reported.get_mut(result.index()) {
            Some(reported) if !*reported => *reported = true,
            _ => {
                warn!(
                    index = result.index(),
                    accession = result.accession(),
                    "ignoring duplicate or unknown result"
                );
                return;
            }
        }

        if let Some(message) = result.failure_message() {
            if self.observer.shows_failures() {
                debug!(accession = result.accession(), "{message}");
            } else {
                warn!(accession = result.accession(), "{message}");
            }
        }

        self.results.push(result);
        let total = self.reported.len();
        if let Some(last) = self.results.last() {
            self.observer.on_result(last, self.results.len(), total);
        }
    }

    /// Reports any task that never produced a result, then builds the report.
    pub(crate) fn finish(mut self, tasks: &[Task], elapsed: Duration) -> BatchReport {
        let missing: Vec<&Task> = tasks
            .iter()
            .filter(|task| !self.reported.get(task.index()).copied().unwrap_or(true))
            .collect();
        for task in missing {
            self.record(TaskResult::new(task, Outcome::Failed(TaskError::WorkerLost)));
        }

        let report = BatchReport::new(self.results, elapsed);
        self.observer.on_finish(&report);
        report
    }
}
