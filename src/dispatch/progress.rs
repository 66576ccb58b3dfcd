//! Progress reporting for dispatched batches.
//!
//! The dispatcher calls a [`ProgressObserver`] once per completed task, in
//! completion order. Observers only watch; they never influence scheduling.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use super::report::BatchReport;
use super::task::TaskResult;

/// Label shown next to the progress bar.
pub const PROGRESS_DESCRIPTION: &str = "Downloading PDBs from AlphaFold";

const PROGRESS_TEMPLATE: &str = "{msg}: {percent:>3}%|{wide_bar}| {pos}/{len} [{elapsed_precise}<{eta_precise}]";

/// Receives dispatch progress.
pub trait ProgressObserver: Send {
    /// Called once before any task runs.
    fn on_start(&mut self, _total: usize) {}

    /// Called once per result. `completed` counts results so far, including
    /// this one, and equals `total` on the last call.
    fn on_result(&mut self, result: &TaskResult, completed: usize, total: usize);

    /// Called once after the last result.
    fn on_finish(&mut self, _report: &BatchReport) {}

    /// True when this observer prints failure lines itself. The dispatcher
    /// then logs failures at debug level so they are not shown twice.
    fn shows_failures(&self) -> bool {
        false
    }
}

/// Terminal progress bar.
///
/// Failure lines are printed above the bar so they stay readable while it
/// redraws.
#[derive(Debug)]
pub struct ProgressReporter {
    bar: ProgressBar,
}

impl ProgressReporter {
    /// Progress bar drawn to stderr.
    #[must_use]
    pub fn new() -> Self {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template(PROGRESS_TEMPLATE)
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        bar.set_message(PROGRESS_DESCRIPTION);
        Self { bar }
    }

    /// Reporter that tracks position without drawing anything.
    #[must_use]
    pub fn hidden() -> Self {
        let reporter = Self::new();
        reporter.bar.set_draw_target(ProgressDrawTarget::hidden());
        reporter
    }

    /// Results reported so far.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.bar.position()
    }

    /// Expected number of results.
    #[must_use]
    pub fn length(&self) -> Option<u64> {
        self.bar.length()
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressObserver for ProgressReporter {
    fn on_start(&mut self, total: usize) {
        self.bar.set_length(total as u64);
        self.bar.set_position(0);
    }

    fn on_result(&mut self, result: &TaskResult, completed: usize, _total: usize) {
        if let Some(message) = result.failure_message() {
            self.bar.println(message);
        }
        self.bar.set_position(completed as u64);
    }

    fn on_finish(&mut self, _report: &BatchReport) {
        self.bar.finish();
    }

    fn shows_failures(&self) -> bool {
        !self.bar.is_hidden()
    }
}
