//! Units of work and their per-item outcomes.

use std::any::Any;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use crate::fetch::FetchError;

/// One accession to fetch.
///
/// Tasks are immutable; every task of a run shares the same output directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    index: usize,
    accession: String,
    output_dir: Arc<Path>,
}

impl Task {
    /// Creates the task at `index` of its batch.
    #[must_use]
    pub fn new(index: usize, accession: impl Into<String>, output_dir: Arc<Path>) -> Self {
        Self {
            index,
            accession: accession.into(),
            output_dir,
        }
    }

    /// Position in the batch (submission order).
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Identifier to fetch.
    #[must_use]
    pub fn accession(&self) -> &str {
        &self.accession
    }

    /// Directory the result is written to.
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }
}

/// Why a task did not produce a file.
#[derive(Debug, Error)]
pub enum TaskError {
    /// The fetch operation returned an error.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The fetch operation panicked.
    #[error("fetch panicked: {message}")]
    Panicked {
        /// Panic payload, if it was a string.
        message: String,
    },

    /// The worker holding the task exited without reporting it.
    #[error("worker exited before reporting a result")]
    WorkerLost,
}

/// Success or failure of a single task.
#[derive(Debug)]
pub enum Outcome {
    /// The structure was written to this path.
    Fetched(PathBuf),
    /// The task failed; the batch carried on.
    Failed(TaskError),
}

/// Result of exactly one [`Task`].
#[derive(Debug)]
pub struct TaskResult {
    index: usize,
    accession: String,
    outcome: Outcome,
}

impl TaskResult {
    /// Pairs `task` with its outcome.
    #[must_use]
    pub fn new(task: &Task, outcome: Outcome) -> Self {
        Self {
            index: task.index,
            accession: task.accession.clone(),
            outcome,
        }
    }

    /// Position of the task in its batch.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    #[must_use]
    pub fn accession(&self) -> &str {
        &self.accession
    }

    #[must_use]
    pub fn outcome(&self) -> &Outcome {
        &self.outcome
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, Outcome::Fetched(_))
    }

    /// Written path, for successful tasks.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match &self.outcome {
            Outcome::Fetched(path) => Some(path),
            Outcome::Failed(_) => None,
        }
    }

    /// Failure cause, for failed tasks.
    #[must_use]
    pub fn error(&self) -> Option<&TaskError> {
        match &self.outcome {
            Outcome::Fetched(_) => None,
            Outcome::Failed(error) => Some(error),
        }
    }

    /// One-line description of a failure, as shown to the user.
    #[must_use]
    pub fn failure_message(&self) -> Option<String> {
        self.error()
            .map(|error| format!("Error fetching '{}': {error}", self.accession))
    }
}

/// Converts a caught panic payload into text.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
