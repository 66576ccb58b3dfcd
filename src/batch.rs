//! Batch input: the ordered list of accessions to fetch.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, instrument};

use crate::dispatch::Task;

/// Errors loading a batch.
#[derive(Debug, Error)]
pub enum BatchError {
    /// The input list could not be read.
    #[error("failed to read accession list {path}: {source}")]
    Read {
        /// The input path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: io::Error,
    },
}

/// Ordered accessions, one task each.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    accessions: Vec<String>,
}

impl Batch {
    /// Builds a batch from accessions, in order.
    pub fn new<I, S>(accessions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            accessions: accessions.into_iter().map(Into::into).collect(),
        }
    }

    /// Reads one accession per line from `path`.
    ///
    /// # Errors
    ///
    /// Returns [`BatchError::Read`] if the file cannot be opened or read.
    #[instrument(fields(path = %path.display()))]
    pub fn from_path(path: &Path) -> Result<Self, BatchError> {
        let read_error = |source| BatchError::Read {
            path: path.to_path_buf(),
            source,
        };
        let file = File::open(path).map_err(read_error)?;
        let batch = Self::from_reader(BufReader::new(file)).map_err(read_error)?;
        debug!(accessions = batch.len(), "loaded accession list");
        Ok(batch)
    }

    /// Reads one accession per line. Lines are trimmed; blank lines are
    /// skipped.
    ///
    /// Blank lines are dropped before any truncation, so `limited(Some(n))`
    /// keeps the first `n` accessions, not the first `n` lines of the file.
    ///
    /// # Errors
    ///
    /// Returns the underlying IO error if reading fails.
    pub fn from_reader(reader: impl BufRead) -> io::Result<Self> {
        let mut accessions = Vec::new();
        for line in reader.lines() {
            let line = line?;
            let accession = line.trim();
            if !accession.is_empty() {
                accessions.push(accession.to_string());
            }
        }
        Ok(Self { accessions })
    }

    /// Keeps only the first `max_items` accessions.
    pub fn truncate(&mut self, max_items: usize) {
        self.accessions.truncate(max_items);
    }

    /// Builder form of [`Self::truncate`]; `None` keeps everything.
    #[must_use]
    pub fn limited(mut self, max_items: Option<usize>) -> Self {
        if let Some(max_items) = max_items {
            self.truncate(max_items);
        }
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.accessions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.accessions.is_empty()
    }

    /// Accessions in input order.
    #[must_use]
    pub fn accessions(&self) -> &[String] {
        &self.accessions
    }

    /// One task per accession, all writing to `output_dir`.
    #[must_use]
    pub fn tasks(&self, output_dir: &Path) -> Vec<Task> {
        let output_dir: Arc<Path> = Arc::from(output_dir);
        self.accessions
            .iter()
            .enumerate()
            .map(|(index, accession)| Task::new(index, accession.as_str(), Arc::clone(&output_dir)))
            .collect()
    }
}

impl<S: Into<String>> FromIterator<S> for Batch {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter)
    }
}
