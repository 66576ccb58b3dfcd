//! End-to-end batch run: config in, [`BatchReport`] out.

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, instrument};

use crate::batch::Batch;
use crate::config::{ConfigurationError, FetchConfig};
use crate::dispatch::{BatchReport, Dispatcher, ProgressObserver};
use crate::fetch::{AlphaFoldFetcher, FetchError, FetchSession, RetryPolicy};

/// Setup failures that stop a run before any task starts.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Invalid option.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// The output directory could not be created.
    #[error("failed to create output directory {path}: {source}")]
    OutputDir {
        /// Directory that could not be created.
        path: std::path::PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The HTTP session could not be built.
    #[error("failed to set up HTTP session: {0}")]
    Session(#[source] FetchError),
}

/// Validates `config`, then fetches every accession of `batch`.
///
/// The batch is truncated to `config.max_items` first. The output directory
/// is created if missing.
///
/// # Errors
///
/// Returns [`PipelineError`] for setup failures only. Per-accession failures
/// are recorded in the returned report.
#[instrument(skip(config, batch, observer), fields(output_dir = %config.output_dir.display()))]
pub async fn run_batch(
    config: &FetchConfig,
    batch: Batch,
    observer: &mut dyn ProgressObserver,
) -> Result<BatchReport, PipelineError> {
    let rate_limit = config.validate()?;
    let base_url = config.parsed_base_url()?;
    let batch = batch.limited(config.max_items);

    tokio::fs::create_dir_all(&config.output_dir)
        .await
        .map_err(|source| PipelineError::OutputDir {
            path: config.output_dir.clone(),
            source,
        })?;

    let session = FetchSession::new(RetryPolicy::with_max_attempts(config.max_attempts))
        .map_err(PipelineError::Session)?;
    let fetcher = Arc::new(AlphaFoldFetcher::new(session.clone(), base_url));
    let limiter = Arc::new(rate_limit.cooperative());
    let dispatcher = Dispatcher::new(config.worker_count, Arc::clone(&limiter))?;

    let report = dispatcher
        .run(&batch, &config.output_dir, fetcher, observer)
        .await;

    info!(
        succeeded = report.succeeded(),
        failed = report.failed(),
        retries = session.retries(),
        rate_limit_wait_ms = limiter.total_wait().as_millis(),
        elapsed_ms = report.elapsed().as_millis(),
        "batch finished"
    );
    Ok(report)
}
