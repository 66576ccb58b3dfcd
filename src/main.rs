//! CLI entry point for `download-pdbs`.

use std::io::{self, IsTerminal};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use pdb_downloader_core::batch::Batch;
use pdb_downloader_core::dispatch::ProgressReporter;
use pdb_downloader_core::pipeline::run_batch;
use tracing::{debug, error, info, warn};

mod cli;

use cli::Args;

/// Exit status when every accession was fetched.
const EXIT_OK: u8 = 0;

/// Exit status when at least one accession failed.
const EXIT_SOME_FAILED: u8 = 1;

/// Exit status when the run could not start.
const EXIT_SETUP_ERROR: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    match run(&args).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            error!("{e:#}");
            ExitCode::from(EXIT_SETUP_ERROR)
        }
    }
}

async fn run(args: &Args) -> Result<u8> {
    let config = args.fetch_config();
    let batch = Batch::from_path(&args.input)?;
    info!(
        accessions = batch.len(),
        input = %args.input.display(),
        "loaded accession list"
    );

    let mut progress = if args.quiet || !io::stderr().is_terminal() {
        ProgressReporter::hidden()
    } else {
        ProgressReporter::new()
    };

    let report = run_batch(&config, batch, &mut progress)
        .await
        .context("download run could not start")?;

    info!(
        succeeded = report.succeeded(),
        failed = report.failed(),
        total = report.total(),
        output = %config.output_dir.display(),
        "Download complete"
    );

    if report.has_failures() {
        warn!(failed = report.failed(), "some failures occurred");
        Ok(EXIT_SOME_FAILED)
    } else {
        Ok(EXIT_OK)
    }
}
