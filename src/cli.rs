//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;
use clap::builder::RangedU64ValueParser;

use pdb_downloader_core::config::FetchConfig;
use pdb_downloader_core::dispatch::DEFAULT_WORKER_COUNT;
use pdb_downloader_core::fetch::{DEFAULT_BASE_URL, DEFAULT_MAX_ATTEMPTS};
use pdb_downloader_core::rate_limit::{DEFAULT_MAX_CALLS, DEFAULT_PERIOD_SECS};

/// Download predicted protein structures from the AlphaFold database.
///
/// Reads one UniProt accession per line and writes `<accession>.pdb` files
/// into the output directory, keeping requests under a sliding-window rate.
#[derive(Parser, Debug)]
#[command(name = "download-pdbs")]
#[command(author, version, about)]
pub struct Args {
    /// File with one accession per line
    #[arg(short, long)]
    pub input: PathBuf,

    /// Directory for the downloaded PDB files (created if missing)
    #[arg(short, long)]
    pub output: PathBuf,

    /// Only download the first N accessions
    #[arg(short = 'M', long)]
    pub max_structures: Option<usize>,

    /// Maximum requests per rate-limit period
    #[arg(long, default_value_t = DEFAULT_MAX_CALLS as u32, value_parser = clap::value_parser!(u32).range(1..))]
    pub max_calls: u32,

    /// Rate-limit period in seconds
    #[arg(long, default_value_t = DEFAULT_PERIOD_SECS)]
    pub period: f64,

    /// Concurrent download workers
    #[arg(short, long, default_value_t = DEFAULT_WORKER_COUNT, value_parser = RangedU64ValueParser::<usize>::new().range(1..))]
    pub workers: usize,

    /// Attempts per request, including the first (1-10)
    #[arg(short = 'a', long, default_value_t = DEFAULT_MAX_ATTEMPTS as u8, value_parser = clap::value_parser!(u8).range(1..=10))]
    pub max_attempts: u8,

    /// AlphaFold service root
    #[arg(long, default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    /// Run configuration described by these arguments.
    pub fn fetch_config(&self) -> FetchConfig {
        FetchConfig {
            max_calls: self.max_calls as usize,
            period_secs: self.period,
            worker_count: self.workers,
            max_items: self.max_structures,
            base_url: self.base_url.clone(),
            max_attempts: u32::from(self.max_attempts),
            ..FetchConfig::new(&self.output)
        }
    }
}
