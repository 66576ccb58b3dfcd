//! The thread-pool dispatcher keeps going through errors and panics.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use pdb_downloader_core::batch::Batch;
use pdb_downloader_core::dispatch::{ProgressReporter, TaskError, TaskResult, dispatch_blocking};
use pdb_downloader_core::fetch::FetchError;
use pdb_downloader_core::rate_limit::RateLimitConfig;

#[test]
fn every_other_item_failing_still_reports_all() {
    let limiter = RateLimitConfig::with_period(50, Duration::from_millis(100))
        .unwrap()
        .blocking();
    let batch = Batch::new((0..40).map(|i| format!("ID{i}")));
    let calls = AtomicUsize::new(0);

    let report = dispatch_blocking(
        &batch,
        Path::new("/out"),
        8,
        &limiter,
        |task| {
            calls.fetch_add(1, Ordering::SeqCst);
            if task.index() % 2 == 0 {
                Err(FetchError::http_status("http://mock/api", 500))
            } else if task.index() == 13 {
                panic!("bad record {}", task.accession());
            } else {
                Ok(PathBuf::from(task.accession()))
            }
        },
        &mut ProgressReporter::hidden(),
    )
    .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 40);
    assert_eq!(report.total(), 40);
    assert_eq!(report.failed(), 21);
    let panicked: Vec<&TaskResult> = report
        .results()
        .iter()
        .filter(|r| matches!(r.error(), Some(TaskError::Panicked { .. })))
        .collect();
    assert_eq!(panicked.len(), 1);
    assert_eq!(panicked[0].accession(), "ID13");
    assert_eq!(
        panicked[0].failure_message().unwrap(),
        "Error fetching 'ID13': fetch panicked: bad record ID13"
    );
}
