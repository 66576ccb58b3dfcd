//! At most `max_calls` grants fall inside any `period`, whichever adapter
//! and however many callers share the limiter.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use pdb_downloader_core::rate_limit::RateLimitConfig;

fn assert_window_bound(mut grants: Vec<Instant>, max_calls: usize, period: Duration) {
    grants.sort();
    for window in grants.windows(max_calls + 1) {
        let span = window[max_calls] - window[0];
        assert!(
            span >= period,
            "{} grants within {span:?} (period {period:?})",
            max_calls + 1
        );
    }
}

#[test]
fn blocking_limiter_bound_under_thread_contention() {
    let max_calls = 4;
    let period = Duration::from_millis(150);
    let limiter = Arc::new(RateLimitConfig::with_period(max_calls, period).unwrap().blocking());
    let grants = Arc::new(Mutex::new(Vec::new()));

    let handles: Vec<_> = (0..8)
        .map(|worker| {
            let limiter = Arc::clone(&limiter);
            let grants = Arc::clone(&grants);
            thread::spawn(move || {
                for call in 0..3 {
                    let permit = limiter.acquire();
                    grants.lock().unwrap().push(permit.granted_at());
                    if (worker + call) % 2 == 0 {
                        thread::sleep(Duration::from_millis(5));
                    }
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let grants = Arc::try_unwrap(grants).unwrap().into_inner().unwrap();
    assert_eq!(grants.len(), 24);
    assert_window_bound(grants, max_calls, period);
    assert!(limiter.recorded_calls() <= max_calls);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn cooperative_limiter_bound_on_multi_thread_runtime() {
    let max_calls = 5;
    let period = Duration::from_millis(120);
    let limiter = Arc::new(
        RateLimitConfig::with_period(max_calls, period)
            .unwrap()
            .cooperative(),
    );

    let mut tasks = tokio::task::JoinSet::new();
    for _ in 0..16 {
        let limiter = Arc::clone(&limiter);
        tasks.spawn(async move {
            let mut grants = Vec::new();
            for _ in 0..2 {
                let permit = limiter.acquire().await;
                grants.push(permit.granted_at());
                tokio::task::yield_now().await;
            }
            grants
        });
    }

    let mut grants = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        grants.extend(joined.unwrap());
    }

    assert_eq!(grants.len(), 32);
    assert_window_bound(grants, max_calls, period);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cooperative_run_releases_even_when_future_errors() {
    let limiter = RateLimitConfig::with_period(2, Duration::from_millis(50))
        .unwrap()
        .cooperative();

    let result: Result<(), &str> = limiter.run(async { Err("upstream failed") }).await;

    assert!(result.is_err());
    assert_eq!(limiter.recorded_calls(), 1);
}
