//! Invalid limiter and run options are rejected before anything runs.

use std::sync::Arc;
use std::time::Duration;

use pdb_downloader_core::config::{ConfigurationError, FetchConfig};
use pdb_downloader_core::dispatch::Dispatcher;
use pdb_downloader_core::rate_limit::RateLimitConfig;

#[test]
fn non_positive_period_is_rejected() {
    for period in [0.0, -1.0, f64::NAN, f64::NEG_INFINITY] {
        assert!(
            matches!(
                RateLimitConfig::new(10, period),
                Err(ConfigurationError::InvalidPeriod { .. })
            ),
            "period {period} should be rejected"
        );
    }
    assert!(RateLimitConfig::with_period(10, Duration::ZERO).is_err());
}

#[test]
fn zero_max_calls_is_rejected() {
    assert_eq!(
        RateLimitConfig::new(0, 1.0).unwrap_err(),
        ConfigurationError::InvalidMaxCalls { value: 0 }
    );
}

#[test]
fn smallest_valid_values_are_accepted() {
    let config = RateLimitConfig::new(1, 0.001).unwrap();
    assert_eq!(config.max_calls(), 1);
    assert_eq!(config.period(), Duration::from_millis(1));
}

#[test]
fn zero_workers_is_rejected_but_any_positive_count_is_accepted() {
    let limiter = Arc::new(RateLimitConfig::default().cooperative());
    assert_eq!(
        Dispatcher::new(0, Arc::clone(&limiter)).unwrap_err(),
        ConfigurationError::InvalidWorkerCount { value: 0 }
    );
    assert!(Dispatcher::new(1, Arc::clone(&limiter)).is_ok());
    assert!(Dispatcher::new(150, limiter).is_ok());

    let config = FetchConfig {
        worker_count: 150,
        ..FetchConfig::new("out")
    };
    assert!(config.validate().is_ok());
}

#[test]
fn fetch_config_reports_first_problem() {
    let config = FetchConfig {
        max_calls: 0,
        worker_count: 0,
        ..FetchConfig::new("out")
    };
    assert_eq!(
        config.validate().unwrap_err(),
        ConfigurationError::InvalidMaxCalls { value: 0 }
    );
}
