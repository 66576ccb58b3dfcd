//! Run configuration and its validation.
//!
//! [`FetchConfig`] gathers every option a batch run recognizes. It is
//! validated once, up front; nothing downstream re-checks these values.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;
use url::Url;

use crate::dispatch::{DEFAULT_WORKER_COUNT, validate_worker_count};
use crate::fetch::{DEFAULT_BASE_URL, DEFAULT_MAX_ATTEMPTS};
use crate::rate_limit::{DEFAULT_MAX_CALLS, DEFAULT_PERIOD_SECS, RateLimitConfig, WaitCallback};

/// Invalid configuration detected before any work starts.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    /// Rate limiting period is not a positive number of seconds.
    #[error("rate limiting period should be > 0, got {value}")]
    InvalidPeriod {
        /// The rejected period in seconds.
        value: f64,
    },

    /// Rate limiting budget is zero.
    #[error("rate limiting number of calls should be > 0, got {value}")]
    InvalidMaxCalls {
        /// The rejected call budget.
        value: usize,
    },

    /// Worker count is zero.
    #[error("invalid worker count {value}: must be at least 1")]
    InvalidWorkerCount {
        /// The rejected worker count.
        value: usize,
    },

    /// Base URL could not be parsed or cannot carry a path.
    #[error("invalid base URL {value:?}: {reason}")]
    InvalidBaseUrl {
        /// The rejected URL text.
        value: String,
        /// Why it was rejected.
        reason: String,
    },
}

/// All options recognized by a batch run.
#[derive(Clone)]
pub struct FetchConfig {
    /// Directory the fetched structures are written to.
    pub output_dir: PathBuf,
    /// Calls admitted per `period_secs`.
    pub max_calls: usize,
    /// Rate window in seconds.
    pub period_secs: f64,
    /// Concurrent workers.
    pub worker_count: usize,
    /// Keep only the first `max_items` accessions.
    pub max_items: Option<usize>,
    /// Informational hook told about every rate-limit wait.
    pub rate_limit_callback: Option<WaitCallback>,
    /// AlphaFold service root.
    pub base_url: String,
    /// Attempts per HTTP request, including the first. Zero is treated as 1.
    pub max_attempts: u32,
}

impl fmt::Debug for FetchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchConfig")
            .field("output_dir", &self.output_dir)
            .field("max_calls", &self.max_calls)
            .field("period_secs", &self.period_secs)
            .field("worker_count", &self.worker_count)
            .field("max_items", &self.max_items)
            .field("rate_limit_callback", &self.rate_limit_callback.is_some())
            .field("base_url", &self.base_url)
            .field("max_attempts", &self.max_attempts)
            .finish()
    }
}

impl FetchConfig {
    /// Config with defaults for everything but the output directory.
    #[must_use]
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            max_calls: DEFAULT_MAX_CALLS,
            period_secs: DEFAULT_PERIOD_SECS,
            worker_count: DEFAULT_WORKER_COUNT,
            max_items: None,
            rate_limit_callback: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    /// Checks every value and returns the limiter config on success.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigurationError`] found.
    pub fn validate(&self) -> Result<RateLimitConfig, ConfigurationError> {
        let rate_limit = RateLimitConfig::new(self.max_calls, self.period_secs)?
            .with_callback(self.rate_limit_callback.clone());

        validate_worker_count(self.worker_count)?;
        self.parsed_base_url()?;
        Ok(rate_limit)
    }

    /// Parses [`Self::base_url`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::InvalidBaseUrl`] for unparseable or
    /// non-hierarchical URLs.
    pub fn parsed_base_url(&self) -> Result<Url, ConfigurationError> {
        let url = Url::parse(&self.base_url).map_err(|e| ConfigurationError::InvalidBaseUrl {
            value: self.base_url.clone(),
            reason: e.to_string(),
        })?;
        if url.cannot_be_a_base() {
            return Err(ConfigurationError::InvalidBaseUrl {
                value: self.base_url.clone(),
                reason: "URL cannot be a base".to_string(),
            });
        }
        Ok(url)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = FetchConfig::new("out");
        let rate_limit = config.validate().unwrap();
        assert_eq!(rate_limit.max_calls(), 100);
        assert_eq!(config.worker_count, 20);
        assert_eq!(rate_limit.period(), Duration::from_secs(1));
    }

    #[test]
    fn test_zero_period_is_configuration_error() {
        let config = FetchConfig {
            period_secs: 0.0,
            ..FetchConfig::new("out")
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::InvalidPeriod { .. })
        ));
    }

    #[test]
    fn test_zero_max_calls_is_configuration_error() {
        let config = FetchConfig {
            max_calls: 0,
            ..FetchConfig::new("out")
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::InvalidMaxCalls { value: 0 })
        ));
    }

    #[test]
    fn test_zero_worker_count_is_configuration_error() {
        let config = FetchConfig {
            worker_count: 0,
            ..FetchConfig::new("out")
        };
        assert_eq!(
            config.validate().unwrap_err(),
            ConfigurationError::InvalidWorkerCount { value: 0 }
        );
    }

    #[test]
    fn test_large_worker_count_validates() {
        let config = FetchConfig {
            worker_count: 150,
            ..FetchConfig::new("out")
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        let config = FetchConfig {
            base_url: "not a url".to_string(),
            ..FetchConfig::new("out")
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::InvalidBaseUrl { .. })
        ));

        let config = FetchConfig {
            base_url: "mailto:someone@example.com".to_string(),
            ..FetchConfig::new("out")
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_callback_is_carried_into_rate_limit() {
        let config = FetchConfig {
            rate_limit_callback: Some(std::sync::Arc::new(|_: Duration| {})),
            ..FetchConfig::new("out")
        };
        let rate_limit = config.validate().unwrap();
        assert!(format!("{rate_limit:?}").contains("callback: true"));
    }

    #[test]
    fn test_error_messages_name_the_option() {
        let err = ConfigurationError::InvalidWorkerCount { value: 0 };
        let msg = err.to_string();
        assert!(msg.contains("worker count"));
        assert!(msg.contains("at least 1"));
    }
}
