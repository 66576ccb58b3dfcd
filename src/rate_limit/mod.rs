//! Sliding-window rate limiting for upstream requests.
//!
//! A limiter admits at most `max_calls` calls inside any trailing `period`.
//! The window bookkeeping lives in [`SlidingWindow`]; two adapters wrap it
//! for the two scheduling models a caller may run under:
//!
//! - [`BlockingRateLimiter`] parks OS threads (mutex + `thread::sleep`).
//! - [`RateLimiter`] suspends tokio tasks and never holds its lock across
//!   the sleep.
//!
//! Both hand out a scoped permit; dropping the permit records the call.
//! A limiter instance uses exactly one model, chosen when it is built from a
//! [`RateLimitConfig`].
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use pdb_downloader_core::rate_limit::RateLimitConfig;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let limiter = Arc::new(RateLimitConfig::new(100, 1.0)?.cooperative());
//!
//! let permit = limiter.acquire().await;
//! // ... one upstream request
//! permit.release();
//! # Ok(())
//! # }
//! ```

mod blocking;
mod cooperative;
pub mod window;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

pub use blocking::{BlockingPermit, BlockingRateLimiter};
pub use cooperative::{Permit, RateLimiter};
pub use window::{Admission, SlidingWindow, Ticket};

use crate::config::ConfigurationError;

/// Default number of calls admitted per period.
pub const DEFAULT_MAX_CALLS: usize = 100;

/// Default window length in seconds.
pub const DEFAULT_PERIOD_SECS: f64 = 1.0;

/// Hook told how long a caller is about to wait.
///
/// Invoked on a detached thread or task; its return and any panic are ignored.
pub type WaitCallback = Arc<dyn Fn(Duration) + Send + Sync>;

/// Validated limiter parameters.
#[derive(Clone)]
pub struct RateLimitConfig {
    max_calls: usize,
    period: Duration,
    callback: Option<WaitCallback>,
}

impl fmt::Debug for RateLimitConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimitConfig")
            .field("max_calls", &self.max_calls)
            .field("period", &self.period)
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

impl RateLimitConfig {
    /// Builds a config from a call budget and a period in seconds.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::InvalidPeriod`] if `period_secs` is not a
    /// positive finite number, and [`ConfigurationError::InvalidMaxCalls`] if
    /// `max_calls` is zero.
    pub fn new(max_calls: usize, period_secs: f64) -> Result<Self, ConfigurationError> {
        if !(period_secs.is_finite() && period_secs > 0.0) {
            return Err(ConfigurationError::InvalidPeriod { value: period_secs });
        }
        let period = Duration::try_from_secs_f64(period_secs)
            .map_err(|_| ConfigurationError::InvalidPeriod { value: period_secs })?;
        Self::with_period(max_calls, period)
    }

    /// Builds a config from a call budget and a period.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError`] if either value is zero.
    pub fn with_period(max_calls: usize, period: Duration) -> Result<Self, ConfigurationError> {
        if period.is_zero() {
            return Err(ConfigurationError::InvalidPeriod { value: 0.0 });
        }
        if max_calls == 0 {
            return Err(ConfigurationError::InvalidMaxCalls { value: 0 });
        }
        Ok(Self {
            max_calls,
            period,
            callback: None,
        })
    }

    /// Attaches a hook that is told about every wait.
    #[must_use]
    pub fn on_wait(mut self, callback: impl Fn(Duration) + Send + Sync + 'static) -> Self {
        self.callback = Some(Arc::new(callback));
        self
    }

    /// Attaches an already shared wait hook.
    #[must_use]
    pub fn with_callback(mut self, callback: Option<WaitCallback>) -> Self {
        self.callback = callback;
        self
    }

    /// Maximum calls per period.
    #[must_use]
    pub fn max_calls(&self) -> usize {
        self.max_calls
    }

    /// Window length.
    #[must_use]
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Builds a thread-blocking limiter.
    #[must_use]
    pub fn blocking(self) -> BlockingRateLimiter {
        BlockingRateLimiter::new(self)
    }

    /// Builds a limiter for tokio tasks.
    #[must_use]
    pub fn cooperative(self) -> RateLimiter {
        RateLimiter::new(self)
    }

    fn into_parts(self) -> (SlidingWindow, Option<WaitCallback>) {
        (SlidingWindow::new(self.max_calls, self.period), self.callback)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_calls: DEFAULT_MAX_CALLS,
            period: Duration::from_secs(1),
            callback: None,
        }
    }
}

#[allow(clippy::cast_possible_truncation)]
fn duration_to_ms(duration: Duration) -> u64 {
    duration.as_millis() as u64
}
