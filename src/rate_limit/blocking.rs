//! Thread-blocking limiter adapter.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, instrument, warn};

use super::window::{Admission, SlidingWindow, Ticket};
use super::{RateLimitConfig, WaitCallback, duration_to_ms};

/// Rate limiter for callers running on OS threads.
///
/// The waiting caller sleeps while holding the window lock, so other
/// acquirers park on the mutex behind it. That queueing is the backpressure.
///
/// # Example
///
/// ```
/// use pdb_downloader_core::rate_limit::RateLimitConfig;
///
/// let limiter = RateLimitConfig::new(10, 1.0).unwrap().blocking();
/// let body = limiter.run(|| "one request");
/// assert_eq!(body, "one request");
/// ```
pub struct BlockingRateLimiter {
    window: Mutex<SlidingWindow>,
    callback: Option<WaitCallback>,
    total_wait_ms: AtomicU64,
}

impl std::fmt::Debug for BlockingRateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockingRateLimiter")
            .field("window", &self.window)
            .field("total_wait_ms", &self.total_wait_ms)
            .finish_non_exhaustive()
    }
}

impl BlockingRateLimiter {
    /// Builds the limiter from a validated config.
    #[must_use]
    #[instrument(skip_all, fields(max_calls = config.max_calls(), period_ms = config.period().as_millis()))]
    pub fn new(config: RateLimitConfig) -> Self {
        debug!("creating blocking rate limiter");
        let (window, callback) = config.into_parts();
        Self {
            window: Mutex::new(window),
            callback,
            total_wait_ms: AtomicU64::new(0),
        }
    }

    /// Blocks the current thread until a call may start.
    pub fn acquire(&self) -> BlockingPermit<'_> {
        let mut window = self.lock();
        loop {
            let now = Instant::now();
            match window.try_acquire(now) {
                Admission::Granted { ticket, granted_at } => {
                    return BlockingPermit {
                        limiter: self,
                        ticket,
                        granted_at,
                    };
                }
                Admission::Wait { until } => {
                    let wait = until.saturating_duration_since(now);
                    self.total_wait_ms
                        .fetch_add(duration_to_ms(wait), Ordering::Relaxed);
                    debug!(wait_ms = wait.as_millis(), "rate window full, blocking");
                    self.notify(wait);
                    thread::sleep(wait);
                }
            }
        }
    }

    /// Runs `f` between an acquire and a release.
    pub fn run<T>(&self, f: impl FnOnce() -> T) -> T {
        let _permit = self.acquire();
        f()
    }

    /// Total time callers have been told to wait.
    #[must_use]
    pub fn total_wait(&self) -> Duration {
        Duration::from_millis(self.total_wait_ms.load(Ordering::Relaxed))
    }

    /// Number of calls currently counted against the window.
    #[must_use]
    pub fn recorded_calls(&self) -> usize {
        self.lock().len()
    }

    /// Maximum calls per period.
    #[must_use]
    pub fn max_calls(&self) -> usize {
        self.lock().max_calls()
    }

    /// Window length.
    #[must_use]
    pub fn period(&self) -> Duration {
        self.lock().period()
    }

    fn release(&self, ticket: Ticket) {
        self.lock().release(ticket, Instant::now());
    }

    fn notify(&self, wait: Duration) {
        let Some(callback) = self.callback.clone() else {
            return;
        };
        let spawned = thread::Builder::new()
            .name("rate-limit-wait".to_string())
            .spawn(move || callback(wait));
        if let Err(e) = spawned {
            warn!(error = %e, "could not spawn wait callback thread");
        }
    }

    fn lock(&self) -> MutexGuard<'_, SlidingWindow> {
        // The window is left consistent between statements, so a poisoned lock is still usable.
        self.window.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// One admitted call on a [`BlockingRateLimiter`]. Dropping it releases the call.
#[derive(Debug)]
#[must_use = "dropping the permit immediately records the call as finished"]
pub struct BlockingPermit<'a> {
    limiter: &'a BlockingRateLimiter,
    ticket: Ticket,
    granted_at: Instant,
}

impl BlockingPermit<'_> {
    /// Instant the call was admitted.
    #[must_use]
    pub fn granted_at(&self) -> Instant {
        self.granted_at
    }

    /// Records the call as finished now.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for BlockingPermit<'_> {
    fn drop(&mut self) {
        self.limiter.release(self.ticket);
    }
}
