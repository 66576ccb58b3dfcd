//! Cooperative (tokio) limiter adapter.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, instrument};

use super::window::{Admission, SlidingWindow, Ticket};
use super::{RateLimitConfig, WaitCallback, duration_to_ms};

/// Rate limiter shared by tokio tasks.
///
/// The window lock is only held for the bookkeeping itself; a task that has
/// to wait drops the lock, sleeps until the oldest slot expires and checks
/// again. Waiters that wake together simply race for the freed slots under
/// the lock, so the bound holds no matter how many tasks share the limiter.
///
/// The lock is a `std::sync::Mutex` because it is never held across an
/// `.await`; that also lets [`Permit`] release synchronously on drop.
///
/// # Usage Pattern
///
/// ```no_run
/// use std::sync::Arc;
/// use pdb_downloader_core::rate_limit::RateLimitConfig;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let limiter = Arc::new(RateLimitConfig::new(2, 1.0)?.cooperative());
///
/// let task_limiter = Arc::clone(&limiter);
/// tokio::spawn(async move {
///     task_limiter.run(async { /* request */ }).await;
/// });
/// # Ok(())
/// # }
/// ```
pub struct RateLimiter {
    window: Mutex<SlidingWindow>,
    callback: Option<WaitCallback>,
    total_wait_ms: AtomicU64,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("window", &self.window)
            .field("total_wait_ms", &self.total_wait_ms)
            .finish_non_exhaustive()
    }
}

impl RateLimiter {
    /// Builds the limiter from a validated config.
    #[must_use]
    #[instrument(skip_all, fields(max_calls = config.max_calls(), period_ms = config.period().as_millis()))]
    pub fn new(config: RateLimitConfig) -> Self {
        debug!("creating rate limiter");
        let (window, callback) = config.into_parts();
        Self {
            window: Mutex::new(window),
            callback,
            total_wait_ms: AtomicU64::new(0),
        }
    }

    /// Suspends the calling task until a call may start.
    pub async fn acquire(&self) -> Permit<'_> {
        loop {
            let now = Instant::now();
            let admission = self.lock().try_acquire(now.into_std());
            match admission {
                Admission::Granted { ticket, granted_at } => {
                    return Permit {
                        limiter: self,
                        ticket,
                        granted_at,
                    };
                }
                Admission::Wait { until } => {
                    let until = Instant::from_std(until);
                    let wait = until.saturating_duration_since(now);
                    self.total_wait_ms
                        .fetch_add(duration_to_ms(wait), Ordering::Relaxed);
                    debug!(wait_ms = wait.as_millis(), "rate window full, suspending");
                    self.notify(wait);
                    tokio::time::sleep_until(until).await;
                }
            }
        }
    }

    /// Awaits `future` between an acquire and a release.
    pub async fn run<F: Future>(&self, future: F) -> F::Output {
        let _permit = self.acquire().await;
        future.await
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
        self.lock().release(ticket, Instant::now().into_std());
    }

    fn notify(&self, wait: Duration) {
        if let Some(callback) = self.callback.clone() {
            // Detached: the handle is dropped, a panic stays inside the blocking task.
            drop(tokio::task::spawn_blocking(move || callback(wait)));
        }
    }

    fn lock(&self) -> MutexGuard<'_, SlidingWindow> {
        self.window.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// One admitted call on a [`RateLimiter`]. Dropping it releases the call.
#[derive(Debug)]
#[must_use = "dropping the permit immediately records the call as finished"]
pub struct Permit<'a> {
    limiter: &'a RateLimiter,
    ticket: Ticket,
    granted_at: std::time::Instant,
}

impl Permit<'_> {
    /// Instant the call was admitted.
    #[must_use]
    pub fn granted_at(&self) -> std::time::Instant {
        self.granted_at
    }

    /// Records the call as finished now.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        self.limiter.release(self.ticket);
    }
}
