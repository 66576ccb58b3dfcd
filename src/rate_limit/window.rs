//! Sliding-window call accounting shared by both limiter adapters.
//!
//! [`SlidingWindow`] is a plain data structure: it never reads the clock and
//! never sleeps. Callers pass `now` in and get back either a granted
//! [`Ticket`] or the instant at which a slot frees up. The blocking and
//! cooperative adapters differ only in how they wait for that instant.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Identifies one acquisition so that its release can find its slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ticket(u64);

#[derive(Debug, Clone, Copy)]
struct Slot {
    ticket: Ticket,
    at: Instant,
}

/// Result of asking the window for a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// A slot was reserved at the given instant.
    Granted {
        /// Ticket to hand back on release.
        ticket: Ticket,
        /// Instant the reservation was stamped with.
        granted_at: Instant,
    },
    /// The window is full; the oldest slot expires at `until`.
    Wait {
        /// Earliest instant at which a retry can succeed.
        until: Instant,
    },
}

/// Ordered buffer of call timestamps bounded to `max_calls` per `period`.
///
/// Slots are kept in chronological order. An acquisition reserves a slot
/// stamped with the grant instant; its release replaces that slot with one
/// stamped at the release instant. The number of slots never exceeds
/// `max_calls`, so no more than `max_calls` calls can ever be granted inside
/// one trailing `period`.
#[derive(Debug)]
pub struct SlidingWindow {
    slots: VecDeque<Slot>,
    max_calls: usize,
    period: Duration,
    next_ticket: u64,
}

impl SlidingWindow {
    /// Creates an empty window. Callers validate `max_calls` and `period`.
    #[must_use]
    pub(crate) fn new(max_calls: usize, period: Duration) -> Self {
        Self {
            slots: VecDeque::with_capacity(max_calls),
            max_calls,
            period,
            next_ticket: 0,
        }
    }

    /// Maximum calls allowed per period.
    #[must_use]
    pub fn max_calls(&self) -> usize {
        self.max_calls
    }

    /// Length of the trailing window.
    #[must_use]
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Number of retained slots (reserved or released).
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns true when no slot is retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Time between the oldest and newest retained slot.
    #[must_use]
    pub fn span(&self) -> Duration {
        match (self.slots.front(), self.slots.back()) {
            (Some(oldest), Some(newest)) => newest.at.saturating_duration_since(oldest.at),
            _ => Duration::ZERO,
        }
    }

    /// Timestamps of retained slots, oldest first.
    pub fn timestamps(&self) -> impl Iterator<Item = Instant> + '_ {
        self.slots.iter().map(|slot| slot.at)
    }

    /// Tries to reserve a slot at `now`.
    ///
    /// Slots that are `period` or more older than `now` are dropped first.
    /// The returned wait instant is always strictly after `now`.
    pub fn try_acquire(&mut self, now: Instant) -> Admission {
        self.prune_before(now);

        if self.slots.len() < self.max_calls {
            let ticket = Ticket(self.next_ticket);
            self.next_ticket = self.next_ticket.wrapping_add(1);
            self.push(Slot { ticket, at: now });
            return Admission::Granted {
                ticket,
                granted_at: now,
            };
        }

        // Full window: the front slot is younger than `period`, so this is in the future.
        let oldest = self.slots.front().map_or(now, |slot| slot.at);
        Admission::Wait {
            until: oldest + self.period,
        }
    }

    /// Records the completion of `ticket` at `now` and prunes stale slots.
    ///
    /// A reservation that already aged out of the window is not re-added.
    pub fn release(&mut self, ticket: Ticket, now: Instant) {
        if let Some(index) = self.slots.iter().position(|slot| slot.ticket == ticket) {
            self.slots.remove(index);
            self.push(Slot { ticket, at: now });
        }

        while self.span() >= self.period {
            self.slots.pop_front();
        }
    }

    fn push(&mut self, slot: Slot) {
        // Callers hold the adapter's lock and read a monotonic clock, so `at`
        // is never older than the current back; clamp in case it is.
        let at = self
            .slots
            .back()
            .map_or(slot.at, |newest| newest.at.max(slot.at));
        self.slots.push_back(Slot { at, ..slot });
    }

    fn prune_before(&mut self, now: Instant) {
        while let Some(oldest) = self.slots.front() {
            if now.saturating_duration_since(oldest.at) >= self.period {
                self.slots.pop_front();
            } else {
                break;
            }
        }
    }
}
