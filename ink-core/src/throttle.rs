//! Fixed-cadence coalescing of expensive updates.

use std::time::{Duration, Instant};

/// Holds the latest pending value and releases it at most once per interval.
///
/// Newer values overwrite older pending ones, so only the most recent value
/// is ever processed. Time is passed in explicitly; the owner drives the
/// timer from its own event loop.
#[derive(Debug, Clone)]
pub struct CoalescingTimer<T> {
    interval: Duration,
    pending: Option<T>,
    deadline: Option<Instant>,
}

impl<T> CoalescingTimer<T> {
    /// Create a timer with the given cadence.
    #[must_use]
    pub const fn new(interval: Duration) -> Self {
        Self {
            interval,
            pending: None,
            deadline: None,
        }
    }

    /// Cadence of the timer.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Queue a value, replacing any pending one. Arms the timer if idle.
    pub fn push(&mut self, value: T, now: Instant) {
        self.pending = Some(value);
        if self.deadline.is_none() {
            self.deadline = Some(now + self.interval);
        }
    }

    /// Release the pending value if the interval has elapsed.
    pub fn poll(&mut self, now: Instant) -> Option<T> {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                self.pending.take()
            }
            _ => None,
        }
    }

    /// Drop any pending value.
    pub fn cancel(&mut self) {
        self.deadline = None;
        self.pending = None;
    }

    /// True if a value is waiting.
    #[must_use]
    pub const fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}

/// A one-shot deadline, used for delayed notifications.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Deadline(Option<Instant>);

impl Deadline {
    /// Arm the deadline `delay` after `now`, replacing any previous one.
    pub fn arm(&mut self, now: Instant, delay: Duration) {
        self.0 = Some(now + delay);
    }

    /// Disarm without firing.
    pub fn disarm(&mut self) {
        self.0 = None;
    }

    /// True while armed.
    #[must_use]
    pub const fn is_armed(&self) -> bool {
        self.0.is_some()
    }

    /// Fire (and disarm) if the deadline has passed.
    pub fn fire(&mut self, now: Instant) -> bool {
        match self.0 {
            Some(at) if now >= at => {
                self.0 = None;
                true
            }
            _ => false,
        }
    }
}
