//! Wall-clock cutoff shared by every work unit of one invocation.
//!
//! Cancellation is cooperative: units call [`DeadlineGuard::check`] before
//! splitting or running a leaf. Nothing is interrupted mid-leaf, and work
//! already written to the grid stays there.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// An absolute instant after which no new work starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Deadline {
    at: Instant,
}

impl Deadline {
    pub fn at(at: Instant) -> Self {
        Self { at }
    }

    pub fn after(budget: Duration) -> Self {
        Self {
            at: Instant::now() + budget,
        }
    }

    pub fn after_millis(ms: u64) -> Self {
        Self::after(Duration::from_millis(ms))
    }

    pub fn instant(&self) -> Instant {
        self.at
    }

    pub fn expired(&self) -> bool {
        Instant::now() >= self.at
    }

    /// Time left, zero once expired.
    pub fn remaining(&self) -> Duration {
        self.at.saturating_duration_since(Instant::now())
    }
}

/// Deadline plus a sticky flag recording that some unit saw it pass.
#[derive(Debug)]
pub struct DeadlineGuard {
    deadline: Option<Deadline>,
    tripped: AtomicBool,
}

impl DeadlineGuard {
    pub fn new(deadline: Option<Deadline>) -> Self {
        Self {
            deadline,
            tripped: AtomicBool::new(false),
        }
    }

    pub fn unbounded() -> Self {
        Self::new(None)
    }

    pub fn deadline(&self) -> Option<Deadline> {
        self.deadline
    }

    /// True when the unit calling this must not start. Once any caller has
    /// seen expiry every later call returns true without reading the clock.
    pub fn check(&self) -> bool {
        if self.tripped.load(Ordering::Acquire) {
            return true;
        }
        match self.deadline {
            Some(d) if d.expired() => {
                self.tripped.store(true, Ordering::Release);
                true
            }
            _ => false,
        }
    }

    /// Whether expiry has been observed by any unit so far.
    pub fn tripped(&self) -> bool {
        self.tripped.load(Ordering::Acquire)
    }

    /// Record expiry reported by a leaf that cut itself short.
    pub(crate) fn trip(&self) {
        self.tripped.store(true, Ordering::Release);
    }
}
