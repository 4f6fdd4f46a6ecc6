//! Presentation clocks.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Instant;
use vidout_core::Pts;

/// Source of "now" in 90 kHz ticks, compared against frame vpts.
pub trait Clock: Send + Sync {
    fn now(&self) -> Pts;
}

/// Monotonic wall clock starting at a given vpts.
#[derive(Debug)]
pub struct SystemClock {
    start: Instant,
    origin: Pts,
}

impl SystemClock {
    pub fn new() -> Self {
        Self::starting_at(Pts::ZERO)
    }

    /// Clock that reads `origin` right now.
    pub fn starting_at(origin: Pts) -> Self {
        Self {
            start: Instant::now(),
            origin,
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Pts {
        self.origin + Pts::from_duration(self.start.elapsed())
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    ticks: AtomicI64,
}

impl ManualClock {
    pub fn new(start: Pts) -> Self {
        Self {
            ticks: AtomicI64::new(start.ticks()),
        }
    }

    pub fn set(&self, now: Pts) {
        self.ticks.store(now.ticks(), Ordering::Release);
    }

    pub fn advance(&self, by: Pts) {
        self.ticks.fetch_add(by.ticks(), Ordering::AcqRel);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Pts {
        Pts(self.ticks.load(Ordering::Acquire))
    }
}
