//! Presentation timestamps in 1/90000 second ticks.
//!
//! Both the decode-order `pts` and the clock-corrected `vpts` of a frame use
//! this unit. Frame-rate conversions go through rational arithmetic so a
//! 29.97 fps duration does not drift.

use num_rational::Rational64;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Sub};
use std::time::Duration;

/// Ticks per second of the presentation clock.
pub const TICKS_PER_SECOND: i64 = 90_000;

/// A timestamp or duration in 90 kHz ticks.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Pts(pub i64);

impl Pts {
    pub const ZERO: Self = Self(0);

    #[inline]
    pub const fn from_ticks(ticks: i64) -> Self {
        Self(ticks)
    }

    #[inline]
    pub const fn ticks(self) -> i64 {
        self.0
    }

    /// Ticks per frame for a `num/den` frames-per-second rate, rounded to
    /// the nearest tick.
    pub fn frame_duration(num: u32, den: u32) -> Self {
        if num == 0 {
            return Self::ZERO;
        }
        let ticks = Rational64::new(TICKS_PER_SECOND * den as i64, num as i64);
        Self(ticks.round().to_integer())
    }

    /// Convert a wall-clock duration into ticks (truncating).
    pub fn from_duration(d: Duration) -> Self {
        Self((d.as_nanos() * TICKS_PER_SECOND as u128 / 1_000_000_000) as i64)
    }

    /// Convert to a wall-clock duration; negative values saturate to zero.
    pub fn to_duration(self) -> Duration {
        if self.0 <= 0 {
            return Duration::ZERO;
        }
        Duration::from_nanos((self.0 as u128 * 1_000_000_000 / TICKS_PER_SECOND as u128) as u64)
    }

    #[inline]
    pub fn to_seconds_f64(self) -> f64 {
        self.0 as f64 / TICKS_PER_SECOND as f64
    }

    /// `self - earlier`, clamped at zero.
    #[inline]
    pub fn saturating_since(self, earlier: Pts) -> Pts {
        Pts((self.0 - earlier.0).max(0))
    }
}

impl Add for Pts {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for Pts {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sub for Pts {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

impl fmt::Display for Pts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}t ({:.3}s)", self.0, self.to_seconds_f64())
    }
}
