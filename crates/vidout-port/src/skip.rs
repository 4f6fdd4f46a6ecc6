//! Late-frame skip policy.
//!
//! A decoder that submits a frame whose vpts is already in the past is
//! told how many upcoming frames to drop so it can catch up.

use serde::{Deserialize, Serialize};
use vidout_core::Pts;

/// Maps lateness to a number of frames the producer should skip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipPolicy {
    /// Lateness tolerated before any frame is skipped.
    pub threshold: Pts,
    /// Upper bound on a single answer.
    pub max_skip: u32,
}

impl SkipPolicy {
    pub fn new(threshold: Pts, max_skip: u32) -> Self {
        Self {
            threshold,
            max_skip,
        }
    }

    /// `0` up to the threshold, then one frame plus one per whole frame
    /// duration of extra lateness, capped at `max_skip`.
    pub fn frames_to_skip(&self, lateness: Pts, frame_duration: Pts) -> u32 {
        if lateness <= self.threshold {
            return 0;
        }
        let excess = (lateness - self.threshold).ticks();
        let per_frame = frame_duration.ticks().max(1);
        let skip = 1 + excess / per_frame;
        skip.min(self.max_skip as i64) as u32
    }
}

impl Default for SkipPolicy {
    fn default() -> Self {
        Self::new(Pts::ZERO, 30)
    }
}
