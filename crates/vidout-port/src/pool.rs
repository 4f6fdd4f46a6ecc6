//! Bounded frame pool with format negotiation.
//!
//! Acquisition order: an exact-format free slot, then a stale free slot
//! reformatted in place by the sink, then a fresh allocation while below the
//! ceiling. Past the ceiling `acquire` blocks until a frame is released,
//! which is the pipeline's only backpressure.
//!
//! The latest request is the pool's target format: free slots of any other
//! format are disposed when an acquisition finds them.

use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};
use vidout_core::{usage_error, FrameFormat, Result, VideoOutError};

use crate::frame::{Frame, Slot};
use crate::sink::SharedSink;

/// Snapshot of pool occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PoolStats {
    /// Live slots, free plus outstanding.
    pub total: usize,
    pub free: usize,
    pub outstanding: usize,
    pub ceiling: usize,
}

#[derive(Default)]
struct PoolState {
    free: Vec<Arc<Slot>>,
    total: usize,
    /// Slots from older generations are disposed on release.
    generation: u64,
    closed: bool,
    next_id: u32,
}

impl PoolState {
    /// Move free slots that cannot serve `format` into `stale`.
    fn evict_other_formats(&mut self, format: &FrameFormat, stale: &mut Vec<Arc<Slot>>) {
        let (keep, other): (Vec<_>, Vec<_>) = std::mem::take(&mut self.free)
            .into_iter()
            .partition(|s| s.format().matches_storage(format));
        self.free = keep;
        self.total -= other.len();
        stale.extend(other);
    }
}

/// State shared between the pool and the slots it handed out.
pub(crate) struct PoolShared {
    state: Mutex<PoolState>,
    available: Condvar,
    ceiling: usize,
}

impl PoolShared {
    /// Take back a slot whose count reached zero.
    pub(crate) fn give_back(&self, slot: Arc<Slot>) {
        let mut state = self.state.lock();
        if state.closed || slot.generation() != state.generation {
            state.total -= 1;
            drop(state);
            debug!("disposing frame {} on release", slot.id());
            slot.dispose();
        } else {
            state.free.push(slot);
            drop(state);
        }
        self.available.notify_one();
    }

    /// Undo a reservation made for an allocation that failed.
    fn cancel_reservation(&self) {
        self.state.lock().total -= 1;
        self.available.notify_one();
    }
}

enum Plan {
    Reuse(Arc<Slot>),
    Reformat(Arc<Slot>),
    Allocate { id: u32, generation: u64 },
}

/// Owns every frame of one output port.
pub struct FramePool {
    shared: Arc<PoolShared>,
    sink: SharedSink,
}

impl FramePool {
    pub fn new(sink: SharedSink, ceiling: usize) -> Self {
        Self {
            shared: Arc::new(PoolShared {
                state: Mutex::new(PoolState::default()),
                available: Condvar::new(),
                ceiling: ceiling.max(1),
            }),
            sink,
        }
    }

    /// Acquire a frame of exactly `format`, blocking while the pool is at
    /// its ceiling with nothing free.
    ///
    /// Pixel content of a reused or reformatted frame is unspecified.
    pub fn acquire(&self, format: &FrameFormat) -> Result<Frame> {
        if self.is_closed() {
            return Err(usage_error("acquiring a frame from a closed pool"));
        }
        self.acquire_unless_closed(format)
    }

    /// Acquire for a caller that may race against [`close`](Self::close):
    /// a closed pool is reported as `PortClosed`, never as misuse.
    pub(crate) fn acquire_unless_closed(&self, format: &FrameFormat) -> Result<Frame> {
        let mut stale = Vec::new();
        let plan = {
            let mut state = self.shared.state.lock();
            loop {
                if state.closed {
                    return Err(VideoOutError::PortClosed);
                }
                if let Some(plan) = self.plan(&mut state, format, &mut stale) {
                    break plan;
                }
                self.shared.available.wait(&mut state);
            }
        };
        self.dispose_stale(stale);
        self.fulfil(plan, format)
    }

    /// Like [`acquire`](Self::acquire) but returns `Ok(None)` instead of
    /// blocking.
    pub fn try_acquire(&self, format: &FrameFormat) -> Result<Option<Frame>> {
        let mut stale = Vec::new();
        let plan = {
            let mut state = self.shared.state.lock();
            if state.closed {
                return Err(VideoOutError::PortClosed);
            }
            self.plan(&mut state, format, &mut stale)
        };
        self.dispose_stale(stale);
        plan.map(|p| self.fulfil(p, format)).transpose()
    }

    fn plan(
        &self,
        state: &mut PoolState,
        format: &FrameFormat,
        stale: &mut Vec<Arc<Slot>>,
    ) -> Option<Plan> {
        if let Some(i) = state
            .free
            .iter()
            .position(|s| s.format().matches_storage(format))
        {
            let slot = state.free.swap_remove(i);
            state.evict_other_formats(format, stale);
            return Some(Plan::Reuse(slot));
        }
        if let Some(slot) = state.free.pop() {
            state.evict_other_formats(format, stale);
            return Some(Plan::Reformat(slot));
        }
        if state.total < self.shared.ceiling {
            state.total += 1;
            let id = state.next_id;
            state.next_id = state.next_id.wrapping_add(1);
            return Some(Plan::Allocate {
                id,
                generation: state.generation,
            });
        }
        None
    }

    fn dispose_stale(&self, stale: Vec<Arc<Slot>>) {
        if stale.is_empty() {
            return;
        }
        for slot in &stale {
            slot.dispose();
        }
        debug!("disposed {} free frames of an older format", stale.len());
        self.shared.available.notify_all();
    }

    /// Runs without the pool lock; the sink may take its time.
    fn fulfil(&self, plan: Plan, format: &FrameFormat) -> Result<Frame> {
        let slot = match plan {
            Plan::Reuse(slot) => slot,
            Plan::Reformat(slot) => {
                let result = {
                    let mut data = slot.data_mut();
                    self.sink.lock().update_frame_format(&mut data, format)
                };
                if let Err(e) = result {
                    self.shared.give_back(slot);
                    return Err(negotiation_failed(e));
                }
                debug!(
                    "reformatted frame {} to {}x{} {:?}",
                    slot.id(),
                    format.width,
                    format.height,
                    format.format
                );
                slot
            }
            Plan::Allocate { id, generation } => {
                let allocated = self.sink.lock().alloc_frame(format);
                match allocated {
                    Ok(data) => {
                        debug!("allocated frame {} ({}x{})", id, format.width, format.height);
                        Arc::new(Slot::new(id, generation, data, Arc::downgrade(&self.shared)))
                    }
                    Err(e) => {
                        self.shared.cancel_reservation();
                        return Err(negotiation_failed(e));
                    }
                }
            }
        };

        {
            let mut data = slot.data_mut();
            data.reset_metadata();
            data.ratio = format.ratio;
            data.flags = format.flags;
        }
        slot.into_frame()
    }

    /// Dispose every free frame. Frames still outstanding are disposed on
    /// release instead of being pooled.
    pub fn drain(&self) {
        let drained = {
            let mut state = self.shared.state.lock();
            state.generation += 1;
            let drained = std::mem::take(&mut state.free);
            state.total -= drained.len();
            drained
        };
        for slot in &drained {
            slot.dispose();
        }
        self.shared.available.notify_all();
        info!("frame pool drained ({} frames disposed)", drained.len());
    }

    /// Drain, reject further acquisitions and wake blocked acquirers.
    /// Never waits for outstanding frames.
    pub fn close(&self) {
        {
            let mut state = self.shared.state.lock();
            if state.closed {
                return;
            }
            state.closed = true;
        }
        self.drain();
        info!("frame pool closed");
    }

    pub fn is_closed(&self) -> bool {
        self.shared.state.lock().closed
    }

    pub fn stats(&self) -> PoolStats {
        let state = self.shared.state.lock();
        PoolStats {
            total: state.total,
            free: state.free.len(),
            outstanding: state.total - state.free.len(),
            ceiling: self.shared.ceiling,
        }
    }

    pub fn ceiling(&self) -> usize {
        self.shared.ceiling
    }
}

impl Drop for FramePool {
    fn drop(&mut self) {
        let stats = self.stats();
        if stats.outstanding > 0 {
            warn!(
                "frame pool dropped with {} frames outstanding; they are disposed on release",
                stats.outstanding
            );
        }
        self.close();
    }
}

fn negotiation_failed(e: VideoOutError) -> VideoOutError {
    match e {
        VideoOutError::FormatNegotiation(_) => e,
        other => VideoOutError::FormatNegotiation(other.to_string()),
    }
}
