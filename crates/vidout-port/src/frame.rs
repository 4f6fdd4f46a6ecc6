//! Reference-counted frame handles.
//!
//! A [`Frame`] is one counted reference to a pool slot. Cloning is explicit
//! through [`Frame::retain`]; dropping a handle releases it. When the last
//! reference goes, the slot goes back to its pool, or is disposed if the
//! pool is draining or already gone.

use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tracing::debug;
use vidout_core::{usage_error, FrameData, FrameFormat, Result};

use crate::pool::PoolShared;

/// Pool-owned storage behind a frame handle.
pub(crate) struct Slot {
    id: u32,
    /// Drain generation the slot was allocated in.
    generation: u64,
    /// Guards only the count; pixel data has its own lock.
    refs: Mutex<i32>,
    data: RwLock<FrameData>,
    disposed: AtomicBool,
    pool: Weak<PoolShared>,
}

impl Slot {
    pub(crate) fn new(id: u32, generation: u64, data: FrameData, pool: Weak<PoolShared>) -> Self {
        Self {
            id,
            generation,
            refs: Mutex::new(0),
            data: RwLock::new(data),
            disposed: AtomicBool::new(false),
            pool,
        }
    }

    #[inline]
    pub(crate) fn id(&self) -> u32 {
        self.id
    }

    #[inline]
    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn format(&self) -> FrameFormat {
        self.data.read().format()
    }

    pub(crate) fn data_mut(&self) -> RwLockWriteGuard<'_, FrameData> {
        self.data.write()
    }

    /// Hand a free slot out with a reference count of exactly one.
    pub(crate) fn into_frame(self: Arc<Self>) -> Result<Frame> {
        let mut refs = self.refs.lock();
        if *refs != 0 {
            return Err(usage_error(format!(
                "frame {} handed out with {} live references",
                self.id, *refs
            )));
        }
        *refs = 1;
        drop(refs);
        Ok(Frame { slot: self })
    }

    fn retain(&self) -> Result<()> {
        let mut refs = self.refs.lock();
        if *refs <= 0 {
            return Err(usage_error(format!(
                "retaining frame {} with no live references",
                self.id
            )));
        }
        *refs += 1;
        Ok(())
    }

    /// Drop one reference; returns the slot to its pool at zero.
    pub(crate) fn unref(self: &Arc<Self>) -> Result<()> {
        let remaining = {
            let mut refs = self.refs.lock();
            if *refs <= 0 {
                return Err(usage_error(format!(
                    "frame {} released more often than retained",
                    self.id
                )));
            }
            *refs -= 1;
            *refs
        };
        if remaining == 0 {
            match self.pool.upgrade() {
                Some(pool) => pool.give_back(Arc::clone(self)),
                None => {
                    debug!("frame {} released after its pool went away", self.id);
                    self.dispose();
                }
            }
        }
        Ok(())
    }

    fn ref_count(&self) -> i32 {
        *self.refs.lock()
    }

    /// Free the backing storage. Terminal.
    pub(crate) fn dispose(&self) {
        if !self.disposed.swap(true, Ordering::AcqRel) {
            *self.data.write() = FrameData::default();
        }
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}

/// One counted reference to a pooled frame.
pub struct Frame {
    slot: Arc<Slot>,
}

impl Frame {
    /// Slot identifier, stable for the slot's lifetime.
    #[inline]
    pub fn id(&self) -> u32 {
        self.slot.id
    }

    /// Take another reference to the same frame.
    pub fn retain(&self) -> Frame {
        // a live handle guarantees the count is positive
        let _ = self.slot.retain();
        Frame {
            slot: Arc::clone(&self.slot),
        }
    }

    /// Give this reference back. Same as dropping it.
    pub fn release(self) {}

    pub fn ref_count(&self) -> i32 {
        self.slot.ref_count()
    }

    /// True while the owning pool still exists.
    pub fn pool_attached(&self) -> bool {
        self.slot.pool.strong_count() > 0
    }

    /// True if both handles reference the same slot.
    pub fn same_frame(&self, other: &Frame) -> bool {
        Arc::ptr_eq(&self.slot, &other.slot)
    }

    /// Shared read access to pixels and metadata.
    pub fn data(&self) -> RwLockReadGuard<'_, FrameData> {
        self.slot.data.read()
    }

    /// Write access, only for the sole holder.
    pub fn data_mut(&self) -> Result<RwLockWriteGuard<'_, FrameData>> {
        let refs = self.slot.ref_count();
        if refs != 1 {
            return Err(usage_error(format!(
                "writing frame {} while {} references are live",
                self.slot.id, refs
            )));
        }
        Ok(self.slot.data.write())
    }

    pub(crate) fn slot(&self) -> &Arc<Slot> {
        &self.slot
    }
}

impl Drop for Frame {
    fn drop(&mut self) {
        let _ = self.slot.unref();
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("id", &self.slot.id)
            .field("refs", &self.slot.ref_count())
            .finish()
    }
}
