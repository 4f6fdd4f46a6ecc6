//! Shared true-color overlay surface.
//!
//! Several overlay events can point at the same ARGB surface when only the
//! placement changed, not the pixels. The surface keeps its own reference
//! count and dirty rectangle under its own lock; that lock is never taken
//! while a frame lock is held.

use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;
use vidout_core::{usage_error, IRect, Result};

struct ArgbState {
    pixels: Vec<u32>,
    dirty: Option<IRect>,
    ref_count: u32,
    disposed: bool,
}

/// A `width x height` buffer of `0xAARRGGBB` pixels.
pub struct ArgbLayer {
    width: u32,
    height: u32,
    state: Mutex<ArgbState>,
}

impl ArgbLayer {
    /// New transparent surface with no references yet. The whole surface
    /// starts dirty.
    pub fn new(width: u32, height: u32) -> Arc<Self> {
        Arc::new(Self {
            width,
            height,
            state: Mutex::new(ArgbState {
                pixels: vec![0; width as usize * height as usize],
                dirty: Some(IRect::new(0, 0, width as i32, height as i32)),
                ref_count: 0,
                disposed: false,
            }),
        })
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn bounds(&self) -> IRect {
        IRect::new(0, 0, self.width as i32, self.height as i32)
    }

    /// Take a counted reference. Fails once the last reference has gone and
    /// the pixel storage was disposed.
    pub fn attach(self: &Arc<Self>) -> Result<ArgbLayerRef> {
        let mut state = self.state.lock();
        if state.disposed {
            return Err(usage_error("retaining an ARGB surface after its disposal"));
        }
        state.ref_count += 1;
        Ok(ArgbLayerRef {
            layer: Arc::clone(self),
        })
    }

    pub fn ref_count(&self) -> u32 {
        self.state.lock().ref_count
    }

    pub fn is_disposed(&self) -> bool {
        self.state.lock().disposed
    }

    /// Write pixels inside `rect` and mark it dirty.
    ///
    /// `f` receives the whole pixel buffer (row stride = width).
    pub fn update<F>(&self, rect: IRect, f: F) -> Result<()>
    where
        F: FnOnce(&mut [u32], u32),
    {
        let Some(rect) = rect.intersect(self.bounds()) else {
            return Ok(());
        };
        let mut state = self.state.lock();
        if state.disposed {
            return Err(usage_error("writing to a disposed ARGB surface"));
        }
        f(&mut state.pixels, self.width);
        state.dirty = Some(match state.dirty {
            Some(d) => d.union(rect),
            None => rect,
        });
        Ok(())
    }

    /// Hand the dirty rectangle to a consumer and clear it.
    pub fn take_dirty(&self) -> Option<IRect> {
        self.state.lock().dirty.take()
    }

    /// Mark the whole surface dirty, e.g. after a consumer lost its cache.
    pub fn invalidate(&self) {
        self.state.lock().dirty = Some(self.bounds());
    }

    /// Run `f` with read access to the pixels. Returns `None` after disposal.
    pub fn with_pixels<R>(&self, f: impl FnOnce(&[u32]) -> R) -> Option<R> {
        let state = self.state.lock();
        if state.disposed {
            None
        } else {
            Some(f(&state.pixels))
        }
    }

    fn release(&self) {
        let mut state = self.state.lock();
        if state.ref_count == 0 {
            // unreachable through ArgbLayerRef
            let _ = usage_error("ARGB surface released more often than retained");
            return;
        }
        state.ref_count -= 1;
        if state.ref_count == 0 {
            state.pixels = Vec::new();
            state.dirty = None;
            state.disposed = true;
            debug!("disposed {}x{} ARGB surface", self.width, self.height);
        }
    }
}

impl std::fmt::Debug for ArgbLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArgbLayer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("ref_count", &self.ref_count())
            .finish()
    }
}

/// One counted reference to an [`ArgbLayer`], held by an overlay layer.
///
/// Cloning retains, dropping releases.
#[derive(Debug)]
pub struct ArgbLayerRef {
    layer: Arc<ArgbLayer>,
}

impl ArgbLayerRef {
    #[inline]
    pub fn layer(&self) -> &Arc<ArgbLayer> {
        &self.layer
    }

    /// True if both references point at the same surface.
    pub fn same_surface(&self, other: &ArgbLayerRef) -> bool {
        Arc::ptr_eq(&self.layer, &other.layer)
    }
}

impl std::ops::Deref for ArgbLayerRef {
    type Target = ArgbLayer;
    fn deref(&self) -> &ArgbLayer {
        &self.layer
    }
}

impl Clone for ArgbLayerRef {
    fn clone(&self) -> Self {
        // a live reference keeps the surface from being disposed
        self.layer.state.lock().ref_count += 1;
        Self {
            layer: Arc::clone(&self.layer),
        }
    }
}

impl Drop for ArgbLayerRef {
    fn drop(&mut self) {
        self.layer.release();
    }
}
