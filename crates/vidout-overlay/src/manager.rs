//! Overlay manager: handle registry plus a time-ordered event queue.
//!
//! Decoders and UI threads allocate a handle per logical overlay object and
//! post show/hide events stamped with a vpts. The display side resolves the
//! visible set for a frame's vpts and hands it to the compositor.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};
use vidout_core::{FrameImage, Pts, Result, VideoOutError};

use crate::compositor::{BlendStats, OverlayCompositor, OverlayTarget};
use crate::layer::{Highlight, OverlayLayer};

/// Default number of overlay objects a manager can track.
pub const DEFAULT_MAX_HANDLES: usize = 50;

/// Identifier of an overlay object. Lower handles are blended first.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct OverlayHandle(pub i32);

/// What kind of object a handle was allocated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverlayKind {
    Subtitle,
    Menu,
    Osd,
}

/// What happens to an overlay object at an event's vpts.
#[derive(Debug, Clone)]
pub enum OverlayAction {
    /// Show (or replace) the object's content.
    Show(OverlayLayer),
    Hide,
    /// Set or clear the menu highlight on the object's content.
    Highlight(Option<Highlight>),
    /// Hide and release the handle.
    Free,
}

/// A queued overlay change.
#[derive(Debug, Clone)]
pub struct OverlayEvent {
    /// When the change takes effect; `Pts::ZERO` means immediately.
    pub vpts: Pts,
    pub handle: OverlayHandle,
    pub action: OverlayAction,
}

impl OverlayEvent {
    pub fn show(vpts: Pts, handle: OverlayHandle, layer: OverlayLayer) -> Self {
        Self {
            vpts,
            handle,
            action: OverlayAction::Show(layer),
        }
    }

    pub fn hide(vpts: Pts, handle: OverlayHandle) -> Self {
        Self {
            vpts,
            handle,
            action: OverlayAction::Hide,
        }
    }
}

struct Slot {
    kind: OverlayKind,
    content: Option<OverlayLayer>,
}

#[derive(Default)]
struct ManagerState {
    slots: Vec<Option<Slot>>,
    showing: BTreeMap<OverlayHandle, OverlayLayer>,
    /// Sorted by vpts; equal stamps keep posting order.
    events: Vec<OverlayEvent>,
    changed: bool,
}

impl ManagerState {
    fn slot_mut(&mut self, handle: OverlayHandle) -> Option<&mut Slot> {
        usize::try_from(handle.0)
            .ok()
            .and_then(|i| self.slots.get_mut(i))
            .and_then(|s| s.as_mut())
    }

    fn release(&mut self, handle: OverlayHandle) {
        if let Ok(i) = usize::try_from(handle.0) {
            if let Some(slot) = self.slots.get_mut(i) {
                *slot = None;
            }
        }
        if self.showing.remove(&handle).is_some() {
            self.changed = true;
        }
        self.events.retain(|e| e.handle != handle);
    }

    /// Apply every queued event due at `vpts`.
    fn process(&mut self, vpts: Pts) {
        let due = self.events.partition_point(|e| e.vpts <= vpts);
        let events: Vec<OverlayEvent> = self.events.drain(..due).collect();
        for event in events {
            let handle = event.handle;
            match event.action {
                OverlayAction::Show(layer) => {
                    let Some(slot) = self.slot_mut(handle) else {
                        continue;
                    };
                    slot.content = Some(layer.clone());
                    self.showing.insert(handle, layer);
                    self.changed = true;
                }
                OverlayAction::Hide => {
                    if self.showing.remove(&handle).is_some() {
                        self.changed = true;
                    }
                }
                OverlayAction::Highlight(highlight) => {
                    if let Some(slot) = self.slot_mut(handle) {
                        if let Some(content) = slot.content.as_mut() {
                            content.highlight = highlight.clone();
                        }
                    }
                    if let Some(layer) = self.showing.get_mut(&handle) {
                        layer.highlight = highlight;
                        self.changed = true;
                    }
                }
                OverlayAction::Free => self.release(handle),
            }
        }
    }
}

/// Registry of overlay objects and their pending events.
///
/// Safe to share between decoder, UI and output threads.
pub struct OverlayManager {
    max_handles: usize,
    state: Mutex<ManagerState>,
    compositor: Mutex<OverlayCompositor>,
}

impl OverlayManager {
    pub fn new(max_handles: usize) -> Self {
        Self {
            max_handles,
            state: Mutex::new(ManagerState::default()),
            compositor: Mutex::new(OverlayCompositor::new()),
        }
    }

    /// Allocate the lowest free handle.
    pub fn get_handle(&self, kind: OverlayKind) -> Result<OverlayHandle> {
        let mut state = self.state.lock();
        let index = match state.slots.iter().position(|s| s.is_none()) {
            Some(i) => i,
            None if state.slots.len() < self.max_handles => {
                state.slots.push(None);
                state.slots.len() - 1
            }
            None => {
                return Err(VideoOutError::Unsupported(format!(
                    "all {} overlay handles in use",
                    self.max_handles
                )))
            }
        };
        state.slots[index] = Some(Slot {
            kind,
            content: None,
        });
        debug!("allocated overlay handle {} for {:?}", index, kind);
        Ok(OverlayHandle(index as i32))
    }

    /// Release a handle immediately, hiding its content and dropping its
    /// pending events.
    pub fn free_handle(&self, handle: OverlayHandle) {
        self.state.lock().release(handle);
    }

    /// Kind the handle was allocated for, if it is allocated.
    pub fn handle_kind(&self, handle: OverlayHandle) -> Option<OverlayKind> {
        self.state.lock().slot_mut(handle).map(|s| s.kind)
    }

    /// Queue an event. The handle must be allocated.
    pub fn add_event(&self, event: OverlayEvent) -> Result<()> {
        let mut state = self.state.lock();
        if state.slot_mut(event.handle).is_none() {
            return Err(VideoOutError::InvalidParameter(format!(
                "overlay handle {} is not allocated",
                event.handle.0
            )));
        }
        let at = state.events.partition_point(|e| e.vpts <= event.vpts);
        state.events.insert(at, event);
        Ok(())
    }

    /// Drop all queued events and hide everything (stream reset).
    pub fn flush_events(&self) {
        let mut state = self.state.lock();
        state.events.clear();
        if !state.showing.is_empty() {
            state.showing.clear();
            state.changed = true;
        }
        drop(state);
        self.compositor.lock().clear_cache();
        info!("overlay events flushed");
    }

    /// Whether the picture at `vpts` would differ from the last blend.
    pub fn redraw_needed(&self, vpts: Pts) -> bool {
        let state = self.state.lock();
        state.changed || state.events.first().is_some_and(|e| e.vpts <= vpts)
    }

    /// Number of events not yet applied.
    pub fn pending_events(&self) -> usize {
        self.state.lock().events.len()
    }

    /// Apply due events and report whether anything is visible at `vpts`.
    pub fn has_visible(&self, vpts: Pts) -> bool {
        let mut state = self.state.lock();
        state.process(vpts);
        !state.showing.is_empty()
    }

    /// Clear the changed flag after a frame went out without a blend pass.
    /// Returns the previous value.
    pub fn take_changed(&self) -> bool {
        std::mem::take(&mut self.state.lock().changed)
    }

    /// Resolve the visible set at `vpts`, in ascending handle order.
    pub fn active_at(&self, vpts: Pts) -> Vec<(OverlayHandle, OverlayLayer)> {
        let mut state = self.state.lock();
        state.process(vpts);
        state
            .showing
            .iter()
            .map(|(h, l)| (*h, l.clone()))
            .collect()
    }

    /// Blend everything visible at `vpts` onto `frame`.
    ///
    /// With `enabled == false` nothing is drawn but events still advance.
    pub fn multiple_overlay_blend(
        &self,
        vpts: Pts,
        target: Option<&mut dyn OverlayTarget>,
        frame: &mut FrameImage,
        enabled: bool,
    ) -> BlendStats {
        let (active, changed) = {
            let mut state = self.state.lock();
            state.process(vpts);
            if !enabled {
                return BlendStats::default();
            }
            let active: Vec<(OverlayHandle, OverlayLayer)> = state
                .showing
                .iter()
                .map(|(h, l)| (*h, l.clone()))
                .collect();
            let changed = std::mem::take(&mut state.changed);
            (active, changed)
        };

        if active.is_empty() && target.is_none() {
            return BlendStats::default();
        }

        let refs: Vec<(OverlayHandle, &OverlayLayer)> =
            active.iter().map(|(h, l)| (*h, l)).collect();
        self.compositor.lock().blend(frame, &refs, changed, target)
    }
}

impl Default for OverlayManager {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HANDLES)
    }
}
