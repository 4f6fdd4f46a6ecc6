//! The sink contract: the platform backend an output port drives.
//!
//! A sink allocates and reformats frame storage, presents frames, answers
//! property queries and optionally composites overlays itself. The port
//! only ever talks to "some implementation of [`Sink`]".

mod memory;

pub use memory::{MemorySink, OverlayCall, Presentation, SinkLog};

use parking_lot::Mutex;
use std::sync::Arc;
use vidout_core::{
    Capabilities, FrameData, FrameFormat, PixelFormat, PropertyId, Pts, Result, VideoOutError,
};
use vidout_overlay::OverlayTarget;

use crate::frame::Frame;

/// Interface revision a sink must report to be bound to a port.
pub const SINK_INTERFACE_VERSION: u32 = 22;

/// A sink shared by a port, its pool and its output thread.
pub type SharedSink = Arc<Mutex<Box<dyn Sink>>>;

/// Wrap a sink for use by a port.
pub fn shared<S: Sink + 'static>(sink: S) -> SharedSink {
    Arc::new(Mutex::new(Box::new(sink) as Box<dyn Sink>))
}

/// Host notifications passed through the data-exchange channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    /// Output window resized.
    Resize { width: u32, height: u32 },
    /// Native window handle changed.
    WindowHandle(u64),
    /// Part of the window needs repainting.
    Expose,
    /// Backend-specific request.
    Custom { kind: i32, payload: Vec<u8> },
}

/// Snapshot of a frame's pixels, in the frame's native layout.
#[derive(Debug, Clone, PartialEq)]
pub struct GrabbedImage {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    /// Tightly packed planes (stride = plane width * bytes per pixel).
    pub planes: Vec<Vec<u8>>,
    pub vpts: Pts,
}

impl GrabbedImage {
    /// Copy the visible pixels out of `data`.
    pub fn from_frame(data: &FrameData) -> Self {
        let planes = data
            .image
            .planes
            .iter()
            .map(|plane| {
                let row_len = plane.width as usize * plane.bytes_per_pixel();
                let mut out = Vec::with_capacity(row_len * plane.height as usize);
                for y in 0..plane.height {
                    out.extend_from_slice(plane.row(y));
                }
                out
            })
            .collect();
        Self {
            width: data.image.width,
            height: data.image.height,
            format: data.image.format,
            planes,
            vpts: data.vpts,
        }
    }
}

/// Platform backend driven by an output port.
pub trait Sink: Send {
    /// Interface revision this sink was written against.
    fn interface_version(&self) -> u32 {
        SINK_INTERFACE_VERSION
    }

    fn capabilities(&self) -> Capabilities;

    /// Allocate storage for a new frame of `format`.
    fn alloc_frame(&mut self, format: &FrameFormat) -> Result<FrameData>;

    /// Reallocate `data` in place for `format`. Pixel content is lost.
    fn update_frame_format(&mut self, data: &mut FrameData, format: &FrameFormat) -> Result<()>;

    /// Called on every submitted frame before it is queued for display.
    fn process_frame(&mut self, _frame: &Frame) {}

    /// Copy `src` into `dst` so overlays can be blended without touching a
    /// frame other holders still reference.
    fn duplicate_frame_data(&mut self, dst: &mut FrameData, src: &FrameData) -> Result<()> {
        dst.image.copy_pixels_from(&src.image);
        dst.ratio = src.ratio;
        dst.flags = src.flags;
        dst.pts = src.pts;
        dst.vpts = src.vpts;
        dst.duration = src.duration;
        dst.top_field_first = src.top_field_first;
        dst.repeat_first_field = src.repeat_first_field;
        dst.progressive_frame = src.progressive_frame;
        dst.coding_type = src.coding_type;
        dst.bad_frame = src.bad_frame;
        dst.origin = src.origin;
        Ok(())
    }

    /// Present `frame`. The sink may keep the reference until the next one.
    fn display_frame(&mut self, frame: Frame);

    /// Persistent overlay support. `None` makes the port blend in software.
    fn overlay_target(&mut self) -> Option<&mut dyn OverlayTarget> {
        None
    }

    fn get_property(&self, id: PropertyId) -> Result<i32> {
        Err(VideoOutError::UnsupportedProperty(id))
    }

    /// Apply an already clamped value; returns what was applied.
    fn set_property(&mut self, id: PropertyId, _value: i32) -> Result<i32> {
        Err(VideoOutError::UnsupportedProperty(id))
    }

    /// Inclusive `(min, max)` for `id`.
    fn property_range(&self, id: PropertyId) -> Result<(i32, i32)> {
        Err(VideoOutError::UnsupportedProperty(id))
    }

    fn gui_data_exchange(&mut self, event: HostEvent) -> Result<i32> {
        Err(VideoOutError::Unsupported(format!(
            "host event {:?} not handled",
            event
        )))
    }

    /// True if the last presented frame must be shown again (e.g. after an
    /// expose). Reading the flag clears it.
    fn redraw_needed(&mut self) -> bool {
        false
    }

    fn grab_frame(&mut self, _data: &FrameData) -> Result<GrabbedImage> {
        Err(VideoOutError::Unsupported("frame grabbing".into()))
    }
}
