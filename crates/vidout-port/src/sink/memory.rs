//! Software sink that keeps presented frames in memory.
//!
//! Used by the demo binary and the tests: it allocates plain CPU frames,
//! records every presentation in a [`SinkLog`] the caller can inspect while
//! the port owns the sink, and optionally acts as a persistent overlay
//! backend that only records the begin/blend/end sequence.

use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, trace};
use vidout_core::{
    Capabilities, FrameData, FrameFormat, FrameImage, PixelFormat, PropertyId, Pts, Result,
    VideoOutError, NUM_PROPERTIES,
};
use vidout_overlay::{OverlayLayer, OverlayTarget};

use super::{GrabbedImage, HostEvent, Sink, SINK_INTERFACE_VERSION};
use crate::frame::Frame;

/// One presented frame as seen by the sink.
#[derive(Debug, Clone, PartialEq)]
pub struct Presentation {
    pub frame_id: u32,
    pub vpts: Pts,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
    /// Pixel snapshot, when capture is enabled.
    pub pixels: Option<GrabbedImage>,
}

/// Calls received through the persistent overlay interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverlayCall {
    Begin { changed: bool },
    Blend { x: i32, y: i32 },
    End,
}

#[derive(Default)]
struct LogState {
    presentations: Vec<Presentation>,
    overlay_calls: Vec<OverlayCall>,
}

/// Shared view of what a [`MemorySink`] has done.
#[derive(Clone, Default)]
pub struct SinkLog {
    inner: Arc<Mutex<LogState>>,
}

impl SinkLog {
    pub fn presentations(&self) -> Vec<Presentation> {
        self.inner.lock().presentations.clone()
    }

    pub fn presented_count(&self) -> usize {
        self.inner.lock().presentations.len()
    }

    pub fn last_presentation(&self) -> Option<Presentation> {
        self.inner.lock().presentations.last().cloned()
    }

    pub fn overlay_calls(&self) -> Vec<OverlayCall> {
        self.inner.lock().overlay_calls.clone()
    }

    pub fn clear(&self) {
        let mut state = self.inner.lock();
        state.presentations.clear();
        state.overlay_calls.clear();
    }
}

struct RecordingTarget {
    log: SinkLog,
}

impl OverlayTarget for RecordingTarget {
    fn overlay_begin(&mut self, _frame: &mut FrameImage, changed: bool) {
        self.log
            .inner
            .lock()
            .overlay_calls
            .push(OverlayCall::Begin { changed });
    }

    fn overlay_blend(&mut self, _frame: &mut FrameImage, layer: &OverlayLayer) {
        self.log.inner.lock().overlay_calls.push(OverlayCall::Blend {
            x: layer.x,
            y: layer.y,
        });
    }

    fn overlay_end(&mut self, _frame: &mut FrameImage) {
        self.log.inner.lock().overlay_calls.push(OverlayCall::End);
    }
}

#[derive(Debug, Clone, Copy)]
struct PropertySlot {
    value: i32,
    min: i32,
    max: i32,
}

/// In-memory sink.
pub struct MemorySink {
    capabilities: Capabilities,
    interface_version: u32,
    properties: [Option<PropertySlot>; NUM_PROPERTIES],
    max_video: (u32, u32),
    capture_pixels: bool,
    redraw_pending: bool,
    window: Option<u64>,
    /// Kept until the next frame replaces it.
    displayed: Option<Frame>,
    persistent: Option<RecordingTarget>,
    log: SinkLog,
}

impl MemorySink {
    pub fn new() -> Self {
        let capabilities = Capabilities::YV12
            | Capabilities::YUY2
            | Capabilities::RGBA
            | Capabilities::CROP
            | Capabilities::UNSCALED_OVERLAY
            | Capabilities::CUSTOM_EXTENT_OVERLAY
            | Capabilities::ARGB_LAYER_OVERLAY
            | Capabilities::COLOR_MATRIX
            | Capabilities::FULLRANGE
            | Capabilities::HUE
            | Capabilities::SATURATION
            | Capabilities::CONTRAST
            | Capabilities::BRIGHTNESS
            | Capabilities::ZOOM_X
            | Capabilities::ZOOM_Y;

        let mut sink = Self {
            capabilities,
            interface_version: SINK_INTERFACE_VERSION,
            properties: [None; NUM_PROPERTIES],
            max_video: (4096, 4096),
            capture_pixels: false,
            redraw_pending: false,
            window: None,
            displayed: None,
            persistent: None,
            log: SinkLog::default(),
        };

        let tunables = [
            (PropertyId::Interlaced, 0, 1, 0),
            (PropertyId::AspectRatio, 0, 4, 0),
            (PropertyId::Hue, 0, 65535, 32768),
            (PropertyId::Saturation, 0, 65535, 32768),
            (PropertyId::Contrast, 0, 65535, 32768),
            (PropertyId::Brightness, 0, 65535, 32768),
            (PropertyId::ZoomX, -85, 400, 100),
            (PropertyId::ZoomY, -85, 400, 100),
            (PropertyId::PanScan, 0, 1, 0),
            (PropertyId::DeinterlaceSd, 0, 1, 0),
            (PropertyId::DeinterlaceHd, 0, 1, 0),
        ];
        for (id, min, max, value) in tunables {
            sink.properties[id.index()] = Some(PropertySlot { value, min, max });
        }
        for id in [
            PropertyId::WindowWidth,
            PropertyId::WindowHeight,
            PropertyId::OutputWidth,
            PropertyId::OutputHeight,
            PropertyId::OutputXOffset,
            PropertyId::OutputYOffset,
        ] {
            sink.set_readonly(id, 0);
        }
        sink.set_readonly(PropertyId::MaxVideoWidth, sink.max_video.0 as i32);
        sink.set_readonly(PropertyId::MaxVideoHeight, sink.max_video.1 as i32);
        sink
    }

    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Act as a persistent overlay backend.
    pub fn with_persistent_overlays(mut self) -> Self {
        self.persistent = Some(RecordingTarget {
            log: self.log.clone(),
        });
        self
    }

    /// Refuse frames larger than `width x height`.
    pub fn with_max_video_size(mut self, width: u32, height: u32) -> Self {
        self.max_video = (width, height);
        self.set_readonly(PropertyId::MaxVideoWidth, width as i32);
        self.set_readonly(PropertyId::MaxVideoHeight, height as i32);
        self
    }

    /// Snapshot pixels of every presented frame into the log.
    pub fn with_pixel_capture(mut self) -> Self {
        self.capture_pixels = true;
        self
    }

    /// Report a different interface revision.
    pub fn with_interface_version(mut self, version: u32) -> Self {
        self.interface_version = version;
        self
    }

    /// Handle to the presentation log.
    pub fn log(&self) -> SinkLog {
        self.log.clone()
    }

    pub fn window_handle(&self) -> Option<u64> {
        self.window
    }

    fn set_readonly(&mut self, id: PropertyId, value: i32) {
        self.properties[id.index()] = Some(PropertySlot {
            value,
            min: value,
            max: value,
        });
    }

    fn negotiate(&self, format: &FrameFormat) -> Result<()> {
        if format.width == 0 || format.height == 0 {
            return Err(VideoOutError::FormatNegotiation(format!(
                "empty frame {}x{}",
                format.width, format.height
            )));
        }
        if format.width > self.max_video.0 || format.height > self.max_video.1 {
            return Err(VideoOutError::FormatNegotiation(format!(
                "{}x{} exceeds {}x{}",
                format.width, format.height, self.max_video.0, self.max_video.1
            )));
        }
        if matches!(format.format, PixelFormat::Opaque(_))
            || !self.capabilities.supports_format(format.format)
        {
            return Err(VideoOutError::FormatNegotiation(format!(
                "{:?} not supported",
                format.format
            )));
        }
        Ok(())
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

impl Sink for MemorySink {
    fn interface_version(&self) -> u32 {
        self.interface_version
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn alloc_frame(&mut self, format: &FrameFormat) -> Result<FrameData> {
        self.negotiate(format)?;
        Ok(FrameData::new(FrameImage::allocate(
            format.width,
            format.height,
            format.format,
        )))
    }

    fn update_frame_format(&mut self, data: &mut FrameData, format: &FrameFormat) -> Result<()> {
        self.negotiate(format)?;
        if !data.format().matches_storage(format) {
            data.image = FrameImage::allocate(format.width, format.height, format.format);
        }
        Ok(())
    }

    fn display_frame(&mut self, frame: Frame) {
        {
            let data = frame.data();
            let display = data.image.crop.display_rect(data.image.width, data.image.height);
            self.set_readonly(PropertyId::OutputWidth, display.width);
            self.set_readonly(PropertyId::OutputHeight, display.height);
            self.set_readonly(PropertyId::OutputXOffset, display.x);
            self.set_readonly(PropertyId::OutputYOffset, display.y);

            let presentation = Presentation {
                frame_id: frame.id(),
                vpts: data.vpts,
                width: data.image.width,
                height: data.image.height,
                format: data.image.format,
                pixels: self.capture_pixels.then(|| GrabbedImage::from_frame(&data)),
            };
            trace!("presenting frame {} at {}", frame.id(), data.vpts);
            self.log.inner.lock().presentations.push(presentation);
        }
        self.displayed = Some(frame);
    }

    fn overlay_target(&mut self) -> Option<&mut dyn OverlayTarget> {
        self.persistent
            .as_mut()
            .map(|t| t as &mut dyn OverlayTarget)
    }

    fn get_property(&self, id: PropertyId) -> Result<i32> {
        self.properties[id.index()]
            .map(|p| p.value)
            .ok_or(VideoOutError::UnsupportedProperty(id))
    }

    fn set_property(&mut self, id: PropertyId, value: i32) -> Result<i32> {
        if id.is_read_only() {
            return Err(VideoOutError::ReadOnlyProperty(id));
        }
        let slot = self.properties[id.index()]
            .as_mut()
            .ok_or(VideoOutError::UnsupportedProperty(id))?;
        slot.value = value.clamp(slot.min, slot.max);
        debug!("property {:?} set to {}", id, slot.value);
        Ok(slot.value)
    }

    fn property_range(&self, id: PropertyId) -> Result<(i32, i32)> {
        self.properties[id.index()]
            .map(|p| (p.min, p.max))
            .ok_or(VideoOutError::UnsupportedProperty(id))
    }

    fn gui_data_exchange(&mut self, event: HostEvent) -> Result<i32> {
        match event {
            HostEvent::Resize { width, height } => {
                self.set_readonly(PropertyId::WindowWidth, width as i32);
                self.set_readonly(PropertyId::WindowHeight, height as i32);
                self.redraw_pending = true;
                Ok(0)
            }
            HostEvent::WindowHandle(handle) => {
                self.window = Some(handle);
                self.redraw_pending = true;
                Ok(0)
            }
            HostEvent::Expose => {
                self.redraw_pending = true;
                Ok(0)
            }
            HostEvent::Custom { kind, .. } => Err(VideoOutError::Unsupported(format!(
                "custom host event {}",
                kind
            ))),
        }
    }

    fn redraw_needed(&mut self) -> bool {
        std::mem::take(&mut self.redraw_pending)
    }

    fn grab_frame(&mut self, data: &FrameData) -> Result<GrabbedImage> {
        if data.image.planes.is_empty() {
            return Err(VideoOutError::Unsupported(
                "grabbing a frame without CPU planes".into(),
            ));
        }
        Ok(GrabbedImage::from_frame(data))
    }
}
