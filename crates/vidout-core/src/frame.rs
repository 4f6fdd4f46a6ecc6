//! Frame storage types: pixel formats, planes, and per-frame metadata.
//!
//! These are the pool-agnostic pieces of a video frame. Reference counting
//! and pool ownership live in `vidout-port`.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::any::Any;
use std::fmt;

use crate::flags::FrameFlags;
use crate::geometry::Crop;
use crate::time::Pts;

/// Four-character code identifying an opaque or hardware surface format.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FourCc(pub [u8; 4]);

impl FourCc {
    pub const fn new(code: &[u8; 4]) -> Self {
        Self(*code)
    }
}

impl fmt::Debug for FourCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FourCc({})", String::from_utf8_lossy(&self.0))
    }
}

/// Pixel format of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PixelFormat {
    /// YUV 4:2:0 planar: Y, U, V; chroma at half resolution.
    #[default]
    Yv12,
    /// YUV 4:2:0, Y plane plus interleaved CbCr.
    Nv12,
    /// Packed YUV 4:2:2 (Y0 U Y1 V).
    Yuy2,
    /// 8-bit RGBA (32 bits per pixel).
    Rgba8,
    /// Backend surface; pixels live in the sink.
    Opaque(FourCc),
}

/// Geometry of one plane of a format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaneLayout {
    pub width: u32,
    pub height: u32,
    pub bytes_per_pixel: usize,
}

impl PixelFormat {
    /// Number of planes for this format.
    pub fn plane_count(self) -> usize {
        match self {
            Self::Yuy2 | Self::Rgba8 => 1,
            Self::Nv12 => 2,
            Self::Yv12 => 3,
            Self::Opaque(_) => 0,
        }
    }

    /// True for the YCbCr formats the software blender understands.
    pub fn is_yuv(self) -> bool {
        matches!(self, Self::Yv12 | Self::Nv12 | Self::Yuy2)
    }

    /// Per-plane layouts for a `width x height` frame.
    pub fn plane_layouts(self, width: u32, height: u32) -> SmallVec<[PlaneLayout; 3]> {
        let cw = width.div_ceil(2);
        let ch = height.div_ceil(2);
        let p = |width, height, bytes_per_pixel| PlaneLayout {
            width,
            height,
            bytes_per_pixel,
        };
        match self {
            Self::Yv12 => smallvec::smallvec![p(width, height, 1), p(cw, ch, 1), p(cw, ch, 1)],
            Self::Nv12 => smallvec::smallvec![p(width, height, 1), p(cw, ch, 2)],
            // one macropixel = two luma samples
            Self::Yuy2 => smallvec::smallvec![p(width, height, 2)],
            Self::Rgba8 => smallvec::smallvec![p(width, height, 4)],
            Self::Opaque(_) => SmallVec::new(),
        }
    }

    /// Calculate total bytes needed for a frame of this format, without
    /// row padding.
    pub fn frame_size(self, width: u32, height: u32) -> usize {
        self.plane_layouts(width, height)
            .iter()
            .map(|l| l.width as usize * l.height as usize * l.bytes_per_pixel)
            .sum()
    }
}

/// A plane of pixel data with stride information.
#[derive(Debug, Clone, Default)]
pub struct FramePlane {
    /// Raw pixel data
    pub data: Vec<u8>,
    /// Bytes per row (may include padding)
    pub stride: usize,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    bytes_per_pixel: usize,
}

impl FramePlane {
    /// Create a zeroed plane with a 64-byte aligned stride.
    pub fn new(width: u32, height: u32, bytes_per_pixel: usize) -> Self {
        let min_stride = (width as usize) * bytes_per_pixel;
        let stride = (min_stride + 63) & !63;
        Self {
            data: vec![0u8; stride * height as usize],
            stride,
            width,
            height,
            bytes_per_pixel,
        }
    }

    #[inline]
    pub fn bytes_per_pixel(&self) -> usize {
        self.bytes_per_pixel
    }

    /// Get a row of pixel data.
    #[inline]
    pub fn row(&self, y: u32) -> &[u8] {
        let start = y as usize * self.stride;
        &self.data[start..start + self.width as usize * self.bytes_per_pixel]
    }

    /// Get a mutable row of pixel data.
    #[inline]
    pub fn row_mut(&mut self, y: u32) -> &mut [u8] {
        let start = y as usize * self.stride;
        let end = start + self.width as usize * self.bytes_per_pixel;
        &mut self.data[start..end]
    }

    /// Fill every pixel with `value` (one entry per byte of a pixel).
    pub fn fill(&mut self, value: &[u8]) {
        debug_assert_eq!(value.len(), self.bytes_per_pixel);
        for y in 0..self.height {
            for px in self.row_mut(y).chunks_exact_mut(value.len()) {
                px.copy_from_slice(value);
            }
        }
    }
}

/// The negotiation key of a frame request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameFormat {
    pub width: u32,
    pub height: u32,
    /// Display aspect ratio; 0.0 means "square pixels".
    pub ratio: f64,
    pub format: PixelFormat,
    pub flags: FrameFlags,
}

impl FrameFormat {
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Self {
        Self {
            width,
            height,
            ratio: 0.0,
            format,
            flags: FrameFlags::NONE,
        }
    }

    /// Storage-relevant equality: a frame allocated for `self` can hold
    /// `other` without reallocation.
    pub fn matches_storage(&self, other: &FrameFormat) -> bool {
        self.width == other.width && self.height == other.height && self.format == other.format
    }
}

/// Pixel payload of a frame, the part the overlay compositor writes into.
#[derive(Debug, Clone, Default)]
pub struct FrameImage {
    pub format: PixelFormat,
    pub width: u32,
    pub height: u32,
    /// Pixel data planes (0-3 depending on format)
    pub planes: SmallVec<[FramePlane; 3]>,
    pub crop: Crop,
    /// Displacement applied to unscaled overlays.
    pub overlay_offset: (i32, i32),
}

impl FrameImage {
    /// Allocate zeroed planes for the given geometry.
    pub fn allocate(width: u32, height: u32, format: PixelFormat) -> Self {
        let planes = format
            .plane_layouts(width, height)
            .into_iter()
            .map(|l| FramePlane::new(l.width, l.height, l.bytes_per_pixel))
            .collect();
        Self {
            format,
            width,
            height,
            planes,
            crop: Crop::NONE,
            overlay_offset: (0, 0),
        }
    }

    /// Total memory usage of this frame in bytes.
    pub fn memory_size(&self) -> usize {
        self.planes.iter().map(|p| p.data.len()).sum()
    }

    /// Copy pixels and geometry from `src`, reallocating if needed.
    pub fn copy_pixels_from(&mut self, src: &FrameImage) {
        if self.format != src.format || self.width != src.width || self.height != src.height {
            *self = FrameImage::allocate(src.width, src.height, src.format);
        }
        for (dst, s) in self.planes.iter_mut().zip(src.planes.iter()) {
            for y in 0..s.height.min(dst.height) {
                dst.row_mut(y).copy_from_slice(s.row(y));
            }
        }
        self.crop = src.crop;
        self.overlay_offset = src.overlay_offset;
    }
}

/// MPEG picture coding type hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PictureCodingType {
    #[default]
    Unknown,
    I,
    P,
    B,
    D,
}

/// Identifier of a logical stream using an output port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StreamId(pub u64);

/// Who is talking to a port: a stream, or an anonymous caller such as a
/// filter that is not a full-blown stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum StreamOrigin {
    #[default]
    Anonymous,
    Stream(StreamId),
}

/// Opaque backend payload attached to a frame.
pub type AccelData = Box<dyn Any + Send + Sync>;

/// Everything a frame carries between decoder, port and sink.
pub struct FrameData {
    pub image: FrameImage,
    pub ratio: f64,
    pub flags: FrameFlags,
    /// Presentation time stamp.
    pub pts: Pts,
    /// Virtual pts assigned by the stream clock.
    pub vpts: Pts,
    /// Frame length in ticks.
    pub duration: Pts,
    pub top_field_first: bool,
    pub repeat_first_field: bool,
    /// Often wrong in MPEG-2 streams; advisory only.
    pub progressive_frame: bool,
    pub coding_type: PictureCodingType,
    /// Skipped, or predicted from a skipped frame.
    pub bad_frame: bool,
    /// Set once the frame has been submitted for display.
    pub drawn: bool,
    /// Non-owning back-reference to the originating stream.
    pub origin: StreamOrigin,
    pub accel: Option<AccelData>,
}

impl FrameData {
    pub fn new(image: FrameImage) -> Self {
        Self {
            image,
            ratio: 0.0,
            flags: FrameFlags::NONE,
            pts: Pts::ZERO,
            vpts: Pts::ZERO,
            duration: Pts::ZERO,
            top_field_first: false,
            repeat_first_field: false,
            progressive_frame: false,
            coding_type: PictureCodingType::Unknown,
            bad_frame: false,
            drawn: false,
            origin: StreamOrigin::Anonymous,
            accel: None,
        }
    }

    /// Current format as seen by the pool.
    pub fn format(&self) -> FrameFormat {
        FrameFormat {
            width: self.image.width,
            height: self.image.height,
            ratio: self.ratio,
            format: self.image.format,
            flags: self.flags,
        }
    }

    /// Reset per-use metadata before handing the frame to a new producer.
    pub fn reset_metadata(&mut self) {
        self.pts = Pts::ZERO;
        self.vpts = Pts::ZERO;
        self.duration = Pts::ZERO;
        self.top_field_first = false;
        self.repeat_first_field = false;
        self.progressive_frame = false;
        self.coding_type = PictureCodingType::Unknown;
        self.bad_frame = false;
        self.drawn = false;
        self.origin = StreamOrigin::Anonymous;
        self.image.crop = Crop::NONE;
        self.image.overlay_offset = (0, 0);
    }
}

impl Default for FrameData {
    fn default() -> Self {
        Self::new(FrameImage::default())
    }
}

impl fmt::Debug for FrameData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameData")
            .field("format", &self.image.format)
            .field("width", &self.image.width)
            .field("height", &self.image.height)
            .field("pts", &self.pts)
            .field("vpts", &self.vpts)
            .field("duration", &self.duration)
            .field("flags", &self.flags)
            .field("origin", &self.origin)
            .field("accel", &self.accel.is_some())
            .finish()
    }
}
