//! VidOut Core - Foundation types for the video output pipeline
//!
//! This crate provides the leaf types shared by the overlay and port crates:
//! - Presentation timestamps in 90 kHz ticks (Pts)
//! - Pixel formats, frame planes and per-frame metadata
//! - Frame flags, sink capabilities and property identifiers
//! - Integer geometry (crop, rectangles)

pub mod caps;
pub mod error;
pub mod flags;
pub mod frame;
pub mod geometry;
pub mod property;
pub mod time;

pub use caps::Capabilities;
pub use error::{usage_error, Result, VideoOutError};
pub use flags::FrameFlags;
pub use frame::{
    AccelData, FourCc, FrameData, FrameFormat, FrameImage, FramePlane, PictureCodingType,
    PixelFormat, PlaneLayout, StreamId, StreamOrigin,
};
pub use geometry::{Crop, IRect};
pub use property::{PropertyId, NUM_PROPERTIES};
pub use time::{Pts, TICKS_PER_SECOND};

/// Overlay palette and opacity limits.
pub mod overlay_limits {
    /// Colors in an overlay palette; indices are 8-bit.
    pub const PALETTE_SIZE: usize = 256;

    /// Highest opacity value (fully opaque).
    pub const MAX_OPACITY: u8 = 0x0f;
}
