//! Sink capability bitmask.

use serde::{Deserialize, Serialize};
use std::ops::{BitOr, BitOrAssign};

use crate::frame::PixelFormat;

/// One bit per optional sink feature.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Capabilities(pub u32);

impl Capabilities {
    pub const NONE: Self = Self(0);

    // ── Pixel formats ───────────────────────────
    /// YUV 4:2:0 planar pictures.
    pub const YV12: Self = Self(0x0000_0001);
    /// Packed YUY2 pictures.
    pub const YUY2: Self = Self(0x0000_0002);

    // ── Acceleration classes ────────────────────
    pub const XVMC_MOCOMP: Self = Self(0x0000_0004);
    pub const XVMC_IDCT: Self = Self(0x0000_0008);
    pub const XXMC: Self = Self(0x0000_0040);
    pub const VDPAU_H264: Self = Self(0x0000_0080);
    pub const VDPAU_MPEG12: Self = Self(0x0000_0100);
    pub const VDPAU_VC1: Self = Self(0x0000_0200);
    pub const VDPAU_MPEG4: Self = Self(0x0000_0400);
    pub const VAAPI: Self = Self(0x0000_0800);

    // ── Overlay and geometry ────────────────────
    /// Can blend overlays at output resolution.
    pub const UNSCALED_OVERLAY: Self = Self(0x0000_0010);
    pub const CROP: Self = Self(0x0000_0020);
    /// Exposes begin/blend/end persistent overlays.
    pub const PERSISTENT_OVERLAY: Self = Self(0x0000_1000);
    /// Accepts packed RGBA frames.
    pub const RGBA: Self = Self(0x0000_2000);
    pub const CUSTOM_EXTENT_OVERLAY: Self = Self(0x0100_0000);
    /// True-color overlays.
    pub const ARGB_LAYER_OVERLAY: Self = Self(0x0200_0000);
    pub const VIDEO_WINDOW_OVERLAY: Self = Self(0x0400_0000);

    // ── Color handling ──────────────────────────
    /// Alternative yuv->rgb matrices.
    pub const COLOR_MATRIX: Self = Self(0x0000_4000);
    pub const FULLRANGE: Self = Self(0x0000_8000);

    // ── Tunable properties ──────────────────────
    pub const HUE: Self = Self(0x0001_0000);
    pub const SATURATION: Self = Self(0x0002_0000);
    pub const CONTRAST: Self = Self(0x0004_0000);
    pub const BRIGHTNESS: Self = Self(0x0008_0000);
    pub const COLORKEY: Self = Self(0x0010_0000);
    pub const AUTOPAINT_COLORKEY: Self = Self(0x0020_0000);
    pub const ZOOM_X: Self = Self(0x0040_0000);
    pub const ZOOM_Y: Self = Self(0x0080_0000);
    pub const GAMMA: Self = Self(0x0800_0000);
    pub const SHARPNESS: Self = Self(0x1000_0000);
    pub const NOISE_REDUCTION: Self = Self(0x2000_0000);

    #[inline]
    pub const fn bits(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    pub const fn with(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    #[inline]
    pub const fn without(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    /// Whether frames of `format` can be handed to the sink.
    ///
    /// Opaque formats are always accepted here; the sink's format
    /// negotiation decides.
    pub fn supports_format(self, format: PixelFormat) -> bool {
        match format {
            PixelFormat::Yv12 | PixelFormat::Nv12 => self.contains(Self::YV12),
            PixelFormat::Yuy2 => self.contains(Self::YUY2),
            PixelFormat::Rgba8 => self.contains(Self::RGBA),
            PixelFormat::Opaque(_) => true,
        }
    }
}

impl BitOr for Capabilities {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for Capabilities {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}
