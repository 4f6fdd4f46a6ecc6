//! Video property identifiers for get/set through a port.

use serde::{Deserialize, Serialize};

use crate::caps::Capabilities;

/// Number of property slots, including the unused id 23.
pub const NUM_PROPERTIES: usize = 33;

/// Tunable and read-only video properties.
///
/// Discriminants are stable across the sink interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum PropertyId {
    Interlaced = 0,
    AspectRatio = 1,
    Hue = 2,
    Saturation = 3,
    Contrast = 4,
    Brightness = 5,
    Colorkey = 6,
    AutopaintColorkey = 7,
    ZoomX = 8,
    PanScan = 9,
    TvMode = 10,
    MaxNumFrames = 11,
    Gamma = 12,
    ZoomY = 13,
    DiscardFrames = 14,
    WindowWidth = 15,
    WindowHeight = 16,
    BufsInFifo = 17,
    NumStreams = 18,
    OutputWidth = 19,
    OutputHeight = 20,
    OutputXOffset = 21,
    OutputYOffset = 22,
    Sharpness = 24,
    NoiseReduction = 25,
    BufsTotal = 26,
    BufsFree = 27,
    MaxVideoWidth = 28,
    MaxVideoHeight = 29,
    LastPts = 30,
    DeinterlaceSd = 31,
    DeinterlaceHd = 32,
}

impl PropertyId {
    pub const ALL: [PropertyId; 32] = [
        Self::Interlaced,
        Self::AspectRatio,
        Self::Hue,
        Self::Saturation,
        Self::Contrast,
        Self::Brightness,
        Self::Colorkey,
        Self::AutopaintColorkey,
        Self::ZoomX,
        Self::PanScan,
        Self::TvMode,
        Self::MaxNumFrames,
        Self::Gamma,
        Self::ZoomY,
        Self::DiscardFrames,
        Self::WindowWidth,
        Self::WindowHeight,
        Self::BufsInFifo,
        Self::NumStreams,
        Self::OutputWidth,
        Self::OutputHeight,
        Self::OutputXOffset,
        Self::OutputYOffset,
        Self::Sharpness,
        Self::NoiseReduction,
        Self::BufsTotal,
        Self::BufsFree,
        Self::MaxVideoWidth,
        Self::MaxVideoHeight,
        Self::LastPts,
        Self::DeinterlaceSd,
        Self::DeinterlaceHd,
    ];

    /// Look up an identifier by its wire value.
    pub fn from_raw(raw: i32) -> Option<Self> {
        Self::ALL.iter().copied().find(|p| *p as i32 == raw)
    }

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn is_read_only(self) -> bool {
        matches!(
            self,
            Self::WindowWidth
                | Self::WindowHeight
                | Self::BufsInFifo
                | Self::NumStreams
                | Self::OutputWidth
                | Self::OutputHeight
                | Self::OutputXOffset
                | Self::OutputYOffset
                | Self::BufsTotal
                | Self::BufsFree
                | Self::MaxVideoWidth
                | Self::MaxVideoHeight
        )
    }

    /// Capability bit a sink must advertise for this property to be
    /// meaningful, if any.
    pub fn required_capability(self) -> Option<Capabilities> {
        match self {
            Self::Hue => Some(Capabilities::HUE),
            Self::Saturation => Some(Capabilities::SATURATION),
            Self::Contrast => Some(Capabilities::CONTRAST),
            Self::Brightness => Some(Capabilities::BRIGHTNESS),
            Self::Colorkey => Some(Capabilities::COLORKEY),
            Self::AutopaintColorkey => Some(Capabilities::AUTOPAINT_COLORKEY),
            Self::ZoomX => Some(Capabilities::ZOOM_X),
            Self::ZoomY => Some(Capabilities::ZOOM_Y),
            Self::Gamma => Some(Capabilities::GAMMA),
            Self::Sharpness => Some(Capabilities::SHARPNESS),
            Self::NoiseReduction => Some(Capabilities::NOISE_REDUCTION),
            _ => None,
        }
    }

    /// Properties the port answers itself instead of asking the sink.
    pub fn is_port_managed(self) -> bool {
        matches!(
            self,
            Self::DiscardFrames
                | Self::BufsInFifo
                | Self::NumStreams
                | Self::BufsTotal
                | Self::BufsFree
                | Self::MaxNumFrames
                | Self::LastPts
        )
    }
}
