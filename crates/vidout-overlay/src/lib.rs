//! VidOut Overlay - Subtitle, menu and OSD overlays
//!
//! This crate provides:
//! - Color lookup tables with per-entry opacity (Clut)
//! - Run-length encoded palette images and shared ARGB surfaces
//! - The overlay manager: handles plus a vpts-ordered event queue
//! - The compositor that blends the visible set onto frames

pub mod argb;
pub mod compositor;
pub mod layer;
pub mod manager;
pub mod palette;
pub mod rle;

pub use argb::{ArgbLayer, ArgbLayerRef};
pub use compositor::{BlendStats, OverlayCompositor, OverlayTarget};
pub use layer::{Highlight, OverlayLayer, OverlaySource};
pub use manager::{
    OverlayAction, OverlayEvent, OverlayHandle, OverlayKind, OverlayManager, DEFAULT_MAX_HANDLES,
};
pub use palette::Clut;
pub use rle::{RleImage, RleRun};
