//! Overlay layers: one subtitle or OSD surface with its placement.

use vidout_core::IRect;

use crate::argb::ArgbLayerRef;
use crate::palette::Clut;
use crate::rle::RleImage;

/// Pixel content of a layer.
#[derive(Debug, Clone)]
pub enum OverlaySource {
    /// Palette image, colored through the layer's CLUT.
    Rle(RleImage),
    /// Shared true-color surface.
    Argb(ArgbLayerRef),
}

/// A highlighted sub-rectangle (DVD menu button) with its own palette.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Highlight {
    /// Layer-local coordinates.
    pub rect: IRect,
    pub clut: Clut,
}

/// A single overlay as handed to the compositor.
#[derive(Debug, Clone)]
pub struct OverlayLayer {
    pub source: OverlaySource,
    /// Placement in the reference coordinate system.
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
    /// Reference coordinate system; 0 means the video's display size.
    pub extent_width: u32,
    pub extent_height: u32,
    pub clut: Clut,
    pub highlight: Option<Highlight>,
    /// Placed in output pixels instead of scaled with the video.
    pub unscaled: bool,
}

impl OverlayLayer {
    /// Palette layer at `(x, y)`, sized from the RLE image.
    pub fn rle(image: RleImage, x: i32, y: i32, clut: Clut) -> Self {
        Self {
            width: image.width,
            height: image.height,
            source: OverlaySource::Rle(image),
            x,
            y,
            extent_width: 0,
            extent_height: 0,
            clut,
            highlight: None,
            unscaled: false,
        }
    }

    /// True-color layer at `(x, y)`, sized from the surface.
    pub fn argb(surface: ArgbLayerRef, x: i32, y: i32) -> Self {
        Self {
            width: surface.width(),
            height: surface.height(),
            source: OverlaySource::Argb(surface),
            x,
            y,
            extent_width: 0,
            extent_height: 0,
            clut: Clut::default(),
            highlight: None,
            unscaled: false,
        }
    }

    pub fn with_extent(mut self, width: u32, height: u32) -> Self {
        self.extent_width = width;
        self.extent_height = height;
        self
    }

    pub fn with_highlight(mut self, highlight: Highlight) -> Self {
        self.highlight = Some(highlight);
        self
    }

    pub fn unscaled(mut self) -> Self {
        self.unscaled = true;
        self
    }

    /// Layer area in its reference coordinate system.
    pub fn rect(&self) -> IRect {
        IRect::new(self.x, self.y, self.width as i32, self.height as i32)
    }

    pub fn is_argb(&self) -> bool {
        matches!(self.source, OverlaySource::Argb(_))
    }

    /// Palette used at layer-local `(lx, ly)`.
    #[inline]
    pub fn clut_at(&self, lx: i32, ly: i32) -> &Clut {
        match &self.highlight {
            Some(h) if h.rect.contains(lx, ly) => &h.clut,
            _ => &self.clut,
        }
    }
}
