//! Integer geometry for frames and overlays.

use serde::{Deserialize, Serialize};

/// Axis-aligned integer rectangle. `x`/`y` may be negative for partially
/// off-screen placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct IRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl IRect {
    #[inline]
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Rectangle spanning `[x1, x2) x [y1, y2)`.
    pub fn from_corners(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self {
            x: x1,
            y: y1,
            width: (x2 - x1).max(0),
            height: (y2 - y1).max(0),
        }
    }

    #[inline]
    pub fn right(self) -> i32 {
        self.x + self.width
    }

    #[inline]
    pub fn bottom(self) -> i32 {
        self.y + self.height
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    #[inline]
    pub fn area(self) -> i64 {
        if self.is_empty() {
            0
        } else {
            self.width as i64 * self.height as i64
        }
    }

    #[inline]
    pub fn contains(self, px: i32, py: i32) -> bool {
        px >= self.x && px < self.right() && py >= self.y && py < self.bottom()
    }

    /// Overlapping area, or `None` if the rectangles are disjoint.
    pub fn intersect(self, other: IRect) -> Option<IRect> {
        let r = IRect::from_corners(
            self.x.max(other.x),
            self.y.max(other.y),
            self.right().min(other.right()),
            self.bottom().min(other.bottom()),
        );
        if r.is_empty() {
            None
        } else {
            Some(r)
        }
    }

    /// Smallest rectangle covering both. Empty inputs are ignored.
    pub fn union(self, other: IRect) -> IRect {
        if self.is_empty() {
            return other;
        }
        if other.is_empty() {
            return self;
        }
        IRect::from_corners(
            self.x.min(other.x),
            self.y.min(other.y),
            self.right().max(other.right()),
            self.bottom().max(other.bottom()),
        )
    }
}

/// Pixels to crop from each edge of a decoded frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Crop {
    pub left: u32,
    pub right: u32,
    pub top: u32,
    pub bottom: u32,
}

impl Crop {
    pub const NONE: Crop = Crop {
        left: 0,
        right: 0,
        top: 0,
        bottom: 0,
    };

    /// The visible area of a `width x height` frame after cropping.
    /// Over-cropping collapses to an empty rectangle.
    pub fn display_rect(self, width: u32, height: u32) -> IRect {
        let w = width as i64 - self.left as i64 - self.right as i64;
        let h = height as i64 - self.top as i64 - self.bottom as i64;
        IRect::new(
            self.left as i32,
            self.top as i32,
            w.max(0) as i32,
            h.max(0) as i32,
        )
    }
}
