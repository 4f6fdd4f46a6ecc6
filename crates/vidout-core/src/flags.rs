//! Per-frame flag bitset passed with every frame request.

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};
use std::ops::{BitAnd, BitOr, BitOrAssign};

/// Field selection, stream markers and the packed color-matrix sub-field.
///
/// Bits 8..=12 hold `(color_matrix << 1) | full_range`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Pod, Zeroable,
)]
#[repr(transparent)]
#[serde(transparent)]
pub struct FrameFlags(pub u32);

impl FrameFlags {
    pub const NONE: Self = Self(0);
    pub const TOP_FIELD: Self = Self(1);
    pub const BOTTOM_FIELD: Self = Self(2);
    pub const BOTH_FIELDS: Self = Self(1 | 2);
    pub const PAN_SCAN: Self = Self(4);
    pub const INTERLACED: Self = Self(8);
    /// Set after an MPEG-2 sequence header.
    pub const NEW_SEQUENCE: Self = Self(16);
    /// 4:2:2 chroma; 4:2:0 otherwise.
    pub const CHROMA_422: Self = Self(32);
    pub const STILL_IMAGE: Self = Self(64);
    pub const FULLRANGE: Self = Self(0x100);

    const CM_SHIFT: u32 = 8;
    const CM_MASK: u32 = 0x1f00;

    #[inline]
    pub const fn bits(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// The raw 5-bit `(matrix << 1) | range` value.
    #[inline]
    pub const fn color_matrix_bits(self) -> u32 {
        (self.0 & Self::CM_MASK) >> Self::CM_SHIFT
    }

    /// MPEG color matrix coefficient index (0..=15).
    #[inline]
    pub const fn color_matrix(self) -> u32 {
        self.color_matrix_bits() >> 1
    }

    #[inline]
    pub const fn full_range(self) -> bool {
        self.color_matrix_bits() & 1 != 0
    }

    /// Replace the color-matrix sub-field, leaving other bits alone.
    pub const fn with_color_matrix(self, matrix: u32, full_range: bool) -> Self {
        let cm = ((matrix << 1) | full_range as u32) & 31;
        Self((self.0 & !Self::CM_MASK) | (cm << Self::CM_SHIFT))
    }

    /// Which fields this frame carries; `BOTH_FIELDS` when unspecified.
    pub fn fields(self) -> Self {
        let f = Self(self.0 & Self::BOTH_FIELDS.0);
        if f == Self::NONE {
            Self::BOTH_FIELDS
        } else {
            f
        }
    }
}

impl BitOr for FrameFlags {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for FrameFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for FrameFlags {
    type Output = Self;
    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}
