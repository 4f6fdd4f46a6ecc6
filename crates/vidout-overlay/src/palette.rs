//! Overlay color lookup tables.

use serde::{Deserialize, Serialize};
use vidout_core::overlay_limits::{MAX_OPACITY, PALETTE_SIZE};

/// A 256-entry color lookup table with per-entry opacity.
///
/// Colors are `0x00RRGGBB` when `rgb` is set, `0x00YYCrCb` otherwise.
/// Opacity runs from 0 (transparent) to 15 (opaque).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clut {
    #[serde(with = "serde_table")]
    colors: [u32; PALETTE_SIZE],
    #[serde(
        serialize_with = "serde_table::serialize",
        deserialize_with = "serde_table::deserialize_opacity"
    )]
    opacity: [u8; PALETTE_SIZE],
    rgb: bool,
}

impl Clut {
    /// Fully transparent palette.
    pub fn new(rgb: bool) -> Self {
        Self {
            colors: [0; PALETTE_SIZE],
            opacity: [0; PALETTE_SIZE],
            rgb,
        }
    }

    /// Build from explicit entries; missing entries stay transparent and
    /// opacities are clamped.
    pub fn from_entries(rgb: bool, entries: &[(u32, u8)]) -> Self {
        let mut clut = Self::new(rgb);
        for (i, &(color, opacity)) in entries.iter().take(PALETTE_SIZE).enumerate() {
            clut.set(i as u8, color, opacity);
        }
        clut
    }

    /// Set one entry. Opacity above 15 is clamped.
    #[inline]
    pub fn set(&mut self, index: u8, color: u32, opacity: u8) {
        self.colors[index as usize] = color & 0x00ff_ffff;
        self.opacity[index as usize] = opacity.min(MAX_OPACITY);
    }

    #[inline]
    pub fn set_opacity(&mut self, index: u8, opacity: u8) {
        self.opacity[index as usize] = opacity.min(MAX_OPACITY);
    }

    #[inline]
    pub fn color(&self, index: u8) -> u32 {
        self.colors[index as usize]
    }

    #[inline]
    pub fn opacity(&self, index: u8) -> u8 {
        self.opacity[index as usize]
    }

    /// True if entries are already RGB-converted.
    #[inline]
    pub fn is_rgb(&self) -> bool {
        self.rgb
    }

    /// Mark entries as converted by an external color stage.
    pub fn replace_colors(&mut self, colors: [u32; PALETTE_SIZE], rgb: bool) {
        self.colors = colors;
        self.rgb = rgb;
    }
}

impl Default for Clut {
    fn default() -> Self {
        Self::new(false)
    }
}

/// serde only derives arrays up to 32 entries.
mod serde_table {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S, T, const N: usize>(table: &[T; N], s: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        T: Serialize,
    {
        table.as_slice().serialize(s)
    }

    pub fn deserialize<'de, D, T, const N: usize>(d: D) -> Result<[T; N], D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de>,
    {
        let v = Vec::<T>::deserialize(d)?;
        let len = v.len();
        v.try_into()
            .map_err(|_| D::Error::invalid_length(len, &"a 256-entry palette table"))
    }

    /// Opacity tables are clamped like every other way of setting them.
    pub fn deserialize_opacity<'de, D, const N: usize>(d: D) -> Result<[u8; N], D::Error>
    where
        D: Deserializer<'de>,
    {
        let mut table: [u8; N] = deserialize(d)?;
        for opacity in table.iter_mut() {
            *opacity = (*opacity).min(super::MAX_OPACITY);
        }
        Ok(table)
    }
}
