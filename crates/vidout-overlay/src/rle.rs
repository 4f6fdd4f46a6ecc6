//! Run-length encoded palette images.
//!
//! Subtitle and OSD bitmaps are stored as `(length, palette index)` runs in
//! row-major order. Runs may span row boundaries.

use serde::{Deserialize, Serialize};
use vidout_core::{Result, VideoOutError};

/// One run of identical palette indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RleRun {
    pub len: u16,
    pub color: u16,
}

/// A palette-indexed image of `width x height` pixels.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RleImage {
    pub width: u32,
    pub height: u32,
    pub runs: Vec<RleRun>,
}

impl RleImage {
    /// Encode a row-major index buffer.
    pub fn encode(width: u32, height: u32, indices: &[u8]) -> Result<Self> {
        let expected = width as usize * height as usize;
        if indices.len() != expected {
            return Err(VideoOutError::InvalidParameter(format!(
                "RLE source has {} pixels, expected {}x{}",
                indices.len(),
                width,
                height
            )));
        }

        let mut runs: Vec<RleRun> = Vec::new();
        for &index in indices {
            match runs.last_mut() {
                Some(run) if run.color == index as u16 && run.len < u16::MAX => run.len += 1,
                _ => runs.push(RleRun {
                    len: 1,
                    color: index as u16,
                }),
            }
        }

        Ok(Self {
            width,
            height,
            runs,
        })
    }

    /// Total pixels covered by the runs.
    pub fn pixel_count(&self) -> usize {
        self.runs.iter().map(|r| r.len as usize).sum()
    }

    /// Expand into a row-major palette index buffer.
    ///
    /// Runs must cover exactly `width * height` pixels and reference
    /// palette entries below 256.
    pub fn decode(&self) -> Result<Vec<u8>> {
        let expected = self.width as usize * self.height as usize;
        let covered = self.pixel_count();
        if covered != expected {
            return Err(VideoOutError::InvalidParameter(format!(
                "RLE runs cover {} pixels, expected {}x{}",
                covered, self.width, self.height
            )));
        }

        let mut out = Vec::with_capacity(expected);
        for run in &self.runs {
            let color = u8::try_from(run.color).map_err(|_| {
                VideoOutError::InvalidParameter(format!("palette index {} out of range", run.color))
            })?;
            out.extend(std::iter::repeat(color).take(run.len as usize));
        }
        Ok(out)
    }

    /// Serialize as `width, height` (u32 LE) followed by `len, color`
    /// (u16 LE) pairs.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(8 + self.runs.len() * 4);
        out.extend_from_slice(&self.width.to_le_bytes());
        out.extend_from_slice(&self.height.to_le_bytes());
        for run in &self.runs {
            out.extend_from_slice(&run.len.to_le_bytes());
            out.extend_from_slice(&run.color.to_le_bytes());
        }
        out
    }

    /// Reconstruct from the `to_bytes` wire form.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < 8 || (data.len() - 8) % 4 != 0 {
            return Err(VideoOutError::Serialization(format!(
                "RLE buffer of {} bytes is truncated",
                data.len()
            )));
        }
        let width = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
        let height = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);
        let runs = data[8..]
            .chunks_exact(4)
            .map(|c| RleRun {
                len: u16::from_le_bytes([c[0], c[1]]),
                color: u16::from_le_bytes([c[2], c[3]]),
            })
            .collect();
        Ok(Self {
            width,
            height,
            runs,
        })
    }
}
