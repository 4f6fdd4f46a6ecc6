//! Output port configuration with versioned JSON persistence.

use serde::{Deserialize, Serialize};
use std::path::Path;
use vidout_core::{Pts, Result, VideoOutError};

use crate::skip::SkipPolicy;

/// Current config schema version.
pub const CONFIG_VERSION: u32 = 1;

/// Tunables of an [`OutputPort`](crate::OutputPort).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortConfig {
    /// Schema version for migration.
    pub version: u32,
    /// Frame pool ceiling.
    pub num_frames: usize,
    /// Lateness tolerated before the producer is told to skip.
    pub skip_threshold: Pts,
    /// Cap on a single skip answer.
    pub max_skip: u32,
    /// Queued frames later than this are dropped instead of presented.
    pub drop_late_frames_after: Pts,
    /// Duration assumed for frames submitted without one (25 fps).
    pub default_frame_duration: Pts,
    /// Output thread polling period.
    pub output_poll_interval_ms: u64,
    pub max_overlay_handles: usize,
}

impl Default for PortConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            num_frames: 15,
            skip_threshold: Pts::ZERO,
            max_skip: 30,
            drop_late_frames_after: Pts(7200),
            default_frame_duration: Pts(3600),
            output_poll_interval_ms: 5,
            max_overlay_handles: vidout_overlay::DEFAULT_MAX_HANDLES,
        }
    }
}

impl PortConfig {
    pub fn skip_policy(&self) -> SkipPolicy {
        SkipPolicy::new(self.skip_threshold, self.max_skip)
    }

    /// Reject values the port cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.num_frames == 0 {
            return Err(VideoOutError::InvalidParameter(
                "num_frames must be at least 1".into(),
            ));
        }
        if self.default_frame_duration.ticks() <= 0 {
            return Err(VideoOutError::InvalidParameter(
                "default_frame_duration must be positive".into(),
            ));
        }
        if self.output_poll_interval_ms == 0 {
            return Err(VideoOutError::InvalidParameter(
                "output_poll_interval_ms must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Serialize to JSON bytes.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec_pretty(self)
            .map_err(|e| VideoOutError::Serialization(format!("Failed to serialize config: {}", e)))
    }

    /// Deserialize from JSON bytes, applying migrations if needed.
    pub fn from_json(data: &[u8]) -> Result<Self> {
        let raw: serde_json::Value = serde_json::from_slice(data)
            .map_err(|e| VideoOutError::Serialization(format!("Invalid JSON: {}", e)))?;

        let version = raw.get("version").and_then(|v| v.as_u64()).unwrap_or(0) as u32;
        if version > CONFIG_VERSION {
            return Err(VideoOutError::Serialization(format!(
                "Config version {} is newer than supported version {}",
                version, CONFIG_VERSION
            )));
        }

        let migrated = migrate(raw, version)?;
        let config: Self = serde_json::from_value(migrated)
            .map_err(|e| VideoOutError::Serialization(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let data = self.to_json()?;
        std::fs::write(path, data)?;
        Ok(())
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)?;
        Self::from_json(&data)
    }
}

/// Apply sequential migrations from `from_version` to CONFIG_VERSION.
fn migrate(mut data: serde_json::Value, from_version: u32) -> Result<serde_json::Value> {
    let mut version = from_version;

    while version < CONFIG_VERSION {
        match version {
            0 => {
                // v0 → v1: frame counts were called "frames"
                if let Some(obj) = data.as_object_mut() {
                    if let Some(frames) = obj.remove("frames") {
                        obj.entry("num_frames").or_insert(frames);
                    }
                    obj.insert("version".into(), serde_json::json!(1));
                }
                version = 1;
            }
            _ => {
                return Err(VideoOutError::Serialization(format!(
                    "No migration path from version {}",
                    version
                )));
            }
        }
    }

    Ok(data)
}
