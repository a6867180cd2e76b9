use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{EngineError, Result};
use crate::preview::FrameSize;

/// Tunables of the trim editor. Fixed for the lifetime of an engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrimConfig {
    /// Number of slots in the thumbnail strip.
    pub thumbnail_count: usize,
    /// Minimum span between start and end, in seconds.
    pub min_gap: f64,
    /// Seconds moved by one fine-tune step.
    pub nudge_step: f64,
    pub thumbnail_width: u32,
    pub thumbnail_height: u32,
    pub preview_width: u32,
    pub preview_height: u32,
    /// Pointer reach of a range handle, in pixels.
    pub handle_width: f32,
    pub thumbnail_workers: usize,
    pub preview_cache_capacity: usize,
    pub preview_cache_bucket_seconds: f64,
    /// Interval between playback ticks driven by the front-end.
    pub tick_interval_ms: u64,
    pub save_timeout_ms: u64,
}

impl Default for TrimConfig {
    fn default() -> Self {
        Self {
            thumbnail_count: 10,
            min_gap: 1.0,
            nudge_step: 0.1,
            thumbnail_width: 160,
            thumbnail_height: 90,
            preview_width: 640,
            preview_height: 360,
            handle_width: 8.0,
            thumbnail_workers: 2,
            preview_cache_capacity: 64,
            preview_cache_bucket_seconds: 1.0 / 30.0,
            tick_interval_ms: 33,
            save_timeout_ms: 15_000,
        }
    }
}

impl TrimConfig {
    /// Loads a config from a JSON file; missing fields keep their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| EngineError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self =
            serde_json::from_str(&text).map_err(|source| EngineError::ConfigSerialization {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        debug!(path = %path.display(), ?config, "trim config loaded");
        Ok(config)
    }

    /// Rejects values the editor cannot work with.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: &str| -> Result<()> {
            Err(EngineError::InvalidConfig {
                reason: reason.to_owned(),
            })
        };

        if self.thumbnail_count == 0 {
            return invalid("thumbnail_count must be at least 1");
        }
        if !self.min_gap.is_finite() || self.min_gap <= 0.0 {
            return invalid("min_gap must be a positive number of seconds");
        }
        if !self.nudge_step.is_finite() || self.nudge_step <= 0.0 {
            return invalid("nudge_step must be a positive number of seconds");
        }
        if self.thumbnail_width == 0 || self.thumbnail_height == 0 {
            return invalid("thumbnail size must be non-zero");
        }
        if self.preview_width == 0 || self.preview_height == 0 {
            return invalid("preview size must be non-zero");
        }
        if !self.handle_width.is_finite() || self.handle_width <= 0.0 {
            return invalid("handle_width must be positive");
        }
        if self.thumbnail_workers == 0 {
            return invalid("thumbnail_workers must be at least 1");
        }
        if self.preview_cache_capacity == 0 {
            return invalid("preview_cache_capacity must be at least 1");
        }
        let bucket = self.preview_cache_bucket_seconds;
        if !bucket.is_finite() || bucket <= 0.0 {
            return invalid("preview_cache_bucket_seconds must be positive");
        }
        if self.tick_interval_ms == 0 {
            return invalid("tick_interval_ms must be at least 1");
        }
        Ok(())
    }

    pub fn thumbnail_size(&self) -> FrameSize {
        FrameSize {
            width: self.thumbnail_width,
            height: self.thumbnail_height,
        }
    }

    pub fn preview_size(&self) -> FrameSize {
        FrameSize {
            width: self.preview_width,
            height: self.preview_height,
        }
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn save_timeout(&self) -> Duration {
        Duration::from_millis(self.save_timeout_ms)
    }
}
