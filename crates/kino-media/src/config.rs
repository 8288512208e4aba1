//! Player configuration

use crate::{types::QualitySwitch, Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Player configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Try the native video loader before the adaptive HLS loader
    pub prefer_native_hls: bool,
    /// The media surface can play HLS without an adaptive engine
    pub native_hls: bool,
    /// Default switch policy for manual quality changes
    pub quality_switch: QualitySwitch,
    /// Minimum target segment duration (seconds) for an EVENT playlist to count as DVR
    pub dvr_min_target_duration: f64,
    /// Engine back buffer for live streams (seconds)
    pub live_back_buffer: f64,
    /// Engine back buffer for low-latency live streams (seconds)
    pub low_latency_back_buffer: f64,
    /// Live edge polling interval in milliseconds
    pub live_sync_interval_ms: u64,
    /// Delay used to coalesce provider loads, in milliseconds
    pub load_frame_ms: u64,
    /// Source type probe timeout in milliseconds
    pub probe_timeout_ms: u64,
    /// Re-seek to the current position after a manual quality switch
    pub nudge_after_quality_switch: bool,
    /// Capacity of the notification channel
    pub event_capacity: usize,
    /// Embed YouTube from the privacy-enhanced host
    pub youtube_no_cookie: bool,
    /// Extra adaptive engine options, merged over the derived ones
    pub engine: serde_json::Map<String, serde_json::Value>,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            prefer_native_hls: false,
            native_hls: false,
            quality_switch: QualitySwitch::Current,
            dvr_min_target_duration: 10.0,
            live_back_buffer: 8.0,
            low_latency_back_buffer: 4.0,
            live_sync_interval_ms: 16,
            load_frame_ms: 16,
            probe_timeout_ms: 10_000,
            nudge_after_quality_switch: true,
            event_capacity: 256,
            youtube_no_cookie: true,
            engine: serde_json::Map::new(),
        }
    }
}

impl PlayerConfig {
    /// Parse a JSON configuration; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        if !(self.dvr_min_target_duration.is_finite() && self.dvr_min_target_duration >= 0.0) {
            return Err(Error::InvalidConfig(format!(
                "dvr_min_target_duration must be a non-negative number, got {}",
                self.dvr_min_target_duration
            )));
        }
        if self.live_sync_interval_ms == 0 {
            return Err(Error::InvalidConfig(
                "live_sync_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.event_capacity == 0 {
            return Err(Error::InvalidConfig(
                "event_capacity must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn live_sync_interval(&self) -> Duration {
        Duration::from_millis(self.live_sync_interval_ms)
    }

    pub fn load_frame(&self) -> Duration {
        Duration::from_millis(self.load_frame_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}
