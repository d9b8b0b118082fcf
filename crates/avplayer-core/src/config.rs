//! Runtime configuration

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Engine family, selects default watcher cadence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineProfile {
    /// Full-featured engines: fine-grained position polling, track enumeration
    Rich,
    /// Legacy media-player engines: coarse position polling, no track catalog
    Legacy,
}

impl EngineProfile {
    /// Default position poll period for this profile
    pub fn position_poll_interval(&self) -> Duration {
        match self {
            EngineProfile::Rich => Duration::from_millis(10),
            EngineProfile::Legacy => Duration::from_millis(100),
        }
    }
}

/// Process-wide runtime configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Forces one profile's cadence on every engine; each engine's own when unset
    pub engine_profile: Option<EngineProfile>,
    /// Position watcher period; profile default when unset
    pub position_poll_interval_ms: Option<u64>,
    /// Buffer watcher period
    pub buffer_poll_interval_ms: u64,
    /// Display refresh rate driving frame handoff
    pub display_refresh_hz: u32,
    /// Recycled frame buffers retained per player
    pub frame_pool_capacity: usize,
    /// Directory `asset://` sources resolve under
    pub asset_root: PathBuf,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            engine_profile: None,
            position_poll_interval_ms: None,
            buffer_poll_interval_ms: 100,
            display_refresh_hz: 60,
            frame_pool_capacity: 4,
            asset_root: PathBuf::from("flutter_assets"),
        }
    }
}

impl RuntimeConfig {
    /// Legacy cadence for every engine
    pub fn legacy() -> Self {
        Self {
            engine_profile: Some(EngineProfile::Legacy),
            ..Default::default()
        }
    }

    /// Parse from JSON, filling unset fields with defaults
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Reject configurations that would stall or spin the watchers
    pub fn validate(&self) -> Result<()> {
        if self.position_poll_interval_ms == Some(0) {
            return Err(Error::InvalidConfig(
                "position_poll_interval_ms must be positive".to_string(),
            ));
        }
        if self.buffer_poll_interval_ms == 0 {
            return Err(Error::InvalidConfig(
                "buffer_poll_interval_ms must be positive".to_string(),
            ));
        }
        if self.display_refresh_hz == 0 || self.display_refresh_hz > 480 {
            return Err(Error::InvalidConfig(format!(
                "display_refresh_hz out of range: {}",
                self.display_refresh_hz
            )));
        }
        Ok(())
    }

    /// Position watcher period for an engine of the given profile
    pub fn position_poll_interval(&self, engine: EngineProfile) -> Duration {
        self.position_poll_interval_ms
            .map(Duration::from_millis)
            .unwrap_or_else(|| self.engine_profile.unwrap_or(engine).position_poll_interval())
    }

    pub fn buffer_poll_interval(&self) -> Duration {
        Duration::from_millis(self.buffer_poll_interval_ms)
    }

    pub fn display_refresh_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.display_refresh_hz.max(1) as f64)
    }
}
