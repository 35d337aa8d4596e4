// src/config.rs
// Configuration for Wayfinder, loaded from YAML. Every field has a default so
// a partial file (or none at all) yields a working setup.

use crate::navigation::TurnThresholds;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

// Upper bounds keep a misconfigured loop responsive
const MAX_TICK_INTERVAL_MS: u64 = 10_000;
const MAX_ERROR_BACKOFF_MS: u64 = 10_000;
const MAX_PROGRESS_INTERVAL_MS: u64 = 600_000;

/// Main configuration structure for Wayfinder
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuideConfig {
    /// Keyframe map settings
    pub map: MapConfig,
    /// Turn severity thresholds (degrees)
    pub turns: TurnThresholds,
    /// Control loop and announcement settings
    pub guidance: GuidanceConfig,
    /// Position feed settings
    pub feed: FeedConfig,
}

/// Keyframe map configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    /// Keyframe table path
    pub keyframe_file: PathBuf,
    /// Keyframes closer than this (meters) are connected
    pub proximity_threshold: f64,
}

/// Guidance loop configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuidanceConfig {
    /// Delay between ticks
    pub tick_interval_ms: u64,
    /// Distance to the final keyframe that counts as arrival (meters)
    pub arrival_radius: f64,
    /// Minimum time between progress updates
    pub progress_interval_ms: u64,
    /// Pause after a failed tick
    pub error_backoff_ms: u64,
    /// Announcement queue capacity
    pub announcement_capacity: usize,
}

/// Position feed configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    /// UDP address the SLAM bridge sends fixes to
    pub bind_address: String,
    /// How long to wait for a fix before reporting none
    pub fix_timeout_ms: u64,
}

impl Default for MapConfig {
    fn default() -> Self {
        MapConfig {
            keyframe_file: PathBuf::from("data/keyframe_data.csv"),
            proximity_threshold: 3.0,
        }
    }
}

impl Default for GuidanceConfig {
    fn default() -> Self {
        GuidanceConfig {
            tick_interval_ms: 500,
            arrival_radius: 2.0,
            progress_interval_ms: 10_000,
            error_backoff_ms: 1_000,
            announcement_capacity: 32,
        }
    }
}

impl GuidanceConfig {
    /// Tick interval as a duration
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// Progress interval as a duration
    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }

    /// Back-off after a failed tick
    pub fn error_backoff(&self) -> Duration {
        Duration::from_millis(self.error_backoff_ms)
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        FeedConfig {
            bind_address: "127.0.0.1:5000".to_string(),
            fix_timeout_ms: 1_000,
        }
    }
}

impl FeedConfig {
    /// Fix timeout as a duration
    pub fn fix_timeout(&self) -> Duration {
        Duration::from_millis(self.fix_timeout_ms)
    }
}

/// Configuration errors
#[derive(Debug)]
pub enum ConfigError {
    /// Config file could not be read
    Io(String),
    /// Config file is not valid YAML for this schema
    Parse(String),
    /// Values are out of range
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            ConfigError::Io(msg) => write!(f, "Config I/O error: {}", msg),
            ConfigError::Parse(msg) => write!(f, "Config parse error: {}", msg),
            ConfigError::Invalid(msg) => write!(f, "Invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

impl GuideConfig {
    /// Load and validate a YAML config file
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
        let config: GuideConfig =
            serde_yaml::from_reader(file).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate YAML text
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let config: GuideConfig =
            serde_yaml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.map.proximity_threshold > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "map.proximity_threshold must be positive, got {}",
                self.map.proximity_threshold
            )));
        }
        if !self.turns.is_valid() {
            return Err(ConfigError::Invalid(format!(
                "turn thresholds must be positive and strictly increasing: {:?}",
                self.turns
            )));
        }
        let g = &self.guidance;
        if g.tick_interval_ms == 0 || g.tick_interval_ms > MAX_TICK_INTERVAL_MS {
            return Err(ConfigError::Invalid(format!(
                "guidance.tick_interval_ms must be in 1..={}, got {}",
                MAX_TICK_INTERVAL_MS, g.tick_interval_ms
            )));
        }
        if g.error_backoff_ms > MAX_ERROR_BACKOFF_MS {
            return Err(ConfigError::Invalid(format!(
                "guidance.error_backoff_ms must be at most {}, got {}",
                MAX_ERROR_BACKOFF_MS, g.error_backoff_ms
            )));
        }
        if g.progress_interval_ms > MAX_PROGRESS_INTERVAL_MS {
            return Err(ConfigError::Invalid(format!(
                "guidance.progress_interval_ms must be at most {}, got {}",
                MAX_PROGRESS_INTERVAL_MS, g.progress_interval_ms
            )));
        }
        if !(g.arrival_radius > 0.0) {
            return Err(ConfigError::Invalid("guidance.arrival_radius must be positive".into()));
        }
        if g.announcement_capacity == 0 {
            return Err(ConfigError::Invalid(
                "guidance.announcement_capacity must be non-zero".into(),
            ));
        }
        Ok(())
    }
}
