//! Configuration types for the tracker
//!
//! These types define the structure of the tracker configuration loaded from a
//! TOML file. Every section falls back to the hand-tuned defaults for the
//! fixed stream layout, so an empty file is a valid configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::samples::RecencyPolicy;
use crate::tracking::{LocalizationFailurePolicy, Position};
use crate::vision::{EventCategory, Rect};

/// Errors raised while loading a configuration file
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),
    #[error("Parse error: {0}")]
    ParseError(String),
}

/// Top-level tracker configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub paths: PathsConfig,
    pub thresholds: ThresholdConfig,
    pub layout: LayoutConfig,
    pub tracking: TrackingConfig,
    pub log: LogConfig,
    pub events: EventsConfig,
    pub export: ExportConfig,
    pub source: SourceConfig,
}

impl TrackerConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::IoError(e.to_string()))?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

/// File locations used by the workers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Static world map image
    pub map: PathBuf,
    /// Template root with `time/`, `direction/` and `event/` subdirectories
    pub templates: PathBuf,
    /// Append-only position log
    pub position_log: PathBuf,
    /// Latest accepted position (`x y`)
    pub current_position: PathBuf,
    /// Latest decoded date (`day hour minute second`)
    pub current_time: PathBuf,
    /// Output directory of the export worker
    pub export_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            map: PathBuf::from("map.png"),
            templates: PathBuf::from("templates"),
            position_log: PathBuf::from("positionData.csv"),
            current_position: PathBuf::from("www/currentPosition"),
            current_time: PathBuf::from("www/currentTime"),
            export_dir: PathBuf::from("www"),
        }
    }
}

/// Confidence thresholds. Read once at startup, never adjusted at runtime.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    /// Windowed localisation is accepted at or above this score
    pub first_pass: f32,
    /// Full-map retry is rejected below this score
    pub fallback_floor: f32,
    /// A direction sprite must score strictly above this
    pub direction: f32,
    /// Minimum score for a clock glyph hit
    pub time_glyph: f32,
    /// Minimum score for an event signature hit
    pub event: f32,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            first_pass: 0.8,
            fallback_floor: 0.7,
            direction: 0.55,
            time_glyph: 0.9,
            event: 0.95,
        }
    }
}

/// Fixed pixel geometry of the stream layout
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Clock area, relative to the full frame
    pub clock: Rect,
    /// Game screen, relative to the full frame
    pub viewport: Rect,
    /// Avatar sprite, relative to the viewport
    pub sprite: Rect,
    /// Dialogue box, relative to the viewport
    pub dialogue: Rect,
    /// Options menu, relative to the viewport
    pub options_menu: Rect,
    /// Naming screen, relative to the viewport
    pub naming: Rect,
    /// Viewport size after scaling down to world-map pixels
    pub scaled_viewport: (u32, u32),
    /// Size the sprite region and direction templates are compared at
    pub direction_size: (u32, u32),
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            clock: Rect::new(526, 81, 304, 38),
            viewport: Rect::new(24, 24, 480, 432),
            sprite: Rect::new(194, 182, 39, 48),
            dialogue: Rect::new(0, 293, 480, 139),
            options_menu: Rect::new(240, 3, 240, 385),
            naming: Rect::new(0, 98, 480, 262),
            scaled_viewport: (160, 144),
            direction_size: (10, 10),
        }
    }
}

/// Position tracker settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Side length of the square search window around the last fix
    pub search_window: u32,
    /// One-shot manual seed for the first frame without a fix
    pub override_position: Option<Position>,
    /// What to do when the viewport cannot be localised
    pub localization_failure: LocalizationFailurePolicy,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            search_window: 500,
            override_position: None,
            localization_failure: LocalizationFailurePolicy::Drop,
        }
    }
}

/// Position log settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Real-world epoch seconds of in-game time 0d 0h 0m 0s
    pub epoch_base: i64,
    /// Number of recent samples kept for duplicate suppression
    pub recency_capacity: usize,
    /// Behaviour once the recency buffer overflows
    pub recency_policy: RecencyPolicy,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            epoch_base: 1_392_254_560,
            recency_capacity: 20,
            recency_policy: RecencyPolicy::ResetOnOverflow,
        }
    }
}

/// Event detector settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    /// Categories in priority order; the first one with hits wins
    pub precedence: Vec<EventCategory>,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            precedence: EventCategory::ALL.to_vec(),
        }
    }
}

/// Visualization/export worker settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub enabled: bool,
    /// Delay before the first export
    pub initial_delay_secs: u64,
    /// Delay between exports
    pub interval_secs: u64,
    /// Half width and half height of the crop around the last position
    pub crop_half_extent: (u32, u32),
    pub trail_radius: i32,
    pub marker_radius: i32,
    /// Opacity of the trail layer over the map
    pub trail_alpha: f32,
    /// Most recent events kept for `events.json`; older ones are dropped
    pub max_events: usize,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            initial_delay_secs: 60,
            interval_secs: 400,
            crop_half_extent: (500, 250),
            trail_radius: 10,
            marker_radius: 20,
            trail_alpha: 0.4,
            max_events: 1000,
        }
    }
}

/// Frame source settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Directory of still frames replayed in file-name order
    pub frames: PathBuf,
    /// Attempts at the initial resolve before giving up
    pub resolve_attempts: u32,
    /// Wait between initial resolve attempts
    pub resolve_interval_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            frames: PathBuf::from("frames"),
            resolve_attempts: 3,
            resolve_interval_secs: 60,
        }
    }
}
