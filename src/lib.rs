//! Overworld Tracker
//!
//! Follows a fixed-layout handheld game shown in a video stream and rebuilds,
//! frame by frame, the in-game clock, the avatar's facing, any modal screen
//! that is open, and the avatar's position on a known static world map.
//!
//! The crate is split the same way the work flows through a frame:
//! - [`vision`] - region cropping, template storage and the recognisers that
//!   read the clock, the facing sprite and event screens
//! - [`tracking`] - the stateful position tracker that localises the viewport
//!   on the world map
//! - [`samples`] - the durable position log, its dedup buffer and readers
//! - [`pipeline`] - frame sources, the per-frame analyzer and the two workers
//!
//! # Example
//!
//! ```ignore
//! use overworld_tracker::pipeline::{FrameAnalyzer, FrameDirectoryResolver, TrackingWorker};
//! use overworld_tracker::TrackerConfig;
//!
//! let config = TrackerConfig::load("tracker.toml")?;
//! let analyzer = FrameAnalyzer::new(&config, templates, map, writer, events);
//! let resolver = FrameDirectoryResolver::new(&config.source.frames);
//! let worker = TrackingWorker::start(analyzer, Box::new(resolver), &config.source)?;
//! let stats = worker.join()?;
//! ```

pub mod config;
pub mod pipeline;
pub mod samples;
pub mod tracking;
pub mod vision;

// Re-export commonly used types
pub use config::{ConfigError, TrackerConfig};
pub use samples::PositionSample;
pub use tracking::{Position, PositionTracker};
pub use vision::{DecodedDate, Direction, EventCategory, EventSignature};

/// Errors that stop an operation outright.
///
/// Frame-level misses (unreadable clock, occluded avatar, failed localisation)
/// are not errors; they are reported through
/// [`pipeline::FrameOutcome`] instead.
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Template error: {0}")]
    Template(String),

    #[error("Stream unavailable: {0}")]
    Acquisition(String),

    #[error("Worker failed: {0}")]
    Worker(String),
}

/// Result type for tracker operations
pub type Result<T> = std::result::Result<T, TrackerError>;
