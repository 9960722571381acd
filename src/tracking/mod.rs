//! Position tracking on the static world map
//!
//! - `PositionTracker` - localises the scaled viewport and owns the
//!   frame-to-frame state
//! - `Position` - map pixel coordinate with an "unknown" sentinel

mod state;
mod tracker;

pub use state::{LocalizationFailurePolicy, Position, TrackerPhase, TrackerState};
pub use tracker::{Localization, PositionTracker};
