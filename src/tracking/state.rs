//! Tracker state types

use serde::{Deserialize, Serialize};

use crate::vision::GlyphLayout;

/// Pixel coordinate on the static world map
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    /// Sentinel for "no fix"
    pub const UNKNOWN: Position = Position { x: -1, y: -1 };

    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn is_known(&self) -> bool {
        *self != Self::UNKNOWN
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// What the tracker does with a frame it cannot localise
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocalizationFailurePolicy {
    /// Drop the frame, no sample
    #[default]
    Drop,
    /// Emit a sample at the last fix, if there is one
    LastKnown,
}

/// Tracker phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerPhase {
    /// No position accepted yet
    NoFix,
    /// Searching around the last accepted position
    Tracking,
}

/// Mutable state carried from frame to frame
#[derive(Debug, Clone, Default)]
pub struct TrackerState {
    /// Last accepted position; only changed by an accepted match
    pub last_position: Option<Position>,
    /// Clock glyph layout of the previous frame
    pub last_layout: Option<GlyphLayout>,
}

impl TrackerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> TrackerPhase {
        match self.last_position {
            Some(_) => TrackerPhase::Tracking,
            None => TrackerPhase::NoFix,
        }
    }

    /// Remember this frame's clock layout.
    ///
    /// Returns `false` when it is identical to the previous frame's.
    pub fn observe_clock(&mut self, layout: &GlyphLayout) -> bool {
        if self.last_layout.as_ref() == Some(layout) {
            return false;
        }
        self.last_layout = Some(layout.clone());
        true
    }
}
