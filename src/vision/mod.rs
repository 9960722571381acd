//! Frame analysis for the fixed stream layout
//!
//! This module cuts the fixed regions out of a frame and reads them with
//! template matching:
//! - the clock area becomes a [`DecodedDate`]
//! - the avatar sprite becomes a [`Direction`]
//! - the game screen is checked for modal [`EventSignature`]s
//!
//! All recognisers share one [`Matcher`] and one immutable [`TemplateStore`].

pub mod clock;
pub mod direction;
pub mod events;
pub mod matcher;
pub mod regions;
pub mod templates;

// Re-export main types for convenient access
pub use clock::{DecodeError, DecodedDate, GlyphHit, GlyphLayout, TimeDecoder};
pub use direction::{Direction, DirectionClassifier};
pub use events::{EventCategory, EventDetector, EventQueue, EventSignature};
pub use matcher::{MatchResult, Matcher, NccMatcher};
pub use regions::{FrameRegions, Rect};
pub use templates::{Template, TemplateStore};
