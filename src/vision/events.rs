//! Modal event detection
//!
//! While a dialogue box, menu, naming screen or item pickup banner covers the
//! game screen the avatar cannot move, so the tracker skips localisation for
//! those frames. Each category has its own signature and its own part of the
//! viewport to look in.

use image::GrayImage;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;

use super::matcher::Matcher;
use super::regions::{crop, Rect};
use super::templates::TemplateStore;
use crate::config::LayoutConfig;

/// Modal screen categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    /// Item pickup banner; searched over the whole viewport
    Moonstone,
    Dialogue,
    OptionsMenu,
    Naming,
}

impl EventCategory {
    /// Default precedence order
    pub const ALL: [EventCategory; 4] = [
        EventCategory::Moonstone,
        EventCategory::Dialogue,
        EventCategory::OptionsMenu,
        EventCategory::Naming,
    ];
}

impl std::str::FromStr for EventCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "moonstone" => Ok(EventCategory::Moonstone),
            "dialogue" => Ok(EventCategory::Dialogue),
            "options_menu" | "optionsmenu" => Ok(EventCategory::OptionsMenu),
            "naming" => Ok(EventCategory::Naming),
            _ => Err(format!("Unknown event category: {}", s)),
        }
    }
}

impl std::fmt::Display for EventCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventCategory::Moonstone => write!(f, "moonstone"),
            EventCategory::Dialogue => write!(f, "dialogue"),
            EventCategory::OptionsMenu => write!(f, "options_menu"),
            EventCategory::Naming => write!(f, "naming"),
        }
    }
}

/// One signature hit, in coordinates of the category's search area
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSignature {
    pub x: u32,
    pub y: u32,
    pub category: EventCategory,
}

/// Ordered queue of detected events, drained by the export worker
#[derive(Debug, Clone, Default)]
pub struct EventQueue {
    inner: Arc<Mutex<VecDeque<EventSignature>>>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: EventSignature) {
        self.inner.lock().push_back(event);
    }

    /// Take every queued event, oldest first
    pub fn drain(&self) -> Vec<EventSignature> {
        self.inner.lock().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

/// A category ready to search: its viewport area and its signature
struct CategoryProbe {
    category: EventCategory,
    /// `None` searches the whole viewport
    area: Option<Rect>,
    signature: GrayImage,
}

/// Finds at most one active event category per viewport
pub struct EventDetector {
    threshold: f32,
    probes: Vec<CategoryProbe>,
}

impl EventDetector {
    /// Build the detector from the categories in `precedence` that have a
    /// signature in the store
    pub fn new(
        threshold: f32,
        layout: &LayoutConfig,
        precedence: &[EventCategory],
        templates: &TemplateStore,
    ) -> Self {
        let probes = precedence
            .iter()
            .filter_map(|&category| {
                let Some(signature) = templates.event(category) else {
                    log::debug!("No signature for event category {}", category);
                    return None;
                };
                let area = match category {
                    EventCategory::Moonstone => None,
                    EventCategory::Dialogue => Some(layout.dialogue),
                    EventCategory::OptionsMenu => Some(layout.options_menu),
                    EventCategory::Naming => Some(layout.naming),
                };
                Some(CategoryProbe {
                    category,
                    area,
                    signature: signature.clone(),
                })
            })
            .collect();

        Self { threshold, probes }
    }

    /// Search the viewport category by category.
    ///
    /// Returns the hits of the first category that has any. An area smaller
    /// than its signature ends the whole pass with no result.
    pub fn detect<M: Matcher + ?Sized>(&self, matcher: &M, viewport: &GrayImage) -> Vec<EventSignature> {
        for probe in &self.probes {
            let area = match probe.area {
                Some(rect) => crop(viewport, rect),
                None => viewport.clone(),
            };

            if area.width() < probe.signature.width() || area.height() < probe.signature.height() {
                log::warn!(
                    "Event area for {} is {}x{}, smaller than its {}x{} signature",
                    probe.category,
                    area.width(),
                    area.height(),
                    probe.signature.width(),
                    probe.signature.height()
                );
                return Vec::new();
            }

            let hits: Vec<EventSignature> = matcher
                .all_matches(&area, &probe.signature, self.threshold)
                .into_iter()
                .map(|(x, y)| EventSignature {
                    x,
                    y,
                    category: probe.category,
                })
                .collect();

            if !hits.is_empty() {
                return hits;
            }
        }

        Vec::new()
    }
}
