//! Template store
//!
//! Holds the reference images for the three recognition domains. Templates
//! are read once at startup from a directory tree and never change afterwards:
//!
//! ```text
//! templates/
//!   time/       0.png .. 9.png, d.png, h.png, m.png, s.png
//!   direction/  up.png, down.png, left.png, right.png
//!   event/      moonstone.png, dialogue.png, options_menu.png, naming.png
//! ```
//!
//! The file stem is the template key.

use image::GrayImage;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use super::direction::Direction;
use super::events::EventCategory;
use crate::{Result, TrackerError};

const SUPPORTED_EXTENSIONS: &[&str] = &["png", "bmp", "jpg", "jpeg"];

/// Keys the clock decoder understands
const TIME_KEYS: &[&str] = &[
    "0", "1", "2", "3", "4", "5", "6", "7", "8", "9", "d", "h", "m", "s",
];

/// A grayscale reference image tagged with its key
#[derive(Debug, Clone)]
pub struct Template {
    pub key: String,
    pub image: GrayImage,
}

impl Template {
    pub fn new(key: impl Into<String>, image: GrayImage) -> Self {
        Self {
            key: key.into(),
            image,
        }
    }
}

/// Immutable set of templates for clock glyphs, direction sprites and event
/// screens
#[derive(Debug, Clone, Default)]
pub struct TemplateStore {
    time: Vec<Template>,
    directions: Vec<(Direction, GrayImage)>,
    events: HashMap<EventCategory, GrayImage>,
}

impl TemplateStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a clock glyph (a digit or one of the `d`/`h`/`m`/`s` separators)
    pub fn with_time_glyph(mut self, key: impl Into<String>, image: GrayImage) -> Self {
        self.time.push(Template::new(key, image));
        self
    }

    /// Add a direction sprite. Sprites are tried in insertion order.
    pub fn with_direction(mut self, direction: Direction, image: GrayImage) -> Self {
        self.directions.retain(|(d, _)| *d != direction);
        self.directions.push((direction, image));
        self
    }

    /// Add an event screen signature
    pub fn with_event(mut self, category: EventCategory, image: GrayImage) -> Self {
        self.events.insert(category, image);
        self
    }

    /// Load all three domains from a template root directory
    pub fn load(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref();
        let mut store = Self::new();

        for (key, image) in load_dir(&root.join("time"))? {
            if TIME_KEYS.contains(&key.as_str()) {
                store = store.with_time_glyph(key, image);
            } else {
                log::warn!("Skipping clock glyph '{}': not a digit or d/h/m/s", key);
            }
        }

        let mut directions: HashMap<Direction, GrayImage> = HashMap::new();
        for (key, image) in load_dir(&root.join("direction"))? {
            match key.parse::<Direction>() {
                Ok(direction) => {
                    directions.insert(direction, image);
                }
                Err(e) => log::warn!("Skipping direction template '{}': {}", key, e),
            }
        }
        for direction in Direction::ALL {
            if let Some(image) = directions.remove(&direction) {
                store = store.with_direction(direction, image);
            }
        }

        for (key, image) in load_dir(&root.join("event"))? {
            match key.parse::<EventCategory>() {
                Ok(category) => store = store.with_event(category, image),
                Err(e) => log::warn!("Skipping event template '{}': {}", key, e),
            }
        }

        if store.time.is_empty() {
            return Err(TrackerError::Template(format!(
                "no clock glyph templates under {:?}",
                root.join("time")
            )));
        }

        log::info!(
            "Loaded {} clock glyphs, {} direction sprites, {} event signatures",
            store.time.len(),
            store.directions.len(),
            store.events.len()
        );
        Ok(store)
    }

    /// Clock glyph templates
    pub fn time_glyphs(&self) -> &[Template] {
        &self.time
    }

    /// Direction sprites in classification order
    pub fn directions(&self) -> &[(Direction, GrayImage)] {
        &self.directions
    }

    /// Signature for an event category, if one was loaded
    pub fn event(&self, category: EventCategory) -> Option<&GrayImage> {
        self.events.get(&category)
    }
}

/// Load every supported image in a directory as grayscale, keyed by file stem
/// and sorted by key. A missing directory yields no templates.
fn load_dir(dir: &Path) -> Result<Vec<(String, GrayImage)>> {
    if !dir.exists() {
        log::warn!("Template directory {:?} does not exist", dir);
        return Ok(Vec::new());
    }

    let mut paths: Vec<PathBuf> = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let supported = path
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .is_some_and(|ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str()));
        if path.is_file() && supported {
            paths.push(path);
        }
    }
    paths.sort();

    let mut templates = Vec::with_capacity(paths.len());
    for path in paths {
        let Some(stem) = path.file_stem() else {
            continue;
        };
        let key = stem.to_string_lossy().into_owned();
        let image = image::open(&path)?.to_luma8();
        log::debug!("Template '{}' {}x{}", key, image.width(), image.height());
        templates.push((key, image));
    }
    Ok(templates)
}
