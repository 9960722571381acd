//! Per-frame control flow
//!
//! A frame goes through the clock, the facing sprite, the event screens and
//! finally the world-map search, in that order. Any step can end the frame
//! early; those early exits are ordinary outcomes, not errors.

use image::{GrayImage, RgbImage};
use std::sync::Arc;

use crate::config::{LayoutConfig, TrackerConfig};
use crate::samples::{LogWriter, RecordOutcome};
use crate::tracking::{Localization, PositionTracker};
use crate::vision::{
    regions, DecodeError, Direction, DirectionClassifier, EventDetector, EventQueue, EventSignature,
    FrameRegions, Matcher, NccMatcher, TemplateStore, TimeDecoder,
};
use crate::Result;

/// How a frame ended
#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    /// Clock glyphs identical to the previous frame
    ClockUnchanged,
    /// Clock could not be read as a full date
    DateUnreadable(DecodeError),
    /// Avatar facing could not be determined
    AvatarHidden,
    /// A modal screen is open; position is unchanged
    EventActive(EventSignature),
    /// Viewport could not be found on the map
    NotLocalized { confidence: f32 },
    /// A position was handed to the log writer
    Localized {
        direction: Direction,
        localization: Localization,
        record: RecordOutcome,
    },
}

/// Running totals per outcome
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub frames: u64,
    pub unchanged: u64,
    pub unreadable: u64,
    pub hidden: u64,
    pub events: u64,
    pub not_localized: u64,
    pub logged: u64,
}

impl FrameStats {
    fn count(&mut self, outcome: &FrameOutcome) {
        self.frames += 1;
        match outcome {
            FrameOutcome::ClockUnchanged => self.unchanged += 1,
            FrameOutcome::DateUnreadable(_) => self.unreadable += 1,
            FrameOutcome::AvatarHidden => self.hidden += 1,
            FrameOutcome::EventActive(_) => self.events += 1,
            FrameOutcome::NotLocalized { .. } => self.not_localized += 1,
            FrameOutcome::Localized { record, .. } => {
                if matches!(record, RecordOutcome::Appended(_)) {
                    self.logged += 1;
                }
            }
        }
    }
}

/// Runs every recogniser and the tracker over a frame
pub struct FrameAnalyzer {
    matcher: Arc<dyn Matcher>,
    templates: Arc<TemplateStore>,
    layout: LayoutConfig,
    clock: TimeDecoder,
    direction: DirectionClassifier,
    detector: EventDetector,
    tracker: PositionTracker,
    writer: LogWriter,
    events: EventQueue,
    stats: FrameStats,
}

impl FrameAnalyzer {
    pub fn new(
        config: &TrackerConfig,
        templates: Arc<TemplateStore>,
        map: Arc<GrayImage>,
        writer: LogWriter,
        events: EventQueue,
    ) -> Self {
        let thresholds = &config.thresholds;
        Self {
            matcher: Arc::new(NccMatcher::new()),
            layout: config.layout.clone(),
            clock: TimeDecoder::new(thresholds.time_glyph),
            direction: DirectionClassifier::new(
                thresholds.direction,
                config.layout.direction_size,
                templates.directions(),
            ),
            detector: EventDetector::new(
                thresholds.event,
                &config.layout,
                &config.events.precedence,
                &templates,
            ),
            tracker: PositionTracker::new(map, &config.tracking, thresholds),
            templates,
            writer,
            events,
            stats: FrameStats::default(),
        }
    }

    /// Use a different matching primitive
    pub fn with_matcher(mut self, matcher: Arc<dyn Matcher>) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn tracker(&self) -> &PositionTracker {
        &self.tracker
    }

    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    /// Analyse one full colour frame
    pub fn analyze(&mut self, frame: &RgbImage) -> Result<FrameOutcome> {
        let outcome = self.run_steps(frame)?;
        self.stats.count(&outcome);
        Ok(outcome)
    }

    fn run_steps(&mut self, frame: &RgbImage) -> Result<FrameOutcome> {
        let matcher = &*self.matcher;
        self.tracker.begin_frame();

        let gray = regions::to_grayscale(frame);
        let cut = FrameRegions::extract(&gray, self.layout.clock, self.layout.viewport);

        let layout = self.clock.read_layout(matcher, &cut.clock, self.templates.time_glyphs());
        if !self.tracker.clock_changed(&layout) {
            return Ok(FrameOutcome::ClockUnchanged);
        }

        let date = match TimeDecoder::decode(&layout) {
            Ok(date) => date,
            Err(e) => {
                log::debug!("Skipping frame, clock unreadable: {}", e);
                return Ok(FrameOutcome::DateUnreadable(e));
            }
        };

        let sprite = regions::crop(&cut.viewport, self.layout.sprite);
        let Some(direction) = self.direction.classify(matcher, &sprite) else {
            log::debug!("Skipping frame at {}, avatar facing undetermined", date);
            return Ok(FrameOutcome::AvatarHidden);
        };

        let found = self.detector.detect(matcher, &cut.viewport);
        if let Some(&event) = found.first() {
            if self.tracker.last_position().is_some() {
                log::debug!("Event {} open at {}", event.category, date);
                self.events.push(event);
                return Ok(FrameOutcome::EventActive(event));
            }
        }

        let scaled = regions::resize(&cut.viewport, self.layout.scaled_viewport);
        let localization = self.tracker.localize(matcher, &scaled);
        let position = match localization {
            Localization::Accepted { position, .. } | Localization::Fallback { position, .. } => position,
            Localization::Rejected { confidence } => {
                return Ok(FrameOutcome::NotLocalized { confidence });
            }
        };

        let record = self.writer.record(&date, position)?;
        Ok(FrameOutcome::Localized {
            direction,
            localization,
            record,
        })
    }
}
