//! World-map localisation of the game screen
//!
//! The scaled-down viewport is searched for in the static map. With a fix the
//! search is limited to a square window around it; a weak windowed match is
//! retried once against the whole map before the frame is given up on.
//!
//! ```text
//!            accepted                 accepted / rejected
//!   NoFix ------------> Tracking <---------------------+
//!                           |                          |
//!                           +--------------------------+
//! ```
//!
//! Rejections never change state.

use image::GrayImage;
use std::borrow::Cow;
use std::sync::Arc;

use super::state::{LocalizationFailurePolicy, Position, TrackerPhase, TrackerState};
use crate::config::{ThresholdConfig, TrackingConfig};
use crate::vision::{GlyphLayout, Matcher};

/// Result of localising one viewport
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Localization {
    /// New fix at the centre of the matched area
    Accepted {
        position: Position,
        confidence: f32,
        /// Whether the windowed pass fell short and the full-map floor applied
        widened: bool,
    },
    /// Not localised; the last fix is reported unchanged
    Fallback { position: Position, confidence: f32 },
    /// Not localised and nothing to report
    Rejected { confidence: f32 },
}

impl Localization {
    /// Position to log for this frame, if any
    pub fn position(&self) -> Option<Position> {
        match self {
            Localization::Accepted { position, .. } | Localization::Fallback { position, .. } => {
                Some(*position)
            }
            Localization::Rejected { .. } => None,
        }
    }
}

/// Where a viewport is searched for
struct SearchWindow<'a> {
    image: Cow<'a, GrayImage>,
    /// Top-left of the window on the map
    offset: (u32, u32),
    full_map: bool,
}

/// Stateful viewport localiser
pub struct PositionTracker {
    map: Arc<GrayImage>,
    window_size: u32,
    first_pass: f32,
    fallback_floor: f32,
    failure_policy: LocalizationFailurePolicy,
    /// Manual seed, consumed on the first frame
    pending_override: Option<Position>,
    state: TrackerState,
}

impl PositionTracker {
    pub fn new(map: Arc<GrayImage>, tracking: &TrackingConfig, thresholds: &ThresholdConfig) -> Self {
        Self {
            map,
            window_size: tracking.search_window,
            first_pass: thresholds.first_pass,
            fallback_floor: thresholds.fallback_floor,
            failure_policy: tracking.localization_failure,
            pending_override: tracking.override_position,
            state: TrackerState::new(),
        }
    }

    /// Set a one-shot manual seed for the first frame
    pub fn with_override(mut self, position: Position) -> Self {
        self.pending_override = Some(position);
        self
    }

    pub fn state(&self) -> &TrackerState {
        &self.state
    }

    pub fn phase(&self) -> TrackerPhase {
        self.state.phase()
    }

    pub fn last_position(&self) -> Option<Position> {
        self.state.last_position
    }

    pub fn map(&self) -> &GrayImage {
        &self.map
    }

    /// Start a frame. The manual seed is applied here, once, if there is no
    /// fix yet; it is discarded either way.
    pub fn begin_frame(&mut self) {
        if let Some(seed) = self.pending_override.take() {
            if self.state.last_position.is_none() {
                log::info!("Seeding tracker with manual position {}", seed);
                self.state.last_position = Some(seed);
            }
        }
    }

    /// Record this frame's clock layout; `false` if unchanged since the last frame
    pub fn clock_changed(&mut self, layout: &GlyphLayout) -> bool {
        self.state.observe_clock(layout)
    }

    /// Localise a viewport already scaled to map pixels
    pub fn localize<M: Matcher + ?Sized>(&mut self, matcher: &M, viewport: &GrayImage) -> Localization {
        let window = self.search_window(viewport.dimensions());
        let first = matcher.best_match(&window.image, viewport);
        let first_confidence = first.map_or(0.0, |m| m.confidence);

        let (found, offset, widened) = if first_confidence >= self.first_pass {
            (first, window.offset, false)
        } else if window.full_map {
            // Searching the same full map again would give the same answer
            (first, (0, 0), true)
        } else {
            log::debug!(
                "Windowed match {:.3} below {:.2}, widening to full map",
                first_confidence,
                self.first_pass
            );
            (matcher.best_match(&self.map, viewport), (0, 0), true)
        };
        drop(window);

        let confidence = found.map_or(0.0, |m| m.confidence);
        let found = match found {
            Some(_) if widened && confidence < self.fallback_floor => None,
            other => other,
        };

        let Some(found) = found else {
            log::warn!("Could not localise viewport (confidence {:.3})", confidence);
            return match (self.failure_policy, self.state.last_position) {
                (LocalizationFailurePolicy::LastKnown, Some(position)) => {
                    Localization::Fallback { position, confidence }
                }
                _ => Localization::Rejected { confidence },
            };
        };

        let (w, h) = viewport.dimensions();
        let position = Position::new(
            (found.location.0 + offset.0 + w / 2) as i32,
            (found.location.1 + offset.1 + h / 2) as i32,
        );
        self.state.last_position = Some(position);

        log::debug!(
            "Localised at {} (confidence {:.3}{})",
            position,
            confidence,
            if widened { ", widened" } else { "" }
        );
        Localization::Accepted {
            position,
            confidence,
            widened,
        }
    }

    /// Window centred on the last fix, or the whole map when there is no fix
    /// or the window would not lie entirely inside the map or would be
    /// smaller than the viewport.
    fn search_window(&self, (crop_w, crop_h): (u32, u32)) -> SearchWindow<'_> {
        let full = || SearchWindow {
            image: Cow::Borrowed(&*self.map),
            offset: (0, 0),
            full_map: true,
        };

        let Some(last) = self.state.last_position else {
            return full();
        };

        let half = (self.window_size / 2) as i64;
        let left = last.x as i64 - half;
        let top = last.y as i64 - half;
        let size = self.window_size as i64;

        let inside = left >= 0
            && top >= 0
            && left + size <= self.map.width() as i64
            && top + size <= self.map.height() as i64;
        if !inside || self.window_size < crop_w || self.window_size < crop_h {
            log::debug!("Search window around {} unusable, using full map", last);
            return full();
        }

        let image = image::imageops::crop_imm(
            &*self.map,
            left as u32,
            top as u32,
            self.window_size,
            self.window_size,
        )
        .to_image();

        SearchWindow {
            image: Cow::Owned(image),
            offset: (left as u32, top as u32),
            full_map: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vision::{MatchResult, NccMatcher};
    use image::Luma;
    use parking_lot::Mutex;
    use rand::{rngs::StdRng, Rng, SeedableRng};
    use std::collections::VecDeque;

    /// Returns scripted confidences and records haystack sizes
    struct ScriptedMatcher {
        confidences: Mutex<VecDeque<f32>>,
        location: (u32, u32),
        haystacks: Mutex<Vec<(u32, u32)>>,
    }

    impl ScriptedMatcher {
        fn new(confidences: &[f32], location: (u32, u32)) -> Self {
            Self {
                confidences: Mutex::new(confidences.iter().copied().collect()),
                location,
                haystacks: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<(u32, u32)> {
            self.haystacks.lock().clone()
        }
    }

    impl Matcher for ScriptedMatcher {
        fn best_match(&self, haystack: &GrayImage, _needle: &GrayImage) -> Option<MatchResult> {
            self.haystacks.lock().push(haystack.dimensions());
            let confidence = self.confidences.lock().pop_front()?;
            Some(MatchResult {
                location: self.location,
                confidence,
            })
        }

        fn all_matches(&self, _: &GrayImage, _: &GrayImage, _: f32) -> Vec<(u32, u32)> {
            Vec::new()
        }
    }

    fn noise(width: u32, height: u32, seed: u64) -> GrayImage {
        let mut rng = StdRng::seed_from_u64(seed);
        GrayImage::from_fn(width, height, |_, _| Luma([rng.gen_range(0..=255)]))
    }

    fn cut(image: &GrayImage, x: u32, y: u32, w: u32, h: u32) -> GrayImage {
        image::imageops::crop_imm(image, x, y, w, h).to_image()
    }

    fn tracking(window: u32) -> TrackingConfig {
        TrackingConfig {
            search_window: window,
            ..TrackingConfig::default()
        }
    }

    fn tracker(map: GrayImage, window: u32) -> PositionTracker {
        PositionTracker::new(Arc::new(map), &tracking(window), &ThresholdConfig::default())
    }

    fn seeded(map: GrayImage, window: u32, seed: Position) -> PositionTracker {
        let mut t = tracker(map, window).with_override(seed);
        t.begin_frame();
        t
    }

    #[test]
    fn test_first_fix_from_full_map() {
        let map = noise(90, 80, 1);
        let viewport = cut(&map, 30, 25, 16, 14);
        let mut t = tracker(map, 40);
        assert_eq!(t.phase(), TrackerPhase::NoFix);

        let result = t.localize(&NccMatcher::new(), &viewport);
        match result {
            Localization::Accepted { position, confidence, .. } => {
                assert_eq!(position, Position::new(30 + 8, 25 + 7));
                assert!(confidence > 0.999);
            }
            other => panic!("expected acceptance, got {:?}", other),
        }
        assert_eq!(t.phase(), TrackerPhase::Tracking);
        assert_eq!(t.last_position(), Some(Position::new(38, 32)));
    }

    #[test]
    fn test_windowed_match_translates_by_window_offset() {
        let map = noise(120, 120, 2);
        let viewport = cut(&map, 60, 50, 16, 14);
        // Previous fix a few pixels away from the true centre (68, 57)
        let mut t = seeded(map, 40, Position::new(64, 60));

        let result = t.localize(&NccMatcher::new(), &viewport);
        assert_eq!(result.position(), Some(Position::new(68, 57)));
        assert!(matches!(result, Localization::Accepted { widened: false, .. }));
    }

    #[test]
    fn test_window_confidence_equals_full_map_confidence() {
        let map = noise(120, 120, 3);
        let viewport = cut(&map, 55, 48, 16, 14);
        let matcher = NccMatcher::new();

        let full = matcher.best_match(&map, &viewport).unwrap();

        let mut t = seeded(map, 40, Position::new(60, 55));
        let Localization::Accepted { confidence, widened, position } = t.localize(&matcher, &viewport) else {
            panic!("expected acceptance");
        };
        assert!(!widened);
        assert!((confidence - full.confidence).abs() < 1e-6);
        assert_eq!(position, Position::new(55 + 8, 48 + 7));
    }

    #[test]
    fn test_window_past_map_edge_falls_back_to_full_map() {
        let map = noise(100, 90, 4);
        let viewport = cut(&map, 0, 0, 16, 14);
        // Window of 40 around (8, 7) would start at negative coordinates
        let mut t = seeded(map, 40, Position::new(8, 7));

        let result = t.localize(&NccMatcher::new(), &viewport);
        assert_eq!(result.position(), Some(Position::new(8, 7)));

        let map = noise(100, 90, 5);
        let viewport = cut(&map, 84, 76, 16, 14);
        let mut t = seeded(map, 40, Position::new(92, 83));
        let result = t.localize(&NccMatcher::new(), &viewport);
        assert_eq!(result.position(), Some(Position::new(92, 83)));
    }

    #[test]
    fn test_window_smaller_than_viewport_uses_full_map() {
        let map = noise(60, 60, 6);
        let viewport = cut(&map, 20, 20, 16, 14);
        let matcher = ScriptedMatcher::new(&[0.9], (20, 20));
        let mut t = seeded(map, 10, Position::new(30, 30));

        t.localize(&matcher, &viewport);
        assert_eq!(matcher.calls(), vec![(60, 60)]);
    }

    #[test]
    fn test_confident_first_pass_is_accepted_without_retry() {
        let matcher = ScriptedMatcher::new(&[0.82], (5, 6));
        let mut t = seeded(noise(120, 120, 7), 40, Position::new(60, 60));
        let viewport = noise(16, 14, 8);

        let result = t.localize(&matcher, &viewport);
        assert_eq!(matcher.calls(), vec![(40, 40)]);
        // Window starts at (40, 40)
        assert_eq!(
            result,
            Localization::Accepted {
                position: Position::new(40 + 5 + 8, 40 + 6 + 7),
                confidence: 0.82,
                widened: false,
            }
        );
    }

    #[test]
    fn test_weak_retry_is_rejected_without_state_change() {
        let matcher = ScriptedMatcher::new(&[0.75, 0.65], (5, 6));
        let mut t = seeded(noise(120, 120, 9), 40, Position::new(60, 60));

        let result = t.localize(&matcher, &noise(16, 14, 10));
        assert_eq!(matcher.calls(), vec![(40, 40), (120, 120)]);
        assert_eq!(result, Localization::Rejected { confidence: 0.65 });
        assert_eq!(result.position(), None);
        assert_eq!(t.last_position(), Some(Position::new(60, 60)));
    }

    #[test]
    fn test_retry_above_floor_is_accepted_in_map_coordinates() {
        let matcher = ScriptedMatcher::new(&[0.75, 0.72], (5, 6));
        let mut t = seeded(noise(120, 120, 11), 40, Position::new(60, 60));

        let result = t.localize(&matcher, &noise(16, 14, 12));
        assert_eq!(
            result,
            Localization::Accepted {
                position: Position::new(5 + 8, 6 + 7),
                confidence: 0.72,
                widened: true,
            }
        );
        assert_eq!(t.last_position(), Some(Position::new(13, 13)));
    }

    #[test]
    fn test_full_map_first_pass_is_not_repeated() {
        let matcher = ScriptedMatcher::new(&[0.75, 0.1], (5, 6));
        let mut t = tracker(noise(120, 120, 13), 40);

        let result = t.localize(&matcher, &noise(16, 14, 14));
        assert_eq!(matcher.calls(), vec![(120, 120)]);
        assert!(matches!(result, Localization::Accepted { widened: true, .. }));
    }

    #[test]
    fn test_rejection_without_fix_stays_no_fix() {
        let matcher = ScriptedMatcher::new(&[0.5], (0, 0));
        let mut t = tracker(noise(120, 120, 15), 40);

        assert_eq!(
            t.localize(&matcher, &noise(16, 14, 16)),
            Localization::Rejected { confidence: 0.5 }
        );
        assert_eq!(t.phase(), TrackerPhase::NoFix);
    }

    #[test]
    fn test_last_known_policy_reports_previous_fix() {
        let config = TrackingConfig {
            search_window: 40,
            localization_failure: LocalizationFailurePolicy::LastKnown,
            override_position: Some(Position::new(60, 60)),
        };
        let mut t = PositionTracker::new(Arc::new(noise(120, 120, 17)), &config, &ThresholdConfig::default());
        t.begin_frame();

        let matcher = ScriptedMatcher::new(&[0.3, 0.2], (0, 0));
        assert_eq!(
            t.localize(&matcher, &noise(16, 14, 18)),
            Localization::Fallback {
                position: Position::new(60, 60),
                confidence: 0.2
            }
        );

        let mut fresh = PositionTracker::new(
            Arc::new(noise(120, 120, 19)),
            &TrackingConfig {
                override_position: None,
                ..config
            },
            &ThresholdConfig::default(),
        );
        let matcher = ScriptedMatcher::new(&[0.3], (0, 0));
        assert!(matches!(
            fresh.localize(&matcher, &noise(16, 14, 20)),
            Localization::Rejected { .. }
        ));
    }

    #[test]
    fn test_override_is_consumed_once() {
        let mut t = tracker(noise(50, 50, 21), 40).with_override(Position::new(10, 10));
        t.begin_frame();
        assert_eq!(t.last_position(), Some(Position::new(10, 10)));

        t.state.last_position = None;
        t.begin_frame();
        assert_eq!(t.last_position(), None);
    }

    #[test]
    fn test_override_ignored_when_fix_exists() {
        let mut t = tracker(noise(50, 50, 22), 40).with_override(Position::new(10, 10));
        t.state.last_position = Some(Position::new(30, 30));
        t.begin_frame();
        assert_eq!(t.last_position(), Some(Position::new(30, 30)));
        assert!(t.pending_override.is_none());
    }

    #[test]
    fn test_needle_larger_than_map_is_rejected() {
        let mut t = tracker(noise(10, 10, 23), 40);
        let result = t.localize(&NccMatcher::new(), &noise(16, 14, 24));
        assert_eq!(result, Localization::Rejected { confidence: 0.0 });
    }

    #[test]
    fn test_viewport_off_the_map_is_rejected() {
        let map = noise(200, 180, 25);
        let elsewhere = noise(16, 14, 26);
        let matcher = NccMatcher::new();

        let mut t = tracker(map.clone(), 60);
        match t.localize(&matcher, &elsewhere) {
            Localization::Rejected { confidence } => assert!(confidence < 0.5, "got {}", confidence),
            other => panic!("expected rejection, got {:?}", other),
        }
        assert_eq!(t.phase(), TrackerPhase::NoFix);

        // With a fix, both the window and the full-map retry come up short
        let mut t = seeded(map, 60, Position::new(100, 90));
        assert!(matches!(t.localize(&matcher, &elsewhere), Localization::Rejected { .. }));
        assert_eq!(t.last_position(), Some(Position::new(100, 90)));
    }
}
