//! Clock reading
//!
//! The on-screen clock reads like `3d 12h 5m 41s`. Each glyph template is
//! searched in the clock area independently, so hits from different templates
//! arrive in template order and have to be put back into display order by
//! their x coordinate before they can be read left to right.

use image::GrayImage;
use serde::{Deserialize, Serialize};

use super::matcher::Matcher;
use super::templates::Template;

/// One glyph template hit inside the clock area
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct GlyphHit {
    pub x: u32,
    pub y: u32,
    pub key: String,
}

/// All glyph hits of one frame in reading order.
///
/// Two frames with equal layouts show the same clock.
pub type GlyphLayout = Vec<GlyphHit>;

/// In-game date read off the clock. Every field is two digits, zero padded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DecodedDate {
    pub day: String,
    pub hour: String,
    pub minute: String,
    pub second: String,
}

impl DecodedDate {
    /// Build a date from numeric fields, zero padding each to two digits
    pub fn new(day: u32, hour: u32, minute: u32, second: u32) -> Self {
        Self {
            day: format!("{:02}", day),
            hour: format!("{:02}", hour),
            minute: format!("{:02}", minute),
            second: format!("{:02}", second),
        }
    }

    /// Seconds since in-game time zero
    pub fn elapsed_seconds(&self) -> i64 {
        let field = |s: &str| s.parse::<i64>().unwrap_or(0);
        field(&self.day) * 86_400
            + field(&self.hour) * 3_600
            + field(&self.minute) * 60
            + field(&self.second)
    }

    /// Absolute timestamp given the epoch of in-game time zero
    pub fn timestamp(&self, epoch_base: i64) -> i64 {
        epoch_base + self.elapsed_seconds()
    }
}

impl std::fmt::Display for DecodedDate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}d {}h {}m {}s", self.day, self.hour, self.minute, self.second)
    }
}

/// Why a glyph layout could not be read as a date
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// At least one of day/hour/minute/second never appeared
    Incomplete,
    /// A field had more than two digits
    Overlong(String),
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeError::Incomplete => write!(f, "date incomplete"),
            DecodeError::Overlong(field) => write!(f, "field '{}' longer than two digits", field),
        }
    }
}

/// Reads the clock area with the clock glyph templates
pub struct TimeDecoder {
    threshold: f32,
}

impl TimeDecoder {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    /// Find every glyph in the clock area, sorted into reading order
    pub fn read_layout<M: Matcher + ?Sized>(
        &self,
        matcher: &M,
        clock: &GrayImage,
        glyphs: &[Template],
    ) -> GlyphLayout {
        let mut layout: GlyphLayout = glyphs
            .iter()
            .flat_map(|glyph| {
                matcher
                    .all_matches(clock, &glyph.image, self.threshold)
                    .into_iter()
                    .map(move |(x, y)| GlyphHit {
                        x,
                        y,
                        key: glyph.key.clone(),
                    })
            })
            .collect();
        layout.sort();
        layout
    }

    /// Fold a layout into a date.
    ///
    /// Digits accumulate until a separator (`d`, `h`, `m`, `s`) assigns them
    /// to its field.
    pub fn decode(layout: &[GlyphHit]) -> Result<DecodedDate, DecodeError> {
        let mut day = None;
        let mut hour = None;
        let mut minute = None;
        let mut second = None;
        let mut digits = String::new();

        for hit in layout {
            let slot = match hit.key.as_str() {
                "d" => &mut day,
                "h" => &mut hour,
                "m" => &mut minute,
                "s" => &mut second,
                other => {
                    digits.push_str(other);
                    continue;
                }
            };
            *slot = Some(format!("{:0>2}", digits));
            digits.clear();
        }

        match (day, hour, minute, second) {
            (Some(day), Some(hour), Some(minute), Some(second)) => {
                for field in [&day, &hour, &minute, &second] {
                    if field.len() != 2 {
                        return Err(DecodeError::Overlong(field.clone()));
                    }
                }
                Ok(DecodedDate {
                    day,
                    hour,
                    minute,
                    second,
                })
            }
            _ => Err(DecodeError::Incomplete),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vision::NccMatcher;
    use image::Luma;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn hit(x: u32, key: &str) -> GlyphHit {
        GlyphHit {
            x,
            y: 0,
            key: key.to_string(),
        }
    }

    fn layout_for(text: &str) -> GlyphLayout {
        text.chars()
            .enumerate()
            .filter(|(_, c)| !c.is_whitespace())
            .map(|(i, c)| hit(i as u32 * 10, &c.to_string()))
            .collect()
    }

    #[test]
    fn test_decode_full_clock() {
        let date = TimeDecoder::decode(&layout_for("0d3h15m42s")).unwrap();
        assert_eq!(date, DecodedDate::new(0, 3, 15, 42));
        assert_eq!(date.day, "00");
        assert_eq!(date.hour, "03");
    }

    #[test]
    fn test_decode_empty_field_pads_to_zero() {
        let date = TimeDecoder::decode(&layout_for("d4h5m6s")).unwrap();
        assert_eq!(date.day, "00");
    }

    #[test]
    fn test_decode_incomplete() {
        assert_eq!(
            TimeDecoder::decode(&layout_for("1d2h3m")),
            Err(DecodeError::Incomplete)
        );
        assert_eq!(TimeDecoder::decode(&[]), Err(DecodeError::Incomplete));
    }

    #[test]
    fn test_decode_overlong_field() {
        assert_eq!(
            TimeDecoder::decode(&layout_for("123d2h3m4s")),
            Err(DecodeError::Overlong("123".to_string()))
        );
    }

    #[test]
    fn test_timestamp() {
        let date = DecodedDate::new(0, 3, 15, 42);
        assert_eq!(date.timestamp(1_392_254_560), 1_392_266_302);

        let date = DecodedDate::new(2, 0, 0, 1);
        assert_eq!(date.elapsed_seconds(), 2 * 86_400 + 1);
    }

    #[test]
    fn test_display() {
        assert_eq!(DecodedDate::new(1, 2, 3, 4).to_string(), "01d 02h 03m 04s");
    }

    /// Distinct random glyphs on a black strip, laid out left to right
    fn render_clock(text: &str) -> (GrayImage, Vec<Template>) {
        let mut rng = StdRng::seed_from_u64(42);
        let keys = ["0", "1", "2", "3", "4", "5", "6", "7", "8", "9", "d", "h", "m", "s"];
        let glyphs: Vec<Template> = keys
            .iter()
            .map(|k| {
                let img = GrayImage::from_fn(6, 8, |_, _| Luma([rng.gen_range(1..=255)]));
                Template::new(*k, img)
            })
            .collect();

        let mut clock = GrayImage::new(8 * text.len() as u32 + 4, 12);
        for (i, c) in text.chars().enumerate() {
            let glyph = glyphs.iter().find(|g| g.key == c.to_string()).unwrap();
            image::imageops::replace(&mut clock, &glyph.image, 2 + 8 * i as i64, 2);
        }
        (clock, glyphs)
    }

    #[test]
    fn test_read_layout_interleaves_templates_by_x() {
        let (clock, glyphs) = render_clock("12d0h7m9s");
        let decoder = TimeDecoder::new(0.999);

        let layout = decoder.read_layout(&NccMatcher::new(), &clock, &glyphs);
        let keys: String = layout.iter().map(|h| h.key.as_str()).collect();
        assert_eq!(keys, "12d0h7m9s");

        let date = TimeDecoder::decode(&layout).unwrap();
        assert_eq!(date, DecodedDate::new(12, 0, 7, 9));
    }

    #[test]
    fn test_read_layout_is_stable_for_unchanged_clock() {
        let (clock, glyphs) = render_clock("3d4h5m6s");
        let decoder = TimeDecoder::new(0.999);
        let matcher = NccMatcher::new();

        let first = decoder.read_layout(&matcher, &clock, &glyphs);
        let second = decoder.read_layout(&matcher, &clock, &glyphs);
        assert_eq!(first, second);
        assert_eq!(TimeDecoder::decode(&first), TimeDecoder::decode(&second));
    }
}
