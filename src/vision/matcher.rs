//! Normalized correlation-coefficient matching
//!
//! Built on `imageproc`'s template matching and integral images. Every
//! recogniser and the position tracker go through the [`Matcher`] trait so
//! the confidence decisions can be exercised without real imagery.

use image::{GrayImage, ImageBuffer, Luma};
use imageproc::integral_image::{integral_image, integral_squared_image};
use imageproc::template_matching::{match_template, MatchTemplateMethod};

/// Best alignment of a needle inside a haystack
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchResult {
    /// Top-left corner of the alignment inside the haystack
    pub location: (u32, u32),
    /// Score in [0, 1]; 1.0 is a perfect alignment
    pub confidence: f32,
}

/// Image matching primitive
pub trait Matcher: Send + Sync {
    /// Highest-scoring alignment of `needle` in `haystack`.
    ///
    /// Returns `None` when the needle is larger than the haystack in either
    /// dimension.
    fn best_match(&self, haystack: &GrayImage, needle: &GrayImage) -> Option<MatchResult>;

    /// Every alignment scoring at or above `threshold`, in row-major order.
    ///
    /// Returns an empty list when the needle is larger than the haystack in
    /// either dimension.
    fn all_matches(&self, haystack: &GrayImage, needle: &GrayImage, threshold: f32) -> Vec<(u32, u32)>;
}

/// Whether `needle` can be slid over `haystack`
pub fn fits(haystack: &GrayImage, needle: &GrayImage) -> bool {
    needle.width() > 0
        && needle.height() > 0
        && needle.width() <= haystack.width()
        && needle.height() <= haystack.height()
}

/// Zero-mean normalized cross-correlation matcher
#[derive(Debug, Clone, Copy, Default)]
pub struct NccMatcher;

impl NccMatcher {
    pub fn new() -> Self {
        Self
    }

    /// Score every alignment with the mean-centred correlation coefficient
    ///
    /// `(ΣIT - ΣI·ΣT/N) / sqrt((ΣI² - (ΣI)²/N)(ΣT² - (ΣT)²/N))`, with the raw
    /// cross term from `imageproc` and the window sums from integral images.
    /// A flat window or a flat needle scores 0; negative correlation is
    /// clamped to 0.
    fn scores(haystack: &GrayImage, needle: &GrayImage) -> impl Iterator<Item = (u32, u32, f32)> {
        let cross = match_template(haystack, needle, MatchTemplateMethod::CrossCorrelation);
        let sums = integral_image::<_, u64>(haystack);
        let squares = integral_squared_image::<_, u64>(haystack);

        let (nw, nh) = needle.dimensions();
        let n = (nw as f64) * (nh as f64);
        let (t_sum, t_sq) = needle.pixels().fold((0u64, 0u64), |(s, q), p| {
            let v = p[0] as u64;
            (s + v, q + v * v)
        });
        let t_sum = t_sum as f64;
        let t_var = n * t_sq as f64 - t_sum * t_sum;

        let (width, height) = cross.dimensions();
        (0..height).flat_map(move |y| (0..width).map(move |x| (x, y))).map(move |(x, y)| {
            if t_var <= 0.0 {
                return (x, y, 0.0);
            }
            let s = window_sum(&sums, x, y, nw, nh) as f64;
            let w_var = n * window_sum(&squares, x, y, nw, nh) as f64 - s * s;
            if w_var <= 0.0 {
                return (x, y, 0.0);
            }

            let c = cross.get_pixel(x, y)[0] as f64;
            let score = (n * c - s * t_sum) / (w_var * t_var).sqrt();
            let score = if score.is_finite() { score.clamp(0.0, 1.0) } else { 0.0 };
            (x, y, score as f32)
        })
    }
}

/// Sum of a `w`x`h` window at `(x, y)` from an integral image with a zero
/// first row and column
fn window_sum(integral: &ImageBuffer<Luma<u64>, Vec<u64>>, x: u32, y: u32, w: u32, h: u32) -> u64 {
    integral.get_pixel(x + w, y + h)[0] + integral.get_pixel(x, y)[0]
        - integral.get_pixel(x + w, y)[0]
        - integral.get_pixel(x, y + h)[0]
}

impl Matcher for NccMatcher {
    fn best_match(&self, haystack: &GrayImage, needle: &GrayImage) -> Option<MatchResult> {
        if !fits(haystack, needle) {
            log::debug!(
                "Needle {}x{} does not fit haystack {}x{}",
                needle.width(),
                needle.height(),
                haystack.width(),
                haystack.height()
            );
            return None;
        }

        let mut best: Option<MatchResult> = None;
        for (x, y, score) in Self::scores(haystack, needle) {
            if best.map_or(true, |b| score > b.confidence) {
                best = Some(MatchResult {
                    location: (x, y),
                    confidence: score,
                });
            }
        }
        best
    }

    fn all_matches(&self, haystack: &GrayImage, needle: &GrayImage, threshold: f32) -> Vec<(u32, u32)> {
        if !fits(haystack, needle) {
            return Vec::new();
        }

        Self::scores(haystack, needle)
            .filter(|&(_, _, score)| score >= threshold)
            .map(|(x, y, _)| (x, y))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn noise(width: u32, height: u32, seed: u64) -> GrayImage {
        let mut rng = StdRng::seed_from_u64(seed);
        GrayImage::from_fn(width, height, |_, _| Luma([rng.gen_range(0..=255)]))
    }

    fn cut(image: &GrayImage, x: u32, y: u32, w: u32, h: u32) -> GrayImage {
        image::imageops::crop_imm(image, x, y, w, h).to_image()
    }

    #[test]
    fn test_best_match_finds_exact_crop() {
        let haystack = noise(40, 30, 1);
        let needle = cut(&haystack, 12, 7, 8, 6);

        let result = NccMatcher::new().best_match(&haystack, &needle).unwrap();
        assert_eq!(result.location, (12, 7));
        assert!(result.confidence > 0.999);
        assert!(result.confidence <= 1.0);
    }

    #[test]
    fn test_needle_larger_than_haystack_is_noop() {
        let haystack = noise(10, 10, 2);
        let wide = noise(11, 4, 3);
        let tall = noise(4, 11, 4);
        let matcher = NccMatcher::new();

        assert!(matcher.best_match(&haystack, &wide).is_none());
        assert!(matcher.best_match(&haystack, &tall).is_none());
        assert!(matcher.all_matches(&haystack, &wide, 0.0).is_empty());
        assert!(matcher.all_matches(&haystack, &tall, 0.0).is_empty());
    }

    #[test]
    fn test_all_matches_finds_every_copy() {
        let glyph = noise(5, 5, 5);
        let mut haystack = GrayImage::from_pixel(40, 10, Luma([0]));
        image::imageops::replace(&mut haystack, &glyph, 3, 2);
        image::imageops::replace(&mut haystack, &glyph, 25, 4);

        let hits = NccMatcher::new().all_matches(&haystack, &glyph, 0.999);
        assert_eq!(hits, vec![(3, 2), (25, 4)]);
    }

    #[test]
    fn test_all_matches_threshold_zero_covers_every_alignment() {
        let haystack = noise(12, 9, 6);
        let needle = noise(4, 3, 7);
        let hits = NccMatcher::new().all_matches(&haystack, &needle, 0.0);
        assert_eq!(hits.len(), 9 * 7);
    }

    #[test]
    fn test_black_haystack_scores_zero() {
        let haystack = GrayImage::new(10, 10);
        let needle = noise(3, 3, 8);
        let result = NccMatcher::new().best_match(&haystack, &needle).unwrap();
        assert_eq!(result.confidence, 0.0);
    }

    #[test]
    fn test_flat_window_scores_zero() {
        let needle = noise(6, 6, 9);
        let mut haystack = GrayImage::from_pixel(20, 20, Luma([230]));
        image::imageops::replace(&mut haystack, &needle, 12, 12);

        let hits = NccMatcher::new().all_matches(&haystack, &needle, 0.0);
        let scores: Vec<_> = NccMatcher::scores(&haystack, &needle).collect();
        assert_eq!(hits.len(), scores.len());
        // Windows that lie entirely on the flat background carry no signal
        assert!(scores
            .iter()
            .filter(|&&(x, y, _)| x + 6 <= 12 || y + 6 <= 12)
            .all(|&(_, _, score)| score == 0.0));
        let best = NccMatcher::new().best_match(&haystack, &needle).unwrap();
        assert_eq!(best.location, (12, 12));
    }

    #[test]
    fn test_flat_needle_scores_zero() {
        let haystack = noise(20, 20, 10);
        let needle = GrayImage::from_pixel(5, 5, Luma([128]));
        let result = NccMatcher::new().best_match(&haystack, &needle).unwrap();
        assert_eq!(result.confidence, 0.0);
    }

    #[test]
    fn test_unrelated_noise_scores_low() {
        let haystack = noise(120, 100, 11);
        let needle = noise(16, 14, 12);
        let result = NccMatcher::new().best_match(&haystack, &needle).unwrap();
        assert!(result.confidence < 0.5, "got {}", result.confidence);
    }

    #[test]
    fn test_score_ignores_brightness_offset() {
        let needle = noise(8, 8, 13);
        let brighter = GrayImage::from_fn(8, 8, |x, y| Luma([needle.get_pixel(x, y)[0] / 2 + 100]));
        let result = NccMatcher::new().best_match(&brighter, &needle).unwrap();
        assert!(result.confidence > 0.99);
    }
}
