//! Avatar facing classification

use image::GrayImage;
use serde::{Deserialize, Serialize};

use super::matcher::Matcher;
use super::regions::resize;

/// Direction the avatar sprite faces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    /// Default classification order
    pub const ALL: [Direction; 4] = [Direction::Up, Direction::Down, Direction::Left, Direction::Right];
}

impl std::str::FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "up" => Ok(Direction::Up),
            "down" => Ok(Direction::Down),
            "left" => Ok(Direction::Left),
            "right" => Ok(Direction::Right),
            _ => Err(format!("Unknown direction: {}", s)),
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Up => write!(f, "up"),
            Direction::Down => write!(f, "down"),
            Direction::Left => write!(f, "left"),
            Direction::Right => write!(f, "right"),
        }
    }
}

/// Compares the sprite area against every direction sprite at a fixed small
/// size, so sprites of any native size are comparable.
pub struct DirectionClassifier {
    threshold: f32,
    compare_size: (u32, u32),
    /// Sprites already scaled to `compare_size`
    sprites: Vec<(Direction, GrayImage)>,
}

impl DirectionClassifier {
    pub fn new(threshold: f32, compare_size: (u32, u32), sprites: &[(Direction, GrayImage)]) -> Self {
        Self {
            threshold,
            compare_size,
            sprites: sprites
                .iter()
                .map(|(direction, image)| (*direction, resize(image, compare_size)))
                .collect(),
        }
    }

    /// First direction whose sprite scores above the threshold, or `None`
    /// when the avatar cannot be made out.
    pub fn classify<M: Matcher + ?Sized>(&self, matcher: &M, sprite_area: &GrayImage) -> Option<Direction> {
        let area = resize(sprite_area, self.compare_size);

        self.sprites.iter().find_map(|(direction, sprite)| {
            let result = matcher.best_match(&area, sprite)?;
            log::trace!("Direction {} scored {:.3}", direction, result.confidence);
            (result.confidence > self.threshold).then_some(*direction)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vision::NccMatcher;
    use image::Luma;

    /// A bright bar on a dim background, placed per direction
    fn arrow(direction: Direction, size: u32) -> GrayImage {
        GrayImage::from_fn(size, size, |x, y| {
            let third = size / 3;
            let lit = match direction {
                Direction::Up => y < third,
                Direction::Down => y >= size - third,
                Direction::Left => x < third,
                Direction::Right => x >= size - third,
            };
            Luma([if lit { 250 } else { 5 }])
        })
    }

    fn classifier() -> DirectionClassifier {
        let sprites: Vec<(Direction, GrayImage)> =
            Direction::ALL.iter().map(|d| (*d, arrow(*d, 30))).collect();
        DirectionClassifier::new(0.55, (10, 10), &sprites)
    }

    #[test]
    fn test_parse_direction() {
        assert_eq!("Up".parse::<Direction>().unwrap(), Direction::Up);
        assert_eq!("right".parse::<Direction>().unwrap(), Direction::Right);
        assert!("north".parse::<Direction>().is_err());
    }

    #[test]
    fn test_classify_each_direction() {
        let classifier = classifier();
        let matcher = NccMatcher::new();
        for direction in Direction::ALL {
            // Sprite area has a different native size than the templates
            let area = arrow(direction, 45);
            assert_eq!(classifier.classify(&matcher, &area), Some(direction));
        }
    }

    #[test]
    fn test_black_area_is_undetermined() {
        let classifier = classifier();
        let area = GrayImage::new(39, 48);
        assert_eq!(classifier.classify(&NccMatcher::new(), &area), None);
    }

    #[test]
    fn test_flat_bright_area_is_undetermined() {
        let classifier = classifier();
        let area = GrayImage::from_pixel(39, 48, Luma([230]));
        assert_eq!(classifier.classify(&NccMatcher::new(), &area), None);
    }

    #[test]
    fn test_no_sprites_is_undetermined() {
        let classifier = DirectionClassifier::new(0.55, (10, 10), &[]);
        let area = arrow(Direction::Up, 30);
        assert_eq!(classifier.classify(&NccMatcher::new(), &area), None);
    }
}
