//! Fixed-rectangle region extraction
//!
//! The stream layout never changes, so every region is a hand-measured
//! rectangle. Crops are clamped to the source bounds the same way array
//! slicing clamps, which means a rectangle that runs off the edge yields a
//! smaller image instead of failing.

use image::{imageops, imageops::FilterType, GrayImage, RgbImage};
use serde::{Deserialize, Serialize};

/// A pixel rectangle (x, y, width, height)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Whether the rectangle lies entirely inside a `width` x `height` image
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.x.saturating_add(self.width) <= width && self.y.saturating_add(self.height) <= height
    }
}

/// Convert a full colour frame to grayscale
pub fn to_grayscale(frame: &RgbImage) -> GrayImage {
    imageops::grayscale(frame)
}

/// Crop a rectangle out of a grayscale image, clamped to the image bounds
pub fn crop(image: &GrayImage, rect: Rect) -> GrayImage {
    imageops::crop_imm(image, rect.x, rect.y, rect.width, rect.height).to_image()
}

/// Resize to an exact size with bilinear filtering
pub fn resize(image: &GrayImage, (width, height): (u32, u32)) -> GrayImage {
    imageops::resize(image, width, height, FilterType::Triangle)
}

/// Regions cut out of one grayscale frame
pub struct FrameRegions {
    /// Clock area
    pub clock: GrayImage,
    /// Native-resolution game screen
    pub viewport: GrayImage,
}

impl FrameRegions {
    /// Cut the clock and viewport out of a grayscale frame
    pub fn extract(gray: &GrayImage, clock: Rect, viewport: Rect) -> Self {
        Self {
            clock: crop(gray, clock),
            viewport: crop(gray, viewport),
        }
    }
}
