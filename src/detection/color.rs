//! HSV color thresholds.
//!
//! Hue, saturation and value use the 8-bit convention of common vision
//! libraries: hue in `0..=180` (degrees halved), saturation and value in
//! `0..=255`.

use image::{GrayImage, Luma, RgbImage};
use serde::{Deserialize, Serialize};

/// Inclusive lower/upper HSV bounds for one target color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorRange {
    /// Lower bound `[h, s, v]`.
    pub lower: [u8; 3],
    /// Upper bound `[h, s, v]`.
    pub upper: [u8; 3],
}

impl ColorRange {
    /// Creates a range from inclusive bounds.
    pub const fn new(lower: [u8; 3], upper: [u8; 3]) -> Self {
        Self { lower, upper }
    }

    /// Returns true if every channel of `hsv` lies within the bounds.
    #[inline]
    pub fn contains(&self, hsv: [u8; 3]) -> bool {
        (0..3).all(|i| self.lower[i] <= hsv[i] && hsv[i] <= self.upper[i])
    }

    /// Returns true if no channel has `lower > upper`.
    pub fn is_well_formed(&self) -> bool {
        (0..3).all(|i| self.lower[i] <= self.upper[i])
    }
}

impl Default for ColorRange {
    fn default() -> Self {
        ColorPreset::Yellow.range()
    }
}

/// Named target colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorPreset {
    /// Saturated yellow, e.g. a tennis ball.
    Yellow,
    /// Dark, unsaturated objects.
    Black,
}

impl ColorPreset {
    /// HSV bounds for this preset.
    pub const fn range(self) -> ColorRange {
        match self {
            ColorPreset::Yellow => ColorRange::new([20, 100, 100], [30, 255, 255]),
            ColorPreset::Black => ColorRange::new([0, 0, 46], [180, 43, 220]),
        }
    }
}

/// Converts one RGB pixel to 8-bit HSV.
pub fn rgb_to_hsv([r, g, b]: [u8; 3]) -> [u8; 3] {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let diff = f32::from(max - min);

    let s = if max == 0 {
        0.0
    } else {
        diff * 255.0 / f32::from(max)
    };

    let (r, g, b) = (f32::from(r), f32::from(g), f32::from(b));
    let mut h = if diff == 0.0 {
        0.0
    } else if max as f32 == r {
        60.0 * (g - b) / diff
    } else if max as f32 == g {
        120.0 + 60.0 * (b - r) / diff
    } else {
        240.0 + 60.0 * (r - g) / diff
    };
    if h < 0.0 {
        h += 360.0;
    }

    let h = ((h / 2.0).round() as u16 % 180) as u8;
    [h, s.round() as u8, max]
}

/// Builds a binary mask: 255 where the pixel's HSV value is inside `range`, 0 elsewhere.
pub fn in_range(image: &RgbImage, range: &ColorRange) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let hsv = rgb_to_hsv(image.get_pixel(x, y).0);
        Luma([if range.contains(hsv) { 255 } else { 0 }])
    })
}
