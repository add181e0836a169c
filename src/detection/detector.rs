//! Color-blob detection on a single frame.

use super::color::{in_range, ColorRange};
use super::contour::{compress_chain, min_enclosing_circle};
use crate::capture::Frame;
use crate::config::DetectionConfig;
use imageproc::contours::{find_contours, Contour};
use imageproc::geometry::contour_area;

/// A blob that passed the color and area filters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    /// Center of the minimal enclosing circle, in pixels.
    pub center: (f32, f32),
    /// Radius of the minimal enclosing circle.
    pub radius: f32,
    /// Contour area in square pixels.
    pub area: f64,
}

/// Contours found in one frame, filtered lazily on iteration.
///
/// Iteration is restartable and yields detections in contour discovery order.
#[derive(Debug)]
pub struct Detections {
    contours: Vec<Contour<i32>>,
    min_area: f64,
}

impl Detections {
    /// Iterates over contours with area strictly greater than the minimum.
    pub fn iter(&self) -> impl Iterator<Item = Detection> + '_ {
        self.contours.iter().filter_map(move |contour| {
            let area = contour_area(&contour.points);
            if area <= self.min_area {
                return None;
            }
            let circle = min_enclosing_circle(&compress_chain(&contour.points));
            Some(Detection {
                center: (circle.center.0 as f32, circle.center.1 as f32),
                radius: circle.radius as f32,
                area,
            })
        })
    }

    /// Number of contours in the mask, before area filtering.
    pub fn contour_count(&self) -> usize {
        self.contours.len()
    }
}

impl<'a> IntoIterator for &'a Detections {
    type Item = Detection;
    type IntoIter = Box<dyn Iterator<Item = Detection> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

/// Finds every blob in `frame` whose color lies in `range` and whose contour
/// area exceeds `min_area`.
pub fn detect(frame: &Frame, range: &ColorRange, min_area: f64) -> Detections {
    let mask = in_range(frame.image(), range);
    let contours = find_contours::<i32>(&mask);

    tracing::trace!(
        sequence = frame.sequence(),
        contours = contours.len(),
        "Extracted contours"
    );

    Detections { contours, min_area }
}

/// Detector bound to one target color and area threshold.
#[derive(Debug, Clone)]
pub struct Detector {
    range: ColorRange,
    min_area: f64,
}

impl Detector {
    /// Creates a detector for `range` that ignores contours of area `<= min_area`.
    pub fn new(range: ColorRange, min_area: f64) -> Self {
        Self { range, min_area }
    }

    /// Builds a detector from the `[detection]` section.
    pub fn from_config(config: &DetectionConfig) -> Self {
        Self::new(config.color_range(), config.min_area)
    }

    /// Runs detection on one frame.
    pub fn detect(&self, frame: &Frame) -> Detections {
        detect(frame, &self.range, self.min_area)
    }

    /// Target color bounds.
    pub fn range(&self) -> &ColorRange {
        &self.range
    }

    /// Area threshold; only larger contours are reported.
    pub fn min_area(&self) -> f64 {
        self.min_area
    }
}

impl Default for Detector {
    fn default() -> Self {
        Self::from_config(&DetectionConfig::default())
    }
}
