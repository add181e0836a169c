//! Color segmentation and blob detection.
//!
//! A frame is converted to HSV, thresholded against a [`ColorRange`], and the
//! resulting mask is traced into contours. Contours larger than a minimum
//! area become [`Detection`]s centered on their minimal enclosing circle.

mod color;
mod contour;
mod detector;

pub use color::{in_range, rgb_to_hsv, ColorPreset, ColorRange};
pub use contour::{compress_chain, min_enclosing_circle, Circle};
pub use detector::{detect, Detection, Detections, Detector};
