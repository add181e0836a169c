//! Frame type representing a captured image with metadata.

use chrono::{DateTime, Utc};
use image::RgbImage;
use std::time::Instant;

/// A single captured frame from the camera.
///
/// Pixels are packed RGB8. A frame is never mutated after capture; it is
/// shared between the capture thread and the main loop behind an `Arc`.
#[derive(Clone)]
pub struct Frame {
    /// Pixel data.
    image: RgbImage,
    /// Monotonic capture instant.
    timestamp: Instant,
    /// Wall-clock capture time, for logs.
    captured_at: DateTime<Utc>,
    /// Monotonic sequence number assigned by the camera.
    sequence: u64,
}

impl Frame {
    /// Creates a new frame from an RGB image.
    pub fn new(image: RgbImage, sequence: u64) -> Self {
        Self {
            image,
            timestamp: Instant::now(),
            captured_at: Utc::now(),
            sequence,
        }
    }

    /// Creates a frame from packed RGB8 bytes.
    ///
    /// Returns `None` if the buffer length does not match `width * height * 3`.
    pub fn from_raw(pixels: Vec<u8>, width: u32, height: u32, sequence: u64) -> Option<Self> {
        RgbImage::from_raw(width, height, pixels).map(|image| Self::new(image, sequence))
    }

    /// Returns the underlying image buffer.
    #[inline]
    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    /// Returns the raw packed RGB8 bytes.
    #[inline]
    pub fn pixels(&self) -> &[u8] {
        self.image.as_raw()
    }

    /// Returns the frame width.
    #[inline]
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Returns the frame height.
    #[inline]
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Returns the capture instant.
    #[inline]
    pub fn timestamp(&self) -> Instant {
        self.timestamp
    }

    /// Returns the wall-clock capture time.
    #[inline]
    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    /// Returns the sequence number.
    #[inline]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width())
            .field("height", &self.height())
            .field("sequence", &self.sequence)
            .field("captured_at", &self.captured_at)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_creation() {
        let frame = Frame::new(RgbImage::new(640, 480), 1);

        assert_eq!(frame.width(), 640);
        assert_eq!(frame.height(), 480);
        assert_eq!(frame.sequence(), 1);
        assert_eq!(frame.pixels().len(), 640 * 480 * 3);
    }

    #[test]
    fn test_frame_from_raw_rejects_wrong_size() {
        assert!(Frame::from_raw(vec![0u8; 100], 640, 480, 1).is_none());
        assert!(Frame::from_raw(vec![0u8; 4 * 2 * 3], 4, 2, 7).is_some());
    }
}
