//! Camera abstraction for frame capture.
//!
//! This module provides a trait-based abstraction over camera hardware,
//! allowing for both real camera input and mock implementations for testing.

use super::{CaptureConfig, Frame};
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_filled_circle_mut;
use thiserror::Error;

/// Errors that can occur during camera operations.
#[derive(Debug, Error)]
pub enum CameraError {
    /// No device matches the configured index.
    #[error("camera device not found: {0}")]
    DeviceNotFound(String),
    /// The device exists but could not be opened.
    #[error("failed to open camera: {0}")]
    OpenFailed(String),
    /// The requested format was rejected.
    #[error("failed to configure camera: {0}")]
    ConfigFailed(String),
    /// A frame read failed.
    #[error("failed to capture frame: {0}")]
    CaptureFailed(String),
    /// Capture was attempted before `open`.
    #[error("camera not initialized")]
    NotInitialized,
}

/// Trait for camera implementations.
///
/// This abstraction allows swapping between real camera hardware
/// and mock implementations for testing.
pub trait Camera {
    /// Opens and initializes the camera with the given configuration.
    fn open(&mut self, config: &CaptureConfig) -> Result<(), CameraError>;

    /// Captures a single frame. Blocks until the device delivers one.
    fn capture(&mut self) -> Result<Frame, CameraError>;

    /// Checks if the camera is currently open.
    fn is_open(&self) -> bool;

    /// Closes the camera and releases resources.
    fn close(&mut self);
}

/// A filled disk drawn into every synthetic frame.
#[derive(Debug, Clone, Copy)]
pub struct MockTarget {
    /// Disk center at sequence 0.
    pub center: (i32, i32),
    /// Disk radius in pixels.
    pub radius: i32,
    /// Disk color.
    pub color: Rgb<u8>,
    /// Per-frame displacement, wrapped at the frame borders.
    pub velocity: (i32, i32),
}

/// Mock camera that generates synthetic frames.
///
/// Each frame is a uniform background with any number of [`MockTarget`]s. A read
/// failure can be scripted with [`MockCamera::fail_after`] to exercise the
/// capture loop's fail-fast path.
#[derive(Debug)]
pub struct MockCamera {
    config: Option<CaptureConfig>,
    sequence: u64,
    background: Rgb<u8>,
    targets: Vec<MockTarget>,
    fail_after: Option<u64>,
    paced: bool,
}

impl Default for MockCamera {
    fn default() -> Self {
        Self {
            config: None,
            sequence: 0,
            background: Rgb([40, 40, 160]),
            targets: Vec::new(),
            fail_after: None,
            paced: false,
        }
    }
}

impl MockCamera {
    /// Creates a camera with a blue background and no targets.
    pub fn new() -> Self {
        Self::default()
    }

    /// Draws `target` into every frame, on top of earlier targets.
    pub fn with_target(mut self, target: MockTarget) -> Self {
        self.targets.push(target);
        self
    }

    /// Sets the background color.
    pub fn with_background(mut self, color: Rgb<u8>) -> Self {
        self.background = color;
        self
    }

    /// Makes every capture after the first `frames` fail.
    pub fn fail_after(mut self, frames: u64) -> Self {
        self.fail_after = Some(frames);
        self
    }

    /// Sleeps one frame interval per capture, as a real device would.
    pub fn paced(mut self) -> Self {
        self.paced = true;
        self
    }

    fn render(&self, config: &CaptureConfig) -> RgbImage {
        let mut image = RgbImage::from_pixel(config.width, config.height, self.background);
        let step = self.sequence as i32;
        for target in &self.targets {
            let x = (target.center.0 + target.velocity.0 * step).rem_euclid(config.width as i32);
            let y = (target.center.1 + target.velocity.1 * step).rem_euclid(config.height as i32);
            draw_filled_circle_mut(&mut image, (x, y), target.radius, target.color);
        }
        image
    }
}

impl Camera for MockCamera {
    fn open(&mut self, config: &CaptureConfig) -> Result<(), CameraError> {
        config
            .validate()
            .map_err(|e| CameraError::ConfigFailed(e.to_string()))?;
        self.config = Some(config.clone());
        self.sequence = 0;
        tracing::info!("MockCamera opened with config: {:?}", config);
        Ok(())
    }

    fn capture(&mut self) -> Result<Frame, CameraError> {
        let config = self.config.as_ref().ok_or(CameraError::NotInitialized)?;

        if self.fail_after.is_some_and(|limit| self.sequence >= limit) {
            return Err(CameraError::CaptureFailed(format!(
                "scripted failure after {} frames",
                self.sequence
            )));
        }

        if self.paced {
            std::thread::sleep(config.frame_interval());
        }

        let image = self.render(config);
        self.sequence += 1;
        Ok(Frame::new(image, self.sequence))
    }

    fn is_open(&self) -> bool {
        self.config.is_some()
    }

    fn close(&mut self) {
        self.config = None;
        tracing::info!("MockCamera closed");
    }
}
