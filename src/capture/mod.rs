//! Camera input and frame handoff.
//!
//! A [`FrameSource`] runs the camera on its own thread and publishes every
//! frame it reads into a [`SharedFrameSlot`]. Consumers take the latest frame
//! from the slot at their own pace.

mod camera;
mod config;
#[cfg(feature = "camera")]
mod device;
mod frame;
mod slot;
mod source;

pub use camera::{Camera, CameraError, MockCamera, MockTarget};
pub use config::CaptureConfig;
#[cfg(feature = "camera")]
pub use device::NokhwaCamera;
pub use frame::Frame;
pub use slot::SharedFrameSlot;
pub use source::{CaptureStatus, FrameSource};
