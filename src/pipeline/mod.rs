//! Orchestration of capture, detection and reporting.
//!
//! The [`MainLoop`] owns a running [`crate::capture::FrameSource`] and a
//! [`crate::report::ReportSink`]. It repeatedly takes the newest frame from
//! the shared slot, runs the detector, and reports every detected blob before
//! looking at the next frame. The [`ShutdownSignal`] ends it cooperatively.

mod main_loop;
mod shutdown;

pub use main_loop::{ExitReason, MainLoop, Phase, RunSummary};
pub use shutdown::ShutdownSignal;

use crate::capture::CameraError;
use crate::report::ReportError;
use thiserror::Error;

/// Errors that end the main loop early.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The camera could not be opened.
    #[error("camera error: {0}")]
    Camera(#[from] CameraError),

    /// The sink failed to deliver an offset.
    #[error("report error: {0}")]
    Report(#[from] ReportError),
}
