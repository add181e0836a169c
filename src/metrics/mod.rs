//! Prometheus metrics for the tracking pipeline.
//!
//! # Metrics Exposed
//!
//! - `blob_tracker_frames_captured_total` - Frames published by the capture loop
//! - `blob_tracker_frames_processed_total` - Frames run through the detector
//! - `blob_tracker_detections_total` - Blobs found
//! - `blob_tracker_reports_total` - Offsets delivered to the sink
//! - `blob_tracker_capture_running` - 1 while the capture loop runs
//! - `blob_tracker_last_offset_dx` / `_dy` - Last reported offset
//!
//! The HTTP exporter requires the `metrics` feature.

mod collector;
#[cfg(feature = "metrics")]
mod server;

pub use collector::{MetricsError, MetricsSnapshot, PipelineMetrics};
#[cfg(feature = "metrics")]
pub use server::{MetricsServer, MetricsServerConfig, ServerError};
