//! Metrics collection and registry.

use crate::report::Offset;
use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};
use thiserror::Error;

/// Errors that can occur during metrics operations.
#[derive(Debug, Error)]
pub enum MetricsError {
    /// Registration or encoding failed.
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),
}

/// Point-in-time copy of the pipeline counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Frames published by the capture thread.
    pub frames_captured: u64,
    /// Frames run through the detector.
    pub frames_processed: u64,
    /// Blobs that passed both filters.
    pub detections: u64,
    /// Offsets delivered to the sink.
    pub reports: u64,
    /// Whether the capture thread is running.
    pub capture_running: bool,
    /// Most recent reported offset, if any.
    pub last_offset: Option<Offset>,
}

/// Prometheus registry for the capture and detection loops.
///
/// All instruments are atomic, so one instance is shared by both threads
/// behind an `Arc`.
pub struct PipelineMetrics {
    registry: Registry,

    frames_captured: IntCounter,
    frames_processed: IntCounter,
    detections: IntCounter,
    reports: IntCounter,

    capture_running: IntGauge,
    last_offset_dx: IntGauge,
    last_offset_dy: IntGauge,
}

impl PipelineMetrics {
    /// Creates a registry with all pipeline metrics registered.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let frames_captured = IntCounter::new(
            "blob_tracker_frames_captured_total",
            "Frames read from the camera and published",
        )?;
        let frames_processed = IntCounter::new(
            "blob_tracker_frames_processed_total",
            "Frames run through the detector",
        )?;
        let detections = IntCounter::new(
            "blob_tracker_detections_total",
            "Blobs that passed the color and area filters",
        )?;
        let reports = IntCounter::new(
            "blob_tracker_reports_total",
            "Offsets delivered to the report sink",
        )?;
        let capture_running = IntGauge::new(
            "blob_tracker_capture_running",
            "Capture loop status (1=running, 0=stopped)",
        )?;
        let last_offset_dx = IntGauge::new(
            "blob_tracker_last_offset_dx",
            "Horizontal offset of the last reported target",
        )?;
        let last_offset_dy = IntGauge::new(
            "blob_tracker_last_offset_dy",
            "Vertical offset of the last reported target",
        )?;

        registry.register(Box::new(frames_captured.clone()))?;
        registry.register(Box::new(frames_processed.clone()))?;
        registry.register(Box::new(detections.clone()))?;
        registry.register(Box::new(reports.clone()))?;
        registry.register(Box::new(capture_running.clone()))?;
        registry.register(Box::new(last_offset_dx.clone()))?;
        registry.register(Box::new(last_offset_dy.clone()))?;

        Ok(Self {
            registry,
            frames_captured,
            frames_processed,
            detections,
            reports,
            capture_running,
            last_offset_dx,
            last_offset_dy,
        })
    }

    /// Counts one published frame.
    pub fn record_frame_captured(&self) {
        self.frames_captured.inc();
    }

    /// Counts one processed frame and its detections.
    pub fn record_frame_processed(&self, detections: usize) {
        self.frames_processed.inc();
        self.detections.inc_by(detections as u64);
    }

    /// Counts one report and remembers its offset.
    pub fn record_report(&self, offset: Offset) {
        self.reports.inc();
        self.last_offset_dx.set(i64::from(offset.dx));
        self.last_offset_dy.set(i64::from(offset.dy));
    }

    /// Sets the capture status gauge.
    pub fn set_capture_running(&self, running: bool) {
        self.capture_running.set(i64::from(running));
    }

    /// Reads the current values.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let reports = self.reports.get();
        MetricsSnapshot {
            frames_captured: self.frames_captured.get(),
            frames_processed: self.frames_processed.get(),
            detections: self.detections.get(),
            reports,
            capture_running: self.capture_running.get() != 0,
            last_offset: (reports > 0).then(|| {
                Offset::new(
                    self.last_offset_dx.get() as i32,
                    self.last_offset_dy.get() as i32,
                )
            }),
        }
    }

    /// Encodes all metrics in Prometheus text format.
    pub fn encode(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}
