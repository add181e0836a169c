//! Blob Tracker Library
//!
//! Finds colored blobs in a live camera feed and reports each blob's offset
//! from the image center, either as console lines or as two-byte SPI
//! transfers to a motion controller.
//!
//! # Architecture
//!
//! Capture and detection run on separate threads and meet at a single-slot
//! buffer that always holds the newest frame:
//!
//! ```text
//! FrameSource (capture thread) → SharedFrameSlot → MainLoop → Detector
//!                                                      ↓
//!                                       ReportSink (console | SPI bus)
//! ```
//!
//! Frames are dropped, never queued. The main loop only looks at a frame
//! newer than the last one it processed.
//!
//! # Example
//!
//! ```no_run
//! use blob_tracker::{
//!     capture::{CaptureConfig, MockCamera},
//!     config::PipelineConfig,
//!     detection::{ColorPreset, Detector},
//!     pipeline::{MainLoop, ShutdownSignal},
//!     report::ConsoleSink,
//! };
//!
//! let shutdown = ShutdownSignal::new();
//! let main_loop = MainLoop::start(
//!     MockCamera::new,
//!     CaptureConfig::default(),
//!     Detector::new(ColorPreset::Yellow.range(), 500.0),
//!     ConsoleSink::new(),
//!     shutdown.clone(),
//!     PipelineConfig::default(),
//!     None,
//! )
//! .unwrap();
//!
//! let summary = main_loop.run().unwrap();
//! println!("{} reports", summary.reports);
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod capture;
pub mod config;
pub mod detection;
pub mod metrics;
pub mod pipeline;
pub mod report;

// Re-export commonly used types at crate root
pub use capture::{Camera, CaptureConfig, Frame, FrameSource, MockCamera, SharedFrameSlot};
pub use config::{ConfigError, FileConfig};
pub use detection::{ColorRange, Detection, Detector};
pub use metrics::PipelineMetrics;
pub use pipeline::{MainLoop, PipelineError, ShutdownSignal};
pub use report::{BusSink, ConsoleSink, Offset, ReportSink};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
