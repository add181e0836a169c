//! Configuration file format.
//!
//! Every section is optional; missing sections and fields take their defaults.
//!
//! ```toml
//! [capture]
//! device_id = 0
//! width = 640
//! height = 480
//!
//! [detection]
//! preset = "yellow"
//! min_area = 500.0
//!
//! [report]
//! sink = "spi"
//! max_clock_hz = 115200
//! ```

use crate::capture::CaptureConfig;
use crate::detection::{ColorPreset, ColorRange};
use crate::report::OFFSET_LIMIT;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// Width or height is zero.
    #[error("invalid frame dimensions")]
    InvalidDimensions,
    /// Frame rate is outside the supported range.
    #[error("invalid frame rate (must be 1-120 fps)")]
    InvalidFrameRate,
    /// A lower HSV bound exceeds its upper bound.
    #[error("color range lower bound exceeds upper bound: {lower:?} > {upper:?}")]
    InvalidColorRange {
        /// Configured lower bound.
        lower: [u8; 3],
        /// Configured upper bound.
        upper: [u8; 3],
    },
    /// Minimum area is negative or NaN.
    #[error("minimum area must be a non-negative number, got {0}")]
    InvalidMinArea(f64),
    /// Offset clamp does not fit a signed byte.
    #[error("offset limit must be 1-127, got {0}")]
    InvalidLimit(i32),
    /// The config file could not be read.
    #[error("failed to read config file: {0}")]
    FileReadError(String),
    /// The config file is not valid TOML for this schema.
    #[error("failed to parse config file: {0}")]
    ParseError(String),
}

/// Full configuration file format.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileConfig {
    /// Camera device and stream format.
    #[serde(default)]
    pub capture: CaptureConfig,
    /// Target color and size filter.
    #[serde(default)]
    pub detection: DetectionConfig,
    /// Output sink settings.
    #[serde(default)]
    pub report: ReportConfig,
    /// Main loop settings.
    #[serde(default)]
    pub pipeline: PipelineConfig,
    /// Metrics exporter settings.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Target color and size filter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Named color; overrides `lower`/`upper` when set.
    pub preset: Option<ColorPreset>,
    /// Lower HSV bound.
    pub lower: [u8; 3],
    /// Upper HSV bound.
    pub upper: [u8; 3],
    /// Contours with area at or below this are ignored.
    pub min_area: f64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        let yellow = ColorPreset::Yellow.range();
        Self {
            preset: None,
            lower: yellow.lower,
            upper: yellow.upper,
            min_area: 500.0,
        }
    }
}

impl DetectionConfig {
    /// Effective color range.
    pub fn color_range(&self) -> ColorRange {
        match self.preset {
            Some(preset) => preset.range(),
            None => ColorRange::new(self.lower, self.upper),
        }
    }

    /// Rejects inverted bounds and a negative or NaN area.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let range = self.color_range();
        if !range.is_well_formed() {
            return Err(ConfigError::InvalidColorRange {
                lower: range.lower,
                upper: range.upper,
            });
        }
        if self.min_area.is_nan() || self.min_area < 0.0 {
            return Err(ConfigError::InvalidMinArea(self.min_area));
        }
        Ok(())
    }
}

/// Where offsets go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    /// Print each offset to stdout.
    Console,
    /// Send each offset as two bytes over SPI.
    Spi,
}

/// Report sink settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Which sink receives offsets.
    pub sink: SinkKind,
    /// SPI bus number.
    pub bus_id: u8,
    /// Chip-select line on the bus.
    pub device_id: u8,
    /// SPI clock in Hz.
    pub max_clock_hz: u32,
    /// Pause after every bus transfer, in milliseconds.
    pub delay_ms: u64,
    /// Symmetric clamp applied before encoding.
    pub limit: i32,
    /// Also print every sent offset to stdout.
    pub echo: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            sink: SinkKind::Console,
            bus_id: 0,
            device_id: 0,
            max_clock_hz: 115_200,
            delay_ms: 50,
            limit: OFFSET_LIMIT,
            echo: true,
        }
    }
}

impl ReportConfig {
    /// Pause after every bus transfer.
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    /// Rejects a clamp limit outside `1..=127`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=127).contains(&self.limit) {
            return Err(ConfigError::InvalidLimit(self.limit));
        }
        Ok(())
    }
}

/// Main loop settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Upper bound on one wait for a new frame, in milliseconds.
    pub poll_interval_ms: u64,
    /// Re-run detection on the last frame when no new one arrived in time.
    pub reprocess_stale: bool,
    /// Key that ends the program when typed on stdin.
    pub exit_key: char,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1,
            reprocess_stale: false,
            exit_key: 'q',
        }
    }
}

impl PipelineConfig {
    /// Upper bound on one frame wait, at least 1 ms.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

/// Metrics exporter settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// HTTP port for `/metrics` (0 to disable).
    pub port: u16,
}

impl FileConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileReadError(e.to_string()))?;
        Self::parse(&content)
    }

    /// Parses and validates a TOML document.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: FileConfig =
            toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates every section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.capture.validate()?;
        self.detection.validate()?;
        self.report.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = FileConfig::parse("").unwrap();
        assert_eq!(config.capture.width, 640);
        assert_eq!(config.detection.min_area, 500.0);
        assert_eq!(config.detection.color_range(), ColorPreset::Yellow.range());
        assert_eq!(config.report.sink, SinkKind::Console);
        assert_eq!(config.report.limit, 125);
        assert!(config.report.echo);
        assert_eq!(config.report.delay(), Duration::from_millis(50));
        assert_eq!(config.pipeline.exit_key, 'q');
        assert_eq!(config.metrics.port, 0);
    }

    #[test]
    fn test_sections_override_defaults() {
        let config = FileConfig::parse(
            r#"
            [capture]
            width = 320
            height = 240

            [detection]
            preset = "black"
            min_area = 200.0

            [report]
            sink = "spi"
            max_clock_hz = 500000
            "#,
        )
        .unwrap();

        assert_eq!(config.capture.width, 320);
        assert_eq!(config.capture.fps, 30);
        assert_eq!(config.detection.color_range(), ColorPreset::Black.range());
        assert_eq!(config.report.sink, SinkKind::Spi);
        assert_eq!(config.report.max_clock_hz, 500_000);
        assert_eq!(config.report.delay_ms, 50);
    }

    #[test]
    fn test_explicit_bounds() {
        let config = FileConfig::parse(
            r#"
            [detection]
            lower = [100, 50, 50]
            upper = [130, 255, 255]
            "#,
        )
        .unwrap();
        assert_eq!(
            config.detection.color_range(),
            ColorRange::new([100, 50, 50], [130, 255, 255])
        );
    }

    #[test]
    fn test_inverted_bounds_rejected() {
        let result = FileConfig::parse(
            r#"
            [detection]
            lower = [40, 0, 0]
            upper = [30, 255, 255]
            "#,
        );
        assert!(matches!(result, Err(ConfigError::InvalidColorRange { .. })));
    }

    #[test]
    fn test_limit_out_of_range_rejected() {
        let result = FileConfig::parse("[report]\nlimit = 200\n");
        assert!(matches!(result, Err(ConfigError::InvalidLimit(200))));
    }

    #[test]
    fn test_malformed_toml() {
        assert!(matches!(
            FileConfig::parse("[capture\nwidth = "),
            Err(ConfigError::ParseError(_))
        ));
    }
}
