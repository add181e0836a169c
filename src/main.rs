//! Blob Tracker CLI
//!
//! Tracks a colored target in the camera feed and reports its offset from
//! the image center. Type the exit key (default `q`) and Enter, or press
//! Ctrl-C, to stop.

use blob_tracker::{
    capture::{Camera, CaptureConfig, MockCamera, MockTarget},
    config::{ConfigError, FileConfig, SinkKind},
    detection::{ColorPreset, Detector},
    metrics::{MetricsError, PipelineMetrics},
    pipeline::{ExitReason, MainLoop, PipelineError, RunSummary, ShutdownSignal},
    report::{ConsoleSink, ReportSink},
};
use clap::{Parser, ValueEnum};
use image::Rgb;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

/// Failures that end the process with exit code 1.
#[derive(Debug, Error)]
enum AppError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("metrics error: {0}")]
    Metrics(#[from] MetricsError),

    #[cfg(feature = "spi")]
    #[error(transparent)]
    Bus(#[from] blob_tracker::report::BusError),

    #[error("failed to watch stdin: {0}")]
    Stdin(#[source] io::Error),

    #[cfg(not(feature = "spi"))]
    #[error("SPI sink requested but blob-tracker was built without the `spi` feature")]
    SpiUnavailable,

    #[error("camera stopped delivering frames")]
    CaptureStopped,
}

#[derive(Debug, Parser)]
#[command(name = "blob-tracker", version, about)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Where to send offsets.
    #[arg(long, value_enum)]
    sink: Option<SinkArg>,

    /// Target color preset.
    #[arg(long, value_enum)]
    color: Option<ColorArg>,

    /// Ignore blobs with area at or below this many pixels.
    #[arg(long)]
    min_area: Option<f64>,

    /// Use the synthetic camera instead of a real device.
    #[arg(long)]
    mock: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SinkArg {
    Console,
    Spi,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ColorArg {
    Yellow,
    Black,
}

fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    info!("Blob Tracker v{}", blob_tracker::VERSION);

    if let Err(e) = run(cli) {
        error!("{}", e);
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn load_config(cli: &Cli) -> Result<FileConfig, AppError> {
    let mut config = match &cli.config {
        Some(path) => FileConfig::from_file(path)?,
        None => FileConfig::default(),
    };

    if let Some(sink) = cli.sink {
        config.report.sink = match sink {
            SinkArg::Console => SinkKind::Console,
            SinkArg::Spi => SinkKind::Spi,
        };
    }
    if let Some(color) = cli.color {
        config.detection.preset = Some(match color {
            ColorArg::Yellow => ColorPreset::Yellow,
            ColorArg::Black => ColorPreset::Black,
        });
    }
    if let Some(min_area) = cli.min_area {
        config.detection.min_area = min_area;
    }

    config.validate()?;
    Ok(config)
}

fn run(cli: Cli) -> Result<(), AppError> {
    let config = load_config(&cli)?;
    info!(sink = ?config.report.sink, "Configuration loaded");

    let shutdown = ShutdownSignal::new();
    if let Err(e) = shutdown.install_ctrlc() {
        warn!("Could not install Ctrl-C handler: {}", e);
    }
    shutdown
        .watch_stdin(config.pipeline.exit_key)
        .map_err(AppError::Stdin)?;

    let metrics = Arc::new(PipelineMetrics::new()?);
    if config.metrics.port != 0 {
        spawn_metrics_server(config.metrics.port, Arc::clone(&metrics), shutdown.clone());
    }

    let sink = open_sink(&config)?;

    #[cfg(feature = "camera")]
    if !cli.mock {
        return track(blob_tracker::capture::NokhwaCamera::new, &config, sink, shutdown, metrics);
    }
    #[cfg(not(feature = "camera"))]
    if !cli.mock {
        warn!("Built without the `camera` feature; using the synthetic camera");
    }

    let capture = config.capture.clone();
    track(move || demo_camera(&capture), &config, sink, shutdown, metrics)
}

fn track<C, F>(
    make_camera: F,
    config: &FileConfig,
    sink: Box<dyn ReportSink>,
    shutdown: ShutdownSignal,
    metrics: Arc<PipelineMetrics>,
) -> Result<(), AppError>
where
    C: Camera,
    F: FnOnce() -> C + Send + 'static,
{
    let detector = Detector::from_config(&config.detection);
    info!(
        lower = ?detector.range().lower,
        upper = ?detector.range().upper,
        min_area = detector.min_area(),
        "Tracking target"
    );

    let main_loop = MainLoop::start(
        make_camera,
        config.capture.clone(),
        detector,
        sink,
        shutdown,
        config.pipeline.clone(),
        Some(metrics),
    )?;

    let summary = main_loop.run()?;
    info!(
        "Processed {} frames: {} detections, {} reports",
        summary.frames_processed, summary.detections, summary.reports
    );
    check_exit(&summary)
}

/// A run that ended because the camera stopped is a failure.
fn check_exit(summary: &RunSummary) -> Result<(), AppError> {
    match summary.exit_reason {
        Some(ExitReason::CaptureStopped) => Err(AppError::CaptureStopped),
        Some(ExitReason::Shutdown) | None => Ok(()),
    }
}

/// Synthetic camera with one target drifting across the frame.
fn demo_camera(capture: &CaptureConfig) -> MockCamera {
    let (cx, cy) = capture.center();
    let center = (cx as i32 / 2, cy as i32);
    MockCamera::new()
        .with_target(MockTarget {
            center,
            radius: 30,
            color: Rgb([255, 220, 0]),
            velocity: (3, 1),
        })
        .paced()
}

fn open_sink(config: &FileConfig) -> Result<Box<dyn ReportSink>, AppError> {
    match config.report.sink {
        SinkKind::Console => Ok(Box::new(ConsoleSink::new())),
        SinkKind::Spi => open_spi_sink(config),
    }
}

#[cfg(feature = "spi")]
fn open_spi_sink(config: &FileConfig) -> Result<Box<dyn ReportSink>, AppError> {
    use blob_tracker::report::{BusSink, SpiBus};

    let report = &config.report;
    let bus = SpiBus::open(report.bus_id, report.device_id, report.max_clock_hz)?;
    let sink = BusSink::new(bus, report.limit, report.delay());
    if report.echo {
        Ok(Box::new(sink.with_echo(io::stdout())))
    } else {
        Ok(Box::new(sink))
    }
}

#[cfg(not(feature = "spi"))]
fn open_spi_sink(_config: &FileConfig) -> Result<Box<dyn ReportSink>, AppError> {
    Err(AppError::SpiUnavailable)
}

#[cfg(feature = "metrics")]
fn spawn_metrics_server(port: u16, metrics: Arc<PipelineMetrics>, shutdown: ShutdownSignal) {
    use blob_tracker::metrics::{MetricsServer, MetricsServerConfig};

    let spawned = std::thread::Builder::new()
        .name("metrics".into())
        .spawn(move || {
            let runtime = match tokio::runtime::Runtime::new() {
                Ok(runtime) => runtime,
                Err(e) => {
                    error!("Failed to start metrics runtime: {}", e);
                    return;
                }
            };
            let server = MetricsServer::new(MetricsServerConfig::with_port(port), metrics);
            if let Err(e) = runtime.block_on(server.run(shutdown)) {
                error!("Metrics server failed: {}", e);
            }
        });
    if let Err(e) = spawned {
        warn!("Could not spawn metrics thread: {}", e);
    }
}

#[cfg(not(feature = "metrics"))]
fn spawn_metrics_server(port: u16, _metrics: Arc<PipelineMetrics>, _shutdown: ShutdownSignal) {
    warn!(port, "Built without the `metrics` feature; exporter disabled");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(exit_reason: Option<ExitReason>) -> RunSummary {
        RunSummary {
            frames_processed: 3,
            detections: 3,
            reports: 3,
            exit_reason,
        }
    }

    #[test]
    fn test_camera_stop_is_a_failure() {
        assert!(matches!(
            check_exit(&summary(Some(ExitReason::CaptureStopped))),
            Err(AppError::CaptureStopped)
        ));
    }

    #[test]
    fn test_shutdown_is_clean() {
        assert!(check_exit(&summary(Some(ExitReason::Shutdown))).is_ok());
    }

    #[test]
    fn test_cli_overrides_file() {
        let cli = Cli::parse_from(["blob-tracker", "--color", "black", "--min-area", "250"]);
        let config = load_config(&cli).unwrap();
        assert_eq!(config.detection.color_range(), ColorPreset::Black.range());
        assert_eq!(config.detection.min_area, 250.0);
    }

    #[test]
    fn test_invalid_override_is_config_error() {
        let cli = Cli::parse_from(["blob-tracker", "--min-area=-1"]);
        assert!(matches!(load_config(&cli), Err(AppError::Config(_))));
    }
}
