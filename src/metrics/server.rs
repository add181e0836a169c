//! HTTP exporter for the tracker's metrics.

use crate::metrics::{MetricsSnapshot, PipelineMetrics};
use crate::pipeline::ShutdownSignal;
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Router};
use std::fmt::Write as _;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tower_http::cors::CorsLayer;

const SHUTDOWN_POLL: Duration = Duration::from_millis(100);

/// Errors from the metrics HTTP server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listen address could not be bound.
    #[error("failed to bind metrics listener: {0}")]
    Bind(#[from] std::io::Error),

    /// The server stopped with an error.
    #[error("metrics server stopped: {0}")]
    Serve(String),
}

/// Metrics server settings.
#[derive(Debug, Clone)]
pub struct MetricsServerConfig {
    /// Address to listen on.
    pub bind_addr: SocketAddr,
}

impl Default for MetricsServerConfig {
    fn default() -> Self {
        Self::with_port(9090)
    }
}

impl MetricsServerConfig {
    /// Listens on every interface at `port`.
    pub fn with_port(port: u16) -> Self {
        Self {
            bind_addr: ([0, 0, 0, 0], port).into(),
        }
    }
}

/// Serves `/metrics` (Prometheus text), `/health` and `/status`.
pub struct MetricsServer {
    config: MetricsServerConfig,
    metrics: Arc<PipelineMetrics>,
}

impl MetricsServer {
    /// Creates a server exporting `metrics`.
    pub fn new(config: MetricsServerConfig, metrics: Arc<PipelineMetrics>) -> Self {
        Self { config, metrics }
    }

    fn router(&self) -> Router {
        Router::new()
            .route("/metrics", get(metrics_handler))
            .route("/health", get(health_handler))
            .route("/status", get(status_handler))
            .layer(CorsLayer::permissive())
            .with_state(Arc::clone(&self.metrics))
    }

    /// Serves until `shutdown` is triggered.
    pub async fn run(self, shutdown: ShutdownSignal) -> Result<(), ServerError> {
        let app = self.router();
        let listener = tokio::net::TcpListener::bind(self.config.bind_addr).await?;
        tracing::info!(addr = %self.config.bind_addr, "Metrics server listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                while !shutdown.is_triggered() {
                    tokio::time::sleep(SHUTDOWN_POLL).await;
                }
            })
            .await
            .map_err(|e| ServerError::Serve(e.to_string()))?;

        tracing::info!("Metrics server stopped");
        Ok(())
    }
}

async fn metrics_handler(State(metrics): State<Arc<PipelineMetrics>>) -> impl IntoResponse {
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            format!("failed to encode metrics: {e}"),
        ),
    }
}

/// 200 while the capture thread runs, 503 after it stopped.
async fn health_handler(State(metrics): State<Arc<PipelineMetrics>>) -> impl IntoResponse {
    if metrics.snapshot().capture_running {
        (StatusCode::OK, "capture running")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "capture stopped")
    }
}

async fn status_handler(State(metrics): State<Arc<PipelineMetrics>>) -> String {
    render_status(&metrics.snapshot())
}

fn render_status(snapshot: &MetricsSnapshot) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "capture_running: {}", snapshot.capture_running);
    let _ = writeln!(out, "frames_captured: {}", snapshot.frames_captured);
    let _ = writeln!(out, "frames_processed: {}", snapshot.frames_processed);
    let _ = writeln!(out, "detections: {}", snapshot.detections);
    let _ = writeln!(out, "reports: {}", snapshot.reports);
    match snapshot.last_offset {
        Some(offset) => {
            let _ = writeln!(out, "last_offset: {offset}");
        }
        None => out.push_str("last_offset: none\n"),
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::Offset;

    #[test]
    fn test_config_port() {
        assert_eq!(MetricsServerConfig::default().bind_addr.port(), 9090);
        assert_eq!(MetricsServerConfig::with_port(8080).bind_addr.port(), 8080);
    }

    #[test]
    fn test_status_before_any_report() {
        let text = render_status(&MetricsSnapshot::default());
        assert!(text.contains("capture_running: false\n"));
        assert!(text.ends_with("last_offset: none\n"));
    }

    #[test]
    fn test_status_shows_last_offset() {
        let metrics = PipelineMetrics::new().unwrap();
        metrics.set_capture_running(true);
        metrics.record_frame_processed(1);
        metrics.record_report(Offset::new(80, -40));

        let text = render_status(&metrics.snapshot());
        assert!(text.contains("frames_processed: 1\n"));
        assert!(text.contains("reports: 1\n"));
        assert!(text.contains("last_offset: x = 80, y = -40\n"));
    }
}
