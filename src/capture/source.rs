//! Continuous frame acquisition on a dedicated thread.

use super::{Camera, CameraError, CaptureConfig, SharedFrameSlot};
use crate::metrics::PipelineMetrics;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};

/// Lifecycle state of a [`FrameSource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureStatus {
    /// The capture loop is reading frames.
    Running,
    /// The loop has exited. Terminal.
    Stopped,
}

/// Owns the capture thread and, through it, the camera handle.
///
/// The camera is created and opened on the capture thread and closed there
/// exactly once, whether the loop ends on a read failure or on [`stop`].
/// A single failed read stops the source; there is no retry.
///
/// [`stop`]: FrameSource::stop
pub struct FrameSource {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl FrameSource {
    /// Opens the camera built by `make_camera` and starts publishing frames
    /// into `slot`.
    ///
    /// Blocks until the camera is open; open errors are returned here.
    pub fn start<C, F>(
        make_camera: F,
        config: CaptureConfig,
        slot: Arc<SharedFrameSlot>,
    ) -> Result<Self, CameraError>
    where
        C: Camera,
        F: FnOnce() -> C + Send + 'static,
    {
        Self::spawn(make_camera, config, slot, None)
    }

    /// Like [`FrameSource::start`], also recording capture counters.
    pub fn start_with_metrics<C, F>(
        make_camera: F,
        config: CaptureConfig,
        slot: Arc<SharedFrameSlot>,
        metrics: Arc<PipelineMetrics>,
    ) -> Result<Self, CameraError>
    where
        C: Camera,
        F: FnOnce() -> C + Send + 'static,
    {
        Self::spawn(make_camera, config, slot, Some(metrics))
    }

    fn spawn<C, F>(
        make_camera: F,
        config: CaptureConfig,
        slot: Arc<SharedFrameSlot>,
        metrics: Option<Arc<PipelineMetrics>>,
    ) -> Result<Self, CameraError>
    where
        C: Camera,
        F: FnOnce() -> C + Send + 'static,
    {
        let (width, height) = (config.width, config.height);
        let running = Arc::new(AtomicBool::new(true));
        let (ready_tx, ready_rx) = mpsc::sync_channel(1);

        let handle = {
            let running = Arc::clone(&running);
            thread::Builder::new()
                .name("frame-source".into())
                .spawn(move || {
                    let mut camera = make_camera();
                    if let Err(e) = camera.open(&config) {
                        running.store(false, Ordering::Release);
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                    let _ = ready_tx.send(Ok(()));

                    capture_loop(&mut camera, &slot, &running, metrics.as_deref());
                    camera.close();
                })
                .map_err(|e| CameraError::OpenFailed(format!("capture thread: {e}")))?
        };

        let opened = ready_rx.recv().unwrap_or_else(|_| {
            Err(CameraError::OpenFailed(
                "capture thread exited during open".into(),
            ))
        });

        match opened {
            Ok(()) => {
                tracing::info!(width, height, "Frame source started");
                Ok(Self {
                    running,
                    handle: Some(handle),
                })
            }
            Err(e) => {
                let _ = handle.join();
                Err(e)
            }
        }
    }

    /// Returns the current lifecycle state.
    pub fn status(&self) -> CaptureStatus {
        if self.running.load(Ordering::Acquire) {
            CaptureStatus::Running
        } else {
            CaptureStatus::Stopped
        }
    }

    /// Signals the loop to exit and waits for it to release the camera.
    ///
    /// An in-flight read is allowed to finish first. Calling `stop` again is a
    /// no-op.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("Capture thread panicked");
            }
            tracing::info!("Frame source stopped");
        }
    }
}

impl Drop for FrameSource {
    fn drop(&mut self) {
        self.stop();
    }
}

fn capture_loop<C: Camera>(
    camera: &mut C,
    slot: &SharedFrameSlot,
    running: &AtomicBool,
    metrics: Option<&PipelineMetrics>,
) {
    if let Some(metrics) = metrics {
        metrics.set_capture_running(true);
    }

    while running.load(Ordering::Acquire) {
        match camera.capture() {
            Ok(frame) => {
                tracing::trace!(
                    sequence = frame.sequence(),
                    captured_at = %frame.captured_at(),
                    "Captured frame"
                );
                slot.publish(frame);
                if let Some(metrics) = metrics {
                    metrics.record_frame_captured();
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Cannot read frame, stopping capture");
                running.store(false, Ordering::Release);
            }
        }
    }

    if let Some(metrics) = metrics {
        metrics.set_capture_running(false);
    }
}
