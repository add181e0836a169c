//! Detection-and-report loop.

use super::{PipelineError, ShutdownSignal};
use crate::capture::{
    Camera, CaptureConfig, CaptureStatus, Frame, FrameSource, SharedFrameSlot,
};
use crate::config::PipelineConfig;
use crate::detection::{Detection, Detector};
use crate::metrics::PipelineMetrics;
use crate::report::{compute_offset, ReportSink};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

/// Observable state of the [`MainLoop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Waiting for a frame newer than the last one processed.
    WaitingForFrame,
    /// Running the detector on the current frame.
    Detecting,
    /// Sending the current frame's detections to the sink.
    Reporting,
    /// Source stopped and sink closed. Terminal.
    Exiting,
}

/// Why the loop reached [`Phase::Exiting`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// The shutdown signal was triggered.
    Shutdown,
    /// The frame source stopped, e.g. after a camera read failure.
    CaptureStopped,
}

/// Counters for one run of the loop.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Frames run through the detector.
    pub frames_processed: u64,
    /// Blobs found across all frames.
    pub detections: u64,
    /// Offsets delivered to the sink.
    pub reports: u64,
    /// Set once the loop reaches [`Phase::Exiting`].
    pub exit_reason: Option<ExitReason>,
}

enum State {
    /// Waiting for a frame newer than the last one processed.
    WaitingForFrame,
    Detecting(Arc<Frame>),
    Reporting {
        frame: Arc<Frame>,
        pending: VecDeque<Detection>,
    },
    /// Source stopped and sink closed. Terminal.
    Exiting,
}

/// Pulls the latest frame, detects blobs and reports each blob's offset.
///
/// The loop owns the [`FrameSource`] and the sink. Both are released exactly
/// once when the loop reaches [`Phase::Exiting`], when [`MainLoop::run`]
/// returns an error, or when the loop is dropped.
pub struct MainLoop<S: ReportSink> {
    source: FrameSource,
    slot: Arc<SharedFrameSlot>,
    detector: Detector,
    sink: S,
    shutdown: ShutdownSignal,
    config: PipelineConfig,
    metrics: Option<Arc<PipelineMetrics>>,
    state: State,
    seen_generation: u64,
    summary: RunSummary,
    released: bool,
}

impl<S: ReportSink> MainLoop<S> {
    /// Starts a frame source on `make_camera` and wires it to a new loop.
    pub fn start<C, F>(
        make_camera: F,
        capture: CaptureConfig,
        detector: Detector,
        sink: S,
        shutdown: ShutdownSignal,
        config: PipelineConfig,
        metrics: Option<Arc<PipelineMetrics>>,
    ) -> Result<Self, PipelineError>
    where
        C: Camera,
        F: FnOnce() -> C + Send + 'static,
    {
        let slot = Arc::new(SharedFrameSlot::new());
        let source = match &metrics {
            Some(metrics) => FrameSource::start_with_metrics(
                make_camera,
                capture,
                Arc::clone(&slot),
                Arc::clone(metrics),
            )?,
            None => FrameSource::start(make_camera, capture, Arc::clone(&slot))?,
        };

        let mut main_loop = Self::new(source, slot, detector, sink, shutdown, config);
        main_loop.metrics = metrics;
        Ok(main_loop)
    }

    /// Wraps an already running source that publishes into `slot`.
    pub fn new(
        source: FrameSource,
        slot: Arc<SharedFrameSlot>,
        detector: Detector,
        sink: S,
        shutdown: ShutdownSignal,
        config: PipelineConfig,
    ) -> Self {
        Self {
            source,
            slot,
            detector,
            sink,
            shutdown,
            config,
            metrics: None,
            state: State::WaitingForFrame,
            seen_generation: 0,
            summary: RunSummary::default(),
            released: false,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        match self.state {
            State::WaitingForFrame => Phase::WaitingForFrame,
            State::Detecting(_) => Phase::Detecting,
            State::Reporting { .. } => Phase::Reporting,
            State::Exiting => Phase::Exiting,
        }
    }

    /// Counters so far.
    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    /// Advances the state machine by one transition and returns the new phase.
    ///
    /// Entering [`Phase::Exiting`] stops the frame source and closes the sink.
    pub fn step(&mut self) -> Result<Phase, PipelineError> {
        let state = std::mem::replace(&mut self.state, State::Exiting);
        let next = match state {
            State::WaitingForFrame => self.wait_for_frame(),
            State::Detecting(frame) => self.detect(frame),
            State::Reporting { frame, pending } => match self.report(frame, pending) {
                Ok(next) => next,
                Err(e) => {
                    self.release();
                    return Err(e);
                }
            },
            State::Exiting => State::Exiting,
        };

        if matches!(next, State::Exiting) {
            self.release();
        }
        self.state = next;
        Ok(self.phase())
    }

    /// Runs until [`Phase::Exiting`] or the first sink error.
    pub fn run(mut self) -> Result<RunSummary, PipelineError> {
        tracing::info!("Main loop started");
        loop {
            if self.step()? == Phase::Exiting {
                break;
            }
        }
        tracing::info!(
            frames = self.summary.frames_processed,
            reports = self.summary.reports,
            reason = ?self.summary.exit_reason,
            "Main loop finished"
        );
        Ok(self.summary.clone())
    }

    fn exit(&mut self, reason: ExitReason) -> State {
        self.summary.exit_reason = Some(reason);
        State::Exiting
    }

    fn wait_for_frame(&mut self) -> State {
        if self.shutdown.is_triggered() {
            tracing::info!("Shutdown requested");
            return self.exit(ExitReason::Shutdown);
        }

        // Status is read before the slot so that every frame published before
        // the source stopped is still seen below.
        let stopped = self.source.status() == CaptureStatus::Stopped;
        let timeout = if stopped {
            Duration::ZERO
        } else {
            self.config.poll_interval()
        };

        if let Some((generation, frame)) = self.slot.wait_newer(self.seen_generation, timeout) {
            self.seen_generation = generation;
            return State::Detecting(frame);
        }

        if stopped {
            tracing::warn!("Frame source stopped");
            return self.exit(ExitReason::CaptureStopped);
        }

        if self.config.reprocess_stale {
            if let Some(frame) = self.slot.read() {
                return State::Detecting(frame);
            }
        }
        State::WaitingForFrame
    }

    fn detect(&mut self, frame: Arc<Frame>) -> State {
        let pending: VecDeque<Detection> = self.detector.detect(&frame).iter().collect();

        self.summary.frames_processed += 1;
        self.summary.detections += pending.len() as u64;
        if let Some(metrics) = &self.metrics {
            metrics.record_frame_processed(pending.len());
        }

        tracing::trace!(
            sequence = frame.sequence(),
            detections = pending.len(),
            age_us = frame.timestamp().elapsed().as_micros() as u64,
            "Processed frame"
        );

        if pending.is_empty() {
            State::WaitingForFrame
        } else {
            State::Reporting { frame, pending }
        }
    }

    fn report(
        &mut self,
        frame: Arc<Frame>,
        mut pending: VecDeque<Detection>,
    ) -> Result<State, PipelineError> {
        let Some(detection) = pending.pop_front() else {
            return Ok(State::WaitingForFrame);
        };

        let offset = compute_offset(detection.center, frame.width(), frame.height());
        self.sink.report(offset)?;

        self.summary.reports += 1;
        if let Some(metrics) = &self.metrics {
            metrics.record_report(offset);
        }
        tracing::debug!(
            sequence = frame.sequence(),
            dx = offset.dx,
            dy = offset.dy,
            area = detection.area,
            "Reported target"
        );

        Ok(if pending.is_empty() {
            State::WaitingForFrame
        } else {
            State::Reporting { frame, pending }
        })
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.source.stop();
        self.sink.close();
    }
}

impl<S: ReportSink> Drop for MainLoop<S> {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{MockCamera, MockTarget};
    use crate::detection::ColorPreset;
    use crate::report::{
        BusError, BusSink, ConsoleSink, Offset, RecordingBus, ReportError, OFFSET_LIMIT,
    };
    use image::{Rgb, RgbImage};
    use imageproc::drawing::draw_filled_circle_mut;
    use std::io::{self, Write};
    use std::sync::Mutex;
    use std::time::Instant;

    const YELLOW: Rgb<u8> = Rgb([255, 255, 0]);

    fn target(center: (i32, i32)) -> MockTarget {
        MockTarget {
            center,
            radius: 30,
            color: YELLOW,
            velocity: (0, 0),
        }
    }

    fn detector() -> Detector {
        Detector::new(ColorPreset::Yellow.range(), 500.0)
    }

    fn bus_sink(bus: &RecordingBus) -> BusSink<RecordingBus> {
        BusSink::new(bus.clone(), OFFSET_LIMIT, Duration::ZERO)
    }

    fn start<S: ReportSink>(camera: MockCamera, sink: S, shutdown: ShutdownSignal) -> MainLoop<S> {
        MainLoop::start(
            move || camera,
            CaptureConfig::with_dimensions(640, 480),
            detector(),
            sink,
            shutdown,
            PipelineConfig::default(),
            None,
        )
        .unwrap()
    }

    /// Source whose first read fails: it publishes nothing and stops.
    fn stopped_source(slot: &Arc<SharedFrameSlot>) -> FrameSource {
        let source = FrameSource::start(
            || MockCamera::new().fail_after(0),
            CaptureConfig::with_dimensions(64, 48),
            Arc::clone(slot),
        )
        .unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while source.status() != CaptureStatus::Stopped && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(source.status(), CaptureStatus::Stopped);
        source
    }

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_reports_target_over_bus() {
        let bus = RecordingBus::new();
        let camera = MockCamera::new().with_target(target((400, 200))).fail_after(3);

        let summary = start(camera, bus_sink(&bus), ShutdownSignal::new())
            .run()
            .unwrap();

        assert_eq!(summary.exit_reason, Some(ExitReason::CaptureStopped));
        assert!(summary.reports >= 1);
        assert_eq!(summary.reports, summary.detections);

        let transactions = bus.transactions();
        assert_eq!(transactions.len() as u64, summary.reports);
        for tx in transactions {
            assert_eq!(tx, vec![0x50, 0xD8]);
        }
        assert_eq!(bus.close_count(), 1);
    }

    #[test]
    fn test_one_report_per_blob() {
        let bus = RecordingBus::new();
        let camera = MockCamera::new()
            .with_target(target((100, 100)))
            .with_target(target((500, 400)))
            .fail_after(1);

        let summary = start(camera, bus_sink(&bus), ShutdownSignal::new())
            .run()
            .unwrap();

        assert_eq!(summary.frames_processed, 1);
        assert_eq!(summary.reports, 2);

        let mut offsets: Vec<Offset> = bus
            .transactions()
            .iter()
            .map(|tx| Offset::from_wire([tx[0], tx[1]]))
            .collect();
        offsets.sort_by_key(|o| o.dx);

        assert_eq!(
            offsets,
            vec![Offset::new(-125, -125), Offset::new(125, 125)]
        );
    }

    #[test]
    fn test_black_target_on_light_background() {
        let bus = RecordingBus::new();
        let camera = MockCamera::new()
            .with_background(Rgb([250, 250, 250]))
            .with_target(MockTarget {
                center: (200, 300),
                radius: 30,
                color: Rgb([60, 60, 60]),
                velocity: (0, 0),
            })
            .fail_after(1);

        let main_loop = MainLoop::start(
            move || camera,
            CaptureConfig::with_dimensions(640, 480),
            Detector::new(ColorPreset::Black.range(), 500.0),
            bus_sink(&bus),
            ShutdownSignal::new(),
            PipelineConfig::default(),
            None,
        )
        .unwrap();
        let summary = main_loop.run().unwrap();

        assert_eq!(summary.reports, 1);
        assert_eq!(bus.transactions(), vec![Offset::new(-120, 60).to_wire().to_vec()]);
    }

    #[test]
    fn test_console_output() {
        let out = SharedBuffer::default();
        let camera = MockCamera::new().with_target(target((330, 250))).fail_after(1);

        let summary = start(
            camera,
            ConsoleSink::with_writer(out.clone()),
            ShutdownSignal::new(),
        )
        .run()
        .unwrap();
        assert_eq!(summary.reports, 1);

        let text = String::from_utf8(out.0.lock().unwrap().clone()).unwrap();
        let line = text.lines().next().unwrap();
        let values: Vec<i32> = line
            .split(", ")
            .map(|part| part.split(" = ").nth(1).unwrap().parse().unwrap())
            .collect();
        assert!((values[0] - 10).abs() <= 1, "line {line}");
        assert!((values[1] - 10).abs() <= 1, "line {line}");
    }

    #[test]
    fn test_shutdown_exits_and_releases() {
        let bus = RecordingBus::new();
        let shutdown = ShutdownSignal::new();
        shutdown.trigger();

        let mut main_loop = start(MockCamera::new(), bus_sink(&bus), shutdown);
        assert_eq!(main_loop.step().unwrap(), Phase::Exiting);
        assert_eq!(main_loop.summary().exit_reason, Some(ExitReason::Shutdown));
        assert_eq!(bus.close_count(), 1);

        drop(main_loop);
        assert_eq!(bus.close_count(), 1);
    }

    #[test]
    fn test_bus_failure_is_fatal() {
        let bus = RecordingBus::failing_after(0);
        let camera = MockCamera::new().with_target(target((400, 200)));

        let result = start(camera, bus_sink(&bus), ShutdownSignal::new()).run();

        assert!(matches!(
            result,
            Err(PipelineError::Report(ReportError::Bus(BusError::Transfer(_))))
        ));
        assert_eq!(bus.close_count(), 1);
    }

    #[test]
    fn test_state_transitions() {
        let bus = RecordingBus::new();
        let slot = Arc::new(SharedFrameSlot::new());
        let source = stopped_source(&slot);

        let mut main_loop = MainLoop::new(
            source,
            Arc::clone(&slot),
            detector(),
            bus_sink(&bus),
            ShutdownSignal::new(),
            PipelineConfig::default(),
        );
        assert_eq!(main_loop.phase(), Phase::WaitingForFrame);

        let mut image = RgbImage::from_pixel(640, 480, Rgb([0, 0, 200]));
        draw_filled_circle_mut(&mut image, (320, 240), 30, YELLOW);
        slot.publish(Frame::new(image, 1));

        assert_eq!(main_loop.step().unwrap(), Phase::Detecting);
        assert_eq!(main_loop.step().unwrap(), Phase::Reporting);
        assert_eq!(main_loop.step().unwrap(), Phase::WaitingForFrame);
        assert_eq!(main_loop.step().unwrap(), Phase::Exiting);

        assert_eq!(main_loop.summary().reports, 1);
        assert_eq!(
            main_loop.summary().exit_reason,
            Some(ExitReason::CaptureStopped)
        );
        assert_eq!(bus.transactions().len(), 1);
    }

    #[test]
    fn test_empty_frame_returns_to_waiting() {
        let slot = Arc::new(SharedFrameSlot::new());
        let source = stopped_source(&slot);

        let mut main_loop = MainLoop::new(
            source,
            Arc::clone(&slot),
            detector(),
            bus_sink(&RecordingBus::new()),
            ShutdownSignal::new(),
            PipelineConfig::default(),
        );

        slot.publish(Frame::new(RgbImage::new(64, 48), 1));
        assert_eq!(main_loop.step().unwrap(), Phase::Detecting);
        assert_eq!(main_loop.step().unwrap(), Phase::WaitingForFrame);
        assert_eq!(main_loop.summary().frames_processed, 1);
        assert_eq!(main_loop.summary().reports, 0);
    }

    #[test]
    fn test_reprocess_stale_frame() {
        let slot = Arc::new(SharedFrameSlot::new());
        let source = FrameSource::start(
            MockCamera::new,
            CaptureConfig::with_dimensions(64, 48),
            Arc::new(SharedFrameSlot::new()),
        )
        .unwrap();

        let config = PipelineConfig {
            reprocess_stale: true,
            ..PipelineConfig::default()
        };
        let mut main_loop = MainLoop::new(
            source,
            Arc::clone(&slot),
            detector(),
            bus_sink(&RecordingBus::new()),
            ShutdownSignal::new(),
            config,
        );

        slot.publish(Frame::new(RgbImage::new(64, 48), 1));
        for _ in 0..3 {
            assert_eq!(main_loop.step().unwrap(), Phase::Detecting);
            assert_eq!(main_loop.step().unwrap(), Phase::WaitingForFrame);
        }
        assert_eq!(main_loop.summary().frames_processed, 3);
    }
}
