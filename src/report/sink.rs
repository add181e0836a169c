//! Output actions for computed offsets.

use super::{BusError, BusTransport, Offset};
use std::io::{self, Stdout, Write};
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while reporting an offset.
#[derive(Debug, Error)]
pub enum ReportError {
    /// The bus transaction failed.
    #[error(transparent)]
    Bus(#[from] BusError),
    /// Writing the offset line failed.
    #[error("failed to write offset: {0}")]
    Io(#[from] io::Error),
}

/// Destination for target offsets.
pub trait ReportSink {
    /// Emits one offset.
    fn report(&mut self, offset: Offset) -> Result<(), ReportError>;

    /// Releases any underlying resource. Called once on shutdown.
    fn close(&mut self) {}
}

impl<S: ReportSink + ?Sized> ReportSink for Box<S> {
    fn report(&mut self, offset: Offset) -> Result<(), ReportError> {
        (**self).report(offset)
    }

    fn close(&mut self) {
        (**self).close()
    }
}

/// Prints `x = <dx>, y = <dy>` per offset, unclamped.
pub struct ConsoleSink<W: Write = Stdout> {
    out: W,
}

impl ConsoleSink<Stdout> {
    /// Prints to stdout.
    pub fn new() -> Self {
        Self { out: io::stdout() }
    }
}

impl Default for ConsoleSink<Stdout> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write> ConsoleSink<W> {
    /// Prints to `out`.
    pub fn with_writer(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write> ReportSink for ConsoleSink<W> {
    fn report(&mut self, offset: Offset) -> Result<(), ReportError> {
        writeln!(self.out, "{offset}")?;
        Ok(())
    }

    fn close(&mut self) {
        let _ = self.out.flush();
    }
}

/// Sends each offset as a two-byte bus transaction.
///
/// Offsets are clamped to `[-limit, limit]` and encoded with
/// [`Offset::to_wire`]. After every transaction the sink sleeps for `delay` so
/// the receiver can keep up. With an echo writer attached, every clamped
/// offset is also written there as a `x = <dx>, y = <dy>` line.
pub struct BusSink<B: BusTransport> {
    bus: B,
    limit: i32,
    delay: Duration,
    echo: Option<Box<dyn Write + Send>>,
}

impl<B: BusTransport> BusSink<B> {
    /// Creates a sink that clamps to `limit` and pauses `delay` per transfer.
    pub fn new(bus: B, limit: i32, delay: Duration) -> Self {
        Self {
            bus,
            limit,
            delay,
            echo: None,
        }
    }

    /// Also prints every sent offset to `out`.
    pub fn with_echo(mut self, out: impl Write + Send + 'static) -> Self {
        self.echo = Some(Box::new(out));
        self
    }

    /// Returns the underlying transport.
    pub fn bus(&self) -> &B {
        &self.bus
    }
}

impl<B: BusTransport> ReportSink for BusSink<B> {
    fn report(&mut self, offset: Offset) -> Result<(), ReportError> {
        let clamped = offset.clamp(self.limit);
        let bytes = clamped.to_wire();

        tracing::info!(
            dx = clamped.dx,
            dy = clamped.dy,
            bytes = ?bytes,
            "Sending offset"
        );

        self.bus.transfer(&bytes)?;
        if let Some(out) = self.echo.as_mut() {
            writeln!(out, "{clamped}")?;
        }
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        Ok(())
    }

    fn close(&mut self) {
        if let Some(out) = self.echo.as_mut() {
            let _ = out.flush();
        }
        self.bus.close();
    }
}
