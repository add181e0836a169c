//! Offset computation and reporting.
//!
//! A detection's center becomes an [`Offset`] from the frame center, which a
//! [`ReportSink`] either prints or sends to an external controller as two
//! signed bytes over a [`BusTransport`].

mod bus;
mod offset;
mod sink;
#[cfg(feature = "spi")]
mod spi;

pub use bus::{BusError, BusTransport, RecordingBus};
pub use offset::{compute_offset, Offset, OFFSET_LIMIT};
pub use sink::{BusSink, ConsoleSink, ReportError, ReportSink};
#[cfg(feature = "spi")]
pub use spi::SpiBus;
