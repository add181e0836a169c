//! Serial bus transport.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;

/// Errors that can occur during bus operations.
#[derive(Debug, Error)]
pub enum BusError {
    /// The bus device could not be opened.
    #[error("failed to open bus {bus}.{device}: {reason}")]
    Open {
        /// Bus number.
        bus: u8,
        /// Chip-select line.
        device: u8,
        /// Driver message.
        reason: String,
    },
    /// A transaction failed.
    #[error("bus transfer failed: {0}")]
    Transfer(String),
    /// The bus was used after `close`.
    #[error("bus is closed")]
    Closed,
}

/// A full-duplex byte transport such as SPI.
pub trait BusTransport {
    /// Sends `tx` as one transaction and returns the bytes clocked in.
    fn transfer(&mut self, tx: &[u8]) -> Result<Vec<u8>, BusError>;

    /// Checks if the bus is open.
    fn is_open(&self) -> bool;

    /// Releases the bus. Further transfers fail with [`BusError::Closed`].
    fn close(&mut self);
}

#[derive(Debug, Default)]
struct BusLog {
    transactions: Vec<Vec<u8>>,
    closes: usize,
    fail_after: Option<usize>,
}

/// In-memory bus that records every transaction.
///
/// Clones share one log, so a test can keep a handle while the bus itself is
/// owned by a sink.
#[derive(Debug, Clone, Default)]
pub struct RecordingBus {
    log: Arc<Mutex<BusLog>>,
}

impl RecordingBus {
    /// Creates an open bus with an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails every transfer after the first `transactions` succeed.
    pub fn failing_after(transactions: usize) -> Self {
        let bus = Self::default();
        bus.lock().fail_after = Some(transactions);
        bus
    }

    fn lock(&self) -> MutexGuard<'_, BusLog> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Every successful transaction, in order.
    pub fn transactions(&self) -> Vec<Vec<u8>> {
        self.lock().transactions.clone()
    }

    /// Number of times `close` was called.
    pub fn close_count(&self) -> usize {
        self.lock().closes
    }
}

impl BusTransport for RecordingBus {
    fn transfer(&mut self, tx: &[u8]) -> Result<Vec<u8>, BusError> {
        let mut log = self.lock();
        if log.closes > 0 {
            return Err(BusError::Closed);
        }
        if log.fail_after.is_some_and(|limit| log.transactions.len() >= limit) {
            return Err(BusError::Transfer("scripted failure".into()));
        }
        log.transactions.push(tx.to_vec());
        Ok(vec![0; tx.len()])
    }

    fn is_open(&self) -> bool {
        self.lock().closes == 0
    }

    fn close(&mut self) {
        self.lock().closes += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_transactions() {
        let mut bus = RecordingBus::new();
        let handle = bus.clone();

        let rx = bus.transfer(&[0x50, 0xD8]).unwrap();
        assert_eq!(rx, vec![0, 0]);
        assert_eq!(handle.transactions(), vec![vec![0x50, 0xD8]]);
    }

    #[test]
    fn test_closed_bus_rejects_transfers() {
        let mut bus = RecordingBus::new();
        bus.close();

        assert!(!bus.is_open());
        assert!(matches!(bus.transfer(&[1]), Err(BusError::Closed)));
        assert_eq!(bus.close_count(), 1);
    }

    #[test]
    fn test_scripted_failure() {
        let mut bus = RecordingBus::failing_after(1);
        assert!(bus.transfer(&[1, 2]).is_ok());
        assert!(matches!(bus.transfer(&[3, 4]), Err(BusError::Transfer(_))));
        assert_eq!(bus.transactions().len(), 1);
    }
}
