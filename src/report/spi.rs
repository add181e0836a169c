//! SPI bus on Raspberry Pi hardware through `rppal`.

use super::{BusError, BusTransport};
use rppal::spi::{Bus, Mode, SlaveSelect, Spi};

/// SPI master on `/dev/spidev<bus>.<device>`, mode 0.
pub struct SpiBus {
    spi: Option<Spi>,
    bus_id: u8,
    device_id: u8,
}

impl SpiBus {
    /// Opens the bus and sets its maximum clock speed.
    pub fn open(bus_id: u8, device_id: u8, max_clock_hz: u32) -> Result<Self, BusError> {
        let open_error = |reason: String| BusError::Open {
            bus: bus_id,
            device: device_id,
            reason,
        };

        let bus = match bus_id {
            0 => Bus::Spi0,
            1 => Bus::Spi1,
            2 => Bus::Spi2,
            3 => Bus::Spi3,
            4 => Bus::Spi4,
            5 => Bus::Spi5,
            6 => Bus::Spi6,
            other => return Err(open_error(format!("no such bus {other}"))),
        };
        let slave = match device_id {
            0 => SlaveSelect::Ss0,
            1 => SlaveSelect::Ss1,
            2 => SlaveSelect::Ss2,
            other => return Err(open_error(format!("no such chip select {other}"))),
        };

        let spi = Spi::new(bus, slave, max_clock_hz, Mode::Mode0)
            .map_err(|e| open_error(e.to_string()))?;

        tracing::info!(bus = bus_id, device = device_id, max_clock_hz, "SPI bus opened");

        Ok(Self {
            spi: Some(spi),
            bus_id,
            device_id,
        })
    }
}

impl BusTransport for SpiBus {
    fn transfer(&mut self, tx: &[u8]) -> Result<Vec<u8>, BusError> {
        let spi = self.spi.as_ref().ok_or(BusError::Closed)?;
        let mut rx = vec![0u8; tx.len()];
        spi.transfer(&mut rx, tx)
            .map_err(|e| BusError::Transfer(e.to_string()))?;
        Ok(rx)
    }

    fn is_open(&self) -> bool {
        self.spi.is_some()
    }

    fn close(&mut self) {
        if self.spi.take().is_some() {
            tracing::info!(bus = self.bus_id, device = self.device_id, "SPI bus closed");
        }
    }
}
