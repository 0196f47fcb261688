//! rppal-backed I2C transport for the TLA2024 ADC.

use std::thread;
use std::time::Duration;

use light_monitor_lib::config::SensorConfig;
use light_monitor_lib::transport::{AdcTransport, TransportError};
use rppal::i2c::I2c;

/// Bus settling delay after each transfer; gives the ADC time to latch
/// before the next register access.
const SETTLE: Duration = Duration::from_micros(55);

pub struct LinuxAdc {
    i2c: I2c,
}

impl LinuxAdc {
    /// Open `/dev/i2c-<bus>` and address the ADC.
    pub fn open(config: &SensorConfig) -> Result<Self, TransportError> {
        let open_err = |e: rppal::i2c::Error| TransportError::Open {
            bus: config.bus,
            reason: e.to_string(),
        };
        let mut i2c = I2c::with_bus(config.bus).map_err(open_err)?;
        i2c.set_slave_address(config.address).map_err(open_err)?;
        Ok(Self { i2c })
    }
}

impl AdcTransport for LinuxAdc {
    fn write_register(&mut self, reg: u8, value: u16) -> Result<(), TransportError> {
        let [lo, hi] = value.to_le_bytes();
        self.i2c
            .write(&[reg, lo, hi])
            .map_err(|e| TransportError::Write {
                reg,
                reason: e.to_string(),
            })?;
        thread::sleep(SETTLE);
        Ok(())
    }

    fn read_register(&mut self, reg: u8) -> Result<u16, TransportError> {
        let mut buffer = [0u8; 2];
        self.i2c
            .write_read(&[reg], &mut buffer)
            .map_err(|e| TransportError::Read {
                reg,
                reason: e.to_string(),
            })?;
        thread::sleep(SETTLE);
        Ok(u16::from_le_bytes(buffer))
    }
}
