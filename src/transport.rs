//! # ADC Transport Seam
//!
//! The sampler talks to the TLA2024 ADC through the [`AdcTransport`] trait:
//! 16-bit register writes and reads, little-endian on the wire, with the
//! hardware implementation inserting a short settling delay after each
//! transfer. Keeping the trait this small lets the sampling core run against
//! real I2C hardware, the deterministic [`SyntheticAdc`] used in development
//! mode, or a scripted transport in tests.
//!
//! Transport failures are surfaced as [`TransportError`] values rather than
//! terminating the process: the sampling loop treats a failed tick as
//! recoverable (log, skip, continue), and only `Sampler::start` treats a
//! transport fault as fatal to the caller.

use thiserror::Error;

/// Errors raised by an ADC transport.
///
/// Each variant carries the failing bus/register plus a human-readable
/// reason, so callers can log a useful message without depending on the
/// concrete transport's error types.
#[derive(Error, Debug)]
pub enum TransportError {
    /// Opening the I2C bus or addressing the device failed
    #[error("unable to open I2C bus {bus}: {reason}")]
    Open { bus: u8, reason: String },

    /// A 16-bit register write failed
    #[error("unable to write register {reg:#04x}: {reason}")]
    Write { reg: u8, reason: String },

    /// A 16-bit register read failed
    #[error("unable to read register {reg:#04x}: {reason}")]
    Read { reg: u8, reason: String },
}

/// A 16-bit register transport to the ADC.
///
/// Implementations are expected to serialize their own bus access (the
/// hardware transport does so with a post-transfer settling delay); the
/// sampler never holds its state lock across a transport call.
pub trait AdcTransport {
    /// Write a 16-bit register, low byte first on the wire.
    fn write_register(&mut self, reg: u8, value: u16) -> Result<(), TransportError>;

    /// Read a 16-bit register as the two wire bytes, low byte first.
    fn read_register(&mut self, reg: u8) -> Result<u16, TransportError>;
}

/// Baseline light level for the synthetic signal, in raw ADC counts
/// (~1.5 V on a 3.3 V / 12-bit scale).
const SYNTH_BASELINE: f64 = 1860.0;

/// Peak-to-peak flicker amplitude around the baseline, in counts.
const SYNTH_FLICKER: f64 = 40.0;

/// Depth of a synthetic dip in counts (~0.4 V, well past the 0.1 V
/// detection threshold).
const SYNTH_DIP_DEPTH: f64 = 500.0;

/// One dip burst starts every this many reads.
const SYNTH_DIP_EVERY: u64 = 400;

/// Number of consecutive reads held low during a dip burst.
const SYNTH_DIP_LEN: u64 = 25;

/// Deterministic software ADC for development mode and tests.
///
/// Produces a bright baseline with gentle sinusoidal flicker and a deep dip
/// burst every [`SYNTH_DIP_EVERY`] reads, mimicking a light source that is
/// periodically shadowed. The device model matches the TLA2024 contract the
/// sampler relies on: the configuration register must be written before data
/// reads, and the data register returns the 12-bit code left-aligned and
/// byte-swapped, exactly as it appears on the wire.
pub struct SyntheticAdc {
    configured: bool,
    reads: u64,
}

impl SyntheticAdc {
    pub fn new() -> Self {
        Self {
            configured: false,
            reads: 0,
        }
    }

    /// The 12-bit code produced for read number `n`.
    fn code_at(n: u64) -> u16 {
        let phase = (n as f64) / 50.0;
        let mut level = SYNTH_BASELINE + SYNTH_FLICKER * phase.sin();
        if n % SYNTH_DIP_EVERY < SYNTH_DIP_LEN {
            level -= SYNTH_DIP_DEPTH;
        }
        level.clamp(0.0, 4095.0) as u16
    }

    /// Left-align a 12-bit code and swap bytes into wire order.
    fn encode(code: u16) -> u16 {
        (code << 4).swap_bytes()
    }
}

impl Default for SyntheticAdc {
    fn default() -> Self {
        Self::new()
    }
}

impl AdcTransport for SyntheticAdc {
    fn write_register(&mut self, _reg: u8, _value: u16) -> Result<(), TransportError> {
        self.configured = true;
        Ok(())
    }

    fn read_register(&mut self, reg: u8) -> Result<u16, TransportError> {
        if !self.configured {
            return Err(TransportError::Read {
                reg,
                reason: "device not configured".to_string(),
            });
        }
        let value = Self::encode(Self::code_at(self.reads));
        self.reads += 1;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Reverse of the wire encoding the sampler applies to raw reads.
    fn decode(wire: u16) -> u16 {
        wire.swap_bytes() >> 4
    }

    #[test]
    fn read_before_configure_is_an_error() {
        let mut adc = SyntheticAdc::new();
        assert!(adc.read_register(0x00).is_err());
    }

    #[test]
    fn encode_decode_round_trip() {
        for code in [0u16, 1, 0x7FF, 0xFFF] {
            assert_eq!(decode(SyntheticAdc::encode(code)), code);
        }
    }

    #[test]
    fn baseline_reads_sit_near_baseline() {
        let mut adc = SyntheticAdc::new();
        adc.write_register(0x01, 0x83E2).unwrap();
        // Skip the initial dip burst
        for _ in 0..SYNTH_DIP_LEN {
            adc.read_register(0x00).unwrap();
        }
        let code = decode(adc.read_register(0x00).unwrap());
        let err = (f64::from(code) - SYNTH_BASELINE).abs();
        assert!(err <= SYNTH_FLICKER + 1.0, "code {code} too far off baseline");
    }

    #[test]
    fn dip_bursts_drop_well_below_baseline() {
        let mut adc = SyntheticAdc::new();
        adc.write_register(0x01, 0x83E2).unwrap();
        let code = decode(adc.read_register(0x00).unwrap());
        assert!(
            f64::from(code) < SYNTH_BASELINE - SYNTH_DIP_DEPTH / 2.0,
            "first burst read {code} should be dipped"
        );
    }
}
