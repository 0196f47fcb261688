//! # PWM Flash Rate Control
//!
//! The rotary encoder dials a flash rate for the PWM light emitter; this
//! module holds the shared rate state. The hardware flasher thread (binary
//! crate, `hardware` feature) applies the rate to the PWM peripheral, and
//! the status display reads it back for the `Flash @ N Hz` line.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

/// Default upper bound on the flash rate.
pub const DEFAULT_MAX_HZ: u32 = 500;

/// Shared flash rate, one encoder detent per hertz, clamped to
/// `0..=max_hz`. Zero means the emitter is off.
#[derive(Debug)]
pub struct FlashControl {
    hz: AtomicU32,
    max_hz: u32,
}

impl FlashControl {
    pub fn new(max_hz: u32) -> Self {
        Self {
            hz: AtomicU32::new(0),
            max_hz,
        }
    }

    /// Apply the encoder counter; values outside `0..=max_hz` clamp.
    pub fn set_from_encoder(&self, detents: i32) {
        let hz = detents.clamp(0, self.max_hz as i32) as u32;
        self.hz.store(hz, Ordering::SeqCst);
    }

    pub fn hz(&self) -> u32 {
        self.hz.load(Ordering::SeqCst)
    }

    /// Full flash period for the current rate; `None` when off.
    pub fn period(&self) -> Option<Duration> {
        match self.hz() {
            0 => None,
            hz => Some(Duration::from_secs_f64(1.0 / f64::from(hz))),
        }
    }
}

impl Default for FlashControl {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HZ)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encoder_value_clamps_to_range() {
        let flash = FlashControl::new(500);
        flash.set_from_encoder(-3);
        assert_eq!(flash.hz(), 0);
        flash.set_from_encoder(72);
        assert_eq!(flash.hz(), 72);
        flash.set_from_encoder(9000);
        assert_eq!(flash.hz(), 500);
    }

    #[test]
    fn period_matches_rate() {
        let flash = FlashControl::new(500);
        assert_eq!(flash.period(), None);
        flash.set_from_encoder(10);
        assert_eq!(flash.period(), Some(Duration::from_millis(100)));
    }
}
