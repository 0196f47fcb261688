//! # Rotary Encoder State Machine
//!
//! Quadrature decoding for the flash-rate knob. The pure transition table
//! maps (previous AB, new AB) pin states to quarter-step movement; a shared
//! [`RotaryEncoder`] accumulates quarter steps into a detent counter read by
//! the emitter wiring. The GPIO polling thread lives in the binary crate
//! behind the `hardware` feature.

use std::sync::atomic::{AtomicI32, Ordering};

/// Quarter steps per mechanical detent.
const STEPS_PER_DETENT: i32 = 4;

/// Movement for one (previous AB, new AB) transition.
///
/// Indexed by `prev << 2 | next`, each state the 2-bit `A << 1 | B` pin
/// reading. Valid Gray-code transitions move one quarter step; illegal
/// jumps (both pins changing at once, i.e. bounce) contribute nothing.
const TRANSITIONS: [i32; 16] = [
    0, 1, -1, 0, //
    -1, 0, 0, 1, //
    1, 0, 0, -1, //
    0, -1, 1, 0,
];

/// Decode quarter-step movement from one AB transition.
pub fn quadrature_step(prev: u8, next: u8) -> i32 {
    TRANSITIONS[usize::from((prev & 0b11) << 2 | (next & 0b11))]
}

/// Stateful decoder for a stream of AB pin readings.
#[derive(Debug)]
pub struct QuadratureDecoder {
    prev: u8,
}

impl QuadratureDecoder {
    /// Start from an initial AB reading.
    pub fn new(initial: u8) -> Self {
        Self {
            prev: initial & 0b11,
        }
    }

    /// Feed the next AB reading; returns the quarter-step movement.
    pub fn update(&mut self, ab: u8) -> i32 {
        let step = quadrature_step(self.prev, ab);
        self.prev = ab & 0b11;
        step
    }
}

/// Shared detent counter fed by the decoder.
#[derive(Debug, Default)]
pub struct RotaryEncoder {
    quarter_steps: AtomicI32,
}

impl RotaryEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accumulate decoded quarter steps.
    pub fn advance(&self, quarter_steps: i32) {
        self.quarter_steps.fetch_add(quarter_steps, Ordering::SeqCst);
    }

    /// Current position in whole detents.
    pub fn value(&self) -> i32 {
        self.quarter_steps.load(Ordering::SeqCst) / STEPS_PER_DETENT
    }

    /// Overwrite the position, in whole detents.
    pub fn set_value(&self, detents: i32) {
        self.quarter_steps
            .store(detents * STEPS_PER_DETENT, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // One full clockwise Gray cycle: 00 -> 01 -> 11 -> 10 -> 00.
    const CW_CYCLE: [u8; 4] = [0b01, 0b11, 0b10, 0b00];

    #[test]
    fn clockwise_cycle_is_one_detent() {
        let mut decoder = QuadratureDecoder::new(0b00);
        let encoder = RotaryEncoder::new();
        for ab in CW_CYCLE {
            encoder.advance(decoder.update(ab));
        }
        assert_eq!(encoder.value(), 1);
    }

    #[test]
    fn counter_clockwise_cycle_is_minus_one_detent() {
        let mut decoder = QuadratureDecoder::new(0b00);
        let encoder = RotaryEncoder::new();
        for ab in [0b10, 0b11, 0b01, 0b00] {
            encoder.advance(decoder.update(ab));
        }
        assert_eq!(encoder.value(), -1);
    }

    #[test]
    fn illegal_double_transition_is_ignored() {
        assert_eq!(quadrature_step(0b00, 0b11), 0);
        assert_eq!(quadrature_step(0b01, 0b10), 0);
    }

    #[test]
    fn repeated_reading_does_not_move() {
        let mut decoder = QuadratureDecoder::new(0b00);
        assert_eq!(decoder.update(0b00), 0);
        assert_eq!(decoder.update(0b00), 0);
    }

    #[test]
    fn set_value_overrides_position() {
        let encoder = RotaryEncoder::new();
        encoder.set_value(42);
        assert_eq!(encoder.value(), 42);
        encoder.advance(STEPS_PER_DETENT);
        assert_eq!(encoder.value(), 43);
    }

    #[test]
    fn partial_cycle_stays_on_the_same_detent() {
        let mut decoder = QuadratureDecoder::new(0b00);
        let encoder = RotaryEncoder::new();
        // Two quarter steps forward, two back: bounce around a detent edge.
        for ab in [0b01, 0b11, 0b01, 0b00] {
            encoder.advance(decoder.update(ab));
        }
        assert_eq!(encoder.value(), 0);
    }
}
