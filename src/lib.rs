//! # Light Monitor Core Library
//!
//! This library implements the core of a light-level monitoring appliance for
//! a Raspberry Pi HAT: a background sampler that reads an I2C ADC roughly
//! once per millisecond, keeps per-second rolling statistics (dip detection,
//! timing jitter), and exposes thread-safe accessors consumed by a UDP
//! command server and an LCD status display.
//!
//! ## Architecture
//!
//! - [`sampler`]: the sampling thread, current/history double buffering,
//!   exponential-moving-average smoothing, and hysteresis dip detection.
//!   Everything mutable lives behind a single mutex inside one owned
//!   [`sampler::Sampler`] instance.
//! - [`transport`]: the I2C ADC seam. Hardware and synthetic transports
//!   implement [`transport::AdcTransport`]; the hardware implementation
//!   lives in the binary crate behind the `hardware` feature.
//! - [`period`]: inter-sample timing statistics (min/max/avg jitter).
//! - [`command`] / [`server`]: the UDP text protocol and its socket loop.
//! - [`display`]: per-second status line formatting and LCD screen drawing.
//! - [`lcd1in54`]: a minimal driver for the 1.54" 240x240 SPI LCD.
//! - [`encoder`] / [`emitter`]: rotary encoder decoding and the PWM flash
//!   rate it controls.
//!
//! ## Concurrency model
//!
//! One sampling thread is the sole writer of all sample state; any number of
//! reader threads (UDP server, display refresher) call the accessors, which
//! only ever hold the sampler lock for the duration of a bounded copy.

// Module declarations
pub mod command;
pub mod config;
pub mod display;
pub mod emitter;
pub mod encoder;
pub mod lcd1in54;
pub mod period;
pub mod sampler;
pub mod server;
pub mod transport;

/// Scale factor from a 12-bit ADC code to volts (3.3 V reference).
///
/// Raw readings are stored unscaled; callers apply this conversion when a
/// voltage-domain value is needed (protocol replies, status lines, dip
/// thresholds).
pub const VOLTS_PER_BIT: f64 = 3.3 / 4096.0;

/// Convert a raw ADC code to volts.
pub fn code_to_volts(code: f64) -> f64 {
    code * VOLTS_PER_BIT
}
