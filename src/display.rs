//! # Status Rendering
//!
//! Gathers a once-per-second snapshot from the sampler accessors and the
//! flash controller, formats the terminal status line, and draws the LCD
//! screen. All of it is pure against a snapshot so the same code backs the
//! `--stdout` development mode, the hardware LCD thread, and the tests.

use chrono::{DateTime, Local};
use embedded_graphics::{
    mono_font::{ascii::FONT_10X20, MonoTextStyle},
    pixelcolor::Rgb565,
    prelude::*,
    text::Text,
};

use crate::code_to_volts;
use crate::emitter::FlashControl;
use crate::period::PeriodStats;
use crate::sampler::SamplerHandle;

/// At most this many history samples are echoed on the spread line.
const MAX_DISPLAY_SAMPLES: usize = 10;

/// One second's worth of status, read once and rendered everywhere.
#[derive(Clone, Debug)]
pub struct StatusSnapshot {
    /// Samples captured during the previous second
    pub samples_last_second: usize,
    /// Current emitter flash rate
    pub flash_hz: u32,
    /// Smoothed average, already converted to volts
    pub average_volts: f64,
    /// Dips detected during the previous second
    pub dips: u32,
    /// Tick jitter over the previous second
    pub jitter: Option<PeriodStats>,
    /// Previous second's samples (raw counts) for the spread line
    pub history: Vec<f64>,
}

/// Read one snapshot from a running sampler.
pub fn gather(sampler: &SamplerHandle, flash: &FlashControl) -> StatusSnapshot {
    let history = sampler.get_history();
    StatusSnapshot {
        samples_last_second: history.len(),
        flash_hz: flash.hz(),
        average_volts: code_to_volts(sampler.get_average()),
        dips: sampler.get_dip_count(),
        jitter: sampler.last_jitter(),
        history,
    }
}

/// The per-second status line.
pub fn format_status(snapshot: &StatusSnapshot) -> String {
    let jitter = snapshot.jitter.unwrap_or(PeriodStats {
        min_ms: 0.0,
        max_ms: 0.0,
        avg_ms: 0.0,
        count: 0,
    });
    format!(
        "#Smpl/s = {:<4}   Flash @{:>3}Hz   avg = {:.3}V   dips = {:<3}   {}",
        snapshot.samples_last_second, snapshot.flash_hz, snapshot.average_volts, snapshot.dips,
        jitter
    )
}

/// Up to ten evenly spaced history samples as `index:voltage` pairs.
pub fn format_sample_spread(history: &[f64]) -> String {
    let mut step = history.len() / MAX_DISPLAY_SAMPLES;
    if step == 0 {
        step = 1;
    }
    history
        .iter()
        .step_by(step)
        .take(MAX_DISPLAY_SAMPLES)
        .enumerate()
        .map(|(i, &code)| format!("{}:{:.3}", i * step, code_to_volts(code)))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Draw the LCD status screen into any RGB565 target.
///
/// Layout follows the appliance's fixed four-line screen: title, flash
/// rate, dip count, worst tick jitter, plus the refresh time at the
/// bottom.
pub fn draw_screen<D>(
    target: &mut D,
    snapshot: &StatusSnapshot,
    now: DateTime<Local>,
) -> Result<(), D::Error>
where
    D: DrawTarget<Color = Rgb565>,
{
    target.clear(Rgb565::WHITE)?;
    let style = MonoTextStyle::new(&FONT_10X20, Rgb565::BLACK);

    let max_ms = snapshot.jitter.map_or(0.0, |j| j.max_ms);
    let lines = [
        "Light Monitor".to_string(),
        format!("Flash @ {} Hz", snapshot.flash_hz),
        format!("Dips = {}", snapshot.dips),
        format!("Max ms: {:.1}", max_ms),
        now.format("%H:%M:%S").to_string(),
    ];

    let x = 5;
    let mut y = 40;
    for line in &lines {
        Text::new(line, Point::new(x, y), style).draw(target)?;
        y += 40;
    }
    Ok(())
}
