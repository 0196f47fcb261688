//! rppal-backed rotary encoder polling and PWM emitter flashing.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use light_monitor_lib::config::EmitterConfig;
use light_monitor_lib::emitter::FlashControl;
use light_monitor_lib::encoder::{QuadratureDecoder, RotaryEncoder};
use rppal::gpio::{Gpio, InputPin, Level};
use rppal::pwm::{Channel, Polarity, Pwm};

/// Encoder poll cadence; fast enough to catch every quarter step by hand.
const ENCODER_POLL: Duration = Duration::from_millis(1);

/// How often the flasher re-applies the dialed rate to the PWM peripheral.
const FLASH_APPLY: Duration = Duration::from_millis(100);

fn ab_level(a: &InputPin, b: &InputPin) -> u8 {
    (u8::from(a.read() == Level::High) << 1) | u8::from(b.read() == Level::High)
}

/// Poll the encoder pins and feed detent movement into the flash rate.
pub fn spawn_encoder(
    config: &EmitterConfig,
    flash: Arc<FlashControl>,
    shutdown: Arc<AtomicBool>,
) -> anyhow::Result<thread::JoinHandle<()>> {
    let gpio = Gpio::new()?;
    let a = gpio.get(config.encoder_a_pin)?.into_input_pullup();
    let b = gpio.get(config.encoder_b_pin)?.into_input_pullup();

    let handle = thread::Builder::new()
        .name("encoder".to_string())
        .spawn(move || {
            let encoder = RotaryEncoder::new();
            let mut decoder = QuadratureDecoder::new(ab_level(&a, &b));
            while !shutdown.load(Ordering::SeqCst) {
                let step = decoder.update(ab_level(&a, &b));
                if step != 0 {
                    encoder.advance(step);
                    flash.set_from_encoder(encoder.value());
                }
                thread::sleep(ENCODER_POLL);
            }
        })?;
    Ok(handle)
}

/// Drive the light emitter at the dialed flash rate, 50% duty.
pub fn spawn_flasher(
    config: &EmitterConfig,
    flash: Arc<FlashControl>,
    shutdown: Arc<AtomicBool>,
) -> anyhow::Result<thread::JoinHandle<()>> {
    let channel = match config.pwm_channel {
        0 => Channel::Pwm0,
        _ => Channel::Pwm1,
    };
    let pwm = Pwm::with_frequency(channel, 1.0, 0.0, Polarity::Normal, true)?;

    let handle = thread::Builder::new()
        .name("flasher".to_string())
        .spawn(move || {
            while !shutdown.load(Ordering::SeqCst) {
                let result = match flash.hz() {
                    0 => pwm.set_duty_cycle(0.0),
                    hz => pwm.set_frequency(f64::from(hz), 0.5),
                };
                if let Err(err) = result {
                    eprintln!("flasher: PWM update failed: {err}");
                }
                thread::sleep(FLASH_APPLY);
            }
            let _ = pwm.disable();
        })?;
    Ok(handle)
}
