//! rppal-backed SPI/GPIO wiring for the 1.54" LCD, plus its refresh thread.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chrono::Local;
use light_monitor_lib::config::DisplayConfig;
use light_monitor_lib::display;
use light_monitor_lib::emitter::FlashControl;
use light_monitor_lib::lcd1in54::{FrameBuffer, GpioPin, Lcd1in54, LcdError, SpiBus};
use light_monitor_lib::sampler::SamplerHandle;
use rppal::gpio::{Gpio, OutputPin};
use rppal::spi::{Bus, Mode, SlaveSelect, Spi};

/// spidev caps a single transfer at 4096 bytes.
const SPI_CHUNK: usize = 4096;

pub struct SpidevBus(Spi);

impl SpiBus for SpidevBus {
    fn write_bytes(&mut self, data: &[u8]) -> Result<(), LcdError> {
        for chunk in data.chunks(SPI_CHUNK) {
            self.0.write(chunk).map_err(|e| LcdError(e.to_string()))?;
        }
        Ok(())
    }
}

pub struct RppalPin(OutputPin);

impl GpioPin for RppalPin {
    fn set_high(&mut self) -> Result<(), LcdError> {
        self.0.set_high();
        Ok(())
    }

    fn set_low(&mut self) -> Result<(), LcdError> {
        self.0.set_low();
        Ok(())
    }
}

fn output_pin(gpio: &Gpio, pin: u8) -> Result<RppalPin, LcdError> {
    Ok(RppalPin(
        gpio.get(pin)
            .map_err(|e| LcdError(e.to_string()))?
            .into_output(),
    ))
}

/// Bring up the panel and refresh the status screen once per period until
/// shutdown, then drop the backlight.
pub fn spawn_lcd(
    config: &DisplayConfig,
    sampler: SamplerHandle,
    flash: Arc<FlashControl>,
    shutdown: Arc<AtomicBool>,
) -> Result<thread::JoinHandle<()>, LcdError> {
    let gpio = Gpio::new().map_err(|e| LcdError(e.to_string()))?;
    let spi = Spi::new(Bus::Spi0, SlaveSelect::Ss0, 20_000_000, Mode::Mode0)
        .map_err(|e| LcdError(e.to_string()))?;
    let mut lcd = Lcd1in54::new(
        SpidevBus(spi),
        output_pin(&gpio, config.dc_pin)?,
        output_pin(&gpio, config.rst_pin)?,
        output_pin(&gpio, config.backlight_pin)?,
    );
    lcd.init()?;

    let refresh = Duration::from_secs(config.refresh_secs.max(1));
    thread::Builder::new()
        .name("lcd".to_string())
        .spawn(move || {
            let mut frame = FrameBuffer::new();
            while !shutdown.load(Ordering::SeqCst) {
                let snapshot = display::gather(&sampler, &flash);
                let _ = display::draw_screen(&mut frame, &snapshot, Local::now());
                if let Err(err) = lcd.display(&frame) {
                    eprintln!("lcd: refresh failed: {err}");
                }
                thread::sleep(refresh);
            }
            let _ = lcd.backlight_off();
        })
        .map_err(|e| LcdError(e.to_string()))
}
