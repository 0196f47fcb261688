//! # 1.54" SPI LCD Driver
//!
//! Minimal driver for the Waveshare 1.54" 240x240 LCD HAT (ST7789 class
//! controller). Pin and SPI access go through the small traits below so the
//! binary crate can plug in `rppal` on hardware while tests draw into the
//! in-memory [`FrameBuffer`], which implements the `embedded-graphics`
//! `DrawTarget` used by [`crate::display`].

use std::thread;
use std::time::Duration;

use embedded_graphics::pixelcolor::{raw::RawU16, Rgb565};
use embedded_graphics::prelude::*;

/// Display dimensions
pub const LCD_WIDTH: u32 = 240;
pub const LCD_HEIGHT: u32 = 240;

/// Simple error type for LCD operations
#[derive(Debug)]
pub struct LcdError(pub String);

impl std::fmt::Display for LcdError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "LCD error: {}", self.0)
    }
}

impl std::error::Error for LcdError {}

/// Trait for the SPI data path (chip select handled by the kernel driver)
pub trait SpiBus {
    fn write_bytes(&mut self, data: &[u8]) -> Result<(), LcdError>;
}

/// Trait for GPIO output pins (data/command, reset, backlight)
pub trait GpioPin {
    fn set_high(&mut self) -> Result<(), LcdError>;
    fn set_low(&mut self) -> Result<(), LcdError>;
}

/// RGB565 frame buffer sized for the panel.
///
/// Drawing happens off-screen through `embedded-graphics`; a full frame is
/// then pushed to the panel in one transfer.
pub struct FrameBuffer {
    pixels: Vec<u16>,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self {
            pixels: vec![0xFFFF; (LCD_WIDTH * LCD_HEIGHT) as usize],
        }
    }

    pub fn fill(&mut self, color: Rgb565) {
        self.pixels.fill(RawU16::from(color).into_inner());
    }

    pub fn set_pixel(&mut self, x: u32, y: u32, color: Rgb565) {
        if x >= LCD_WIDTH || y >= LCD_HEIGHT {
            return;
        }
        self.pixels[(y * LCD_WIDTH + x) as usize] = RawU16::from(color).into_inner();
    }

    pub fn pixel(&self, x: u32, y: u32) -> u16 {
        self.pixels[(y * LCD_WIDTH + x) as usize]
    }

    /// Panel byte order: each RGB565 word big-endian.
    pub fn as_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.pixels.len() * 2);
        for word in &self.pixels {
            bytes.extend_from_slice(&word.to_be_bytes());
        }
        bytes
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl OriginDimensions for FrameBuffer {
    fn size(&self) -> Size {
        Size::new(LCD_WIDTH, LCD_HEIGHT)
    }
}

impl DrawTarget for FrameBuffer {
    type Color = Rgb565;
    type Error = core::convert::Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        for Pixel(point, color) in pixels {
            if point.x >= 0 && point.y >= 0 {
                self.set_pixel(point.x as u32, point.y as u32, color);
            }
        }
        Ok(())
    }
}

/// ST7789-class LCD over SPI with data/command, reset, and backlight pins.
pub struct Lcd1in54<SPI, DC, RST, BL> {
    spi: SPI,
    dc_pin: DC,
    rst_pin: RST,
    backlight_pin: BL,
}

impl<SPI, DC, RST, BL> Lcd1in54<SPI, DC, RST, BL>
where
    SPI: SpiBus,
    DC: GpioPin,
    RST: GpioPin,
    BL: GpioPin,
{
    pub fn new(spi: SPI, dc_pin: DC, rst_pin: RST, backlight_pin: BL) -> Self {
        Self {
            spi,
            dc_pin,
            rst_pin,
            backlight_pin,
        }
    }

    /// Hardware reset pulse
    fn reset(&mut self) -> Result<(), LcdError> {
        self.rst_pin.set_high()?;
        thread::sleep(Duration::from_millis(100));
        self.rst_pin.set_low()?;
        thread::sleep(Duration::from_millis(100));
        self.rst_pin.set_high()?;
        thread::sleep(Duration::from_millis(100));
        Ok(())
    }

    fn send_command(&mut self, command: u8) -> Result<(), LcdError> {
        self.dc_pin.set_low()?;
        self.spi.write_bytes(&[command])?;
        Ok(())
    }

    fn send_data(&mut self, data: &[u8]) -> Result<(), LcdError> {
        self.dc_pin.set_high()?;
        self.spi.write_bytes(data)?;
        Ok(())
    }

    /// Reset the panel and run the ST7789 init sequence.
    pub fn init(&mut self) -> Result<(), LcdError> {
        self.reset()?;

        self.send_command(0x01)?; // SWRESET
        thread::sleep(Duration::from_millis(150));
        self.send_command(0x11)?; // SLPOUT
        thread::sleep(Duration::from_millis(120));

        self.send_command(0x3A)?; // COLMOD: 16 bit/pixel
        self.send_data(&[0x05])?;
        self.send_command(0x36)?; // MADCTL: row/column order
        self.send_data(&[0x00])?;
        self.send_command(0x21)?; // INVON (panel expects inverted)
        self.send_command(0x13)?; // NORON
        self.send_command(0x29)?; // DISPON
        thread::sleep(Duration::from_millis(20));

        self.backlight_on()?;
        Ok(())
    }

    pub fn backlight_on(&mut self) -> Result<(), LcdError> {
        self.backlight_pin.set_high()
    }

    pub fn backlight_off(&mut self) -> Result<(), LcdError> {
        self.backlight_pin.set_low()
    }

    /// Set the full-panel address window.
    fn set_window(&mut self) -> Result<(), LcdError> {
        let x_end = (LCD_WIDTH - 1) as u16;
        let y_end = (LCD_HEIGHT - 1) as u16;

        self.send_command(0x2A)?; // CASET
        self.send_data(&[0, 0, (x_end >> 8) as u8, (x_end & 0xFF) as u8])?;
        self.send_command(0x2B)?; // RASET
        self.send_data(&[0, 0, (y_end >> 8) as u8, (y_end & 0xFF) as u8])?;
        Ok(())
    }

    /// Push a full frame to the panel.
    pub fn display(&mut self, frame: &FrameBuffer) -> Result<(), LcdError> {
        self.set_window()?;
        self.send_command(0x2C)?; // RAMWR
        self.send_data(&frame.as_bytes())
    }
}
