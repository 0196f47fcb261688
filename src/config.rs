//! # Configuration Management
//!
//! Loads runtime settings from `monitor-config.toml`: which I2C bus and
//! address the ADC sits on, the UDP port, LCD wiring, and emitter limits.
//! A missing or malformed file falls back to the defaults so the appliance
//! always comes up. Dip detection thresholds are deliberately not
//! configurable at runtime; they are compile-time constants in the sampler.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Application configuration loaded from monitor-config.toml
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// ADC wiring
    pub sensor: SensorConfig,
    /// UDP command server
    pub server: ServerConfig,
    /// LCD wiring and refresh cadence
    pub display: DisplayConfig,
    /// PWM emitter and rotary encoder wiring
    pub emitter: EmitterConfig,
}

/// I2C ADC configuration
#[derive(Debug, Deserialize, Serialize)]
pub struct SensorConfig {
    /// I2C bus number (`/dev/i2c-<bus>`)
    pub bus: u8,
    /// Device address of the ADC (TLA2024 default 0x48)
    pub address: u16,
}

/// UDP command server configuration
#[derive(Debug, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Listening port
    pub port: u16,
}

/// LCD configuration
#[derive(Debug, Deserialize, Serialize)]
pub struct DisplayConfig {
    /// Seconds between screen refreshes
    pub refresh_secs: u64,
    /// Data/command GPIO pin (BCM numbering)
    pub dc_pin: u8,
    /// Reset GPIO pin
    pub rst_pin: u8,
    /// Backlight GPIO pin
    pub backlight_pin: u8,
}

/// Emitter and encoder configuration
#[derive(Debug, Deserialize, Serialize)]
pub struct EmitterConfig {
    /// Hardware PWM channel driving the light emitter
    pub pwm_channel: u8,
    /// Rotary encoder A-phase GPIO pin
    pub encoder_a_pin: u8,
    /// Rotary encoder B-phase GPIO pin
    pub encoder_b_pin: u8,
    /// Upper bound on the flash rate, in Hz
    pub max_flash_hz: u32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            sensor: SensorConfig {
                bus: 1,
                address: 0x48,
            },
            server: ServerConfig {
                port: crate::server::DEFAULT_PORT,
            },
            display: DisplayConfig {
                refresh_secs: 1,
                dc_pin: 25,
                rst_pin: 27,
                backlight_pin: 18,
            },
            emitter: EmitterConfig {
                pwm_channel: 0,
                encoder_a_pin: 5,
                encoder_b_pin: 6,
                max_flash_hz: crate::emitter::DEFAULT_MAX_HZ,
            },
        }
    }
}

impl Config {
    /// Load configuration from monitor-config.toml in the working directory.
    /// Falls back to defaults if the file doesn't exist or is invalid.
    pub fn load() -> Self {
        Self::load_from_path("monitor-config.toml")
    }

    /// Load configuration from the given path, falling back to defaults on
    /// any failure.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match toml::from_str::<Config>(&contents) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("Warning: invalid config file format: {e}");
                    eprintln!("Using default configuration");
                    Self::default()
                }
            },
            Err(_) => {
                eprintln!("Info: no config file found, using default configuration");
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn default_config_is_sane() {
        let config = Config::default();
        assert_eq!(config.sensor.bus, 1);
        assert_eq!(config.sensor.address, 0x48);
        assert_eq!(config.server.port, 12345);
        assert_eq!(config.display.refresh_secs, 1);
        assert_eq!(config.emitter.max_flash_hz, 500);
    }

    #[test]
    fn config_round_trips_through_toml() {
        let config = Config::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(config.sensor.bus, parsed.sensor.bus);
        assert_eq!(config.server.port, parsed.server.port);
        assert_eq!(config.emitter.encoder_b_pin, parsed.emitter.encoder_b_pin);
    }

    #[test]
    fn load_nonexistent_file_falls_back_to_default() {
        let config = Config::load_from_path("/nonexistent/path");
        assert_eq!(config.server.port, 12345);
    }

    #[test]
    fn load_reads_overrides_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            "[sensor]\nbus = 2\naddress = 0x49\n\
             [server]\nport = 4242\n\
             [display]\nrefresh_secs = 2\ndc_pin = 25\nrst_pin = 27\nbacklight_pin = 18\n\
             [emitter]\npwm_channel = 1\nencoder_a_pin = 5\nencoder_b_pin = 6\nmax_flash_hz = 100\n"
        )
        .unwrap();

        let config = Config::load_from_path(file.path());
        assert_eq!(config.sensor.bus, 2);
        assert_eq!(config.sensor.address, 0x49);
        assert_eq!(config.server.port, 4242);
        assert_eq!(config.emitter.max_flash_hz, 100);
    }

    #[test]
    fn malformed_file_falls_back_to_default() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "this is not toml [[[").unwrap();
        let config = Config::load_from_path(file.path());
        assert_eq!(config.server.port, 12345);
    }
}
