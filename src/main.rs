//! # Light Monitor Application Entry Point
//!
//! Wires the sampler, UDP command server, display, and (on hardware) the
//! rotary encoder and PWM emitter together. Supports production mode on a
//! Raspberry Pi with the HAT attached (`--features hardware`) and a
//! `--stdout` development mode that samples a synthetic light signal and
//! prints the per-second status lines to the terminal.

// Test modules
#[cfg(test)]
mod tests;

// Hardware wiring, only on Linux with the hardware feature
#[cfg(all(target_os = "linux", feature = "hardware"))]
mod hw_gpio;
#[cfg(all(target_os = "linux", feature = "hardware"))]
mod hw_i2c;
#[cfg(all(target_os = "linux", feature = "hardware"))]
mod hw_spi;

use std::env;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use light_monitor_lib::config::Config;
use light_monitor_lib::display;
use light_monitor_lib::emitter::FlashControl;
use light_monitor_lib::sampler::Sampler;
use light_monitor_lib::server::CommandServer;
use light_monitor_lib::transport::SyntheticAdc;

/// Main application entry point.
fn main() -> anyhow::Result<()> {
    // Development mode: synthetic signal, status to stdout, no hardware
    let development_mode = env::args().any(|arg| arg == "--stdout");

    let config = Config::load();
    let shutdown = Arc::new(AtomicBool::new(false));
    let flash = Arc::new(FlashControl::new(config.emitter.max_flash_hz));

    let mut sampler = Sampler::new();
    #[allow(unused_mut)]
    let mut hardware_threads: Vec<thread::JoinHandle<()>> = Vec::new();

    if development_mode {
        eprintln!("Development mode: sampling a synthetic light signal");
        sampler.start(Box::new(SyntheticAdc::new()))?;
    } else {
        #[cfg(all(target_os = "linux", feature = "hardware"))]
        {
            let adc = hw_i2c::LinuxAdc::open(&config.sensor)?;
            sampler.start(Box::new(adc))?;

            hardware_threads.push(hw_gpio::spawn_encoder(
                &config.emitter,
                Arc::clone(&flash),
                Arc::clone(&shutdown),
            )?);
            hardware_threads.push(hw_gpio::spawn_flasher(
                &config.emitter,
                Arc::clone(&flash),
                Arc::clone(&shutdown),
            )?);
            hardware_threads.push(hw_spi::spawn_lcd(
                &config.display,
                sampler.handle(),
                Arc::clone(&flash),
                Arc::clone(&shutdown),
            )?);
        }

        #[cfg(not(all(target_os = "linux", feature = "hardware")))]
        {
            eprintln!("Hardware support not enabled. Rebuild with --features hardware.");
            eprintln!("Falling back to the synthetic light signal (as with --stdout).");
            sampler.start(Box::new(SyntheticAdc::new()))?;
        }
    }

    let server = CommandServer::spawn(config.server.port, sampler.handle(), Arc::clone(&shutdown))?;
    println!(
        "Listening for commands on UDP port {}",
        server.local_addr().port()
    );

    // Per-second status lines until the `stop` command raises the flag.
    let refresh = Duration::from_secs(config.display.refresh_secs.max(1));
    while !shutdown.load(Ordering::SeqCst) {
        thread::sleep(refresh);
        let snapshot = display::gather(&sampler, &flash);
        println!("{}", display::format_status(&snapshot));
        let spread = display::format_sample_spread(&snapshot.history);
        if !spread.is_empty() {
            println!("{spread}");
        }
    }

    server.join();
    for handle in hardware_threads {
        let _ = handle.join();
    }
    sampler.stop();
    Ok(())
}
