//! # WiiU Gamepad
//!
//! Expose a Wii U gamepad as a standard Linux input device.
//!
//! # Control Flow
//!
//! 1. **Probe**
//!    - Load configuration and set up logging
//!    - Register the input device
//!    - Claim the GPIO button and open the ADC, when enabled
//!
//! 2. **Run**
//!    - Open the device, which arms the polling tick
//!    - Wait for Ctrl+C or SIGTERM
//!
//! 3. **Remove**
//!    - Close the device, which disarms the tick
//!    - Release sources and unregister the device, in reverse order
//!
//! A failure during probe releases whatever was already set up, in reverse
//! order, before exiting.
//!
//! # Examples
//!
//! ```bash
//! sudo wiiu-gamepad config/default.toml
//! ```
//!
//! Expected output:
//! ```text
//! INFO wiiu_gamepad: WiiU Gamepad driver v0.1.0 starting...
//! INFO wiiu_gamepad::gamepad::device: WiiU Gamepad initialized (vendor: 0x0001, product: 0x0001, version: 0x0100)
//! INFO wiiu_gamepad::poller: Polling started every 10ms
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use tokio::time::Duration;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use wiiu_gamepad::config::Config;
use wiiu_gamepad::gamepad::device::UinputGamepad;
use wiiu_gamepad::poller::{PadDriver, Poller};
use wiiu_gamepad::source::adc::AdcAxis;
use wiiu_gamepad::source::gpio::GpioButton;

/// Configuration file used when no path is given
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Prefix of the rotated log files
const LOG_FILE_PREFIX: &str = "wiiu-gamepad.log";

#[tokio::main]
async fn main() -> Result<()> {
    let (config, from_file) = load_config()?;
    let _guard = init_logging(&config);

    info!("WiiU Gamepad driver v{} starting...", env!("CARGO_PKG_VERSION"));
    if !from_file {
        warn!("{} not found, using built-in defaults", DEFAULT_CONFIG_PATH);
    }

    let poller = probe(&config)?;

    poller.open().await;
    info!("Press Ctrl+C to exit");

    let waited = wait_for_shutdown().await;
    info!("Shutting down...");

    let ticks = remove(poller, waited).await?;
    info!("Total ticks: {}", ticks);
    Ok(())
}

/// Close the device, then release everything the probe set up.
///
/// The tick is disarmed before `waited` is inspected, so a failed signal
/// handler shuts down in the same order as a clean exit.
async fn remove(poller: Poller, waited: Result<()>) -> Result<u64> {
    poller.close().await?;
    let ticks = poller.driver().lock().await.ticks();

    // Dropping the poller releases the sources, then unregisters the device
    drop(poller);
    waited?;
    Ok(ticks)
}

/// Load the configuration named on the command line, or the default file.
///
/// Returns whether a file was read.
fn load_config() -> Result<(Config, bool)> {
    match std::env::args().nth(1) {
        Some(path) => {
            let config = Config::load(&path)
                .with_context(|| format!("Failed to load configuration from {}", path))?;
            Ok((config, true))
        }
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
            let config = Config::load(DEFAULT_CONFIG_PATH)
                .with_context(|| format!("Failed to load configuration from {}", DEFAULT_CONFIG_PATH))?;
            Ok((config, true))
        }
        None => Ok((Config::default(), false)),
    }
}

/// Initialize the tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured level. When a log
/// directory is configured, output goes to a daily-rotated file instead of
/// stdout; the returned guard flushes it on drop.
fn init_logging(config: &Config) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    if config.logging.directory.is_empty() {
        tracing_subscriber::fmt().with_env_filter(filter).init();
        return None;
    }

    let appender = tracing_appender::rolling::daily(&config.logging.directory, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();
    Some(guard)
}

/// Register the device and claim the enabled sources.
///
/// Each step owns what it set up; an error drops those owners in reverse
/// order, which releases the GPIO line and unregisters the device.
fn probe(config: &Config) -> Result<Poller> {
    let pad = UinputGamepad::register(&config.identity(), &config.layout())
        .context("Failed to register input device")?;
    let mut driver = PadDriver::new(Box::new(pad));

    if config.button.enabled {
        let button = GpioButton::claim(
            config.button.gpio_pin,
            config.button.button,
            config.button.active_low,
            config.button.pull_up,
        )
        .with_context(|| format!("Failed to claim GPIO {}", config.button.gpio_pin))?;
        driver.add_source(Box::new(button));
    }

    if let Some(settings) = config.adc_settings() {
        let axis = AdcAxis::open(config.adc.i2c_bus, config.adc.address, settings)
            .with_context(|| {
                format!(
                    "Failed to set up ADC at 0x{:02x} on i2c-{}",
                    config.adc.address, config.adc.i2c_bus
                )
            })?;
        driver.add_source(Box::new(axis));
    }

    info!("Polling {} input sources", driver.source_count());
    Ok(Poller::new(driver, Duration::from_millis(config.poll.refresh_ms)))
}

/// Wait for Ctrl+C or SIGTERM.
async fn wait_for_shutdown() -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for Ctrl+C")?;
            info!("Received Ctrl+C");
        }
        _ = terminate.recv() => {
            info!("Received SIGTERM");
        }
    }
    Ok(())
}
