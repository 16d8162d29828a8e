//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//!
//! Every section and field has a default, so an empty file describes the
//! plain virtual gamepad. Enabling `[button]` adds the GPIO thumb-stick
//! button, enabling `[adc]` adds the analog axis.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::error::{Result, WiiuPadError};
use crate::gamepad::device::{
    DeviceIdentity, BUS_PARPORT, DEFAULT_NAME, DEFAULT_PRODUCT, DEFAULT_VENDOR, DEFAULT_VERSION,
};
use crate::gamepad::{AxisRange, PadAxis, PadButton, PadLayout};
use crate::source::adc::{AdcSettings, ADC_FULL_SCALE, ADS1015_DEFAULT_ADDRESS, CHANNEL_COUNT};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub device: DeviceConfig,

    #[serde(default)]
    pub poll: PollConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub button: ButtonConfig,

    #[serde(default)]
    pub adc: AdcConfig,
}

/// Input device identity
#[derive(Debug, Deserialize, Clone)]
pub struct DeviceConfig {
    #[serde(default = "default_device_name")]
    pub name: String,

    #[serde(default = "default_vendor")]
    pub vendor: u16,

    #[serde(default = "default_product")]
    pub product: u16,

    #[serde(default = "default_version")]
    pub version: u16,
}

/// Timer configuration
#[derive(Debug, Deserialize, Clone)]
pub struct PollConfig {
    #[serde(default = "default_refresh_ms")]
    pub refresh_ms: u64,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for daily-rotated log files; empty logs to stdout only
    #[serde(default)]
    pub directory: String,
}

/// GPIO thumb-stick button
#[derive(Debug, Deserialize, Clone)]
pub struct ButtonConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_gpio_pin")]
    pub gpio_pin: u8,

    #[serde(default = "default_button")]
    pub button: PadButton,

    #[serde(default = "default_true")]
    pub active_low: bool,

    #[serde(default = "default_true")]
    pub pull_up: bool,
}

/// ADS1015 analog axis
#[derive(Debug, Deserialize, Clone)]
pub struct AdcConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_i2c_bus")]
    pub i2c_bus: u8,

    #[serde(default = "default_adc_address")]
    pub address: u8,

    #[serde(default)]
    pub channel: u8,

    #[serde(default = "default_adc_axis")]
    pub axis: PadAxis,

    #[serde(default)]
    pub min: i32,

    #[serde(default = "default_adc_max")]
    pub max: i32,

    #[serde(default = "default_adc_fuzz")]
    pub fuzz: i32,

    #[serde(default = "default_adc_flat")]
    pub flat: i32,

    #[serde(default)]
    pub invert: bool,
}

// Default value functions
fn default_device_name() -> String { DEFAULT_NAME.to_string() }
fn default_vendor() -> u16 { DEFAULT_VENDOR }
fn default_product() -> u16 { DEFAULT_PRODUCT }
fn default_version() -> u16 { DEFAULT_VERSION }

fn default_refresh_ms() -> u64 { crate::poller::DEFAULT_REFRESH_MS }

fn default_log_level() -> String { "info".to_string() }

fn default_gpio_pin() -> u8 { 17 }
fn default_button() -> PadButton { PadButton::ThumbL }
fn default_true() -> bool { true }

fn default_i2c_bus() -> u8 { 1 }
fn default_adc_address() -> u8 { ADS1015_DEFAULT_ADDRESS }
fn default_adc_axis() -> PadAxis { PadAxis::X }
fn default_adc_max() -> i32 { 1650 }
fn default_adc_fuzz() -> i32 { 4 }
fn default_adc_flat() -> i32 { 16 }

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            name: default_device_name(),
            vendor: default_vendor(),
            product: default_product(),
            version: default_version(),
        }
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self { refresh_ms: default_refresh_ms() }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            directory: String::new(),
        }
    }
}

impl Default for ButtonConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            gpio_pin: default_gpio_pin(),
            button: default_button(),
            active_low: true,
            pull_up: true,
        }
    }
}

impl Default for AdcConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            i2c_bus: default_i2c_bus(),
            address: default_adc_address(),
            channel: 0,
            axis: default_adc_axis(),
            min: 0,
            max: default_adc_max(),
            fuzz: default_adc_fuzz(),
            flat: default_adc_flat(),
            invert: false,
        }
    }
}

fn invalid(message: impl std::fmt::Display) -> WiiuPadError {
    WiiuPadError::Config(toml::de::Error::custom(message))
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use wiiu_gamepad::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse and validate configuration from a TOML string
    pub fn parse(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        if self.device.name.trim().is_empty() {
            return Err(invalid("device name cannot be empty"));
        }

        if self.poll.refresh_ms == 0 || self.poll.refresh_ms > 1000 {
            return Err(invalid("refresh_ms must be between 1 and 1000"));
        }

        if !["trace", "debug", "info", "warn", "error"].contains(&self.logging.level.as_str()) {
            return Err(invalid("log level must be one of: trace, debug, info, warn, error"));
        }

        // BCM GPIO numbers exposed on the 40-pin header
        if self.button.enabled && self.button.gpio_pin > 27 {
            return Err(invalid("gpio_pin must be between 0 and 27"));
        }

        if self.adc.enabled {
            // ADDR pin selects one of four addresses
            if !(0x48..=0x4B).contains(&self.adc.address) {
                return Err(invalid("ADC address must be between 0x48 and 0x4B"));
            }

            if self.adc.channel >= CHANNEL_COUNT {
                return Err(invalid(format!(
                    "ADC channel must be between 0 and {}",
                    CHANNEL_COUNT - 1
                )));
            }

            if self.adc.min >= self.adc.max {
                return Err(invalid("ADC min must be less than max"));
            }

            // Single-ended readings never leave 0..=ADC_FULL_SCALE
            if self.adc.min < 0 || self.adc.max > ADC_FULL_SCALE {
                return Err(invalid(format!(
                    "ADC min and max must be between 0 and {}",
                    ADC_FULL_SCALE
                )));
            }

            if self.adc.fuzz < 0 || self.adc.flat < 0 {
                return Err(invalid("ADC fuzz and flat cannot be negative"));
            }
        }

        if self.button.enabled
            && self.adc.enabled
            && self.adc.i2c_bus == 1
            && (self.button.gpio_pin == 2 || self.button.gpio_pin == 3)
        {
            return Err(invalid(format!(
                "gpio_pin {} is the SDA/SCL line of i2c-1",
                self.button.gpio_pin
            )));
        }

        Ok(())
    }

    /// Identity the input device is registered with.
    #[must_use]
    pub fn identity(&self) -> DeviceIdentity {
        DeviceIdentity {
            name: self.device.name.clone(),
            bus_type: BUS_PARPORT,
            vendor: self.device.vendor,
            product: self.device.product,
            version: self.device.version,
        }
    }

    /// Capability layout, with the ADC range applied to its axis when enabled.
    #[must_use]
    pub fn layout(&self) -> PadLayout {
        let mut layout = PadLayout::default();
        if let Some(settings) = self.adc_settings() {
            layout.set_range(settings.axis, settings.range);
        }
        layout
    }

    /// ADC binding, if the ADC is enabled.
    #[must_use]
    pub fn adc_settings(&self) -> Option<AdcSettings> {
        self.adc.enabled.then(|| AdcSettings {
            channel: self.adc.channel,
            axis: self.adc.axis,
            range: AxisRange {
                min: self.adc.min,
                max: self.adc.max,
                fuzz: self.adc.fuzz,
                flat: self.adc.flat,
            },
            invert: self.adc.invert,
        })
    }
}
