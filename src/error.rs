//! # Error Types
//!
//! Custom error types for the WiiU gamepad driver using `thiserror`.

use thiserror::Error;

/// Main error type for the WiiU gamepad driver
#[derive(Debug, Error)]
pub enum WiiuPadError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// GPIO line could not be claimed or configured
    #[error("GPIO error: {0}")]
    Gpio(#[from] rppal::gpio::Error),

    /// I2C bus could not be opened or the ADC did not respond
    #[error("I2C error: {0}")]
    I2c(#[from] rppal::i2c::Error),

    /// Input device registration or emission failed
    #[error("Input device error: {0}")]
    Device(String),

    /// `close()` called more times than `open()`
    #[error("Input device is not open")]
    NotOpen,
}

/// Result type alias for the WiiU gamepad driver
pub type Result<T> = std::result::Result<T, WiiuPadError>;
