//! # Source Module
//!
//! Hardware inputs polled on every tick.
//!
//! This module handles:
//! - The thumb-stick button wired to a GPIO line ([`gpio::GpioButton`])
//! - The analog axis sampled through an ADS1015 I2C ADC ([`adc::AdcAxis`])

pub mod adc;
pub mod gpio;

use crate::error::Result;
use crate::gamepad::PadState;

/// A polled hardware input.
///
/// `sample` writes the current hardware reading into `state`. Inputs the
/// source does not own must be left untouched.
pub trait InputSource: Send {
    /// Short name used in log messages.
    fn name(&self) -> &str;

    /// Read the hardware and update `state`.
    fn sample(&mut self, state: &mut PadState) -> Result<()>;
}
