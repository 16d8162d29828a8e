//! # ADC Axis
//!
//! Samples one analog axis through an ADS1015 12-bit I2C ADC.
//!
//! ## Register Map
//!
//! | Register | Address | Width | Use |
//! |----------|---------|-------|-----|
//! | Conversion | 0x00 | 16 bit | Last result, left-justified (12 bit) |
//! | Config | 0x01 | 16 bit | Mux, gain, mode, data rate |
//!
//! The converter is put in continuous mode once during setup, so every tick
//! is a single register read with no conversion wait.
//!
//! ## Failure Handling
//!
//! A failed read keeps the last good value on the axis and does not fail the
//! tick. The first failure is logged at warn level, repeats at debug level
//! until the bus recovers.

use rppal::i2c::I2c;
use tracing::{debug, info, warn};

use super::InputSource;
use crate::error::Result;
use crate::gamepad::{AxisRange, PadAxis, PadState};

/// Default I2C address of the ADS1015 (ADDR pin tied to GND).
pub const ADS1015_DEFAULT_ADDRESS: u8 = 0x48;

/// Conversion result register.
pub const REG_CONVERSION: u8 = 0x00;

/// Configuration register.
pub const REG_CONFIG: u8 = 0x01;

/// Number of single-ended input channels.
pub const CHANNEL_COUNT: u8 = 4;

/// Full-scale value of a single-ended reading at ±4.096 V.
pub const ADC_FULL_SCALE: i32 = 2047;

// Config register fields
const CONFIG_MUX_SINGLE: u16 = 0x4000; // AINx vs GND, channel in bits 13:12
const CONFIG_PGA_4_096V: u16 = 0x0200;
const CONFIG_MODE_CONTINUOUS: u16 = 0x0000;
const CONFIG_DR_1600SPS: u16 = 0x0080;
const CONFIG_COMP_DISABLE: u16 = 0x0003;

/// Config register value for continuous single-ended conversion on `channel`.
///
/// # Examples
///
/// ```
/// use wiiu_gamepad::source::adc::continuous_config;
///
/// assert_eq!(continuous_config(0), 0x4283);
/// assert_eq!(continuous_config(3), 0x7283);
/// ```
#[must_use]
pub fn continuous_config(channel: u8) -> u16 {
    CONFIG_MUX_SINGLE
        | (u16::from(channel & 0x03) << 12)
        | CONFIG_PGA_4_096V
        | CONFIG_MODE_CONTINUOUS
        | CONFIG_DR_1600SPS
        | CONFIG_COMP_DISABLE
}

/// Decodes the conversion register into a 12-bit reading.
///
/// Single-ended readings cannot be negative; small negative offsets around
/// ground are clamped to 0.
#[must_use]
pub fn decode_conversion(bytes: [u8; 2]) -> i32 {
    let raw = i16::from_be_bytes(bytes) >> 4;
    i32::from(raw).max(0)
}

/// Register-level access to a device on the I2C bus.
#[cfg_attr(test, mockall::automock)]
pub trait I2cBus {
    /// Write `bytes` in a single transaction.
    fn write(&mut self, bytes: &[u8]) -> Result<()>;

    /// Write `bytes`, then read into `buffer` with a repeated start.
    fn write_read(&mut self, bytes: &[u8], buffer: &mut [u8]) -> Result<()>;
}

/// `/dev/i2c-N` bus with the ADC selected as slave.
#[derive(Debug)]
pub struct RppalI2c {
    i2c: I2c,
}

impl RppalI2c {
    /// Open bus `bus` and address `address`.
    ///
    /// # Errors
    ///
    /// Returns `I2c` error if the bus does not exist or the address is
    /// rejected.
    pub fn open(bus: u8, address: u8) -> Result<Self> {
        let mut i2c = I2c::with_bus(bus)?;
        i2c.set_slave_address(u16::from(address))?;
        Ok(Self { i2c })
    }
}

impl I2cBus for RppalI2c {
    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        self.i2c.write(bytes)?;
        Ok(())
    }

    fn write_read(&mut self, bytes: &[u8], buffer: &mut [u8]) -> Result<()> {
        self.i2c.write_read(bytes, buffer)?;
        Ok(())
    }
}

/// Binding of one ADC channel to a gamepad axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdcSettings {
    pub channel: u8,
    pub axis: PadAxis,
    pub range: AxisRange,
    pub invert: bool,
}

/// Analog axis sampled from an ADS1015 on every tick.
pub struct AdcAxis<B: I2cBus = RppalI2c> {
    bus: B,
    settings: AdcSettings,
    name: String,
    failing: bool,
}

impl<B: I2cBus> std::fmt::Debug for AdcAxis<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdcAxis")
            .field("name", &self.name)
            .field("settings", &self.settings)
            .field("failing", &self.failing)
            .finish_non_exhaustive()
    }
}

impl AdcAxis<RppalI2c> {
    /// Open the ADC on `bus` at `address` and start continuous conversion.
    ///
    /// # Errors
    ///
    /// Returns `I2c` error if the bus cannot be opened or the ADC does not
    /// acknowledge the config write.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use wiiu_gamepad::gamepad::{AxisRange, PadAxis};
    /// use wiiu_gamepad::source::adc::{AdcAxis, AdcSettings};
    ///
    /// let settings = AdcSettings {
    ///     channel: 0,
    ///     axis: PadAxis::X,
    ///     range: AxisRange { min: 0, max: 1650, fuzz: 4, flat: 16 },
    ///     invert: false,
    /// };
    /// let axis = AdcAxis::open(1, 0x48, settings)?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn open(bus: u8, address: u8, settings: AdcSettings) -> Result<Self> {
        let i2c = RppalI2c::open(bus, address)?;
        let axis = Self::with_bus(i2c, format!("ads1015@{}-{:02x}", bus, address), settings)?;
        info!(
            "ADS1015 on i2c-{} at 0x{:02x}: channel {} -> {:?}",
            bus, address, settings.channel, settings.axis
        );
        Ok(axis)
    }
}

impl<B: I2cBus> AdcAxis<B> {
    /// Configure the ADC behind `bus` for continuous conversion.
    ///
    /// # Errors
    ///
    /// Returns the bus error if the config register write fails.
    pub fn with_bus(mut bus: B, name: impl Into<String>, settings: AdcSettings) -> Result<Self> {
        let [hi, lo] = continuous_config(settings.channel).to_be_bytes();
        bus.write(&[REG_CONFIG, hi, lo])?;

        Ok(Self {
            bus,
            settings,
            name: name.into(),
            failing: false,
        })
    }

    /// Read the latest conversion, clamped into the axis range.
    ///
    /// # Errors
    ///
    /// Returns the bus error if the conversion register cannot be read.
    pub fn read(&mut self) -> Result<i32> {
        let mut buffer = [0u8; 2];
        self.bus.write_read(&[REG_CONVERSION], &mut buffer)?;
        Ok(self.scale(decode_conversion(buffer)))
    }

    fn scale(&self, raw: i32) -> i32 {
        let AxisRange { min, max, .. } = self.settings.range;
        let value = raw.clamp(min, max);
        if self.settings.invert {
            // Result stays within [min, max]
            (i64::from(min) + i64::from(max) - i64::from(value)) as i32
        } else {
            value
        }
    }
}

impl<B: I2cBus + Send> InputSource for AdcAxis<B> {
    fn name(&self) -> &str {
        &self.name
    }

    fn sample(&mut self, state: &mut PadState) -> Result<()> {
        match self.read() {
            Ok(value) => {
                if self.failing {
                    info!("{}: reads recovered", self.name);
                    self.failing = false;
                }
                state.set_axis(self.settings.axis, value);
            }
            Err(e) if self.failing => {
                debug!("{}: read failed again: {}", self.name, e);
            }
            Err(e) => {
                warn!("{}: read failed, keeping last value: {}", self.name, e);
                self.failing = true;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WiiuPadError;
    use std::io;

    fn settings(invert: bool) -> AdcSettings {
        AdcSettings {
            channel: 1,
            axis: PadAxis::X,
            range: AxisRange { min: 0, max: 1650, fuzz: 4, flat: 16 },
            invert,
        }
    }

    fn configured_bus() -> MockI2cBus {
        let mut bus = MockI2cBus::new();
        bus.expect_write()
            .withf(|bytes| bytes.to_vec() == vec![REG_CONFIG, 0x52, 0x83])
            .times(1)
            .returning(|_| Ok(()));
        bus
    }

    fn bus_error() -> WiiuPadError {
        WiiuPadError::Io(io::Error::new(io::ErrorKind::Other, "Mock NACK"))
    }

    #[test]
    fn test_config_register_values() {
        // Continuous, ±4.096V, 1600SPS, comparator off
        assert_eq!(continuous_config(0), 0x4283);
        assert_eq!(continuous_config(1), 0x5283);
        assert_eq!(continuous_config(2), 0x6283);
        assert_eq!(continuous_config(3), 0x7283);
    }

    #[test]
    fn test_decode_conversion() {
        // 12-bit result left-justified in 16 bits
        assert_eq!(decode_conversion([0x00, 0x00]), 0);
        assert_eq!(decode_conversion([0x33, 0x40]), 0x334);
        assert_eq!(decode_conversion([0x7F, 0xF0]), ADC_FULL_SCALE);
        // Slightly below ground
        assert_eq!(decode_conversion([0xFF, 0xF0]), 0);
    }

    #[test]
    fn test_setup_writes_config() {
        let axis = AdcAxis::with_bus(configured_bus(), "ads1015", settings(false));
        assert!(axis.is_ok());
    }

    #[test]
    fn test_setup_failure_propagates() {
        let mut bus = MockI2cBus::new();
        bus.expect_write().times(1).returning(|_| Err(bus_error()));

        let result = AdcAxis::with_bus(bus, "ads1015", settings(false));
        assert!(matches!(result, Err(WiiuPadError::Io(_))));
    }

    #[test]
    fn test_sample_sets_axis() {
        let mut bus = configured_bus();
        bus.expect_write_read()
            .withf(|bytes, _| bytes.to_vec() == vec![REG_CONVERSION])
            .times(1)
            .returning(|_, buffer| {
                buffer.copy_from_slice(&[0x33, 0x40]);
                Ok(())
            });

        let mut axis = AdcAxis::with_bus(bus, "ads1015", settings(false)).unwrap();
        let mut state = PadState::new();
        axis.sample(&mut state).unwrap();

        assert_eq!(state.axis(PadAxis::X), 0x334);
        assert_eq!(state.axis(PadAxis::Y), 0, "Unbound axes must stay untouched");
    }

    #[test]
    fn test_reading_clamped_and_inverted() {
        let mut bus = configured_bus();
        bus.expect_write_read().returning(|_, buffer| {
            // 2047, above the configured max
            buffer.copy_from_slice(&[0x7F, 0xF0]);
            Ok(())
        });

        let mut plain = AdcAxis::with_bus(bus, "ads1015", settings(false)).unwrap();
        assert_eq!(plain.read().unwrap(), 1650);

        let mut bus = configured_bus();
        bus.expect_write_read().returning(|_, buffer| {
            buffer.copy_from_slice(&[0x06, 0x40]);
            Ok(())
        });

        let mut inverted = AdcAxis::with_bus(bus, "ads1015", settings(true)).unwrap();
        assert_eq!(inverted.read().unwrap(), 1650 - 0x64);
    }

    #[test]
    fn test_inverted_extreme_range_does_not_overflow() {
        let mut bus = MockI2cBus::new();
        bus.expect_write().returning(|_| Ok(()));
        bus.expect_write_read().returning(|_, buffer| {
            buffer.copy_from_slice(&[0x7F, 0xF0]);
            Ok(())
        });

        let extreme = AdcSettings {
            channel: 0,
            axis: PadAxis::X,
            range: AxisRange { min: 2_000_000_000, max: i32::MAX, fuzz: 0, flat: 0 },
            invert: true,
        };
        let mut axis = AdcAxis::with_bus(bus, "ads1015", extreme).unwrap();

        // 2047 clamps to min, inverts to max
        assert_eq!(axis.read().unwrap(), i32::MAX);
    }

    #[test]
    fn test_read_failure_keeps_last_value() {
        let mut bus = configured_bus();
        let mut seq = mockall::Sequence::new();
        bus.expect_write_read()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, buffer| {
                buffer.copy_from_slice(&[0x20, 0x00]);
                Ok(())
            });
        bus.expect_write_read()
            .times(2)
            .in_sequence(&mut seq)
            .returning(|_, _| Err(bus_error()));
        bus.expect_write_read()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, buffer| {
                buffer.copy_from_slice(&[0x30, 0x00]);
                Ok(())
            });

        let mut axis = AdcAxis::with_bus(bus, "ads1015", settings(false)).unwrap();
        let mut state = PadState::new();

        axis.sample(&mut state).unwrap();
        assert_eq!(state.axis(PadAxis::X), 0x200);

        // Failures are swallowed and the axis keeps its value
        assert!(axis.sample(&mut state).is_ok());
        assert_eq!(state.axis(PadAxis::X), 0x200);
        assert!(axis.failing);
        assert!(axis.sample(&mut state).is_ok());
        assert_eq!(state.axis(PadAxis::X), 0x200);

        axis.sample(&mut state).unwrap();
        assert_eq!(state.axis(PadAxis::X), 0x300);
        assert!(!axis.failing);
    }

    // Integration test - requires an ADS1015 on i2c-1
    #[test]
    #[ignore] // Run with: cargo test -- --ignored
    fn test_open_with_real_adc() {
        let mut axis = AdcAxis::open(1, ADS1015_DEFAULT_ADDRESS, settings(false))
            .expect("ADS1015 not available");
        println!("ADC reading: {}", axis.read().unwrap());
    }
}
