//! # GPIO Button
//!
//! Reads the thumb-stick push button wired to a Raspberry Pi GPIO line.
//!
//! The button shorts the line to ground when pressed, so the default wiring is
//! active-low with the internal pull-up enabled.

use rppal::gpio::{Gpio, InputPin, Level};
use tracing::{debug, info};

use super::InputSource;
use crate::error::Result;
use crate::gamepad::{PadButton, PadState};

/// A digital input line.
pub trait ButtonLine: Send {
    /// Current logic level of the line.
    fn level(&self) -> Level;
}

impl ButtonLine for InputPin {
    fn level(&self) -> Level {
        self.read()
    }
}

/// Button read from a GPIO line on every tick.
#[derive(Debug)]
pub struct GpioButton<L: ButtonLine = InputPin> {
    line: L,
    button: PadButton,
    active_level: Level,
    name: String,
}

impl GpioButton<InputPin> {
    /// Claim `pin` (BCM numbering) as an input and bind it to `button`.
    ///
    /// The line is released and reset when the returned value is dropped.
    ///
    /// # Errors
    ///
    /// Returns `Gpio` error if the GPIO peripheral is unavailable or the pin
    /// is already claimed.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use wiiu_gamepad::gamepad::PadButton;
    /// use wiiu_gamepad::source::gpio::GpioButton;
    ///
    /// let button = GpioButton::claim(17, PadButton::ThumbL, true, true)?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn claim(pin: u8, button: PadButton, active_low: bool, pull_up: bool) -> Result<Self> {
        let pin = Gpio::new()?.get(pin)?;
        let number = pin.pin();
        let line = if pull_up {
            pin.into_input_pullup()
        } else {
            pin.into_input()
        };

        info!(
            "Claimed GPIO {} for {:?} (active {}, pull-up {})",
            number,
            button,
            if active_low { "low" } else { "high" },
            pull_up
        );

        Ok(Self::with_line(line, format!("gpio{}", number), button, active_low))
    }
}

impl<L: ButtonLine> GpioButton<L> {
    /// Bind an already configured line to `button`.
    pub fn with_line(line: L, name: impl Into<String>, button: PadButton, active_low: bool) -> Self {
        Self {
            line,
            button,
            active_level: if active_low { Level::Low } else { Level::High },
            name: name.into(),
        }
    }

    /// Whether the button is currently held down.
    #[must_use]
    pub fn is_pressed(&self) -> bool {
        self.line.level() == self.active_level
    }
}

impl<L: ButtonLine> InputSource for GpioButton<L> {
    fn name(&self) -> &str {
        &self.name
    }

    fn sample(&mut self, state: &mut PadState) -> Result<()> {
        let pressed = self.is_pressed();
        if pressed != state.button(self.button) {
            debug!("{}: {:?} {}", self.name, self.button, if pressed { "pressed" } else { "released" });
        }
        state.set_button(self.button, pressed);
        Ok(())
    }
}
