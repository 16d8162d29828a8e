//! # Gamepad Module
//!
//! Capability layout and state tracking for the WiiU gamepad.
//!
//! ## Buttons (EV_KEY)
//!
//! | Index | evdev Code | Config name |
//! |-------|------------|-------------|
//! | 0 | BTN_TL2 | `tl2` |
//! | 1 | BTN_TR2 | `tr2` |
//! | 2 | BTN_TL | `tl` |
//! | 3 | BTN_TR | `tr` |
//! | 4 | BTN_NORTH (BTN_X) | `x` |
//! | 5 | BTN_SOUTH (BTN_A) | `a` |
//! | 6 | BTN_EAST (BTN_B) | `b` |
//! | 7 | BTN_WEST (BTN_Y) | `y` |
//! | 8 | BTN_SELECT | `select` |
//! | 9 | BTN_THUMBL | `thumb_l` |
//! | 10 | BTN_THUMBR | `thumb_r` |
//! | 11 | BTN_START | `start` |
//! | 12 | BTN_0 | `btn0` |
//! | 13 | BTN_1 | `btn1` |
//! | 14 | BTN_2 | `btn2` |
//!
//! `BTN_A`, `BTN_B`, `BTN_X` and `BTN_Y` are kernel aliases of the compass
//! names evdev exposes.
//!
//! ## Axes (EV_ABS)
//!
//! | Index | evdev Code | Config name | Default range |
//! |-------|------------|-------------|---------------|
//! | 0 | ABS_RX | `rx` | -1..1 |
//! | 1 | ABS_RY | `ry` | -1..1 |
//! | 2 | ABS_X | `x` | -1..1 |
//! | 3 | ABS_Y | `y` | -1..1 |
//!
//! A [`PadState`] is a fixed-size snapshot of every button and axis. The
//! poller keeps the last reported snapshot and uses [`PadState::diff`] to turn
//! a fresh sample into the minimal list of [`PadEvent`]s.

pub mod device;

use evdev::{AbsoluteAxisType, Key};
use serde::Deserialize;

/// Number of buttons exposed by the gamepad.
pub const BUTTON_COUNT: usize = 15;

/// Number of absolute axes exposed by the gamepad.
pub const AXIS_COUNT: usize = 4;

/// Minimum value of a digital axis.
pub const DIGITAL_AXIS_MIN: i32 = -1;

/// Maximum value of a digital axis.
pub const DIGITAL_AXIS_MAX: i32 = 1;

/// Gamepad button, in registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PadButton {
    Tl2,
    Tr2,
    Tl,
    Tr,
    X,
    A,
    B,
    Y,
    Select,
    ThumbL,
    ThumbR,
    Start,
    Btn0,
    Btn1,
    Btn2,
}

impl PadButton {
    /// All buttons in registration order.
    pub const ALL: [PadButton; BUTTON_COUNT] = [
        PadButton::Tl2,
        PadButton::Tr2,
        PadButton::Tl,
        PadButton::Tr,
        PadButton::X,
        PadButton::A,
        PadButton::B,
        PadButton::Y,
        PadButton::Select,
        PadButton::ThumbL,
        PadButton::ThumbR,
        PadButton::Start,
        PadButton::Btn0,
        PadButton::Btn1,
        PadButton::Btn2,
    ];

    /// Position of this button in [`PadButton::ALL`].
    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }

    /// The evdev key code reported for this button.
    #[must_use]
    pub fn key(self) -> Key {
        match self {
            PadButton::Tl2 => Key::BTN_TL2,
            PadButton::Tr2 => Key::BTN_TR2,
            PadButton::Tl => Key::BTN_TL,
            PadButton::Tr => Key::BTN_TR,
            PadButton::X => Key::BTN_NORTH,
            PadButton::A => Key::BTN_SOUTH,
            PadButton::B => Key::BTN_EAST,
            PadButton::Y => Key::BTN_WEST,
            PadButton::Select => Key::BTN_SELECT,
            PadButton::ThumbL => Key::BTN_THUMBL,
            PadButton::ThumbR => Key::BTN_THUMBR,
            PadButton::Start => Key::BTN_START,
            PadButton::Btn0 => Key::BTN_0,
            PadButton::Btn1 => Key::BTN_1,
            PadButton::Btn2 => Key::BTN_2,
        }
    }
}

/// Gamepad absolute axis, in registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PadAxis {
    Rx,
    Ry,
    X,
    Y,
}

impl PadAxis {
    /// All axes in registration order.
    pub const ALL: [PadAxis; AXIS_COUNT] = [PadAxis::Rx, PadAxis::Ry, PadAxis::X, PadAxis::Y];

    /// Position of this axis in [`PadAxis::ALL`].
    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }

    /// The evdev axis code reported for this axis.
    #[must_use]
    pub fn code(self) -> AbsoluteAxisType {
        match self {
            PadAxis::Rx => AbsoluteAxisType::ABS_RX,
            PadAxis::Ry => AbsoluteAxisType::ABS_RY,
            PadAxis::X => AbsoluteAxisType::ABS_X,
            PadAxis::Y => AbsoluteAxisType::ABS_Y,
        }
    }
}

/// Range and filtering parameters registered for one axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisRange {
    pub min: i32,
    pub max: i32,
    pub fuzz: i32,
    pub flat: i32,
}

impl AxisRange {
    /// The `[-1, 1]` range used by the digital axes.
    #[must_use]
    pub fn digital() -> Self {
        Self {
            min: DIGITAL_AXIS_MIN,
            max: DIGITAL_AXIS_MAX,
            fuzz: 0,
            flat: 0,
        }
    }
}

/// Capability layout registered with the input device.
///
/// Every button and every axis is always registered; sources only decide
/// which of them ever change.
///
/// # Examples
///
/// ```
/// use wiiu_gamepad::gamepad::{AxisRange, PadAxis, PadLayout};
///
/// let mut layout = PadLayout::default();
/// layout.set_range(PadAxis::X, AxisRange { min: 0, max: 1650, fuzz: 4, flat: 16 });
///
/// assert_eq!(layout.range(PadAxis::X).max, 1650);
/// assert_eq!(layout.range(PadAxis::Y).max, 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PadLayout {
    ranges: [AxisRange; AXIS_COUNT],
}

impl Default for PadLayout {
    fn default() -> Self {
        Self {
            ranges: [AxisRange::digital(); AXIS_COUNT],
        }
    }
}

impl PadLayout {
    /// Returns the range registered for `axis`.
    #[must_use]
    pub fn range(&self, axis: PadAxis) -> AxisRange {
        self.ranges[axis.index()]
    }

    /// Overrides the range registered for `axis`.
    pub fn set_range(&mut self, axis: PadAxis, range: AxisRange) {
        self.ranges[axis.index()] = range;
    }

    /// Iterates over every axis with its registered range.
    pub fn axes(&self) -> impl Iterator<Item = (PadAxis, AxisRange)> + '_ {
        PadAxis::ALL.iter().map(move |&axis| (axis, self.range(axis)))
    }
}

/// A single input change to report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PadEvent {
    /// Button pressed or released.
    Key { button: PadButton, pressed: bool },
    /// Axis moved to a new absolute value.
    Abs { axis: PadAxis, value: i32 },
}

/// Snapshot of every button and axis of the gamepad.
///
/// # Examples
///
/// ```
/// use wiiu_gamepad::gamepad::{PadButton, PadEvent, PadState};
///
/// let before = PadState::default();
/// let mut after = before.clone();
/// after.set_button(PadButton::ThumbL, true);
///
/// assert_eq!(
///     before.diff(&after),
///     vec![PadEvent::Key { button: PadButton::ThumbL, pressed: true }]
/// );
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PadState {
    buttons: [bool; BUTTON_COUNT],
    axes: [i32; AXIS_COUNT],
}

impl PadState {
    /// Creates a state with every button released and every axis at 0.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn button(&self, button: PadButton) -> bool {
        self.buttons[button.index()]
    }

    pub fn set_button(&mut self, button: PadButton, pressed: bool) {
        self.buttons[button.index()] = pressed;
    }

    #[must_use]
    pub fn axis(&self, axis: PadAxis) -> i32 {
        self.axes[axis.index()]
    }

    pub fn set_axis(&mut self, axis: PadAxis, value: i32) {
        self.axes[axis.index()] = value;
    }

    /// Lists the events that turn `self` into `next`.
    ///
    /// Buttons come first, then axes, each in registration order. Equal
    /// states produce an empty list.
    #[must_use]
    pub fn diff(&self, next: &PadState) -> Vec<PadEvent> {
        let keys = PadButton::ALL
            .iter()
            .filter(|&&button| self.button(button) != next.button(button))
            .map(|&button| PadEvent::Key {
                button,
                pressed: next.button(button),
            });

        let axes = PadAxis::ALL
            .iter()
            .filter(|&&axis| self.axis(axis) != next.axis(axis))
            .map(|&axis| PadEvent::Abs {
                axis,
                value: next.axis(axis),
            });

        keys.chain(axes).collect()
    }
}
