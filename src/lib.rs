//! # WiiU Gamepad Library
//!
//! Expose a Wii U gamepad as a standard Linux input device.
//!
//! This library registers a virtual gamepad through uinput, polls a GPIO
//! thumb-stick button and an ADS1015 analog axis on a fixed tick, and reports
//! every change as input events.

pub mod config;
pub mod error;
pub mod gamepad;
pub mod poller;
pub mod source;
