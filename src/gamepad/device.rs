//! # Input Device Module
//!
//! Registers the gamepad with the kernel input subsystem through `/dev/uinput`
//! and forwards [`PadEvent`]s to it.
//!
//! The device node disappears when the [`UinputGamepad`] is dropped, so a
//! failed setup later in the probe sequence unregisters it automatically.

use evdev::uinput::{VirtualDevice, VirtualDeviceBuilder};
use evdev::{AbsInfo, AttributeSet, BusType, EventType, InputEvent, InputId, Key, UinputAbsSetup};
use tracing::{debug, info};

use super::{PadButton, PadEvent, PadLayout};
use crate::error::{Result, WiiuPadError};

/// Parallel port bus type, as reported by the original gamepad driver.
pub const BUS_PARPORT: u16 = 0x07;

/// Default device name.
pub const DEFAULT_NAME: &str = "WiiU Gamepad";

/// Default vendor ID.
pub const DEFAULT_VENDOR: u16 = 0x0001;

/// Default product ID.
pub const DEFAULT_PRODUCT: u16 = 0x0001;

/// Default version.
pub const DEFAULT_VERSION: u16 = 0x0100;

/// Identity metadata of the registered input device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub name: String,
    pub bus_type: u16,
    pub vendor: u16,
    pub product: u16,
    pub version: u16,
}

impl Default for DeviceIdentity {
    fn default() -> Self {
        Self {
            name: DEFAULT_NAME.to_string(),
            bus_type: BUS_PARPORT,
            vendor: DEFAULT_VENDOR,
            product: DEFAULT_PRODUCT,
            version: DEFAULT_VERSION,
        }
    }
}

/// Destination for gamepad events.
///
/// Implemented by [`UinputGamepad`] for real devices and by a recording mock
/// in tests.
pub trait InputSink: Send {
    /// Report a batch of events followed by a single sync report.
    fn emit(&mut self, events: &[PadEvent]) -> Result<()>;
}

/// Converts a [`PadEvent`] into the raw evdev event written to uinput.
#[must_use]
pub fn to_input_event(event: &PadEvent) -> InputEvent {
    match *event {
        PadEvent::Key { button, pressed } => {
            InputEvent::new(EventType::KEY, button.key().code(), i32::from(pressed))
        }
        PadEvent::Abs { axis, value } => InputEvent::new(EventType::ABSOLUTE, axis.code().0, value),
    }
}

/// Virtual gamepad registered through uinput.
pub struct UinputGamepad {
    device: VirtualDevice,
    identity: DeviceIdentity,
}

impl std::fmt::Debug for UinputGamepad {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UinputGamepad")
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

impl UinputGamepad {
    /// Register the gamepad with the kernel.
    ///
    /// Sets the key bit of every [`PadButton`] and the absolute parameters of
    /// every axis in `layout`, then creates the device node.
    ///
    /// # Errors
    ///
    /// Returns `Device` error if `/dev/uinput` cannot be opened or the kernel
    /// rejects the device. Nothing stays registered in that case.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use wiiu_gamepad::gamepad::PadLayout;
    /// use wiiu_gamepad::gamepad::device::{DeviceIdentity, UinputGamepad};
    ///
    /// let pad = UinputGamepad::register(&DeviceIdentity::default(), &PadLayout::default())?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn register(identity: &DeviceIdentity, layout: &PadLayout) -> Result<Self> {
        let mut keys = AttributeSet::<Key>::new();
        for button in PadButton::ALL {
            keys.insert(button.key());
        }

        let id = InputId::new(
            BusType(identity.bus_type),
            identity.vendor,
            identity.product,
            identity.version,
        );

        let mut builder = VirtualDeviceBuilder::new()
            .map_err(|e| WiiuPadError::Device(format!("Failed to open /dev/uinput: {}", e)))?
            .name(identity.name.as_str())
            .input_id(id)
            .with_keys(&keys)
            .map_err(|e| WiiuPadError::Device(format!("Failed to set key bits: {}", e)))?;

        for (axis, range) in layout.axes() {
            debug!(
                "Registering {:?}: min={} max={} fuzz={} flat={}",
                axis, range.min, range.max, range.fuzz, range.flat
            );
            let info = AbsInfo::new(0, range.min, range.max, range.fuzz, range.flat, 0);
            builder = builder
                .with_absolute_axis(&UinputAbsSetup::new(axis.code(), info))
                .map_err(|e| {
                    WiiuPadError::Device(format!("Failed to set params for {:?}: {}", axis, e))
                })?;
        }

        let device = builder
            .build()
            .map_err(|e| WiiuPadError::Device(format!("Failed to create input device: {}", e)))?;

        info!(
            "{} initialized (vendor: 0x{:04x}, product: 0x{:04x}, version: 0x{:04x})",
            identity.name, identity.vendor, identity.product, identity.version
        );

        Ok(Self {
            device,
            identity: identity.clone(),
        })
    }

    /// Identity the device was registered with.
    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }
}

impl InputSink for UinputGamepad {
    fn emit(&mut self, events: &[PadEvent]) -> Result<()> {
        if events.is_empty() {
            return Ok(());
        }

        let raw: Vec<InputEvent> = events.iter().map(to_input_event).collect();

        // VirtualDevice::emit appends the SYN_REPORT
        self.device
            .emit(&raw)
            .map_err(|e| WiiuPadError::Device(format!("Failed to emit events: {}", e)))?;

        debug!("Reported {} input events", events.len());
        Ok(())
    }
}

impl Drop for UinputGamepad {
    fn drop(&mut self) {
        info!("{} unregistered", self.identity.name);
    }
}
