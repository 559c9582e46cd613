//! Hardware abstraction seam
//!
//! The directory, selector and stream lifecycle only talk to the platform
//! through these two traits. The macOS implementation lives in
//! `coreaudio_hal.rs`; tests use a scripted mock.
//!
//! # Important
//!
//! This file must NOT contain any platform-specific imports (coreaudio-sys, etc.).

use std::ptr::NonNull;

use crate::audio::bridge::RenderBridge;
use crate::audio::error::Result;
use crate::audio::types::{DeviceId, Direction, StreamFormat};

/// Device-level platform queries
pub trait AudioHardware: Send + Sync {
    /// All device identities, in hardware enumeration order
    fn device_ids(&self) -> Result<Vec<DeviceId>>;

    /// Channel count of every buffer in the device's stream configuration
    fn stream_configuration(&self, device: DeviceId, direction: Direction) -> Result<Vec<u32>>;

    /// Display name, already transcoded to UTF-8
    fn device_name(&self, device: DeviceId, direction: Direction) -> Result<String>;

    /// System default device for this direction
    fn default_device(&self, direction: Direction) -> Result<DeviceId>;

    fn is_alive(&self, device: DeviceId, direction: Direction) -> Result<bool>;

    /// PID holding Hog Mode on the device, `-1` when nobody does
    ///
    /// Some devices don't support the property at all; those return `Err`.
    fn hog_mode_owner(&self, device: DeviceId, direction: Direction) -> Result<i32>;

    /// Instantiate a fresh HAL I/O unit
    fn open_unit(&self) -> Result<Box<dyn AudioUnitHandle>>;
}

/// One platform I/O unit. Dropping the handle disposes the unit.
pub trait AudioUnitHandle: Send {
    /// Enable the bus for `direction` and disable the other one
    fn enable_io(&mut self, direction: Direction) -> Result<()>;

    fn set_current_device(&mut self, device: DeviceId) -> Result<()>;

    fn set_stream_format(&mut self, direction: Direction, format: &StreamFormat) -> Result<()>;

    /// Route the unit's real-time callback for `direction` into `bridge`
    fn install_callback(&mut self, direction: Direction, bridge: BridgeHandle) -> Result<()>;

    /// After this returns the unit must never touch the installed bridge again
    fn uninstall_callback(&mut self, direction: Direction) -> Result<()>;

    fn initialize(&mut self) -> Result<()>;

    fn start(&mut self) -> Result<()>;

    fn stop(&mut self) -> Result<()>;
}

/// Pointer to a stream's bridge, handed to the callback thread
///
/// Only the stream lifecycle creates these, and it keeps the bridge alive
/// (and unmoved) until the callback has been uninstalled and the unit
/// disposed.
#[derive(Debug, Clone, Copy)]
pub struct BridgeHandle(NonNull<RenderBridge>);

// Safety: the bridge is only ever dereferenced from the single callback thread.
unsafe impl Send for BridgeHandle {}

impl BridgeHandle {
    pub(crate) fn new(bridge: &mut RenderBridge) -> Self {
        Self(NonNull::from(bridge))
    }

    /// Raw pointer for platform callback contexts
    pub fn as_ptr(self) -> *mut RenderBridge {
        self.0.as_ptr()
    }

    /// # Safety
    ///
    /// Callers must hold the handle between install and uninstall, and must
    /// not create two live references at once.
    pub unsafe fn bridge_mut<'a>(self) -> &'a mut RenderBridge {
        &mut *self.0.as_ptr()
    }
}
