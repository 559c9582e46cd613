//! Device selection: requested name (or default) -> live, non-hogged device

use crate::audio::directory::DeviceDirectory;
use crate::audio::error::{AudioBackendError, Result};
use crate::audio::hal::AudioHardware;
use crate::audio::types::{DeviceId, Direction};

/// Resolve the device a stream should bind to
///
/// `None` means the system default device for `direction`, never merely the
/// first directory entry.
pub fn resolve(
    hw: &dyn AudioHardware,
    directory: &DeviceDirectory,
    direction: Direction,
    requested: Option<&str>,
) -> Result<DeviceId> {
    let device_id = match requested {
        None => hw.default_device(direction).map_err(|e| {
            AudioBackendError::DeviceNotFound(format!("no default {} device ({})", direction, e))
        })?,
        Some(name) => directory
            .lookup_by_name(direction, name)
            .ok_or_else(|| AudioBackendError::DeviceNotFound(format!("no such {} device '{}'", direction, name)))?,
    };

    if !hw.is_alive(device_id, direction)? {
        return Err(AudioBackendError::DeviceUnavailable(format!(
            "requested device {} exists, but isn't alive",
            device_id
        )));
    }

    // Some devices don't support Hog Mode queries; errors are fine here.
    if let Ok(owner) = hw.hog_mode_owner(device_id, direction) {
        if owner >= 0 && owner as u32 != std::process::id() {
            return Err(AudioBackendError::DeviceBusy(format!(
                "requested device {} is being hogged by PID {}",
                device_id, owner
            )));
        }
    }

    log::debug!("[CoreAudio] Selected {} device {}", direction, device_id);
    Ok(device_id)
}
