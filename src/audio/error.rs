//! Audio backend error types
//!
//! This module defines unified error types for all audio backend operations.
//! Platform status codes are mapped to these generic error variants. The host
//! never sees a structured error: the driver layer flattens these into the
//! one-line message pushed to the error sink.

use thiserror::Error;

/// Unified error type for audio backend operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AudioBackendError {
    /// Platform query failed while enumerating devices
    #[error("Device enumeration failed: {0}")]
    EnumerationFailed(String),
    /// No default device, or the requested name is not in the directory
    #[error("Device not found: {0}")]
    DeviceNotFound(String),
    /// Device exists but reports not-alive
    #[error("Device unavailable: {0}")]
    DeviceUnavailable(String),
    /// Device is hogged by another process
    #[error("Device busy: {0}")]
    DeviceBusy(String),
    /// No acceptable sample encoding (or a degenerate spec)
    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),
    /// A stream-description / property-binding call failed
    #[error("CoreAudio error ({call}): {status}")]
    PlatformConfiguration { call: &'static str, status: i32 },
    /// Buffer or platform object could not be allocated
    #[error("Allocation failed: {0}")]
    AllocationFailed(String),
    /// Stream configuration could not be loaded
    #[error("Invalid configuration: {0}")]
    Config(String),
    /// Operation not supported on this platform
    #[error("Not supported: {0}")]
    NotSupported(String),
}

impl AudioBackendError {
    /// Map a platform status code to an error, `0` (noErr) being success
    pub fn check(call: &'static str, status: i32) -> Result<()> {
        if status == 0 {
            Ok(())
        } else {
            Err(Self::PlatformConfiguration { call, status })
        }
    }
}

impl From<serde_json::Error> for AudioBackendError {
    fn from(e: serde_json::Error) -> Self {
        Self::Config(e.to_string())
    }
}

/// Result type alias for audio backend operations
pub type Result<T> = std::result::Result<T, AudioBackendError>;
