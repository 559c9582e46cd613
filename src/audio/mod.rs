//! CoreAudio driver backend
//!
//! Bridges CoreAudio's pull-based render callback to the host's push-based
//! user callback, behind the host's stable driver contract.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │       Host audio subsystem (DriverRegistry)  │
//! │  open_audio() / quit(), error sink           │
//! └─────────────┬───────────────────────────────┘
//!               │ trait AudioDriver
//!               ▼
//! ┌─────────────────────────────────────────────┐
//! │            CoreAudioBackend                  │
//! │  DeviceDirectory ─► selector ─► negotiate    │
//! └─────────────┬───────────────────────────────┘
//!               │ CoreAudioStream (open/close)
//!               ▼
//! ┌──────────────┐    ┌──────────────────────┐
//! │ RenderBridge │◄───│ trait AudioHardware   │
//! │ (RT thread)  │    │ CoreAudioHal / mock   │
//! └──────────────┘    └──────────────────────┘
//! ```

pub mod bridge;
pub mod config;
pub mod coreaudio_backend;
pub mod coreaudio_stream;
pub mod directory;
pub mod driver;
pub mod error;
pub mod hal;
pub mod negotiate;
pub mod selector;
pub mod types;

#[cfg(target_os = "macos")]
pub mod coreaudio_hal;

#[cfg(test)]
pub(crate) mod mock;

// Re-exports for convenience
pub use bridge::{AudioCallback, RenderBridge, StreamControl};
pub use config::StreamConfig;
pub use coreaudio_backend::{coreaudio_bootstrap, create_backend, CoreAudioBackend};
pub use coreaudio_stream::{CoreAudioStream, StreamState};
pub use directory::{DeviceDirectory, Snapshot};
pub use driver::{AudioBootstrap, AudioDriver, DriverRegistry, DriverStream, ErrorSink, LastError};
pub use error::{AudioBackendError, Result};
pub use hal::{AudioHardware, AudioUnitHandle, BridgeHandle};
pub use types::*;
