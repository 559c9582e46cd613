//! Host driver contract
//!
//! The host audio subsystem only knows drivers through `AudioBootstrap`
//! entries: an availability probe plus an init that hands back an
//! `AudioDriver`. Streams come back as `DriverStream`s.
//!
//! Failures cross this boundary as a single formatted message written to the
//! host's error sink; `open_audio` itself only reports success or failure.

use parking_lot::{Mutex, MutexGuard};

use crate::audio::bridge::AudioCallback;
use crate::audio::config::StreamConfig;
use crate::audio::error::Result;
use crate::audio::types::{AudioSpec, Direction};

/// Process-wide "set last error" sink owned by the host
pub trait ErrorSink: Send + Sync {
    fn set_error(&self, message: String);
}

/// Default sink: remembers the most recent message
#[derive(Debug, Default)]
pub struct LastError {
    message: Mutex<Option<String>>,
}

impl LastError {
    pub fn get(&self) -> Option<String> {
        self.message.lock().clone()
    }

    pub fn clear(&self) {
        *self.message.lock() = None;
    }
}

impl ErrorSink for LastError {
    fn set_error(&self, message: String) {
        *self.message.lock() = Some(message);
    }
}

/// One backend implementation, once initialized
pub trait AudioDriver: Send {
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// Display names of the usable devices for `direction`
    fn device_names(&self, direction: Direction) -> Vec<String>;

    /// Re-enumerate devices for both directions
    fn refresh_devices(&mut self);

    fn open(
        &mut self,
        direction: Direction,
        device: Option<&str>,
        config: &StreamConfig,
        callback: Box<dyn AudioCallback>,
    ) -> Result<Box<dyn DriverStream>>;

    /// Release process-wide driver state (device lists). Idempotent.
    fn deinitialize(&mut self);
}

/// Per-stream operations the host polls
///
/// Callback-driven backends have nothing to do in `wait_audio`/`play_audio`
/// and no mix buffer to hand out; the defaults say so.
pub trait DriverStream: Send {
    fn wait_audio(&mut self) {}

    fn play_audio(&mut self) {}

    fn get_audio_buf(&mut self) -> Option<&mut [u8]> {
        None
    }

    fn spec(&self) -> Option<AudioSpec>;

    fn pause(&self, paused: bool);

    fn set_enabled(&self, enabled: bool);

    fn lock(&self) -> MutexGuard<'_, Box<dyn AudioCallback>>;

    fn close(&mut self);
}

/// Registration entry for one driver
pub struct AudioBootstrap {
    pub name: &'static str,
    pub description: &'static str,
    pub available: fn() -> bool,
    pub init: Box<dyn Fn() -> Result<Box<dyn AudioDriver>> + Send + Sync>,
}

/// Driver table + current driver + error sink
pub struct DriverRegistry<S: ErrorSink = LastError> {
    bootstraps: Vec<AudioBootstrap>,
    current: Option<Box<dyn AudioDriver>>,
    errors: S,
}

impl DriverRegistry<LastError> {
    pub fn new() -> Self {
        Self::with_sink(LastError::default())
    }
}

impl Default for DriverRegistry<LastError> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: ErrorSink> DriverRegistry<S> {
    pub fn with_sink(errors: S) -> Self {
        Self {
            bootstraps: Vec::new(),
            current: None,
            errors,
        }
    }

    pub fn register(&mut self, bootstrap: AudioBootstrap) {
        self.bootstraps.push(bootstrap);
    }

    pub fn errors(&self) -> &S {
        &self.errors
    }

    pub fn driver_names(&self) -> Vec<&'static str> {
        self.bootstraps.iter().map(|b| b.name).collect()
    }

    pub fn current(&self) -> Option<&dyn AudioDriver> {
        self.current.as_deref()
    }

    /// Bring up the named driver, or the first available one
    pub fn init(&mut self, name: Option<&str>) -> bool {
        self.quit();

        for bootstrap in &self.bootstraps {
            if name.is_some_and(|n| n != bootstrap.name) {
                continue;
            }
            if !(bootstrap.available)() {
                continue;
            }
            match (bootstrap.init)() {
                Ok(driver) => {
                    log::info!("[Audio] Using driver '{}' ({})", bootstrap.name, bootstrap.description);
                    self.current = Some(driver);
                    return true;
                }
                Err(e) => {
                    log::warn!("[Audio] Driver '{}' failed to initialize: {}", bootstrap.name, e);
                    self.errors.set_error(e.to_string());
                }
            }
        }

        if self.current.is_none() {
            let message = match name {
                Some(n) => format!("Audio target '{}' not available", n),
                None => "No available audio device".to_string(),
            };
            self.errors.set_error(message);
        }
        false
    }

    /// Open a stream on the current driver; failures go to the error sink
    pub fn open_audio(
        &mut self,
        direction: Direction,
        device: Option<&str>,
        config: &StreamConfig,
        callback: Box<dyn AudioCallback>,
    ) -> Option<Box<dyn DriverStream>> {
        let Some(driver) = self.current.as_mut() else {
            self.errors.set_error("Audio subsystem is not initialized".to_string());
            return None;
        };

        match driver.open(direction, device, config, callback) {
            Ok(stream) => Some(stream),
            Err(e) => {
                log::error!("[Audio] Couldn't open {} stream: {}", direction, e);
                self.errors.set_error(e.to_string());
                None
            }
        }
    }

    pub fn device_names(&self, direction: Direction) -> Vec<String> {
        self.current
            .as_ref()
            .map(|driver| driver.device_names(direction))
            .unwrap_or_default()
    }

    /// Deinitialize the current driver. Idempotent.
    pub fn quit(&mut self) {
        if let Some(mut driver) = self.current.take() {
            driver.deinitialize();
        }
    }
}

impl<S: ErrorSink> Drop for DriverRegistry<S> {
    fn drop(&mut self) {
        self.quit();
    }
}
