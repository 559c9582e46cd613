//! CoreAudio stream lifecycle
//!
//! Open sequence: allocate state -> negotiate format -> select device ->
//! open HAL unit -> enable IO -> bind device -> bind stream format ->
//! install bridge callback -> initialize -> start.
//!
//! Any failing step runs the close sequence before the error is returned, so
//! a half-open stream is never handed out. Close (stop -> uninstall callback
//! -> dispose unit -> free buffer) is idempotent and also runs on drop.

use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

use crate::audio::bridge::{AudioCallback, CallbackLock, RenderBridge, StreamControl};
use crate::audio::config::StreamConfig;
use crate::audio::directory::DeviceDirectory;
use crate::audio::error::Result;
use crate::audio::hal::{AudioHardware, AudioUnitHandle, BridgeHandle};
use crate::audio::negotiate::negotiate;
use crate::audio::selector;
use crate::audio::types::{AudioSpec, DeviceId, Direction, StreamFormat};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Closed,
    Opening,
    Running,
}

/// One open CoreAudio stream
pub struct CoreAudioStream {
    direction: Direction,
    state: StreamState,
    spec: Option<AudioSpec>,
    format: Option<StreamFormat>,
    device_id: Option<DeviceId>,
    unit: Option<Box<dyn AudioUnitHandle>>,
    callback_installed: bool,
    started: bool,
    // Boxed so the pointer handed to the callback thread stays put
    bridge: Option<Box<RenderBridge>>,
    control: Arc<StreamControl>,
    callback: CallbackLock,
}

impl CoreAudioStream {
    /// Open a stream, or fail with everything already acquired released
    pub fn open(
        hw: &dyn AudioHardware,
        directory: &DeviceDirectory,
        direction: Direction,
        device: Option<&str>,
        config: &StreamConfig,
        callback: Box<dyn AudioCallback>,
    ) -> Result<Self> {
        let mut stream = Self {
            direction,
            state: StreamState::Opening,
            spec: None,
            format: None,
            device_id: None,
            unit: None,
            callback_installed: false,
            started: false,
            bridge: None,
            control: Arc::new(StreamControl::default()),
            callback: Arc::new(Mutex::new(callback)),
        };

        match stream.prepare(hw, directory, device, config) {
            Ok(()) => {
                stream.state = StreamState::Running;
                log::info!(
                    "[CoreAudioStream] Opened {} device {:?}: {}Hz, {} channels, {}",
                    direction,
                    stream.device_id,
                    config.sample_rate,
                    config.channels,
                    stream.spec.map(|s| s.format.to_string()).unwrap_or_default()
                );
                Ok(stream)
            }
            Err(e) => {
                log::warn!("[CoreAudioStream] Open failed, unwinding: {}", e);
                stream.close();
                Err(e)
            }
        }
    }

    fn prepare(
        &mut self,
        hw: &dyn AudioHardware,
        directory: &DeviceDirectory,
        device: Option<&str>,
        config: &StreamConfig,
    ) -> Result<()> {
        let direction = self.direction;

        // 1. Format
        let negotiated = negotiate(
            &config.format_candidates(),
            config.channels,
            config.sample_rate,
            config.samples,
        )?;
        self.spec = Some(negotiated.spec);
        self.format = Some(negotiated.format);

        // 2. Device (must be known before the unit is configured)
        let device_id = selector::resolve(hw, directory, direction, device)?;
        self.device_id = Some(device_id);

        // 3. HAL unit, bound to the device and format
        let unit = self.unit.insert(hw.open_unit()?);
        unit.enable_io(direction)?;
        unit.set_current_device(device_id)?;
        unit.set_stream_format(direction, &negotiated.format)?;

        // 4. Bridge + callback
        let bridge = self.bridge.insert(Box::new(RenderBridge::new(
            direction,
            &negotiated.spec,
            Arc::clone(&self.control),
            Arc::clone(&self.callback),
        )));
        unit.install_callback(direction, BridgeHandle::new(bridge))?;
        self.callback_installed = true;

        // 5. Go
        unit.initialize()?;
        unit.start()?;
        self.started = true;

        Ok(())
    }

    /// Tear down whatever has been acquired. Safe to call repeatedly.
    pub fn close(&mut self) {
        if let Some(mut unit) = self.unit.take() {
            if self.started {
                if let Err(e) = unit.stop() {
                    log::warn!("[CoreAudioStream] Stop failed: {}", e);
                }
            }
            if self.callback_installed {
                if let Err(e) = unit.uninstall_callback(self.direction) {
                    log::warn!("[CoreAudioStream] Removing callback failed: {}", e);
                }
            }
            // Dropping the handle disposes the unit
            drop(unit);
        }
        self.started = false;
        self.callback_installed = false;

        // Only now is the callback thread guaranteed to be done with it
        self.bridge = None;

        if self.state != StreamState::Closed {
            log::info!("[CoreAudioStream] Closed {} stream", self.direction);
        }
        self.state = StreamState::Closed;
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Obtained spec (None once closed)
    pub fn spec(&self) -> Option<&AudioSpec> {
        match self.state {
            StreamState::Running => self.spec.as_ref(),
            _ => None,
        }
    }

    pub fn format(&self) -> Option<&StreamFormat> {
        match self.state {
            StreamState::Running => self.format.as_ref(),
            _ => None,
        }
    }

    pub fn device_id(&self) -> Option<DeviceId> {
        match self.state {
            StreamState::Running => self.device_id,
            _ => None,
        }
    }

    pub fn pause(&self, paused: bool) {
        self.control.set_paused(paused);
    }

    pub fn is_paused(&self) -> bool {
        self.control.is_paused()
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.control.set_enabled(enabled);
    }

    pub fn is_enabled(&self) -> bool {
        self.control.is_enabled()
    }

    /// Hold the user-callback lock (the callback won't run meanwhile)
    pub fn lock(&self) -> MutexGuard<'_, Box<dyn AudioCallback>> {
        self.callback.lock()
    }
}

impl Drop for CoreAudioStream {
    fn drop(&mut self) {
        self.close();
    }
}
