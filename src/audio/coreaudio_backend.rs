//! CoreAudio driver backend
//!
//! Owns the device directory (built at init, dropped at deinitialize) and
//! opens `CoreAudioStream`s against it. Generic over the hardware seam so the
//! whole open/close sequence runs the same on the real HAL and in tests.

use parking_lot::MutexGuard;

use crate::audio::bridge::AudioCallback;
use crate::audio::config::StreamConfig;
use crate::audio::coreaudio_stream::CoreAudioStream;
use crate::audio::directory::DeviceDirectory;
use crate::audio::driver::{AudioBootstrap, AudioDriver, DriverStream};
use crate::audio::error::Result;
use crate::audio::hal::AudioHardware;
use crate::audio::types::{AudioSpec, Direction, EndpointRecord};

pub const DRIVER_NAME: &str = "coreaudio";
pub const DRIVER_DESCRIPTION: &str = "Mac OS X CoreAudio";

/// CoreAudio backend
pub struct CoreAudioBackend<H: AudioHardware> {
    hw: H,
    directory: DeviceDirectory,
}

impl<H: AudioHardware> CoreAudioBackend<H> {
    /// Initialize the backend: enumerate output and capture devices
    pub fn new(hw: H) -> Self {
        let directory = DeviceDirectory::build(&hw);
        log::info!(
            "[CoreAudio] Backend initialized: {} output, {} capture devices",
            directory.snapshot(Direction::Output).len(),
            directory.snapshot(Direction::Capture).len()
        );
        Self { hw, directory }
    }

    pub fn directory(&self) -> &DeviceDirectory {
        &self.directory
    }

    pub fn devices(&self, direction: Direction) -> &[EndpointRecord] {
        self.directory.snapshot(direction).endpoints()
    }

    /// Open a stream without going through the driver trait object
    pub fn open_stream(
        &self,
        direction: Direction,
        device: Option<&str>,
        config: &StreamConfig,
        callback: Box<dyn AudioCallback>,
    ) -> Result<CoreAudioStream> {
        let device = device.or(config.device.as_deref());
        CoreAudioStream::open(&self.hw, &self.directory, direction, device, config, callback)
    }
}

impl<H: AudioHardware + 'static> AudioDriver for CoreAudioBackend<H> {
    fn name(&self) -> &'static str {
        DRIVER_NAME
    }

    fn description(&self) -> &'static str {
        DRIVER_DESCRIPTION
    }

    fn device_names(&self, direction: Direction) -> Vec<String> {
        self.directory.names(direction)
    }

    fn refresh_devices(&mut self) {
        self.directory.rebuild(&self.hw, Direction::Output);
        self.directory.rebuild(&self.hw, Direction::Capture);
    }

    fn open(
        &mut self,
        direction: Direction,
        device: Option<&str>,
        config: &StreamConfig,
        callback: Box<dyn AudioCallback>,
    ) -> Result<Box<dyn DriverStream>> {
        let stream = self.open_stream(direction, device, config, callback)?;
        Ok(Box::new(stream))
    }

    fn deinitialize(&mut self) {
        self.directory.teardown();
        log::info!("[CoreAudio] Backend deinitialized");
    }
}

impl DriverStream for CoreAudioStream {
    fn spec(&self) -> Option<AudioSpec> {
        CoreAudioStream::spec(self).copied()
    }

    fn pause(&self, paused: bool) {
        CoreAudioStream::pause(self, paused)
    }

    fn set_enabled(&self, enabled: bool) {
        CoreAudioStream::set_enabled(self, enabled)
    }

    fn lock(&self) -> MutexGuard<'_, Box<dyn AudioCallback>> {
        CoreAudioStream::lock(self)
    }

    fn close(&mut self) {
        CoreAudioStream::close(self)
    }
}

/// Factory function to create the backend for the current platform
pub fn create_backend() -> Result<Box<dyn AudioDriver>> {
    #[cfg(target_os = "macos")]
    {
        use crate::audio::coreaudio_hal::CoreAudioHal;
        Ok(Box::new(CoreAudioBackend::new(CoreAudioHal)))
    }

    #[cfg(not(target_os = "macos"))]
    {
        Err(crate::audio::error::AudioBackendError::NotSupported(
            "CoreAudio is only available on macOS".to_string(),
        ))
    }
}

/// Registration entry for the host's driver table
pub fn coreaudio_bootstrap() -> AudioBootstrap {
    AudioBootstrap {
        name: DRIVER_NAME,
        description: DRIVER_DESCRIPTION,
        available: || cfg!(target_os = "macos"),
        init: Box::new(create_backend),
    }
}
