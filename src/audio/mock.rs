//! Scripted hardware for tests
//!
//! Plays the role of the CoreAudio HAL: a fixed device table, optional
//! failure injection at any unit-configuration step, and bookkeeping of every
//! unit so tests can check that nothing leaks after a failed open.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::audio::error::{AudioBackendError, Result};
use crate::audio::hal::{AudioHardware, AudioUnitHandle, BridgeHandle};
use crate::audio::types::{DeviceId, Direction, StreamFormat};

#[derive(Debug, Clone)]
pub struct MockDevice {
    id: DeviceId,
    name: String,
    name_ok: bool,
    output: bool,
    capture: bool,
    buffers: Vec<u32>,
    alive: bool,
    hog_owner: Option<i32>,
}

impl MockDevice {
    fn new(id: DeviceId, name: &str, output: bool, capture: bool) -> Self {
        Self {
            id,
            name: name.to_string(),
            name_ok: true,
            output,
            capture,
            buffers: vec![2],
            alive: true,
            hog_owner: Some(-1),
        }
    }

    pub fn output(id: DeviceId, name: &str) -> Self {
        Self::new(id, name, true, false)
    }

    pub fn capture(id: DeviceId, name: &str) -> Self {
        Self::new(id, name, false, true)
    }

    pub fn duplex(id: DeviceId, name: &str) -> Self {
        Self::new(id, name, true, true)
    }

    /// Channel count per buffer, for every direction the device supports
    pub fn buffers(mut self, buffers: Vec<u32>) -> Self {
        self.buffers = buffers;
        self
    }

    pub fn undecodable_name(mut self) -> Self {
        self.name_ok = false;
        self
    }

    pub fn dead(mut self) -> Self {
        self.alive = false;
        self
    }

    pub fn hogged(mut self, pid: i32) -> Self {
        self.hog_owner = Some(pid);
        self
    }

    pub fn hog_unsupported(mut self) -> Self {
        self.hog_owner = None;
        self
    }

    fn supports(&self, direction: Direction) -> bool {
        match direction {
            Direction::Output => self.output,
            Direction::Capture => self.capture,
        }
    }
}

/// Unit-configuration step to fail on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailStep {
    OpenUnit,
    EnableIo,
    SetDevice,
    SetFormat,
    InstallCallback,
    Initialize,
    Start,
}

#[derive(Debug, Default)]
struct UnitRecord {
    disposed: bool,
    initialized: bool,
    running: bool,
    enabled: Option<Direction>,
    device: Option<DeviceId>,
    format: Option<StreamFormat>,
    callback: Option<(Direction, BridgeHandle)>,
}

#[derive(Default)]
struct MockState {
    devices: Vec<MockDevice>,
    defaults: HashMap<Direction, DeviceId>,
    fail_enumeration: bool,
    fail_step: Option<FailStep>,
    names_queried: HashSet<DeviceId>,
    units: Vec<UnitRecord>,
}

#[derive(Clone, Default)]
pub struct MockHardware {
    state: Arc<Mutex<MockState>>,
}

impl MockHardware {
    pub fn new(devices: Vec<MockDevice>) -> Self {
        let hw = Self::default();
        hw.state.lock().devices = devices;
        hw
    }

    pub fn with_default(self, direction: Direction, device: DeviceId) -> Self {
        self.state.lock().defaults.insert(direction, device);
        self
    }

    pub fn fail_enumeration(&self, fail: bool) {
        self.state.lock().fail_enumeration = fail;
    }

    pub fn fail_at(&self, step: Option<FailStep>) {
        self.state.lock().fail_step = step;
    }

    pub fn name_queried(&self, device: DeviceId) -> bool {
        self.state.lock().names_queried.contains(&device)
    }

    pub fn units_created(&self) -> usize {
        self.state.lock().units.len()
    }

    pub fn live_units(&self) -> usize {
        self.state.lock().units.iter().filter(|u| !u.disposed).count()
    }

    pub fn running_units(&self) -> usize {
        self.state.lock().units.iter().filter(|u| u.running).count()
    }

    pub fn installed_callbacks(&self) -> usize {
        self.state.lock().units.iter().filter(|u| u.callback.is_some()).count()
    }

    /// Device and format bound to the most recent live unit
    pub fn bound(&self) -> Option<(DeviceId, StreamFormat, Direction)> {
        let state = self.state.lock();
        let unit = state.units.iter().rev().find(|u| !u.disposed)?;
        Some((unit.device?, unit.format?, unit.enabled?))
    }

    fn running_callback(&self, direction: Direction) -> Option<BridgeHandle> {
        let state = self.state.lock();
        state
            .units
            .iter()
            .rev()
            .filter(|u| u.running && u.initialized)
            .find_map(|u| match u.callback {
                Some((d, handle)) if d == direction => Some(handle),
                _ => None,
            })
    }

    /// Issue one render request of `len` bytes on the running output unit
    pub fn render(&self, len: usize) -> Option<Vec<u8>> {
        let handle = self.running_callback(Direction::Output)?;
        let mut dest = vec![0xEEu8; len];
        // Safety: the handle is only held while the unit is running
        unsafe { handle.bridge_mut() }.render(&mut [&mut dest[..]]);
        Some(dest)
    }

    /// Deliver captured bytes to the running capture unit
    pub fn capture(&self, input: &[u8]) -> bool {
        match self.running_callback(Direction::Capture) {
            Some(handle) => {
                unsafe { handle.bridge_mut() }.capture(input);
                true
            }
            None => false,
        }
    }

    fn device(&self, device: DeviceId) -> Result<MockDevice> {
        self.state
            .lock()
            .devices
            .iter()
            .find(|d| d.id == device)
            .cloned()
            .ok_or(AudioBackendError::PlatformConfiguration {
                call: "AudioObjectGetPropertyData",
                status: -50,
            })
    }
}

impl AudioHardware for MockHardware {
    fn device_ids(&self) -> Result<Vec<DeviceId>> {
        let state = self.state.lock();
        if state.fail_enumeration {
            return Err(AudioBackendError::EnumerationFailed("mock".to_string()));
        }
        Ok(state.devices.iter().map(|d| d.id).collect())
    }

    fn stream_configuration(&self, device: DeviceId, direction: Direction) -> Result<Vec<u32>> {
        let device = self.device(device)?;
        if device.supports(direction) {
            Ok(device.buffers)
        } else {
            Ok(Vec::new())
        }
    }

    fn device_name(&self, device: DeviceId, _direction: Direction) -> Result<String> {
        self.state.lock().names_queried.insert(device);
        let device = self.device(device)?;
        if device.name_ok {
            Ok(device.name)
        } else {
            Err(AudioBackendError::EnumerationFailed("name transcoding".to_string()))
        }
    }

    fn default_device(&self, direction: Direction) -> Result<DeviceId> {
        self.state
            .lock()
            .defaults
            .get(&direction)
            .copied()
            .ok_or(AudioBackendError::PlatformConfiguration {
                call: "AudioObjectGetPropertyData (default device)",
                status: -1,
            })
    }

    fn is_alive(&self, device: DeviceId, _direction: Direction) -> Result<bool> {
        Ok(self.device(device)?.alive)
    }

    fn hog_mode_owner(&self, device: DeviceId, _direction: Direction) -> Result<i32> {
        self.device(device)?
            .hog_owner
            .ok_or(AudioBackendError::NotSupported("kAudioDevicePropertyHogMode".to_string()))
    }

    fn open_unit(&self) -> Result<Box<dyn AudioUnitHandle>> {
        let mut state = self.state.lock();
        if state.fail_step == Some(FailStep::OpenUnit) {
            return Err(AudioBackendError::PlatformConfiguration {
                call: "AudioComponentInstanceNew",
                status: -1,
            });
        }
        state.units.push(UnitRecord::default());
        Ok(Box::new(MockUnit {
            index: state.units.len() - 1,
            state: Arc::clone(&self.state),
        }))
    }
}

struct MockUnit {
    index: usize,
    state: Arc<Mutex<MockState>>,
}

impl MockUnit {
    fn step(&self, step: FailStep, call: &'static str, apply: impl FnOnce(&mut UnitRecord)) -> Result<()> {
        let mut state = self.state.lock();
        if state.fail_step == Some(step) {
            return Err(AudioBackendError::PlatformConfiguration { call, status: -10875 });
        }
        apply(&mut state.units[self.index]);
        Ok(())
    }
}

impl AudioUnitHandle for MockUnit {
    fn enable_io(&mut self, direction: Direction) -> Result<()> {
        self.step(FailStep::EnableIo, "kAudioOutputUnitProperty_EnableIO", |u| {
            u.enabled = Some(direction)
        })
    }

    fn set_current_device(&mut self, device: DeviceId) -> Result<()> {
        self.step(FailStep::SetDevice, "kAudioOutputUnitProperty_CurrentDevice", |u| {
            u.device = Some(device)
        })
    }

    fn set_stream_format(&mut self, _direction: Direction, format: &StreamFormat) -> Result<()> {
        let format = *format;
        self.step(FailStep::SetFormat, "kAudioUnitProperty_StreamFormat", |u| {
            u.format = Some(format)
        })
    }

    fn install_callback(&mut self, direction: Direction, bridge: BridgeHandle) -> Result<()> {
        self.step(FailStep::InstallCallback, "kAudioUnitProperty_SetRenderCallback", |u| {
            u.callback = Some((direction, bridge))
        })
    }

    fn uninstall_callback(&mut self, _direction: Direction) -> Result<()> {
        self.state.lock().units[self.index].callback = None;
        Ok(())
    }

    fn initialize(&mut self) -> Result<()> {
        self.step(FailStep::Initialize, "AudioUnitInitialize", |u| u.initialized = true)
    }

    fn start(&mut self) -> Result<()> {
        self.step(FailStep::Start, "AudioOutputUnitStart", |u| u.running = true)
    }

    fn stop(&mut self) -> Result<()> {
        self.state.lock().units[self.index].running = false;
        Ok(())
    }
}

impl Drop for MockUnit {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        let unit = &mut state.units[self.index];
        unit.running = false;
        unit.initialized = false;
        unit.disposed = true;
    }
}
