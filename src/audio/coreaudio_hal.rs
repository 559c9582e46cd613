//! CoreAudio HAL implementation of the hardware seam (macOS)
//!
//! Uses coreaudio-sys for direct HAL access to:
//! - Enumerate devices and their stream configurations
//! - Query default devices, liveness and Hog Mode ownership
//! - Drive a `kAudioUnitSubType_HALOutput` unit bound to one device
//!
//! This file is only compiled on macOS via #[cfg(target_os = "macos")]

use std::ffi::c_void;
use std::mem;
use std::ptr;

use core_foundation::base::TCFType;
use core_foundation::string::{CFString, CFStringRef};
use coreaudio_sys::*;

use crate::audio::bridge::RenderBridge;
use crate::audio::error::{AudioBackendError, Result};
use crate::audio::hal::{AudioHardware, AudioUnitHandle, BridgeHandle};
use crate::audio::types::{DeviceId, Direction, StreamFormat};

const OUTPUT_BUS: AudioUnitElement = 0;
const INPUT_BUS: AudioUnitElement = 1;

/// Largest capture delivery (in frames) the input scratch buffer holds
const MAX_CAPTURE_FRAMES: usize = 8192;

/// The system's CoreAudio HAL
#[derive(Debug, Clone, Copy, Default)]
pub struct CoreAudioHal;

fn device_scope(direction: Direction) -> AudioObjectPropertyScope {
    match direction {
        Direction::Output => kAudioDevicePropertyScopeOutput,
        Direction::Capture => kAudioDevicePropertyScopeInput,
    }
}

fn address(selector: AudioObjectPropertySelector, scope: AudioObjectPropertyScope) -> AudioObjectPropertyAddress {
    AudioObjectPropertyAddress {
        mSelector: selector,
        mScope: scope,
        mElement: kAudioObjectPropertyElementMain,
    }
}

/// Read a fixed-size property into `T`
fn get_property<T: Copy>(
    object: AudioObjectID,
    address: &AudioObjectPropertyAddress,
    mut value: T,
    call: &'static str,
) -> Result<T> {
    let mut size = mem::size_of::<T>() as u32;
    let status = unsafe {
        AudioObjectGetPropertyData(
            object,
            address,
            0,
            ptr::null(),
            &mut size,
            &mut value as *mut T as *mut c_void,
        )
    };
    AudioBackendError::check(call, status)?;
    Ok(value)
}

/// Read a variable-size property into 8-byte aligned storage
fn get_property_bytes(object: AudioObjectID, address: &AudioObjectPropertyAddress, call: &'static str) -> Result<(Vec<u64>, u32)> {
    let mut size: u32 = 0;
    let status = unsafe { AudioObjectGetPropertyDataSize(object, address, 0, ptr::null(), &mut size) };
    AudioBackendError::check(call, status)?;

    let mut storage = vec![0u64; (size as usize).div_ceil(mem::size_of::<u64>())];
    let status = unsafe {
        AudioObjectGetPropertyData(
            object,
            address,
            0,
            ptr::null(),
            &mut size,
            storage.as_mut_ptr() as *mut c_void,
        )
    };
    AudioBackendError::check(call, status)?;
    Ok((storage, size))
}

impl AudioHardware for CoreAudioHal {
    fn device_ids(&self) -> Result<Vec<DeviceId>> {
        let address = address(kAudioHardwarePropertyDevices, kAudioObjectPropertyScopeGlobal);

        let mut size: u32 = 0;
        let status = unsafe {
            AudioObjectGetPropertyDataSize(kAudioObjectSystemObject, &address, 0, ptr::null(), &mut size)
        };
        if status != 0 {
            return Err(AudioBackendError::EnumerationFailed(format!(
                "Failed to get device list size: {}",
                status
            )));
        }

        let device_count = size as usize / mem::size_of::<AudioObjectID>();
        let mut devices: Vec<AudioObjectID> = vec![0; device_count];
        let status = unsafe {
            AudioObjectGetPropertyData(
                kAudioObjectSystemObject,
                &address,
                0,
                ptr::null(),
                &mut size,
                devices.as_mut_ptr() as *mut c_void,
            )
        };
        if status != 0 {
            return Err(AudioBackendError::EnumerationFailed(format!(
                "Failed to get device list: {}",
                status
            )));
        }

        // The list may have shrunk between the two calls
        devices.truncate(size as usize / mem::size_of::<AudioObjectID>());
        Ok(devices)
    }

    fn stream_configuration(&self, device: DeviceId, direction: Direction) -> Result<Vec<u32>> {
        let address = address(kAudioDevicePropertyStreamConfiguration, device_scope(direction));
        let (storage, size) = get_property_bytes(device, &address, "kAudioDevicePropertyStreamConfiguration")?;
        if (size as usize) < mem::size_of::<u32>() {
            return Ok(Vec::new());
        }

        unsafe {
            let buffer_list = storage.as_ptr() as *const AudioBufferList;
            let num_buffers = (*buffer_list).mNumberBuffers as usize;
            let header = mem::size_of::<AudioBufferList>() - mem::size_of::<AudioBuffer>();
            if header + num_buffers * mem::size_of::<AudioBuffer>() > size as usize {
                return Ok(Vec::new());
            }
            let buffers = std::slice::from_raw_parts((*buffer_list).mBuffers.as_ptr(), num_buffers);
            Ok(buffers.iter().map(|b| b.mNumberChannels).collect())
        }
    }

    fn device_name(&self, device: DeviceId, direction: Direction) -> Result<String> {
        let address = address(kAudioObjectPropertyName, device_scope(direction));
        let cf_name: CFStringRef = get_property(device, &address, ptr::null(), "kAudioObjectPropertyName")?;
        if cf_name.is_null() {
            return Err(AudioBackendError::EnumerationFailed(format!(
                "Device {} has no name",
                device
            )));
        }

        // The HAL hands out a retained string
        let cf_string = unsafe { CFString::wrap_under_create_rule(cf_name) };
        Ok(cf_string.to_string())
    }

    fn default_device(&self, direction: Direction) -> Result<DeviceId> {
        let selector = match direction {
            Direction::Output => kAudioHardwarePropertyDefaultOutputDevice,
            Direction::Capture => kAudioHardwarePropertyDefaultInputDevice,
        };
        let address = address(selector, kAudioObjectPropertyScopeGlobal);
        let device_id: AudioObjectID = get_property(
            kAudioObjectSystemObject,
            &address,
            kAudioObjectUnknown,
            "AudioObjectGetPropertyData (default device)",
        )?;

        if device_id == kAudioObjectUnknown {
            return Err(AudioBackendError::DeviceNotFound(format!("No default {} device", direction)));
        }
        Ok(device_id)
    }

    fn is_alive(&self, device: DeviceId, direction: Direction) -> Result<bool> {
        let address = address(kAudioDevicePropertyDeviceIsAlive, device_scope(direction));
        let alive: u32 = get_property(device, &address, 0, "kAudioDevicePropertyDeviceIsAlive")?;
        Ok(alive != 0)
    }

    fn hog_mode_owner(&self, device: DeviceId, direction: Direction) -> Result<i32> {
        let address = address(kAudioDevicePropertyHogMode, device_scope(direction));
        get_property(device, &address, -1i32, "kAudioDevicePropertyHogMode")
    }

    fn open_unit(&self) -> Result<Box<dyn AudioUnitHandle>> {
        // HALOutput rather than DefaultOutput so a specific device can be selected
        let desc = AudioComponentDescription {
            componentType: kAudioUnitType_Output,
            componentSubType: kAudioUnitSubType_HALOutput,
            componentManufacturer: kAudioUnitManufacturer_Apple,
            componentFlags: 0,
            componentFlagsMask: 0,
        };

        unsafe {
            let component = AudioComponentFindNext(ptr::null_mut(), &desc);
            if component.is_null() {
                return Err(AudioBackendError::AllocationFailed(
                    "Couldn't find HAL audio output component".to_string(),
                ));
            }

            let mut audio_unit: AudioUnit = ptr::null_mut();
            let status = AudioComponentInstanceNew(component, &mut audio_unit);
            AudioBackendError::check("AudioComponentInstanceNew", status)?;

            Ok(Box::new(HalUnit {
                audio_unit,
                initialized: false,
                bytes_per_frame: 0,
                channels: 0,
                input: None,
            }))
        }
    }
}

/// Capture callback state: the unit to pull from and a preallocated buffer
struct InputContext {
    audio_unit: AudioUnit,
    bridge: *mut RenderBridge,
    bytes_per_frame: u32,
    channels: u32,
    scratch: Vec<u8>,
}

struct HalUnit {
    audio_unit: AudioUnit,
    initialized: bool,
    bytes_per_frame: u32,
    channels: u32,
    // Boxed so the pointer given to CoreAudio stays put
    input: Option<Box<InputContext>>,
}

// Safety: the AudioUnit is only configured from the owning thread; CoreAudio
// synchronizes its own callback thread.
unsafe impl Send for HalUnit {}

impl HalUnit {
    fn set_property<T>(
        &self,
        property: AudioUnitPropertyID,
        scope: AudioUnitScope,
        element: AudioUnitElement,
        value: &T,
        call: &'static str,
    ) -> Result<()> {
        let status = unsafe {
            AudioUnitSetProperty(
                self.audio_unit,
                property,
                scope,
                element,
                value as *const T as *const c_void,
                mem::size_of::<T>() as u32,
            )
        };
        AudioBackendError::check(call, status)
    }

    /// Bus and scope carrying the client-side format for `direction`
    fn client_side(direction: Direction) -> (AudioUnitScope, AudioUnitElement) {
        match direction {
            Direction::Output => (kAudioUnitScope_Input, OUTPUT_BUS),
            Direction::Capture => (kAudioUnitScope_Output, INPUT_BUS),
        }
    }
}

impl AudioUnitHandle for HalUnit {
    fn enable_io(&mut self, direction: Direction) -> Result<()> {
        let input: u32 = direction.is_capture() as u32;
        let output: u32 = (!direction.is_capture()) as u32;
        self.set_property(
            kAudioOutputUnitProperty_EnableIO,
            kAudioUnitScope_Input,
            INPUT_BUS,
            &input,
            "kAudioOutputUnitProperty_EnableIO input",
        )?;
        self.set_property(
            kAudioOutputUnitProperty_EnableIO,
            kAudioUnitScope_Output,
            OUTPUT_BUS,
            &output,
            "kAudioOutputUnitProperty_EnableIO output",
        )
    }

    fn set_current_device(&mut self, device: DeviceId) -> Result<()> {
        self.set_property(
            kAudioOutputUnitProperty_CurrentDevice,
            kAudioUnitScope_Global,
            0,
            &device,
            "kAudioOutputUnitProperty_CurrentDevice",
        )
    }

    fn set_stream_format(&mut self, direction: Direction, format: &StreamFormat) -> Result<()> {
        let mut flags = kLinearPCMFormatFlagIsPacked as AudioFormatFlags;
        if format.is_big_endian {
            flags |= kLinearPCMFormatFlagIsBigEndian as AudioFormatFlags;
        }
        if format.is_float {
            flags |= kLinearPCMFormatFlagIsFloat as AudioFormatFlags;
        } else if format.is_signed {
            flags |= kLinearPCMFormatFlagIsSignedInteger as AudioFormatFlags;
        }

        let asbd = AudioStreamBasicDescription {
            mSampleRate: format.sample_rate as f64,
            mFormatID: kAudioFormatLinearPCM,
            mFormatFlags: flags,
            mBytesPerPacket: format.bytes_per_packet,
            mFramesPerPacket: format.frames_per_packet,
            mBytesPerFrame: format.bytes_per_frame,
            mChannelsPerFrame: format.channels,
            mBitsPerChannel: format.bits_per_channel,
            mReserved: 0,
        };

        let (scope, bus) = Self::client_side(direction);
        self.set_property(kAudioUnitProperty_StreamFormat, scope, bus, &asbd, "kAudioUnitProperty_StreamFormat")?;
        self.bytes_per_frame = format.bytes_per_frame;
        self.channels = format.channels;
        Ok(())
    }

    fn install_callback(&mut self, direction: Direction, bridge: BridgeHandle) -> Result<()> {
        match direction {
            Direction::Output => {
                let callback = AURenderCallbackStruct {
                    inputProc: Some(output_callback),
                    inputProcRefCon: bridge.as_ptr() as *mut c_void,
                };
                let (scope, bus) = Self::client_side(direction);
                self.set_property(
                    kAudioUnitProperty_SetRenderCallback,
                    scope,
                    bus,
                    &callback,
                    "kAudioUnitProperty_SetRenderCallback",
                )
            }
            Direction::Capture => {
                let context = self.input.insert(Box::new(InputContext {
                    audio_unit: self.audio_unit,
                    bridge: bridge.as_ptr(),
                    bytes_per_frame: self.bytes_per_frame,
                    channels: self.channels,
                    scratch: vec![0u8; MAX_CAPTURE_FRAMES * self.bytes_per_frame as usize],
                }));
                let callback = AURenderCallbackStruct {
                    inputProc: Some(input_callback),
                    inputProcRefCon: &mut **context as *mut InputContext as *mut c_void,
                };
                self.set_property(
                    kAudioOutputUnitProperty_SetInputCallback,
                    kAudioUnitScope_Global,
                    0,
                    &callback,
                    "kAudioOutputUnitProperty_SetInputCallback",
                )
            }
        }
    }

    fn uninstall_callback(&mut self, direction: Direction) -> Result<()> {
        let callback = AURenderCallbackStruct {
            inputProc: None,
            inputProcRefCon: ptr::null_mut(),
        };
        let result = match direction {
            Direction::Output => {
                let (scope, bus) = Self::client_side(direction);
                self.set_property(
                    kAudioUnitProperty_SetRenderCallback,
                    scope,
                    bus,
                    &callback,
                    "kAudioUnitProperty_SetRenderCallback",
                )
            }
            Direction::Capture => self.set_property(
                kAudioOutputUnitProperty_SetInputCallback,
                kAudioUnitScope_Global,
                0,
                &callback,
                "kAudioOutputUnitProperty_SetInputCallback",
            ),
        };
        if result.is_ok() {
            self.input = None;
        }
        result
    }

    fn initialize(&mut self) -> Result<()> {
        let status = unsafe { AudioUnitInitialize(self.audio_unit) };
        AudioBackendError::check("AudioUnitInitialize", status)?;
        self.initialized = true;
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        let status = unsafe { AudioOutputUnitStart(self.audio_unit) };
        AudioBackendError::check("AudioOutputUnitStart", status)
    }

    fn stop(&mut self) -> Result<()> {
        let status = unsafe { AudioOutputUnitStop(self.audio_unit) };
        AudioBackendError::check("AudioOutputUnitStop", status)
    }
}

impl Drop for HalUnit {
    fn drop(&mut self) {
        unsafe {
            let _ = AudioOutputUnitStop(self.audio_unit);
            if self.initialized {
                let _ = AudioUnitUninitialize(self.audio_unit);
            }
            let _ = AudioComponentInstanceDispose(self.audio_unit);
        }
        // The unit is gone, so nothing can call into the input context anymore
        self.input = None;
    }
}

/// Render callback: CoreAudio wants `mDataByteSize` bytes right now
unsafe extern "C" fn output_callback(
    in_ref_con: *mut c_void,
    _io_action_flags: *mut AudioUnitRenderActionFlags,
    _in_time_stamp: *const AudioTimeStamp,
    _in_bus_number: u32,
    _in_number_frames: u32,
    io_data: *mut AudioBufferList,
) -> OSStatus {
    let bridge = &mut *(in_ref_con as *mut RenderBridge);
    let buffer_list = &mut *io_data;

    // Only a single interleaved buffer is handled
    if buffer_list.mNumberBuffers != 1 {
        return 0;
    }

    let buffer = &mut buffer_list.mBuffers[0];
    if buffer.mData.is_null() {
        return 0;
    }
    let dest = std::slice::from_raw_parts_mut(buffer.mData as *mut u8, buffer.mDataByteSize as usize);
    bridge.render(&mut [dest]);

    0 // noErr
}

/// Input callback: pull the captured frames, then hand them to the bridge
unsafe extern "C" fn input_callback(
    in_ref_con: *mut c_void,
    io_action_flags: *mut AudioUnitRenderActionFlags,
    in_time_stamp: *const AudioTimeStamp,
    in_bus_number: u32,
    in_number_frames: u32,
    _io_data: *mut AudioBufferList,
) -> OSStatus {
    let context = &mut *(in_ref_con as *mut InputContext);

    let bytes = in_number_frames as usize * context.bytes_per_frame as usize;
    if bytes == 0 || bytes > context.scratch.len() {
        return 0;
    }

    let mut buffer_list = AudioBufferList {
        mNumberBuffers: 1,
        mBuffers: [AudioBuffer {
            mNumberChannels: context.channels,
            mDataByteSize: bytes as u32,
            mData: context.scratch.as_mut_ptr() as *mut c_void,
        }],
    };

    let status = AudioUnitRender(
        context.audio_unit,
        io_action_flags,
        in_time_stamp,
        in_bus_number,
        in_number_frames,
        &mut buffer_list,
    );
    if status != 0 {
        return status;
    }

    let delivered = (buffer_list.mBuffers[0].mDataByteSize as usize).min(bytes);
    let bridge = &mut *context.bridge;
    bridge.capture(&context.scratch[..delivered]);

    0
}
