//! Shared audio types used by all backends
//!
//! This module contains platform-agnostic types for device management and
//! stream negotiation.
//! NO platform-specific imports allowed here.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::audio::error::AudioBackendError;

/// Platform endpoint identity (an `AudioObjectID` on macOS)
pub type DeviceId = u32;

/// Stream direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Playback towards the hardware
    Output,
    /// Recording from the hardware
    Capture,
}

impl Direction {
    pub fn is_capture(self) -> bool {
        self == Self::Capture
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Output => f.write_str("output"),
            Self::Capture => f.write_str("capture"),
        }
    }
}

/// Sample encoding, using the host subsystem's bit layout
///
/// ```text
/// 0x8000  signed
/// 0x1000  big endian
/// 0x0100  float
/// 0x00FF  bits per sample
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AudioFormat(pub u16);

impl AudioFormat {
    const MASK_BITSIZE: u16 = 0x00FF;
    const MASK_FLOAT: u16 = 0x0100;
    const MASK_BIG_ENDIAN: u16 = 0x1000;
    const MASK_SIGNED: u16 = 0x8000;

    pub const U8: Self = Self(0x0008);
    pub const S8: Self = Self(0x8008);
    pub const U16LSB: Self = Self(0x0010);
    pub const S16LSB: Self = Self(0x8010);
    pub const U16MSB: Self = Self(0x1010);
    pub const S16MSB: Self = Self(0x9010);
    pub const S32LSB: Self = Self(0x8020);
    pub const S32MSB: Self = Self(0x9020);
    pub const F32LSB: Self = Self(0x8120);
    pub const F32MSB: Self = Self(0x9120);

    #[cfg(target_endian = "little")]
    pub const S16SYS: Self = Self::S16LSB;
    #[cfg(target_endian = "big")]
    pub const S16SYS: Self = Self::S16MSB;
    #[cfg(target_endian = "little")]
    pub const S32SYS: Self = Self::S32LSB;
    #[cfg(target_endian = "big")]
    pub const S32SYS: Self = Self::S32MSB;
    #[cfg(target_endian = "little")]
    pub const F32SYS: Self = Self::F32LSB;
    #[cfg(target_endian = "big")]
    pub const F32SYS: Self = Self::F32MSB;

    /// Every encoding the backend hands to CoreAudio
    pub const RECOGNIZED: [Self; 10] = [
        Self::U8,
        Self::S8,
        Self::U16LSB,
        Self::S16LSB,
        Self::U16MSB,
        Self::S16MSB,
        Self::S32LSB,
        Self::S32MSB,
        Self::F32LSB,
        Self::F32MSB,
    ];

    pub fn bit_size(self) -> u32 {
        (self.0 & Self::MASK_BITSIZE) as u32
    }

    pub fn is_float(self) -> bool {
        self.0 & Self::MASK_FLOAT != 0
    }

    pub fn is_big_endian(self) -> bool {
        self.0 & Self::MASK_BIG_ENDIAN != 0
    }

    pub fn is_signed(self) -> bool {
        self.0 & Self::MASK_SIGNED != 0
    }

    pub fn is_recognized(self) -> bool {
        Self::RECOGNIZED.contains(&self)
    }

    /// Byte value of digital silence for this encoding
    pub fn silence(self) -> u8 {
        if self == Self::U8 {
            0x80
        } else {
            0x00
        }
    }

    /// Ordered candidates to try when `requested` is what the caller asked for
    ///
    /// Starts with `requested`, then stays as close as possible to it:
    /// same width and endianness first, then wider/narrower layouts.
    pub fn fallback_order(requested: Self) -> Vec<Self> {
        use AudioFormat as F;
        let order: &[F] = match requested {
            F::U8 => &[F::U8, F::S8, F::S16LSB, F::S16MSB, F::U16LSB, F::U16MSB, F::S32LSB, F::S32MSB, F::F32LSB, F::F32MSB],
            F::S8 => &[F::S8, F::U8, F::S16LSB, F::S16MSB, F::U16LSB, F::U16MSB, F::S32LSB, F::S32MSB, F::F32LSB, F::F32MSB],
            F::S16LSB => &[F::S16LSB, F::S16MSB, F::U16LSB, F::U16MSB, F::S32LSB, F::S32MSB, F::F32LSB, F::F32MSB, F::U8, F::S8],
            F::S16MSB => &[F::S16MSB, F::S16LSB, F::U16MSB, F::U16LSB, F::S32MSB, F::S32LSB, F::F32MSB, F::F32LSB, F::U8, F::S8],
            F::U16LSB => &[F::U16LSB, F::U16MSB, F::S16LSB, F::S16MSB, F::S32LSB, F::S32MSB, F::F32LSB, F::F32MSB, F::U8, F::S8],
            F::U16MSB => &[F::U16MSB, F::U16LSB, F::S16MSB, F::S16LSB, F::S32MSB, F::S32LSB, F::F32MSB, F::F32LSB, F::U8, F::S8],
            F::S32LSB => &[F::S32LSB, F::S32MSB, F::F32LSB, F::F32MSB, F::S16LSB, F::S16MSB, F::U16LSB, F::U16MSB, F::U8, F::S8],
            F::S32MSB => &[F::S32MSB, F::S32LSB, F::F32MSB, F::F32LSB, F::S16MSB, F::S16LSB, F::U16MSB, F::U16LSB, F::U8, F::S8],
            F::F32LSB => &[F::F32LSB, F::F32MSB, F::S32LSB, F::S32MSB, F::S16LSB, F::S16MSB, F::U16LSB, F::U16MSB, F::U8, F::S8],
            F::F32MSB => &[F::F32MSB, F::F32LSB, F::S32MSB, F::S32LSB, F::S16MSB, F::S16LSB, F::U16MSB, F::U16LSB, F::U8, F::S8],
            other => return vec![other],
        };
        order.to_vec()
    }

    fn name(self) -> Option<&'static str> {
        Some(match self {
            Self::U8 => "U8",
            Self::S8 => "S8",
            Self::U16LSB => "U16LSB",
            Self::S16LSB => "S16LSB",
            Self::U16MSB => "U16MSB",
            Self::S16MSB => "S16MSB",
            Self::S32LSB => "S32LSB",
            Self::S32MSB => "S32MSB",
            Self::F32LSB => "F32LSB",
            Self::F32MSB => "F32MSB",
            _ => return None,
        })
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "0x{:04X}", self.0),
        }
    }
}

impl FromStr for AudioFormat {
    type Err = AudioBackendError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        match upper.as_str() {
            "S16" | "S16SYS" => return Ok(Self::S16SYS),
            "S32" | "S32SYS" => return Ok(Self::S32SYS),
            "F32" | "F32SYS" => return Ok(Self::F32SYS),
            _ => {}
        }
        Self::RECOGNIZED
            .iter()
            .copied()
            .find(|f| f.name() == Some(upper.as_str()))
            .ok_or_else(|| AudioBackendError::UnsupportedFormat(s.to_string()))
    }
}

impl TryFrom<String> for AudioFormat {
    type Error = AudioBackendError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<AudioFormat> for String {
    fn from(format: AudioFormat) -> Self {
        format.to_string()
    }
}

/// One usable hardware endpoint, as listed by the device directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EndpointRecord {
    /// Platform device identity
    pub id: DeviceId,
    /// Sanitized display name (non-empty, no trailing spaces)
    pub name: String,
}

/// The spec actually obtained for an open stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioSpec {
    /// Sample frames per second
    pub freq: u32,
    pub format: AudioFormat,
    pub channels: u8,
    /// Byte written by the bridge whenever no audio is available
    pub silence: u8,
    /// Sample frames per generation quantum
    pub samples: u16,
    /// Bytes per generation quantum (buffer capacity of the bridge)
    pub size: u32,
}

impl AudioSpec {
    pub fn new(freq: u32, format: AudioFormat, channels: u8, samples: u16) -> Self {
        let mut spec = Self {
            freq,
            format,
            channels,
            silence: 0,
            samples,
            size: 0,
        };
        spec.finalize();
        spec
    }

    /// Recompute the derived fields (silence and size) from the others
    pub fn finalize(&mut self) {
        self.silence = self.format.silence();
        self.size = (self.format.bit_size() / 8) * self.channels as u32 * self.samples as u32;
    }
}

/// Wire-level stream description handed to the hardware unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamFormat {
    pub sample_rate: u32,
    pub channels: u32,
    pub bits_per_channel: u32,
    pub is_float: bool,
    pub is_signed: bool,
    pub is_big_endian: bool,
    /// Always true: samples fill all bits of their container
    pub is_packed: bool,
    pub bytes_per_frame: u32,
    pub frames_per_packet: u32,
    pub bytes_per_packet: u32,
}
