//! Stream format negotiation
//!
//! Walks the caller's candidate encodings in order and takes the first one
//! CoreAudio can be handed directly. Channel count and rate pass through
//! untouched: any conversion is left to the hardware/OS mixer.

use crate::audio::error::{AudioBackendError, Result};
use crate::audio::types::{AudioFormat, AudioSpec, StreamFormat};

/// Outcome of a negotiation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Negotiated {
    /// Obtained spec, finalized (silence + generation quantum size)
    pub spec: AudioSpec,
    /// Stream description for the hardware unit
    pub format: StreamFormat,
}

/// Pick the first recognized candidate and derive the stream description
pub fn negotiate(
    candidates: &[AudioFormat],
    channels: u8,
    sample_rate: u32,
    samples: u16,
) -> Result<Negotiated> {
    if channels == 0 || sample_rate == 0 || samples == 0 {
        return Err(AudioBackendError::UnsupportedFormat(format!(
            "{} channels at {} Hz, {} samples per callback",
            channels, sample_rate, samples
        )));
    }

    let accepted = candidates
        .iter()
        .copied()
        .find(|format| format.is_recognized())
        .ok_or_else(|| {
            let offered: Vec<String> = candidates.iter().map(|f| f.to_string()).collect();
            AudioBackendError::UnsupportedFormat(format!("none of [{}]", offered.join(", ")))
        })?;

    let format = describe(accepted, channels, sample_rate);
    let spec = AudioSpec::new(sample_rate, accepted, channels, samples);

    log::debug!(
        "[CoreAudio] Negotiated {} {}ch {} Hz ({} bytes per callback)",
        accepted,
        channels,
        sample_rate,
        spec.size
    );

    Ok(Negotiated { spec, format })
}

/// Packed linear PCM, one frame per packet
fn describe(format: AudioFormat, channels: u8, sample_rate: u32) -> StreamFormat {
    let bits_per_channel = format.bit_size();
    let channels = channels as u32;
    let bytes_per_frame = bits_per_channel * channels / 8;
    let frames_per_packet = 1;

    StreamFormat {
        sample_rate,
        channels,
        bits_per_channel,
        is_float: format.is_float(),
        // Float formats carry the signed bit too; the flag means signed integer
        is_signed: !format.is_float() && format.is_signed(),
        is_big_endian: format.is_big_endian(),
        is_packed: true,
        bytes_per_frame,
        frames_per_packet,
        bytes_per_packet: bytes_per_frame * frames_per_packet,
    }
}
