//! Stream configuration
//!
//! What the host asks for when opening a stream. Loadable from JSON so the
//! host can persist its audio preferences next to the rest of its settings.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::audio::error::{AudioBackendError, Result};
use crate::audio::types::AudioFormat;

/// Requested stream configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Target sample rate
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u8,
    /// Sample frames per user-callback invocation
    pub samples: u16,
    /// Preferred sample encoding
    pub format: AudioFormat,
    /// Explicit candidate list, in priority order (empty = derive from `format`)
    pub formats: Vec<AudioFormat>,
    /// Device display name (None = system default device)
    pub device: Option<String>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            channels: 2,
            samples: 4096,
            format: AudioFormat::S16SYS,
            formats: Vec::new(),
            device: None,
        }
    }
}

impl StreamConfig {
    /// Create a new stereo stream config
    pub fn stereo(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            ..Self::default()
        }
    }

    /// Candidate encodings to offer the negotiator, in priority order
    pub fn format_candidates(&self) -> Vec<AudioFormat> {
        if self.formats.is_empty() {
            AudioFormat::fallback_order(self.format)
        } else {
            self.formats.clone()
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| AudioBackendError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&json)
    }
}
