pub mod audio;

pub use audio::{
    coreaudio_bootstrap, create_backend, AudioBackendError, AudioCallback, AudioDriver, AudioFormat,
    AudioSpec, CoreAudioBackend, CoreAudioStream, Direction, DriverRegistry, DriverStream,
    StreamConfig,
};
