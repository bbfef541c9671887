pub mod backend;
pub mod factory;
pub mod file;
pub mod lease;
pub mod replay;

#[cfg(feature = "microphone")]
pub mod microphone;

pub use backend::{
    AudioCapture, AudioCategory, AudioFormat, AudioFrame, AudioMode, AudioSessionConfig,
    TapHandler,
};
pub use factory::{CaptureConfig, CaptureFactory, CaptureSource};
pub use file::AudioFile;
pub use lease::{AudioSessionLease, SharedCapture};
pub use replay::{ReplayCapture, ReplaySource};

#[cfg(feature = "microphone")]
pub use microphone::MicrophoneCapture;
