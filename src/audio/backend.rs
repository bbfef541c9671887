use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Audio sample data (16-bit PCM, interleaved)
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Raw audio samples (i16 PCM, interleaved)
    pub samples: Vec<i16>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Timestamp in milliseconds since capture started
    pub timestamp_ms: u64,
}

impl AudioFrame {
    /// Number of sample frames (samples per channel)
    pub fn frame_count(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.samples.len() / self.channels as usize
    }

    /// Playback duration of this buffer
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frame_count() as f64 / self.sample_rate as f64)
    }

    /// Downmix to mono by averaging channels
    pub fn to_mono(&self) -> AudioFrame {
        if self.channels <= 1 {
            return self.clone();
        }

        let channels = self.channels as usize;
        let samples = self
            .samples
            .chunks_exact(channels)
            .map(|frame| {
                let sum: i32 = frame.iter().map(|&s| s as i32).sum();
                (sum / channels as i32) as i16
            })
            .collect();

        AudioFrame {
            samples,
            sample_rate: self.sample_rate,
            channels: 1,
            timestamp_ms: self.timestamp_ms,
        }
    }
}

/// Native format of the capture input node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

/// Audio session category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioCategory {
    /// Input only; other audio is silenced or ducked
    Record,
    /// Simultaneous input and output
    PlayAndRecord,
}

/// Audio session mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioMode {
    Default,
    /// Minimal system signal processing on the input
    Measurement,
    VoiceChat,
}

/// Session-level configuration applied before capture starts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioSessionConfig {
    pub category: AudioCategory,
    pub mode: AudioMode,
    /// Lower the volume of other audio while the session is active
    pub duck_others: bool,
    /// Let other apps resume their audio when we deactivate
    pub notify_others_on_deactivation: bool,
}

impl Default for AudioSessionConfig {
    fn default() -> Self {
        Self {
            category: AudioCategory::Record,
            mode: AudioMode::Measurement,
            duck_others: true,
            notify_others_on_deactivation: true,
        }
    }
}

/// Receives every captured buffer, synchronously, on the capture thread
pub type TapHandler = Box<dyn FnMut(AudioFrame) + Send>;

/// Audio capture backend trait
///
/// Mirrors a platform audio engine: a session that must be configured and
/// activated, a single input node that accepts one tap, and an engine that
/// is started and stopped independently of the tap.
///
/// Implementations:
/// - `ReplayCapture`: paced silence or WAV playback (all platforms)
/// - `MicrophoneCapture`: cpal default input device (feature `microphone`)
pub trait AudioCapture: Send {
    /// Backend name for logging
    fn name(&self) -> &str;

    /// Apply category/mode and activate the audio session
    fn activate(&mut self, config: &AudioSessionConfig) -> Result<()>;

    /// Deactivate the audio session
    fn deactivate(&mut self) -> Result<()>;

    /// Native format of the input node
    fn input_format(&self) -> AudioFormat;

    /// Install the input tap delivering `buffer_size`-frame buffers
    ///
    /// A previously installed tap is replaced.
    fn install_tap(&mut self, buffer_size: usize, handler: TapHandler) -> Result<()>;

    /// Remove the input tap. No-op when none is installed.
    fn remove_tap(&mut self);

    /// Preallocate engine resources
    fn prepare(&mut self) {}

    /// Start delivering buffers to the tap
    fn start_engine(&mut self) -> Result<()>;

    /// Stop the engine. No-op when not running.
    fn stop_engine(&mut self);

    /// Check if the engine is currently running
    fn is_running(&self) -> bool;
}
