use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;

use super::backend::{AudioCapture, AudioFormat};
use super::file::AudioFile;
use super::replay::ReplayCapture;

/// Where captured audio comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureSource {
    /// Paced silence, for running without a microphone
    Silence,
    /// Paced playback of `wav_path`
    Wav,
    /// Default input device (feature `microphone`)
    Microphone,
}

/// Configuration for the capture backend
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub source: CaptureSource,
    /// WAV file replayed when `source = "wav"`
    pub wav_path: Option<String>,
    /// Restart the WAV file when it ends instead of falling back to silence
    pub loop_playback: bool,
    /// Format of generated silence
    pub sample_rate: u32,
    pub channels: u16,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            source: CaptureSource::Silence,
            wav_path: None,
            loop_playback: false,
            sample_rate: 16000,
            channels: 1,
        }
    }
}

/// Capture backend factory
pub struct CaptureFactory;

impl CaptureFactory {
    /// Create capture backend based on configuration and compiled features
    pub fn create(config: &CaptureConfig) -> Result<Box<dyn AudioCapture>> {
        match config.source {
            CaptureSource::Silence => {
                info!(
                    "Using silent capture ({}Hz, {} channels)",
                    config.sample_rate, config.channels
                );
                Ok(Box::new(ReplayCapture::silence(AudioFormat {
                    sample_rate: config.sample_rate,
                    channels: config.channels,
                })))
            }

            CaptureSource::Wav => {
                let Some(path) = config.wav_path.as_deref() else {
                    anyhow::bail!("capture.source = \"wav\" requires capture.wav_path");
                };
                let path = PathBuf::from(shellexpand::tilde(path).as_ref());
                let file = AudioFile::open(&path)?;
                Ok(Box::new(ReplayCapture::from_file(file, config.loop_playback)))
            }

            CaptureSource::Microphone => {
                #[cfg(feature = "microphone")]
                {
                    let backend = super::microphone::MicrophoneCapture::new()?;
                    Ok(Box::new(backend))
                }

                #[cfg(not(feature = "microphone"))]
                {
                    anyhow::bail!("Microphone capture requires building with --features microphone")
                }
            }
        }
    }
}
