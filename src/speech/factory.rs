use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;

use super::scripted::{Script, ScriptedRecognizer};
use super::SpeechRecognizer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecognizerBackend {
    /// Fixed script of hypotheses (demo / tests)
    Scripted,
    /// Offline Vosk model (feature `vosk`)
    Vosk,
}

/// Configuration for the speech recognizer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognizerConfig {
    pub backend: RecognizerBackend,
    /// Script tokens for the scripted backend, e.g. "4 42 42!"
    pub script: String,
    /// Pause between scripted steps
    pub step_delay_ms: u64,
    /// Whether the scripted backend claims on-device support
    pub on_device: bool,
    /// Vosk model directory
    pub model_path: String,
}

impl Default for RecognizerConfig {
    fn default() -> Self {
        Self {
            backend: RecognizerBackend::Scripted,
            script: String::new(),
            step_delay_ms: 700,
            on_device: true,
            model_path: "~/.local/share/vosk/model".to_string(),
        }
    }
}

/// Recognizer factory
pub struct RecognizerFactory;

impl RecognizerFactory {
    /// Create recognizer based on configuration and compiled features
    pub fn create(config: &RecognizerConfig) -> Result<Box<dyn SpeechRecognizer>> {
        match config.backend {
            RecognizerBackend::Scripted => {
                let script: Script = config
                    .script
                    .parse()
                    .context("Invalid recognizer script")?;
                info!("Using scripted recognizer ({} steps)", script.steps.len());
                let recognizer =
                    ScriptedRecognizer::new(script, Duration::from_millis(config.step_delay_ms))
                        .with_on_device(config.on_device);
                Ok(Box::new(recognizer))
            }

            RecognizerBackend::Vosk => {
                #[cfg(feature = "vosk")]
                {
                    let path = std::path::PathBuf::from(
                        shellexpand::tilde(&config.model_path).as_ref(),
                    );
                    Ok(Box::new(super::vosk::VoskRecognizer::new(path)?))
                }

                #[cfg(not(feature = "vosk"))]
                {
                    anyhow::bail!(
                        "Vosk recognition requires building with --features vosk (model: {})",
                        config.model_path
                    )
                }
            }
        }
    }
}
