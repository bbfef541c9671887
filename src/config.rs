use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::audio::CaptureConfig;
use crate::game::GameConfig;
use crate::session::SessionConfig;
use crate::speech::RecognizerConfig;

/// Prefix for environment overrides, e.g. `SPEECH_SOUND__SESSION__INACTIVITY_TIMEOUT_MS=5000`
pub const ENV_PREFIX: &str = "SPEECH_SOUND";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub session: SessionConfig,
    pub capture: CaptureConfig,
    pub recognizer: RecognizerConfig,
    pub game: GameConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "speech-sound".to_string(),
        }
    }
}

impl Config {
    /// Load from an optional TOML file (extension may be omitted) layered
    /// under `SPEECH_SOUND__*` environment variables. Every key has a default.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            let name = path.to_string_lossy();
            builder = builder.add_source(config::File::with_name(&name).required(true));
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to read configuration")?;

        settings
            .try_deserialize()
            .context("Invalid configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_without_a_file() -> Result<()> {
        let cfg = Config::load(None)?;
        assert_eq!(cfg.service.name, "speech-sound");
        assert_eq!(cfg.session.inactivity_timeout_ms, 3000);
        assert_eq!(cfg.game.max_target, 100);
        Ok(())
    }

    #[test]
    fn file_overrides_defaults() -> Result<()> {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile()?;
        writeln!(
            file,
            "[session]\ninactivity_timeout_ms = 1500\n\n[recognizer]\nscript = \"1 12 12!\"\n\n[game]\nseed = 7"
        )?;

        let cfg = Config::load(Some(file.path()))?;
        assert_eq!(cfg.session.inactivity_timeout_ms, 1500);
        assert_eq!(cfg.session.buffer_size, 1024);
        assert_eq!(cfg.recognizer.script, "1 12 12!");
        assert_eq!(cfg.game.seed, Some(7));
        Ok(())
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(Config::load(Some(Path::new("/nonexistent/speech-sound.toml"))).is_err());
    }
}
