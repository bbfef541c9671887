use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::audio::AudioSessionConfig;

/// Configuration for recognition sessions
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Silence after the last transcript (or start) that ends the session
    /// Default: 3000 ms
    pub inactivity_timeout_ms: u64,

    /// Frames per captured buffer handed to the recognizer
    pub buffer_size: usize,

    /// Recognized text shown when the recognizer becomes unavailable
    pub unavailable_text: String,

    /// Ask the recognizer for partial hypotheses
    pub report_partial_results: bool,

    /// Buffered events per subscriber before lagging ones drop events
    pub event_capacity: usize,

    /// Audio session category/mode applied on start
    pub audio: AudioSessionConfig,
}

impl SessionConfig {
    pub fn inactivity_timeout(&self) -> Duration {
        Duration::from_millis(self.inactivity_timeout_ms)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            inactivity_timeout_ms: 3000,
            buffer_size: 1024,
            unavailable_text: "Unavailable".to_string(),
            report_partial_results: true,
            event_capacity: 64,
            audio: AudioSessionConfig::default(),
        }
    }
}
