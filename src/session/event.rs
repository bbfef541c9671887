use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::stats::SessionStats;

/// Controller lifecycle state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Idle,
    Active,
    /// Transient while resources are released
    Stopping,
}

/// Why an active session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// `stop()` was called
    Requested,
    /// The recognizer reported a final result
    Final,
    /// The recognizer reported an error
    Error,
    /// No transcript within the inactivity timeout
    Inactivity,
    /// The recognizer became unavailable
    Unavailable,
    /// The controller was shut down
    Shutdown,
}

/// Why `start()` did not produce a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartFailure {
    /// Audio session configuration or activation failed
    AudioSession,
    /// The recognizer reported itself unavailable
    RecognizerUnavailable,
    /// The input tap could not be installed
    Tap,
    /// The recognizer refused to start a task
    Recognizer,
    /// The capture engine failed to start
    Engine,
}

/// Observable fields of the controller
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub recognized_text: Option<String>,
    pub is_processing: bool,
}

/// Lifecycle events broadcast to subscribers
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    SessionStarted {
        session_id: Uuid,
        at: DateTime<Utc>,
    },
    TranscriptUpdated {
        session_id: Uuid,
        text: Option<String>,
        is_final: bool,
        at: DateTime<Utc>,
    },
    SessionEnded {
        stats: SessionStats,
    },
    StartFailed {
        reason: StartFailure,
        detail: String,
        at: DateTime<Utc>,
    },
    AvailabilityChanged {
        available: bool,
        at: DateTime<Utc>,
    },
}
