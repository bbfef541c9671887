use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::event::EndReason;

/// Statistics about a finished recognition session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    pub session_id: Uuid,

    /// When the session started
    pub started_at: DateTime<Utc>,

    /// Total duration in seconds
    pub duration_secs: f64,

    /// Number of transcript callbacks applied
    pub transcript_updates: usize,

    /// Number of captured buffers appended to the recognizer
    pub buffers_appended: usize,

    /// Why the session ended
    pub end_reason: EndReason,
}
