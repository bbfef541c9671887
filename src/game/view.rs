use serde::Serialize;

use super::scoreboard::Scoreboard;
use crate::session::SessionSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetColor {
    Green,
    Red,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonColor {
    Red,
    Gray,
}

/// Everything the game screen shows, derived from the scoreboard and the
/// session's observable fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewModel {
    pub score_label: String,
    pub target: u32,
    pub target_color: TargetColor,
    /// Recognized text, or the idle prompt before anything was recognized
    pub caption: String,
    pub button_icon: &'static str,
    pub button_color: ButtonColor,
    pub is_processing: bool,
}

impl ViewModel {
    pub fn new(scoreboard: &Scoreboard, snapshot: &SessionSnapshot, idle_prompt: &str) -> Self {
        let recognized = snapshot.recognized_text.as_deref();
        let processing = snapshot.is_processing;

        Self {
            score_label: format!("Score {}", scoreboard.score()),
            target: scoreboard.target(),
            target_color: scoreboard.target_color(recognized),
            caption: recognized.unwrap_or(idle_prompt).to_string(),
            button_icon: if processing {
                "waveform.circle.fill"
            } else {
                "waveform.circle"
            },
            button_color: if processing {
                ButtonColor::Red
            } else {
                ButtonColor::Gray
            },
            is_processing: processing,
        }
    }
}
