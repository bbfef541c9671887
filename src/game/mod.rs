//! The number game: say the number on screen to score

mod runner;
mod scoreboard;
mod view;

pub use runner::{Game, GameConfig, GameInput, GameSummary};
pub use scoreboard::Scoreboard;
pub use view::{ButtonColor, TargetColor, ViewModel};
