use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use super::scoreboard::Scoreboard;
use super::view::ViewModel;
use crate::session::{SessionController, SessionEvent, SessionSnapshot};

/// Configuration for the number game
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Targets are drawn from `0..max_target`
    pub max_target: u32,
    /// Pause between a match and the next target
    pub match_delay_ms: u64,
    /// Caption shown before anything was recognized
    pub idle_prompt: String,
    /// Fixed seed for reproducible targets
    pub seed: Option<u64>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            max_target: 100,
            match_delay_ms: 500,
            idle_prompt: "Tap to begin".to_string(),
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameInput {
    /// Start listening, or stop if already listening
    Toggle,
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GameSummary {
    pub score: u32,
    pub target: u32,
}

pub struct Game {
    controller: SessionController,
    /// Every transcript update, in order. The snapshot `watch` keeps only
    /// the latest value, so a hypothesis replaced before the loop wakes
    /// would never be matched.
    events: broadcast::Receiver<SessionEvent>,
    scoreboard: Scoreboard,
    config: GameConfig,
}

impl Game {
    pub fn new(controller: SessionController, config: GameConfig) -> Self {
        let scoreboard = Scoreboard::new(config.max_target, config.seed);
        let events = controller.subscribe();
        Self {
            controller,
            events,
            scoreboard,
            config,
        }
    }

    pub fn with_scoreboard(mut self, scoreboard: Scoreboard) -> Self {
        self.scoreboard = scoreboard;
        self
    }

    pub fn scoreboard(&self) -> &Scoreboard {
        &self.scoreboard
    }

    pub fn controller(&self) -> &SessionController {
        &self.controller
    }

    /// Play until `Quit` (or the input closes), calling `render` whenever the
    /// screen changes. The session is shut down before returning.
    pub async fn run<R>(
        mut self,
        mut input: mpsc::Receiver<GameInput>,
        mut render: R,
    ) -> Result<GameSummary>
    where
        R: FnMut(&ViewModel) -> Result<()>,
    {
        let match_delay = Duration::from_millis(self.config.match_delay_ms);
        let mut snapshots = self.controller.watch();
        let mut last_text = snapshots.borrow_and_update().recognized_text.clone();

        let next_target = sleep(Duration::ZERO);
        tokio::pin!(next_target);
        let mut next_target_pending = false;

        info!(first_target = self.scoreboard.target(), "Game started");
        render(&self.view(&self.controller.snapshot()))?;

        loop {
            // Session events, then screen updates, are handled before input
            tokio::select! {
                biased;

                event = self.events.recv() => {
                    let text = match event {
                        Ok(SessionEvent::TranscriptUpdated { text, .. }) => text,
                        // The sentinel text is set without a transcript
                        Ok(SessionEvent::AvailabilityChanged { .. })
                        | Ok(SessionEvent::StartFailed { .. }) => self.controller.recognized_text(),
                        Ok(_) => continue,
                        Err(RecvError::Lagged(missed)) => {
                            warn!(missed, "Game fell behind session events");
                            self.controller.recognized_text()
                        }
                        Err(RecvError::Closed) => {
                            warn!("Session controller went away");
                            break;
                        }
                    };

                    if text != last_text {
                        last_text = text;

                        if self.scoreboard.is_match(last_text.as_deref()) {
                            let score = self.scoreboard.record_match();
                            info!(score, matched = self.scoreboard.target(), "Match");
                            next_target.as_mut().reset(Instant::now() + match_delay);
                            next_target_pending = true;
                            render(&self.view(&self.controller.snapshot()))?;
                        }
                    }
                }

                changed = snapshots.changed() => {
                    if changed.is_err() {
                        warn!("Session controller went away");
                        break;
                    }

                    let snapshot = snapshots.borrow_and_update().clone();
                    render(&self.view(&snapshot))?;
                }

                _ = &mut next_target, if next_target_pending => {
                    next_target_pending = false;
                    let next = self.scoreboard.draw_target();
                    debug!(next, "New target");
                    self.controller.stop();
                    render(&self.view(&self.controller.snapshot()))?;
                }

                command = input.recv() => match command {
                    Some(GameInput::Toggle) => {
                        if self.controller.is_processing() {
                            debug!("Toggle: stopping");
                            self.controller.stop();
                        } else {
                            debug!("Toggle: starting");
                            self.controller.start();
                        }
                    }
                    Some(GameInput::Quit) | None => break,
                },
            }
        }

        let summary = GameSummary {
            score: self.scoreboard.score(),
            target: self.scoreboard.target(),
        };
        info!(score = summary.score, "Game over");

        self.controller.shutdown().await;
        Ok(summary)
    }

    fn view(&self, snapshot: &SessionSnapshot) -> ViewModel {
        ViewModel::new(&self.scoreboard, snapshot, &self.config.idle_prompt)
    }
}
