use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::view::TargetColor;

/// Target number and score
pub struct Scoreboard {
    rng: StdRng,
    max_target: u32,
    target: u32,
    score: u32,
}

impl Scoreboard {
    /// Targets are drawn uniformly from `0..max_target`. A seed makes the
    /// sequence reproducible.
    pub fn new(max_target: u32, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        let mut scoreboard = Self {
            rng,
            max_target: max_target.max(1),
            target: 0,
            score: 0,
        };
        scoreboard.draw_target();
        scoreboard
    }

    /// Replace the current target
    pub fn with_target(mut self, target: u32) -> Self {
        self.target = target;
        self
    }

    pub fn target(&self) -> u32 {
        self.target
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    /// Exact match of the recognized text against the target's decimal form
    pub fn is_match(&self, recognized: Option<&str>) -> bool {
        recognized == Some(self.target.to_string().as_str())
    }

    pub fn target_color(&self, recognized: Option<&str>) -> TargetColor {
        if self.is_match(recognized) {
            TargetColor::Green
        } else {
            TargetColor::Red
        }
    }

    /// Returns the new score
    pub fn record_match(&mut self) -> u32 {
        self.score += 1;
        self.score
    }

    /// Returns the new target
    pub fn draw_target(&mut self) -> u32 {
        self.target = self.rng.random_range(0..self.max_target);
        self.target
    }
}
