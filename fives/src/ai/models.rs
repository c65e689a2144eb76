//! AI seat difficulty tiers and their tuning parameters.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Difficulty presets for computer-controlled seats.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Difficulty::Easy => write!(f, "easy"),
            Difficulty::Medium => write!(f, "medium"),
            Difficulty::Hard => write!(f, "hard"),
        }
    }
}

/// Tuning knobs per difficulty tier.
#[derive(Clone, Copy, Debug)]
pub struct DifficultyParams {
    /// Chance [0,1] of a random misplay (wrong bid size, random card).
    pub mistake_rate: f64,
    /// Chance [0,1] of bluffing: overbidding or playing a weak round.
    pub bluff_frequency: f64,
    /// Hand strength (0-5) below which the seat prefers to sit.
    pub sit_threshold: u8,
    /// When set, play rather than sit if any opponent's score is within
    /// this margin of winning (the collusion heuristic).
    pub contest_margin: Option<i32>,
    /// Base thinking delay before acting, for natural pacing.
    pub base_think_ms: u64,
    /// Random variance added to or subtracted from the base delay.
    pub think_variance_ms: u64,
}

impl DifficultyParams {
    /// Loose and erratic: frequent misplays, never bluffs on purpose.
    #[must_use]
    pub fn easy() -> Self {
        Self {
            mistake_rate: 0.35,
            bluff_frequency: 0.0,
            sit_threshold: 3,
            contest_margin: None,
            base_think_ms: 900,
            think_variance_ms: 600,
        }
    }

    /// Plays the heuristics straight with a small bluff rate.
    #[must_use]
    pub fn medium() -> Self {
        Self {
            mistake_rate: 0.10,
            bluff_frequency: 0.10,
            sit_threshold: 2,
            contest_margin: None,
            base_think_ms: 1200,
            think_variance_ms: 800,
        }
    }

    /// Near-optimal, bluffs, and contests seats close to winning.
    #[must_use]
    pub fn hard() -> Self {
        Self {
            mistake_rate: 0.02,
            bluff_frequency: 0.20,
            sit_threshold: 2,
            contest_margin: Some(3),
            base_think_ms: 1500,
            think_variance_ms: 1000,
        }
    }

    #[must_use]
    pub fn from_difficulty(difficulty: Difficulty) -> Self {
        match difficulty {
            Difficulty::Easy => Self::easy(),
            Difficulty::Medium => Self::medium(),
            Difficulty::Hard => Self::hard(),
        }
    }

    /// Jittered thinking delay in milliseconds, never below 300.
    #[must_use]
    pub fn think_delay_ms(&self) -> u64 {
        use rand::Rng;
        let mut rng = rand::rng();
        let variance = rng.random_range(0..=self.think_variance_ms) as i64;
        let sign = if rng.random_bool(0.5) { 1 } else { -1 };
        let delay = self.base_think_ms as i64 + variance * sign;
        delay.max(300) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiers_get_stricter_with_difficulty() {
        assert!(DifficultyParams::easy().mistake_rate > DifficultyParams::medium().mistake_rate);
        assert!(DifficultyParams::medium().mistake_rate > DifficultyParams::hard().mistake_rate);
        assert!(DifficultyParams::hard().contest_margin.is_some());
        assert!(DifficultyParams::easy().contest_margin.is_none());
    }

    #[test]
    fn think_delay_has_a_floor() {
        let params = DifficultyParams::easy();
        for _ in 0..50 {
            assert!(params.think_delay_ms() >= 300);
        }
    }

    #[test]
    fn difficulty_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Difficulty::Hard).unwrap(), "\"hard\"");
    }
}
