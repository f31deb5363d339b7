use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Number of recent episode lengths kept
pub const RECENT_EPISODES: usize = 100;

/// Aggregate episode outcomes; also the persisted stats payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Metrics {
    pub hunter_wins: u32,
    pub prey_wins: u32,
    pub total_episodes: u32,
    /// Oldest first, at most [`RECENT_EPISODES`] entries
    pub episode_steps: Vec<u32>,
}

impl Metrics {
    pub fn end_episode(&mut self, steps: u32, hunter_won: bool) {
        self.total_episodes += 1;
        if hunter_won {
            self.hunter_wins += 1;
        } else {
            self.prey_wins += 1;
        }

        self.episode_steps.push(steps);
        if self.episode_steps.len() > RECENT_EPISODES {
            let excess = self.episode_steps.len() - RECENT_EPISODES;
            self.episode_steps.drain(..excess);
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn hunter_win_rate(&self) -> f32 {
        if self.total_episodes == 0 {
            return 0.0;
        }
        self.hunter_wins as f32 / self.total_episodes as f32
    }

    /// Mean length of the recent episodes
    pub fn mean_steps(&self) -> Option<f32> {
        if self.episode_steps.is_empty() {
            return None;
        }
        let total: u32 = self.episode_steps.iter().sum();
        Some(total as f32 / self.episode_steps.len() as f32)
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Missing fields fall back to zero
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let mut metrics: Self = serde_json::from_slice(bytes)?;
        if metrics.episode_steps.len() > RECENT_EPISODES {
            let excess = metrics.episode_steps.len() - RECENT_EPISODES;
            metrics.episode_steps.drain(..excess);
        }
        Ok(metrics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_outcomes() {
        let mut metrics = Metrics::default();
        metrics.end_episode(12, true);
        metrics.end_episode(100, false);
        metrics.end_episode(20, true);

        assert_eq!((metrics.hunter_wins, metrics.prey_wins, metrics.total_episodes), (2, 1, 3));
        assert!((metrics.hunter_win_rate() - 2.0 / 3.0).abs() < 1e-6);
        assert_eq!(metrics.mean_steps(), Some(44.0));
    }

    #[test]
    fn keeps_only_recent_steps() {
        let mut metrics = Metrics::default();
        for steps in 0..150 {
            metrics.end_episode(steps, false);
        }
        assert_eq!(metrics.episode_steps.len(), RECENT_EPISODES);
        assert_eq!(metrics.episode_steps[0], 50, "oldest dropped first");
        assert_eq!(metrics.total_episodes, 150);
    }

    #[test]
    fn json_payload() {
        let mut metrics = Metrics::default();
        metrics.end_episode(7, true);
        let restored = Metrics::from_json(&metrics.to_json().unwrap()).unwrap();
        assert_eq!(restored, metrics);

        let partial = Metrics::from_json(br#"{"hunter_wins": 4}"#).unwrap();
        assert_eq!(partial.hunter_wins, 4);
        assert_eq!(partial.total_episodes, 0, "missing fields default");

        assert!(Metrics::from_json(b"[1, 2").is_err());
    }

    #[test]
    fn empty_metrics() {
        let metrics = Metrics::default();
        assert_eq!(metrics.hunter_win_rate(), 0.0);
        assert_eq!(metrics.mean_steps(), None);
    }
}
