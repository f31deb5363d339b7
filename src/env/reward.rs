use serde::{Deserialize, Serialize};

/// Hunter reward constants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HunterRewards {
    pub caught: f32,
    pub step_penalty: f32,
    pub closer_bonus: f32,
    /// Applied when the move did not close the path distance
    pub farther_penalty: f32,
    /// Overrides every other term except capture
    pub stagnation_penalty: f32,
    /// Previous path distance below which the closing bonus is multiplied
    pub near_distance: u32,
    pub near_multiplier: f32,
    pub streak_bonus: f32,
    pub streak_cap: f32,
}

/// Prey reward constants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreyRewards {
    pub caught: f32,
    pub invalid_move: f32,
    /// Reversing while the hunter is closer than `reverse_close_distance`
    pub close_reversal: f32,
    pub reverse_close_distance: u32,
    pub survive_bonus: f32,
    pub hidden_bonus: f32,
    pub hidden_close_distance: u32,
    pub farther_bonus: f32,
    pub closer_penalty: f32,
    pub unchanged_penalty: f32,
}

/// Per-role reward constants
///
/// There is deliberately no `Default`: pick one of the named presets or build one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardConfig {
    pub hunter: HunterRewards,
    pub prey: PreyRewards,
}

impl RewardConfig {
    /// Heavy pressure on the hunter, a prey that values survival above all
    pub fn tuned() -> Self {
        Self {
            hunter: HunterRewards {
                caught: 20.0,
                step_penalty: -0.5,
                closer_bonus: 0.3,
                farther_penalty: -0.1,
                stagnation_penalty: -5.0,
                near_distance: 4,
                near_multiplier: 2.0,
                streak_bonus: 0.2,
                streak_cap: 2.0,
            },
            prey: PreyRewards {
                caught: -500.0,
                invalid_move: -0.5,
                close_reversal: -1.0,
                reverse_close_distance: 3,
                survive_bonus: 5.0,
                hidden_bonus: 5.0,
                hidden_close_distance: 5,
                farther_bonus: 15.0,
                closer_penalty: -0.5,
                unchanged_penalty: -0.1,
            },
        }
    }

    /// Smaller, roughly symmetric magnitudes for both roles
    pub fn gentle() -> Self {
        Self {
            hunter: HunterRewards {
                caught: 10.0,
                step_penalty: -0.05,
                closer_bonus: 0.2,
                farther_penalty: -0.2,
                stagnation_penalty: -1.0,
                near_distance: 3,
                near_multiplier: 1.5,
                streak_bonus: 0.05,
                streak_cap: 0.5,
            },
            prey: PreyRewards {
                caught: -10.0,
                invalid_move: -0.5,
                close_reversal: -0.3,
                reverse_close_distance: 3,
                survive_bonus: 0.05,
                hidden_bonus: 0.2,
                hidden_close_distance: 5,
                farther_bonus: 0.2,
                closer_penalty: -0.2,
                unchanged_penalty: -0.05,
            },
        }
    }
}

/// Features of one hunter transition
#[derive(Debug, Clone, Default)]
pub struct HunterTransition {
    pub prev_distance: u32,
    pub new_distance: u32,
    pub caught: bool,
    pub moved: bool,
    pub bumped: bool,
    pub reversed: bool,
    /// The new cell already appeared at least twice in the recent trail
    pub looped: bool,
    /// The new cell appears anywhere in the recent trail
    pub on_trail: bool,
    /// Consecutive ticks the path distance shrank, this one included
    pub closing_streak: u32,
}

/// Features of one prey transition
#[derive(Debug, Clone, Default)]
pub struct PreyTransition {
    pub prev_distance: u32,
    pub new_distance: u32,
    pub caught: bool,
    pub moved: bool,
    pub reversed: bool,
    pub hidden: bool,
}

/// Stateless reward shaping for both roles
#[derive(Debug, Clone)]
pub struct RewardService {
    config: RewardConfig,
}

impl RewardService {
    pub fn new(config: RewardConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RewardConfig {
        &self.config
    }

    pub fn hunter_reward(&self, t: &HunterTransition) -> f32 {
        let h = &self.config.hunter;
        if t.caught {
            return h.caught;
        }
        if !t.moved || t.bumped || t.reversed || t.looped || t.on_trail {
            return h.stagnation_penalty;
        }

        let mut r = h.step_penalty;
        if t.new_distance < t.prev_distance {
            let proximity = if t.prev_distance < h.near_distance {
                h.near_multiplier
            } else {
                1.0
            };
            r += h.closer_bonus * proximity + (t.closing_streak as f32 * h.streak_bonus).min(h.streak_cap);
        } else {
            r += h.farther_penalty;
        }
        r
    }

    pub fn prey_reward(&self, t: &PreyTransition) -> f32 {
        let p = &self.config.prey;
        if t.caught {
            return p.caught;
        }
        if !t.moved {
            return p.invalid_move;
        }
        if t.reversed && t.prev_distance < p.reverse_close_distance {
            return p.close_reversal;
        }

        let mut r = p.survive_bonus;
        if t.hidden && t.prev_distance < p.hidden_close_distance {
            r += p.hidden_bonus;
        }
        r += match t.new_distance.cmp(&t.prev_distance) {
            std::cmp::Ordering::Greater => p.farther_bonus,
            std::cmp::Ordering::Less => p.closer_penalty,
            std::cmp::Ordering::Equal => p.unchanged_penalty,
        };
        r
    }
}
