use rand::{thread_rng, Rng};

use crate::{assert_interval, decay::Decay};

use super::Choice;

/// Epsilon greedy exploration policy whose threshold decays once per episode
///
/// Epsilon never increases except through [`EpsilonGreedy::reset`], and never falls
/// below the floor of its decay schedule.
pub struct EpsilonGreedy<D: Decay> {
    schedule: D,
    epsilon: f32,
}

impl<D: Decay> EpsilonGreedy<D> {
    /// Initialize epsilon greedy policy with a decay strategy
    ///
    /// **Panics** if the schedule's initial value is not in the interval `[0,1]`
    pub fn new(schedule: D) -> Self {
        let epsilon = schedule.initial();
        assert_interval!(epsilon, 0.0, 1.0);
        Self { schedule, epsilon }
    }

    pub fn epsilon(&self) -> f32 {
        self.epsilon
    }

    /// Invoke epsilon greedy policy at the current threshold
    pub fn choose(&self) -> Choice {
        if thread_rng().gen::<f32>() < self.epsilon {
            Choice::Explore
        } else {
            Choice::Exploit
        }
    }

    /// Advance the schedule by one step
    pub fn decay(&mut self) {
        self.epsilon = self.schedule.next(self.epsilon).min(self.epsilon);
    }

    /// Restore a threshold read back from a checkpoint
    ///
    /// Values outside `[floor, initial]` are clamped into it.
    pub fn restore(&mut self, epsilon: f32) {
        let floor = self.schedule.next(0.0);
        self.epsilon = epsilon.clamp(floor, self.schedule.initial());
    }

    pub fn reset(&mut self) {
        self.epsilon = self.schedule.initial();
    }
}
