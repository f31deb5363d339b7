use std::collections::HashSet;

use burn::tensor::backend::AutodiffBackend;
use log::trace;

use crate::{
    algo::Trainer,
    ds::RingBuffer,
    env::{Action, HunterTransition, Pos, RewardService, Role, World, WorldStep},
    error::Result,
};

use super::{check_dims, raycasts, relative, AgentRunner, TickResult, HUNTER_STATE_DIM};

const POSITION_HISTORY: usize = 12;
const PREY_HISTORY: usize = 4;
const DISTANCE_HISTORY: usize = 10;

/// The pursuing agent
///
/// Steers toward the last place it saw the prey; once it reaches that place without
/// regaining sight, it picks a random free cell to search instead.
pub struct HunterRunner<B: AutodiffBackend> {
    trainer: Trainer<B>,
    step: WorldStep,
    rewards: RewardService,
    positions: RingBuffer<Pos>,
    prey_positions: RingBuffer<Pos>,
    distances: RingBuffer<u32>,
    closing_streak: u32,
    last_action: Option<Action>,
    last_known_pos: Pos,
    prey_visible: bool,
}

impl<B: AutodiffBackend> HunterRunner<B> {
    pub fn new(trainer: Trainer<B>, step: WorldStep, rewards: RewardService) -> Result<Self> {
        check_dims(&trainer, HUNTER_STATE_DIM)?;
        Ok(Self {
            trainer,
            step,
            rewards,
            positions: RingBuffer::new(POSITION_HISTORY),
            prey_positions: RingBuffer::new(PREY_HISTORY),
            distances: RingBuffer::new(DISTANCE_HISTORY),
            closing_streak: 0,
            last_action: None,
            last_known_pos: (0, 0),
            prey_visible: true,
        })
    }

    pub fn trainer(&self) -> &Trainer<B> {
        &self.trainer
    }

    pub fn trainer_mut(&mut self) -> &mut Trainer<B> {
        &mut self.trainer
    }

    /// Current pursuit target
    pub fn last_known_pos(&self) -> Pos {
        self.last_known_pos
    }

    pub fn prey_visible(&self) -> bool {
        self.prey_visible
    }

    fn refresh_perception(&mut self, world: &mut World) {
        let hunter = world.hunter.position;
        self.prey_visible = world.grid.has_line_of_sight(hunter, world.prey.position);

        if self.prey_visible {
            self.last_known_pos = world.prey.position;
        } else if hunter == self.last_known_pos {
            self.last_known_pos = world.grid.random_free_pos(&HashSet::new(), true);
        }
    }

    fn sense(&mut self, world: &mut World) -> Vec<f32> {
        self.refresh_perception(world);
        let grid = &world.grid;
        let hunter = world.hunter.position;

        let target = relative(grid, hunter, self.last_known_pos);
        let scent = match self.prey_positions.oldest() {
            Some(&old) if self.prey_positions.is_full() => relative(grid, hunter, old),
            _ => target,
        };

        let n = self.distances.len();
        let efficiency = if n >= 3 && self.distances[n - 1] >= self.distances[n - 3] {
            -1.0
        } else {
            1.0
        };
        let oscillating = self.positions.len() >= 4 && self.positions.count(&hunter) >= 2;

        let mut state = Vec::with_capacity(HUNTER_STATE_DIM);
        state.extend(target);
        state.extend(scent);
        state.extend(raycasts(grid, hunter, true));
        state.push(efficiency);
        state.push(if oscillating { 1.0 } else { 0.0 });
        state.push(if self.prey_visible { 1.0 } else { 0.0 });
        state
    }

    /// Act on `index`, score the transition and learn from it
    fn resolve(&mut self, world: &mut World, state: Vec<f32>, index: usize) -> TickResult {
        let action = Action::from_index(index);
        let reversed = matches!(
            (self.last_action, action),
            (Some(last), Some(next)) if next == last.opposite()
        );

        let prev_distance = self
            .step
            .real_path_distance(&world.grid, world.hunter.position, world.prey.position);
        let old_pos = world.hunter.position;

        let outcome = self.step.move_agent(&mut world.grid, &mut world.hunter, action);

        let new_pos = world.hunter.position;
        let new_distance = self
            .step
            .real_path_distance(&world.grid, new_pos, world.prey.position);
        let caught = WorldStep::check_collision(&world.hunter, &world.prey);

        let on_trail = self.positions.contains(&new_pos);
        let looped = self.positions.count(&new_pos) >= 2;
        self.distances.push(new_distance);
        if new_distance < prev_distance {
            self.closing_streak += 1;
        } else {
            self.closing_streak = 0;
        }
        self.positions.push(new_pos);
        self.last_action = action;

        let reward = self.rewards.hunter_reward(&HunterTransition {
            prev_distance,
            new_distance,
            caught,
            moved: new_pos != old_pos,
            bumped: outcome.bumped(),
            reversed,
            looped,
            on_trail,
            closing_streak: self.closing_streak,
        });

        let terminal = world.episode.done || caught;
        let next_state = self.sense(world);
        self.trainer
            .store_experience(state, index, reward, next_state, terminal);
        self.trainer.train_step();

        if caught {
            world.episode.done = true;
        }

        trace!("hunter {action:?} -> {outcome:?}, reward {reward:.2}");
        TickResult {
            role: Role::Hunter,
            action,
            reward,
            caught,
            distance: new_distance as f32,
        }
    }
}

impl<B: AutodiffBackend> AgentRunner for HunterRunner<B> {
    fn tick(&mut self, world: &mut World) -> Option<TickResult> {
        if world.episode.done {
            return None;
        }

        // The prey walked into us; stay put and end the episode
        if WorldStep::check_collision(&world.hunter, &world.prey) {
            world.episode.done = true;
            trace!("prey ran into the hunter at {:?}", world.hunter.position);
            return Some(TickResult {
                role: Role::Hunter,
                action: None,
                reward: 0.0,
                caught: true,
                distance: 0.0,
            });
        }

        let state = self.sense(world);
        self.prey_positions.push(world.prey.position);
        let index = self.trainer.select_action(&state);
        Some(self.resolve(world, state, index))
    }

    fn reset_episode_state(&mut self, world: &World) {
        self.positions.clear();
        self.prey_positions.clear();
        self.distances.clear();
        self.closing_streak = 0;
        self.last_action = None;
        self.last_known_pos = world.prey.position;
        self.prey_visible = true;
    }
}
