use burn::tensor::backend::AutodiffBackend;
use log::trace;

use crate::{
    algo::Trainer,
    ds::RingBuffer,
    env::{manhattan, Action, Pos, PreyTransition, RewardService, Role, World, WorldStep},
    error::Result,
};

use super::{check_dims, raycasts, relative, AgentRunner, TickResult, PREY_STATE_DIM};

const HUNTER_HISTORY: usize = 4;
/// Manhattan distance below which the prey panics
const PANIC_DISTANCE: u32 = 3;
/// Ticks between burst hops
const BURST_COOLDOWN: u32 = 2;

/// The evading agent
///
/// After a successful move it may hop a second cell in the same direction, then waits
/// out a short cooldown before it can burst again.
pub struct PreyRunner<B: AutodiffBackend> {
    trainer: Trainer<B>,
    step: WorldStep,
    rewards: RewardService,
    hunter_positions: RingBuffer<Pos>,
    burst_cooldown: u32,
    last_action: Option<Action>,
}

impl<B: AutodiffBackend> PreyRunner<B> {
    pub fn new(trainer: Trainer<B>, step: WorldStep, rewards: RewardService) -> Result<Self> {
        check_dims(&trainer, PREY_STATE_DIM)?;
        Ok(Self {
            trainer,
            step,
            rewards,
            hunter_positions: RingBuffer::new(HUNTER_HISTORY),
            burst_cooldown: 0,
            last_action: None,
        })
    }

    pub fn trainer(&self) -> &Trainer<B> {
        &self.trainer
    }

    pub fn trainer_mut(&mut self) -> &mut Trainer<B> {
        &mut self.trainer
    }

    /// The cell diagonally toward the hunter is a wall
    fn is_hidden(world: &World) -> bool {
        let (hr, hc) = world.hunter.position;
        let (pr, pc) = world.prey.position;
        world
            .grid
            .is_wall((pr + (hr - pr).signum(), pc + (hc - pc).signum()))
    }

    fn sense(&self, world: &World) -> Vec<f32> {
        let grid = &world.grid;
        let prey = world.prey.position;

        let hunter = relative(grid, prey, world.hunter.position);
        let scent = match self.hunter_positions.oldest() {
            Some(&old) if self.hunter_positions.is_full() => relative(grid, prey, old),
            _ => hunter,
        };
        let panic = WorldStep::distance(&world.hunter, &world.prey) < PANIC_DISTANCE;

        let mut state = Vec::with_capacity(PREY_STATE_DIM);
        state.extend(hunter);
        state.extend(scent);
        state.extend(raycasts(grid, prey, false));
        state.push(if Self::is_hidden(world) { 1.0 } else { 0.0 });
        state.push(if panic { 1.0 } else { 0.0 });
        state
    }

    fn resolve(&mut self, world: &mut World, state: Vec<f32>, index: usize, hidden: bool) -> TickResult {
        let action = Action::from_index(index);
        let reversed = matches!(
            (self.last_action, action),
            (Some(last), Some(next)) if next == last.opposite()
        );

        let prev_distance = manhattan(world.hunter.position, world.prey.position);
        let outcome = self.step.move_agent(&mut world.grid, &mut world.prey, action);

        // The hop is a full second move, so it sees walls and pallets as the first left them
        if self.burst_cooldown == 0 && outcome.moved() {
            if !WorldStep::check_collision(&world.hunter, &world.prey) {
                self.step.move_agent(&mut world.grid, &mut world.prey, action);
            }
            self.burst_cooldown = BURST_COOLDOWN;
        } else if self.burst_cooldown > 0 {
            self.burst_cooldown -= 1;
        }

        let new_distance = manhattan(world.hunter.position, world.prey.position);
        let caught = WorldStep::check_collision(&world.hunter, &world.prey);
        self.last_action = action;

        let reward = self.rewards.prey_reward(&PreyTransition {
            prev_distance,
            new_distance,
            caught,
            moved: outcome.moved(),
            reversed,
            hidden,
        });

        let terminal = world.episode.done || caught;
        let next_state = self.sense(world);
        self.trainer
            .store_experience(state, index, reward, next_state, terminal);
        self.trainer.train_step();

        trace!("prey {action:?} -> {outcome:?}, reward {reward:.2}");
        TickResult {
            role: Role::Prey,
            action,
            reward,
            caught,
            distance: new_distance as f32,
        }
    }
}

impl<B: AutodiffBackend> AgentRunner for PreyRunner<B> {
    fn tick(&mut self, world: &mut World) -> Option<TickResult> {
        if world.episode.done {
            return None;
        }

        let state = self.sense(world);
        self.hunter_positions.push(world.hunter.position);
        let hidden = Self::is_hidden(world);
        let index = self.trainer.select_action(&state);
        Some(self.resolve(world, state, index, hidden))
    }

    fn reset_episode_state(&mut self, _world: &World) {
        self.hunter_positions.clear();
        self.burst_cooldown = 0;
        self.last_action = None;
    }
}
