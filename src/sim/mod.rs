//! Real-time paced episode orchestration
//!
//! [`Simulation`] owns the world and both runners, ticks them against an injected [`Clock`],
//! and persists statistics and checkpoints through a [`Store`]. Persistence failures are
//! logged and otherwise ignored.

mod clock;
mod game_log;
mod metrics;

pub use clock::{Clock, ManualClock, SystemClock};
pub use game_log::GameLog;
pub use metrics::{Metrics, RECENT_EPISODES};

use std::collections::HashSet;

use burn::{config::Config, tensor::backend::AutodiffBackend};
use log::{debug, warn};
use serde::Serialize;

use crate::{
    agent::{AgentRunner, HunterRunner, PreyRunner, TickResult, HUNTER_STATE_DIM, PREY_STATE_DIM},
    algo::{Trainer, TrainerConfig},
    env::{
        manhattan, offset, Action, GridWorld, LayoutReport, PathCosts, Pos, RewardConfig,
        RewardService, World, WorldStep, NEIGHBORS_4,
    },
    error::Error,
    store::Store,
};

pub const HUNTER_CHECKPOINT: &str = "checkpoints/hunter_train.ckpt";
pub const PREY_CHECKPOINT: &str = "checkpoints/prey_train.ckpt";
pub const STATS_PATH: &str = "data/stats.json";

const SPAWN_ATTEMPTS: usize = 200;
const SEPARATION_ATTEMPTS: usize = 50;
/// A spawn cell may touch at most this many walls
const MAX_SPAWN_WALLS: usize = 1;
/// Ticks per update grow by one for every this many units of speed
const TICKS_PER_SPEED: u32 = 10;

#[derive(Config, Debug)]
pub struct SimConfig {
    /// Side length of the square grid
    #[config(default = 15)]
    pub grid_size: usize,
    #[config(default = 100)]
    pub max_steps: u32,
    #[config(default = 35)]
    pub wall_count: usize,
    #[config(default = 12)]
    pub pallet_count: usize,
    #[config(default = 42)]
    pub seed: u64,
    /// Manhattan separation spawning tries to keep between the agents
    #[config(default = 6)]
    pub min_spawn_distance: u32,
    /// Checkpoint both trainers after every this many episodes
    #[config(default = 50)]
    pub checkpoint_every: u32,
    /// Tick interval at speed 1
    #[config(default = 200.0)]
    pub base_tick_ms: f64,
    #[config(default = 10)]
    pub log_capacity: usize,
}

impl SimConfig {
    pub fn validate(&self) -> crate::Result<()> {
        let problem = if self.grid_size < 3 {
            "grid must be at least 3x3"
        } else if self.max_steps == 0 {
            "episodes need a non-zero step cap"
        } else if self.checkpoint_every == 0 {
            "checkpoint period must be non-zero"
        } else if self.base_tick_ms.is_nan() || self.base_tick_ms <= 0.0 {
            "tick interval must be positive"
        } else if self.log_capacity == 0 {
            "message list needs room for at least one line"
        } else {
            return Ok(());
        };
        Err(Error::InvalidConfig(problem.to_owned()))
    }
}

/// Everything needed to build a [`Simulation`]
#[derive(Debug)]
pub struct Setup {
    pub sim: SimConfig,
    pub rewards: RewardConfig,
    pub costs: PathCosts,
    pub hunter: TrainerConfig,
    pub prey: TrainerConfig,
}

impl Setup {
    /// Default trainer hyperparameters sized for each role's perception
    pub fn new(sim: SimConfig, rewards: RewardConfig, costs: PathCosts) -> Self {
        Self {
            sim,
            rewards,
            costs,
            hunter: TrainerConfig::new(HUNTER_STATE_DIM, Action::COUNT),
            prey: TrainerConfig::new(PREY_STATE_DIM, Action::COUNT),
        }
    }

    /// Adjust both trainer configs the same way
    pub fn with_trainers(mut self, f: impl Fn(TrainerConfig) -> TrainerConfig) -> Self {
        self.hunter = f(self.hunter);
        self.prey = f(self.prey);
        self
    }
}

/// Read-only view of the simulation for a renderer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub width: usize,
    pub height: usize,
    pub walls: Vec<Pos>,
    pub pallets: Vec<Pos>,
    pub hunter: Pos,
    pub prey: Pos,
    pub steps: u32,
    pub hunter_epsilon: f32,
    pub prey_epsilon: f32,
    pub hunter_wins: u32,
    pub prey_wins: u32,
    pub total_episodes: u32,
    /// Newest first
    pub messages: Vec<String>,
}

/// Drives both runners against one shared world
pub struct Simulation<B: AutodiffBackend, C: Clock, S: Store> {
    config: SimConfig,
    world: World,
    hunter: HunterRunner<B>,
    prey: PreyRunner<B>,
    metrics: Metrics,
    log: GameLog,
    clock: C,
    store: S,
    last_tick_ms: f64,
}

impl<B: AutodiffBackend, C: Clock, S: Store> Simulation<B, C, S> {
    /// Build both agents, restore whatever checkpoints and stats `store` holds, and start
    /// the first episode
    pub fn new(setup: Setup, clock: C, store: S, device: B::Device) -> crate::Result<Self> {
        let Setup {
            sim: config,
            rewards,
            costs,
            hunter,
            prey,
        } = setup;
        config.validate()?;

        let step = WorldStep::new(costs);
        let rewards = RewardService::new(rewards);
        let mut hunter = HunterRunner::new(Trainer::new(hunter, device.clone())?, step, rewards.clone())?;
        let mut prey = PreyRunner::new(Trainer::new(prey, device)?, step, rewards)?;
        hunter.trainer_mut().load(&store, HUNTER_CHECKPOINT);
        prey.trainer_mut().load(&store, PREY_CHECKPOINT);
        let metrics = load_metrics(&store);

        let size = config.grid_size;
        let corner = size as i32 - 1;
        let world = World::new(GridWorld::new(size, size, config.seed), (0, 0), (corner, corner));

        let mut sim = Self {
            log: GameLog::new(config.log_capacity),
            last_tick_ms: clock.now_ms(),
            config,
            world,
            hunter,
            prey,
            metrics,
            clock,
            store,
        };
        sim.reset_episode(sim.config.wall_count, sim.config.pallet_count);
        Ok(sim)
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn log(&self) -> &GameLog {
        &self.log
    }

    pub fn hunter(&self) -> &HunterRunner<B> {
        &self.hunter
    }

    pub fn prey(&self) -> &PreyRunner<B> {
        &self.prey
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Regenerate the layout, respawn both agents and clear per-episode state
    pub fn reset_episode(&mut self, wall_count: usize, pallet_count: usize) -> LayoutReport {
        let report = self
            .world
            .grid
            .generate_random_layout(wall_count, pallet_count, &HashSet::new());

        let hunter = self.safe_spawn(&HashSet::new());
        let taken = HashSet::from([hunter]);
        let mut prey = self.safe_spawn(&taken);
        for _ in 0..SEPARATION_ATTEMPTS {
            if manhattan(hunter, prey) >= self.config.min_spawn_distance {
                break;
            }
            prey = self.safe_spawn(&taken);
        }

        self.world.hunter.position = hunter;
        self.world.prey.position = prey;
        self.world.episode.reset();
        self.hunter.reset_episode_state(&self.world);
        self.prey.reset_episode_state(&self.world);

        debug!("episode reset: hunter at {hunter:?}, prey at {prey:?}");
        report
    }

    /// Interior free cell, off any pallet and not in `exclude`, touching few walls if possible
    fn safe_spawn(&mut self, exclude: &HashSet<Pos>) -> Pos {
        let grid = &mut self.world.grid;
        let mut blocked = exclude.clone();
        blocked.extend(grid.active_pallets().iter().copied());

        for _ in 0..SPAWN_ATTEMPTS {
            let pos = grid.random_free_pos(&blocked, false);
            let walls_around = NEIGHBORS_4
                .iter()
                .filter(|&&delta| grid.is_wall(offset(pos, delta)))
                .count();
            if walls_around <= MAX_SPAWN_WALLS {
                return pos;
            }
        }

        let pos = grid.random_free_pos(&blocked, false);
        if grid.is_free(pos) && !blocked.contains(&pos) {
            return pos;
        }
        grid.first_free_interior(&blocked).unwrap_or_else(|| {
            warn!("no spawn cell left, placing agent at {pos:?}");
            pos
        })
    }

    /// Advance the simulation if enough real time has passed
    ///
    /// Runs one tick per call up to speed 10, then `speed / 10` ticks per call. Each tick
    /// moves the prey first, then the hunter.
    ///
    /// **Returns** the last hunter and prey results produced by this call
    pub fn update(
        &mut self,
        speed: u32,
        paused: bool,
        wall_count: usize,
        pallet_count: usize,
    ) -> (Option<TickResult>, Option<TickResult>) {
        if paused {
            return (None, None);
        }

        let speed = speed.max(1);
        let now = self.clock.now_ms();
        let interval = self.config.base_tick_ms / speed as f64;
        let (mut hunter_result, mut prey_result) = (None, None);

        if now - self.last_tick_ms > interval {
            let ticks = if speed <= TICKS_PER_SPEED {
                1
            } else {
                speed / TICKS_PER_SPEED
            };
            for _ in 0..ticks {
                prey_result = self.prey.tick(&mut self.world);
                hunter_result = self.hunter.tick(&mut self.world);
                self.world.episode.steps += 1;

                let caught = WorldStep::check_collision(&self.world.hunter, &self.world.prey);
                if self.end_episode_if_over(caught, wall_count, pallet_count) {
                    break;
                }
            }
            self.last_tick_ms = now;
        }

        (hunter_result, prey_result)
    }

    fn end_episode_if_over(&mut self, caught: bool, wall_count: usize, pallet_count: usize) -> bool {
        if caught || self.world.episode.steps >= self.config.max_steps {
            self.world.episode.done = true;
        }
        if !self.world.episode.done {
            return false;
        }

        let steps = self.world.episode.steps;
        self.metrics.end_episode(steps, caught);
        self.save_stats();

        let episode = self.metrics.total_episodes;
        self.log.log(if caught {
            format!("Episode {episode}: hunter won in {steps} steps")
        } else {
            format!("Episode {episode}: prey survived {steps} steps")
        });

        if episode % self.config.checkpoint_every == 0 {
            self.save_checkpoints();
        }

        self.hunter.trainer_mut().decay_epsilon();
        self.prey.trainer_mut().decay_epsilon();
        self.reset_episode(wall_count, pallet_count);
        true
    }

    fn save_stats(&self) {
        let saved = self
            .metrics
            .to_json()
            .and_then(|blob| self.store.save(STATS_PATH, &blob));
        if let Err(e) = saved {
            warn!("failed to save stats: {e}");
        }
    }

    /// Write both checkpoints, logging failures
    pub fn save_checkpoints(&self) {
        for (path, saved) in [
            (HUNTER_CHECKPOINT, self.hunter.trainer().save(&self.store, HUNTER_CHECKPOINT)),
            (PREY_CHECKPOINT, self.prey.trainer().save(&self.store, PREY_CHECKPOINT)),
        ] {
            if let Err(e) = saved {
                warn!("failed to save checkpoint {path}: {e}");
            }
        }
    }

    /// Forget everything learned: persisted state, both trainers and the metrics
    pub fn reset_learning(&mut self, wall_count: usize, pallet_count: usize) {
        for path in [HUNTER_CHECKPOINT, PREY_CHECKPOINT, STATS_PATH] {
            if let Err(e) = self.store.delete(path) {
                warn!("failed to delete {path}: {e}");
            }
        }

        self.hunter.trainer_mut().reset_training();
        self.prey.trainer_mut().reset_training();
        self.metrics.reset();
        self.log.log("Learning reset");
        self.reset_episode(wall_count, pallet_count);
    }

    pub fn snapshot(&self) -> Snapshot {
        let sorted = |cells: &HashSet<Pos>| {
            let mut cells = cells.iter().copied().collect::<Vec<_>>();
            cells.sort_unstable();
            cells
        };
        let grid = &self.world.grid;

        Snapshot {
            width: grid.width(),
            height: grid.height(),
            walls: sorted(grid.walls()),
            pallets: sorted(grid.active_pallets()),
            hunter: self.world.hunter.position,
            prey: self.world.prey.position,
            steps: self.world.episode.steps,
            hunter_epsilon: self.hunter.trainer().epsilon(),
            prey_epsilon: self.prey.trainer().epsilon(),
            hunter_wins: self.metrics.hunter_wins,
            prey_wins: self.metrics.prey_wins,
            total_episodes: self.metrics.total_episodes,
            messages: self.log.lines().map(str::to_owned).collect(),
        }
    }
}

fn load_metrics(store: &impl Store) -> Metrics {
    match store.load(STATS_PATH).and_then(|blob| blob.map(|b| Metrics::from_json(&b)).transpose()) {
        Ok(metrics) => metrics.unwrap_or_default(),
        Err(e) => {
            warn!("ignoring unreadable stats: {e}");
            Metrics::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use burn::backend::{Autodiff, NdArray};

    use crate::store::MemoryStore;

    use super::*;

    type TestBackend = Autodiff<NdArray>;
    type TestSim<S> = Simulation<TestBackend, ManualClock, S>;

    struct FailingStore;

    impl Store for FailingStore {
        fn save(&self, _path: &str, _blob: &[u8]) -> crate::Result<()> {
            Err(io::Error::other("disk full").into())
        }

        fn load(&self, _path: &str) -> crate::Result<Option<Vec<u8>>> {
            Err(io::Error::other("unreadable").into())
        }

        fn delete(&self, _path: &str) -> crate::Result<()> {
            Err(io::Error::other("read-only").into())
        }
    }

    fn setup(sim: SimConfig) -> Setup {
        Setup::new(sim, RewardConfig::tuned(), PathCosts::weighted()).with_trainers(|t| {
            t.with_hidden(8).with_batch_size(4).with_memory_size(64)
        })
    }

    fn sim_with<S: Store>(config: SimConfig, clock: &ManualClock, store: S) -> TestSim<S> {
        Simulation::new(setup(config), clock.clone(), store, Default::default()).unwrap()
    }

    /// Advance past one speed-1 interval and update
    fn tick(sim: &mut TestSim<impl Store>, clock: &ManualClock) -> (Option<TickResult>, Option<TickResult>) {
        clock.advance(sim.config().base_tick_ms + 1.0);
        sim.update(1, false, sim.config().wall_count, sim.config().pallet_count)
    }

    /// Start a fresh episode on an open grid with the agents at fixed cells
    fn place(sim: &mut TestSim<impl Store>, hunter: Pos, prey: Pos) {
        let size = sim.config().grid_size;
        sim.world.grid = GridWorld::new(size, size, 0);
        sim.world.hunter.position = hunter;
        sim.world.prey.position = prey;
        sim.world.episode.reset();
        sim.hunter.reset_episode_state(&sim.world);
        sim.prey.reset_episode_state(&sim.world);
    }

    #[test]
    fn initial_episode_spawns_safely() {
        let clock = ManualClock::new();
        let sim = sim_with(SimConfig::new(), &clock, MemoryStore::new());
        let world = sim.world();

        for pos in [world.hunter.position, world.prey.position] {
            assert!(world.grid.is_free(pos), "{pos:?} is free");
            assert!(!world.grid.is_border(pos), "{pos:?} is interior");
            assert!(!world.grid.is_pallet_active(pos), "{pos:?} is not a pallet");
        }
        assert_ne!(world.hunter.position, world.prey.position);
        assert_eq!(world.episode.steps, 0);
        assert!(!world.episode.done);
        assert_eq!(sim.hunter().last_known_pos(), world.prey.position);
    }

    #[test]
    fn paused_is_a_no_op() {
        let clock = ManualClock::new();
        let mut sim = sim_with(SimConfig::new(), &clock, MemoryStore::new());
        let before = sim.snapshot();

        clock.advance(10_000.0);
        assert_eq!(sim.update(5, true, 35, 12), (None, None));
        assert_eq!(sim.snapshot(), before, "nothing changed");
    }

    #[test]
    fn ticks_wait_for_the_interval() {
        let clock = ManualClock::new();
        let mut sim = sim_with(SimConfig::new(), &clock, MemoryStore::new());

        assert_eq!(sim.update(1, false, 35, 12), (None, None), "no time has passed");
        clock.advance(200.0);
        assert_eq!(sim.update(1, false, 35, 12), (None, None), "interval not exceeded");

        clock.advance(1.0);
        let (hunter, prey) = sim.update(1, false, 35, 12);
        assert!(hunter.is_some() && prey.is_some(), "one tick ran");
        assert!(sim.world().episode.steps == 1 || sim.metrics().total_episodes == 1);

        assert_eq!(sim.update(1, false, 35, 12), (None, None), "clock did not move");
    }

    #[test]
    fn high_speed_batches_ticks() {
        let clock = ManualClock::new();
        let mut sim = sim_with(SimConfig::new(), &clock, MemoryStore::new());

        place(&mut sim, (2, 2), (12, 12));

        clock.advance(7.0);
        let (hunter, prey) = sim.update(30, false, 35, 12);
        assert!(hunter.is_some() && prey.is_some());
        assert_eq!(sim.metrics().total_episodes, 0, "too far apart to meet in three ticks");
        assert_eq!(sim.world().episode.steps, 3, "speed 30 runs three ticks");
    }

    #[test]
    fn hunter_observes_the_prey_after_it_moved() {
        let clock = ManualClock::new();
        let mut sim = sim_with(SimConfig::new(), &clock, MemoryStore::new());
        place(&mut sim, (2, 2), (10, 10));

        let (_, prey) = tick(&mut sim, &clock);
        assert!(prey.is_some());
        let moved_to = sim.world().prey.position;
        assert_ne!(moved_to, (10, 10), "open grid, every move succeeds");
        assert_eq!(sim.hunter().last_known_pos(), moved_to, "prey ticks before the hunter");
        assert_eq!(sim.world().episode.steps, 1);
    }

    #[test]
    fn prey_walking_into_the_hunter_is_a_capture() {
        let clock = ManualClock::new();
        let mut sim = sim_with(SimConfig::new(), &clock, MemoryStore::new());
        let mut prey_captures = 0;

        for _ in 0..400 {
            place(&mut sim, (7, 8), (7, 7));
            let wins = sim.metrics().hunter_wins;
            let (hunter, prey) = tick(&mut sim, &clock);
            let (hunter, prey) = (hunter.unwrap(), prey.unwrap());

            if prey.caught {
                prey_captures += 1;
                assert_eq!(hunter.action, None, "hunter stays on the prey");
                assert!(hunter.caught);
            }
            let won = sim.metrics().hunter_wins > wins;
            assert_eq!(won, hunter.caught, "wins only follow an actual collision");
        }
        assert!(prey_captures > 0, "prey stepped right at least once");
    }

    #[test]
    fn step_cap_ends_episodes() {
        let clock = ManualClock::new();
        let store = MemoryStore::new();
        let mut sim = sim_with(SimConfig::new().with_max_steps(1), &clock, store.clone());

        for _ in 0..3 {
            tick(&mut sim, &clock);
        }

        let metrics = sim.metrics();
        assert_eq!(metrics.total_episodes, 3);
        assert_eq!(metrics.hunter_wins + metrics.prey_wins, 3);
        assert_eq!(metrics.episode_steps, vec![1, 1, 1]);
        assert_eq!(sim.world().episode.steps, 0, "fresh episode");
        assert!(!sim.world().episode.done);
        assert_eq!(sim.log().len(), 3, "one message per episode");

        let saved = Metrics::from_json(&store.load(STATS_PATH).unwrap().unwrap()).unwrap();
        assert_eq!(&saved, metrics, "stats persisted every episode");
    }

    #[test]
    fn episodes_decay_exploration() {
        let clock = ManualClock::new();
        let mut sim = sim_with(SimConfig::new().with_max_steps(1), &clock, MemoryStore::new());

        tick(&mut sim, &clock);
        let snapshot = sim.snapshot();
        assert!(snapshot.hunter_epsilon < 1.0);
        assert!(snapshot.prey_epsilon < 1.0);
    }

    #[test]
    fn checkpoints_on_schedule() {
        let clock = ManualClock::new();
        let store = MemoryStore::new();
        let config = SimConfig::new().with_max_steps(1).with_checkpoint_every(2);
        let mut sim = sim_with(config, &clock, store.clone());

        tick(&mut sim, &clock);
        assert!(!store.contains(HUNTER_CHECKPOINT), "not yet");
        tick(&mut sim, &clock);
        assert!(store.contains(HUNTER_CHECKPOINT) && store.contains(PREY_CHECKPOINT));
    }

    #[test]
    fn resumes_from_store() {
        let clock = ManualClock::new();
        let store = MemoryStore::new();
        let config = SimConfig::new().with_max_steps(1).with_checkpoint_every(1);
        let mut first = sim_with(config.clone(), &clock, store.clone());
        tick(&mut first, &clock);
        tick(&mut first, &clock);

        // Checkpoints are written before the end-of-episode decay
        let second = sim_with(config, &clock, store);
        assert_eq!(second.metrics(), first.metrics(), "stats restored");
        let restored = second.hunter().trainer().epsilon();
        assert!(restored < 1.0, "checkpoint restored");
        assert!(restored > first.hunter().trainer().epsilon());
    }

    #[test]
    fn persistence_failures_are_not_fatal() {
        let clock = ManualClock::new();
        let config = SimConfig::new().with_max_steps(1).with_checkpoint_every(1);
        let mut sim = sim_with(config, &clock, FailingStore);
        assert_eq!(sim.metrics(), &Metrics::default());

        tick(&mut sim, &clock);
        assert_eq!(sim.metrics().total_episodes, 1, "kept simulating");
        sim.reset_learning(35, 12);
        assert_eq!(sim.metrics().total_episodes, 0);
    }

    #[test]
    fn reset_learning_forgets_everything() {
        let clock = ManualClock::new();
        let store = MemoryStore::new();
        let config = SimConfig::new().with_max_steps(1).with_checkpoint_every(1);
        let mut sim = sim_with(config, &clock, store.clone());
        tick(&mut sim, &clock);
        assert!(store.contains(STATS_PATH) && store.contains(HUNTER_CHECKPOINT));

        sim.reset_learning(35, 12);
        assert!(store.is_empty(), "persisted state deleted");
        assert_eq!(sim.metrics(), &Metrics::default());
        assert_eq!(sim.hunter().trainer().epsilon(), 1.0);
        assert_eq!(sim.prey().trainer().memory_len(), 0);
        assert_eq!(sim.log().lines().next(), Some("Learning reset"));
    }

    #[test]
    fn layout_respects_connectivity_each_episode() {
        let clock = ManualClock::new();
        let mut sim = sim_with(SimConfig::new(), &clock, MemoryStore::new());

        for _ in 0..5 {
            let report = sim.reset_episode(35, 12);
            let grid = &sim.world().grid;
            assert!(report.walls_placed <= 35);
            assert_eq!(grid.flood_fill(sim.world().hunter.position).len(), grid.free_cell_count());
        }
    }

    #[test]
    fn invalid_config_is_rejected() {
        let clock = ManualClock::new();
        let result = TestSim::<MemoryStore>::new(
            setup(SimConfig::new().with_grid_size(2)),
            clock,
            MemoryStore::new(),
            Default::default(),
        );
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }
}
