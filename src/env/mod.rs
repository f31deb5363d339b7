//! Grid topology, movement resolution and reward shaping for the pursuit game

mod grid;
mod reward;
mod step;

pub use grid::{GridWorld, LayoutReport};
pub use reward::{HunterRewards, HunterTransition, PreyRewards, PreyTransition, RewardConfig, RewardService};
pub use step::{MoveOutcome, PathCosts, WorldStep, UNREACHABLE};

use strum::{Display, EnumIter, FromRepr, VariantArray};

/// A `(row, column)` cell coordinate
///
/// Signed so that out-of-bounds neighbours can be represented and rejected.
pub type Pos = (i32, i32);

/// The four cardinal neighbour offsets
pub(crate) const NEIGHBORS_4: [Pos; 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];

/// All eight neighbour offsets
pub(crate) const NEIGHBORS_8: [Pos; 8] = [
    (-1, 0),
    (1, 0),
    (0, -1),
    (0, 1),
    (-1, -1),
    (-1, 1),
    (1, -1),
    (1, 1),
];

/// Discrete movement actions, indexed to match the estimator's output layer
#[derive(EnumIter, VariantArray, FromRepr, Display, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Action {
    Up = 0,
    Down = 1,
    Left = 2,
    Right = 3,
}

impl Action {
    pub const COUNT: usize = 4;

    /// Resolve an estimator output index, `None` if out of range
    pub fn from_index(index: usize) -> Option<Self> {
        Self::from_repr(index)
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn opposite(self) -> Self {
        match self {
            Action::Up => Action::Down,
            Action::Down => Action::Up,
            Action::Left => Action::Right,
            Action::Right => Action::Left,
        }
    }

    /// Unit `(row, column)` delta
    pub fn delta(self) -> Pos {
        match self {
            Action::Up => (-1, 0),
            Action::Down => (1, 0),
            Action::Left => (0, -1),
            Action::Right => (0, 1),
        }
    }
}

/// Explicit role tag carried by every agent
#[derive(Display, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    Hunter,
    Prey,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentState {
    pub role: Role,
    pub position: Pos,
}

impl AgentState {
    pub fn new(role: Role, position: Pos) -> Self {
        Self { role, position }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EpisodeState {
    pub steps: u32,
    pub done: bool,
}

impl EpisodeState {
    /// The step counter and the done flag are only ever reset together
    pub fn reset(&mut self) {
        self.steps = 0;
        self.done = false;
    }
}

/// Everything an agent runner reads or mutates during a tick
#[derive(Debug, Clone)]
pub struct World {
    pub grid: GridWorld,
    pub hunter: AgentState,
    pub prey: AgentState,
    pub episode: EpisodeState,
}

impl World {
    pub fn new(grid: GridWorld, hunter: Pos, prey: Pos) -> Self {
        Self {
            grid,
            hunter: AgentState::new(Role::Hunter, hunter),
            prey: AgentState::new(Role::Prey, prey),
            episode: EpisodeState::default(),
        }
    }
}

/// L1 distance between two cells, ignoring obstacles
pub fn manhattan(a: Pos, b: Pos) -> u32 {
    a.0.abs_diff(b.0) + a.1.abs_diff(b.1)
}

pub(crate) fn offset(pos: Pos, delta: Pos) -> Pos {
    (pos.0 + delta.0, pos.1 + delta.1)
}
