use std::{
    cmp::Reverse,
    collections::{BinaryHeap, HashMap},
};

use log::warn;
use serde::{Deserialize, Serialize};

use super::{manhattan, offset, Action, AgentState, GridWorld, Pos, Role, NEIGHBORS_4};

/// Returned by [`WorldStep::real_path_distance`] when no path exists
///
/// Layout generation keeps the grid connected, so seeing this at runtime means the
/// topology invariant was broken.
pub const UNREACHABLE: u32 = 10_000;

/// Traversal costs for weighted shortest-path search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathCosts {
    pub free: u32,
    pub pallet: u32,
}

impl PathCosts {
    /// Pallets cost two steps: one to break, one to enter
    pub const fn weighted() -> Self {
        Self { free: 1, pallet: 2 }
    }

    /// Every free cell costs one step, pallets included
    pub const fn uniform() -> Self {
        Self { free: 1, pallet: 1 }
    }
}

/// The single outcome class of one movement attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    /// Relocated onto an ordinary free cell
    Moved,
    /// The prey relocated through an active pallet, deactivating it
    PassedPallet,
    /// A non-prey agent broke an active pallet and stayed put
    BrokePallet,
    /// Target cell is a wall
    Blocked,
    /// Target cell is off the grid
    OutOfBounds,
    /// No movement was attempted
    Invalid,
}

impl MoveOutcome {
    pub fn moved(self) -> bool {
        matches!(self, MoveOutcome::Moved | MoveOutcome::PassedPallet)
    }

    pub fn bumped(self) -> bool {
        matches!(
            self,
            MoveOutcome::PassedPallet
                | MoveOutcome::BrokePallet
                | MoveOutcome::Blocked
                | MoveOutcome::OutOfBounds
        )
    }

    /// Whether the grid itself changed as a result of the move
    pub fn changed_grid(self) -> bool {
        matches!(self, MoveOutcome::PassedPallet | MoveOutcome::BrokePallet)
    }
}

/// Resolves agent moves against grid semantics and measures distances
#[derive(Debug, Clone, Copy)]
pub struct WorldStep {
    costs: PathCosts,
}

impl WorldStep {
    pub fn new(costs: PathCosts) -> Self {
        Self { costs }
    }

    /// Apply one discrete move for `agent`
    ///
    /// `None` stands for an unknown action index and leaves everything unchanged.
    pub fn move_agent(
        &self,
        grid: &mut GridWorld,
        agent: &mut AgentState,
        action: Option<Action>,
    ) -> MoveOutcome {
        let Some(action) = action else {
            return MoveOutcome::Invalid;
        };
        let target = offset(agent.position, action.delta());

        if !grid.in_bounds(target) {
            return MoveOutcome::OutOfBounds;
        }

        if grid.is_pallet_active(target) {
            grid.break_pallet(target);
            return match agent.role {
                Role::Prey => {
                    agent.position = target;
                    MoveOutcome::PassedPallet
                }
                Role::Hunter => MoveOutcome::BrokePallet,
            };
        }

        if grid.is_wall(target) {
            return MoveOutcome::Blocked;
        }

        agent.position = target;
        MoveOutcome::Moved
    }

    pub fn check_collision(a: &AgentState, b: &AgentState) -> bool {
        a.position == b.position
    }

    /// Manhattan distance, ignoring obstacles
    pub fn distance(a: &AgentState, b: &AgentState) -> u32 {
        manhattan(a.position, b.position)
    }

    /// Weighted shortest-path cost from `start` to `end` (Dijkstra)
    ///
    /// Recomputed from the live grid on every call since pallets break mid-tick.
    /// Returns [`UNREACHABLE`] when `end` cannot be reached.
    pub fn real_path_distance(&self, grid: &GridWorld, start: Pos, end: Pos) -> u32 {
        if start == end {
            return 0;
        }

        let mut best = HashMap::from([(start, 0u32)]);
        let mut heap = BinaryHeap::from([Reverse((0u32, start))]);

        while let Some(Reverse((cost, pos))) = heap.pop() {
            if pos == end {
                return cost;
            }
            if cost > best.get(&pos).copied().unwrap_or(u32::MAX) {
                continue;
            }

            for delta in NEIGHBORS_4 {
                let next = offset(pos, delta);
                if !grid.is_free(next) {
                    continue;
                }
                let weight = if grid.is_pallet_active(next) {
                    self.costs.pallet
                } else {
                    self.costs.free
                };
                let next_cost = cost + weight;
                if next_cost < best.get(&next).copied().unwrap_or(u32::MAX) {
                    best.insert(next, next_cost);
                    heap.push(Reverse((next_cost, next)));
                }
            }
        }

        warn!("no path from {start:?} to {end:?}, grid connectivity is broken");
        UNREACHABLE
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn hunter(pos: Pos) -> AgentState {
        AgentState::new(Role::Hunter, pos)
    }

    fn prey(pos: Pos) -> AgentState {
        AgentState::new(Role::Prey, pos)
    }

    #[test]
    fn wall_bump_leaves_position() {
        let step = WorldStep::new(PathCosts::weighted());
        let mut grid = GridWorld::new(5, 5, 0).with_walls([(2, 3)]);
        let mut agent = hunter((2, 2));

        let outcome = step.move_agent(&mut grid, &mut agent, Some(Action::Right));
        assert_eq!(outcome, MoveOutcome::Blocked);
        assert!(!outcome.moved() && outcome.bumped());
        assert_eq!(agent.position, (2, 2), "position unchanged");
    }

    #[test]
    fn out_of_bounds_is_a_bump() {
        let step = WorldStep::new(PathCosts::weighted());
        let mut grid = GridWorld::new(5, 5, 0);
        let mut agent = prey((0, 0));

        let outcome = step.move_agent(&mut grid, &mut agent, Some(Action::Up));
        assert_eq!(outcome, MoveOutcome::OutOfBounds);
        assert!(!outcome.moved() && outcome.bumped());
        assert_eq!(agent.position, (0, 0));
    }

    #[test]
    fn hunter_breaks_pallet_without_moving() {
        let step = WorldStep::new(PathCosts::weighted());
        let mut grid = GridWorld::new(5, 5, 0).with_pallets([(1, 2)]);
        let mut agent = hunter((1, 1));

        let outcome = step.move_agent(&mut grid, &mut agent, Some(Action::Right));
        assert_eq!(outcome, MoveOutcome::BrokePallet);
        assert!(!outcome.moved() && outcome.bumped() && outcome.changed_grid());
        assert_eq!(agent.position, (1, 1), "hunter stays put");
        assert!(!grid.is_pallet_active((1, 2)), "pallet broken");

        let outcome = step.move_agent(&mut grid, &mut agent, Some(Action::Right));
        assert_eq!(outcome, MoveOutcome::Moved, "broken pallet cell is free");
        assert_eq!(agent.position, (1, 2));
    }

    #[test]
    fn prey_passes_through_pallet() {
        let step = WorldStep::new(PathCosts::weighted());
        let mut grid = GridWorld::new(5, 5, 0).with_pallets([(2, 1)]);
        let mut agent = prey((1, 1));

        let outcome = step.move_agent(&mut grid, &mut agent, Some(Action::Down));
        assert_eq!(outcome, MoveOutcome::PassedPallet);
        assert!(outcome.moved() && outcome.bumped());
        assert_eq!(agent.position, (2, 1), "prey relocated");
        assert!(!grid.is_pallet_active((2, 1)), "pallet deactivated");
    }

    #[test]
    fn free_move_and_invalid_action() {
        let step = WorldStep::new(PathCosts::weighted());
        let mut grid = GridWorld::new(5, 5, 0);
        let mut agent = hunter((2, 2));

        let outcome = step.move_agent(&mut grid, &mut agent, Some(Action::Left));
        assert_eq!(outcome, MoveOutcome::Moved);
        assert!(outcome.moved() && !outcome.bumped());
        assert_eq!(agent.position, (2, 1));

        let outcome = step.move_agent(&mut grid, &mut agent, None);
        assert_eq!(outcome, MoveOutcome::Invalid);
        assert!(!outcome.moved() && !outcome.bumped());
        assert_eq!(agent.position, (2, 1));
    }

    #[test]
    fn adjacent_move_collides() {
        let step = WorldStep::new(PathCosts::weighted());
        let mut grid = GridWorld::new(5, 5, 0);
        let mut h = hunter((0, 0));
        let p = prey((0, 1));

        step.move_agent(&mut grid, &mut h, Some(Action::Right));
        assert!(WorldStep::check_collision(&h, &p));
    }

    #[test]
    fn path_distance_properties() {
        let step = WorldStep::new(PathCosts::weighted());
        let mut grid = GridWorld::new(9, 9, 11);
        grid.generate_random_layout(20, 6, &HashSet::new());

        let free = (0..9)
            .flat_map(|r| (0..9).map(move |c| (r, c)))
            .filter(|&p| grid.is_free(p))
            .collect::<Vec<_>>();

        for &a in &free {
            assert_eq!(step.real_path_distance(&grid, a, a), 0, "zero to self");
        }
        for &a in free.iter().step_by(3) {
            for &b in free.iter().step_by(5) {
                let real = step.real_path_distance(&grid, a, b);
                assert_ne!(real, UNREACHABLE, "{a:?} -> {b:?} must be reachable");
                assert!(real >= manhattan(a, b), "manhattan is a lower bound");
            }
        }
    }

    #[test]
    fn pallets_cost_double_when_weighted() {
        let grid = GridWorld::new(3, 1, 0).with_pallets([(0, 1)]);
        assert_eq!(
            WorldStep::new(PathCosts::weighted()).real_path_distance(&grid, (0, 0), (0, 2)),
            3
        );
        assert_eq!(
            WorldStep::new(PathCosts::uniform()).real_path_distance(&grid, (0, 0), (0, 2)),
            2
        );
    }

    #[test]
    fn path_detours_around_walls() {
        let grid = GridWorld::new(3, 3, 0).with_walls([(0, 1), (1, 1)]);
        let step = WorldStep::new(PathCosts::weighted());
        assert_eq!(step.real_path_distance(&grid, (0, 0), (0, 2)), 6);
    }

    #[test]
    fn sealed_cell_is_unreachable() {
        let grid = GridWorld::new(3, 3, 0).with_walls([(0, 1), (1, 0), (1, 1)]);
        let step = WorldStep::new(PathCosts::weighted());
        assert_eq!(step.real_path_distance(&grid, (0, 0), (2, 2)), UNREACHABLE);
    }
}
