//! Sense-think-act-learn runners for the two roles

mod hunter;
mod prey;

pub use hunter::HunterRunner;
pub use prey::PreyRunner;

use strum::VariantArray;

use crate::{
    algo::Trainer,
    env::{Action, GridWorld, Pos, Role, World},
    error::{Error, Result},
};

/// Relative target, prey scent, four rays, efficiency, oscillation and visibility
pub const HUNTER_STATE_DIM: usize = 11;

/// Relative hunter, hunter scent, four rays, hidden and panic
pub const PREY_STATE_DIM: usize = 10;

/// Ray casts look at most this many cells ahead
const RAY_RANGE: i32 = 5;

/// What one runner did during one tick
#[derive(Debug, Clone, PartialEq)]
pub struct TickResult {
    pub role: Role,
    /// `None` if the estimator produced an index with no matching action, or if the
    /// hunter found the prey already on its cell and did not move
    pub action: Option<Action>,
    pub reward: f32,
    pub caught: bool,
    /// Path distance for the hunter, Manhattan distance for the prey
    pub distance: f32,
}

/// One adaptive agent driven by the simulation
pub trait AgentRunner {
    /// Run one sense-think-act-learn cycle against the shared world
    ///
    /// **Returns** `None` without touching anything once the episode is done
    fn tick(&mut self, world: &mut World) -> Option<TickResult>;

    /// Forget per-episode short-term memory; learned parameters are kept
    fn reset_episode_state(&mut self, world: &World);
}

/// Offset from `from` to `to`, normalized by the grid's height and width
fn relative(grid: &GridWorld, from: Pos, to: Pos) -> [f32; 2] {
    [
        (to.0 - from.0) as f32 / grid.height() as f32,
        (to.1 - from.1) as f32 / grid.width() as f32,
    ]
}

/// Normalized distance to the first obstruction in each action direction
///
/// Walls and the grid edge always obstruct; active pallets only when `pallets_block`.
fn raycasts(grid: &GridWorld, from: Pos, pallets_block: bool) -> [f32; 4] {
    let mut rays = [1.0; 4];
    for (ray, action) in rays.iter_mut().zip(Action::VARIANTS) {
        let (dr, dc) = action.delta();
        if let Some(hit) = (1..=RAY_RANGE).find(|&d| {
            let p = (from.0 + dr * d, from.1 + dc * d);
            !grid.in_bounds(p) || grid.is_wall(p) || (pallets_block && grid.is_pallet_active(p))
        }) {
            *ray = hit as f32 / RAY_RANGE as f32;
        }
    }
    rays
}

fn check_dims<B: burn::tensor::backend::AutodiffBackend>(
    trainer: &Trainer<B>,
    state_dim: usize,
) -> Result<()> {
    let config = trainer.config();
    for (expected, found) in [(state_dim, config.state_dim), (Action::COUNT, config.action_dim)] {
        if expected != found {
            return Err(Error::DimensionMismatch { expected, found });
        }
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use burn::backend::{Autodiff, NdArray};

    use crate::algo::TrainerConfig;

    use super::*;

    pub type TestBackend = Autodiff<NdArray>;

    pub fn small_trainer(state_dim: usize) -> Trainer<TestBackend> {
        let config = TrainerConfig::new(state_dim, Action::COUNT)
            .with_hidden(8)
            .with_batch_size(2)
            .with_memory_size(16);
        Trainer::new(config, Default::default()).unwrap()
    }

    #[test]
    fn rays_stop_at_edges_and_walls() {
        let grid = GridWorld::new(5, 5, 0).with_walls([(2, 4)]);
        let rays = raycasts(&grid, (0, 0), true);
        assert_eq!(rays, [0.2, 1.0, 0.2, 1.0], "edge at distance one, open beyond range");

        let rays = raycasts(&grid, (2, 2), true);
        assert_eq!(rays[3], 0.4, "wall two cells right");
    }

    #[test]
    fn pallets_only_block_when_asked() {
        let grid = GridWorld::new(5, 5, 0).with_pallets([(2, 3)]);
        assert_eq!(raycasts(&grid, (2, 2), true)[3], 0.2);
        assert_eq!(raycasts(&grid, (2, 2), false)[3], 0.6, "sees through to the edge");
    }

    #[test]
    fn relative_offset_is_normalized() {
        let grid = GridWorld::new(10, 5, 0);
        assert_eq!(relative(&grid, (1, 1), (3, 6)), [0.4, 0.5]);
    }

    #[test]
    fn trainer_dimensions_must_match() {
        assert!(check_dims(&small_trainer(11), 11).is_ok());
        assert!(matches!(
            check_dims(&small_trainer(10), 11),
            Err(Error::DimensionMismatch { expected: 11, found: 10 })
        ));
    }
}
