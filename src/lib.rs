/// Runners that perceive, act and learn for each role
pub mod agent;

/// Value estimator and the DQN trainer
pub mod algo;

/// Implementations of strategies for time-decaying hyperparameters
pub mod decay;

/// Data structures
pub mod ds;

/// Grid world, movement rules and reward shaping
pub mod env;

/// Exploration policies
pub mod exploration;

/// Experience replay
pub mod memory;

/// Episode orchestration
pub mod sim;

/// Persistence for checkpoints and statistics
pub mod store;

mod error;
mod util;

pub use error::{Error, Result};

/// Backend used when nothing else is specified
pub type DefaultBackend = burn::backend::Autodiff<burn::backend::NdArray>;
