pub mod dqn;
mod model;

pub use dqn::{Trainer, TrainerConfig};
pub use model::{QNet, QNetConfig};
