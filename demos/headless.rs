//! Run the simulation without a renderer until a number of episodes have finished
//!
//! ```sh
//! RUST_LOG=info cargo run --release --example headless -- 200
//! ```

use std::{thread, time::Duration};

use pursuit::{
    env::{PathCosts, RewardConfig},
    sim::{Setup, SimConfig, Simulation, SystemClock},
    store::FileStore,
    DefaultBackend,
};

const SPEED: u32 = 100;

fn main() -> pursuit::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let episodes = std::env::args()
        .nth(1)
        .and_then(|arg| arg.parse().ok())
        .unwrap_or(20);

    let config = SimConfig::new();
    let (walls, pallets) = (config.wall_count, config.pallet_count);
    let setup = Setup::new(config, RewardConfig::tuned(), PathCosts::weighted());
    let mut sim = Simulation::<DefaultBackend, _, _>::new(
        setup,
        SystemClock::new(),
        FileStore::new("."),
        Default::default(),
    )?;

    let target = sim.metrics().total_episodes + episodes;
    while sim.metrics().total_episodes < target {
        sim.update(SPEED, false, walls, pallets);
        thread::sleep(Duration::from_millis(1));
    }
    sim.save_checkpoints();

    let metrics = sim.metrics();
    println!(
        "{} episodes, hunter win rate {:.1}%, mean length {:.1} steps",
        metrics.total_episodes,
        metrics.hunter_win_rate() * 100.0,
        metrics.mean_steps().unwrap_or(0.0),
    );
    for line in sim.log().lines() {
        println!("  {line}");
    }
    Ok(())
}
