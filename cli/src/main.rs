use std::time::Instant;

use polygrain::sim::{bootstrap::run_local, config::SimConfig};
use tracing::info;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let mut args = std::env::args().skip(1);
    let config_path = args.next().unwrap_or_else(|| "config.txt".into());
    let world_size: usize = args
        .next()
        .map(|raw| raw.parse().expect("world size must be a positive integer"))
        .unwrap_or(1);
    let board_path = args.next().unwrap_or_else(|| "board.txt".into());

    let started = Instant::now();
    let config = SimConfig::read_from(&config_path).unwrap();
    info!(
        "read {} in {}ms: {:?}",
        config_path,
        started.elapsed().as_millis(),
        config
    );

    let started = Instant::now();
    let board = run_local(config, world_size).await.unwrap();
    info!(
        "simulated {} workers in {}ms",
        world_size,
        started.elapsed().as_millis()
    );

    let started = Instant::now();
    board.write_to(&board_path).unwrap();
    info!(
        "wrote {} in {}ms",
        board_path,
        started.elapsed().as_millis()
    );
}
