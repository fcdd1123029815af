use rand::Rng;
use tracing::debug;

use super::{
    automaton::Automaton,
    board::Board,
    comm::{
        fabric::{Endpoint, Fabric},
        wire::{decode_payload, encode_payload, Tag},
    },
    config::{RankConfig, SimConfig},
    error::Error,
};

/// Owned slab widths per rank: every rank takes `ceil(x / world)` rows
/// and the last rank absorbs the remainder. Fails if that would leave
/// the last rank without a row.
pub fn plan_slabs(global_x: usize, world_size: usize) -> Result<Vec<usize>, Error> {
    if world_size == 0 {
        return Err(Error::InvalidConfig("world size must be at least 1".into()));
    }
    if global_x == 0 {
        return Err(Error::InvalidConfig("x_size must be at least 1".into()));
    }
    let base = (global_x + world_size - 1) / world_size;
    let consumed = base * (world_size - 1);
    if consumed >= global_x {
        return Err(Error::InvalidConfig(format!(
            "cannot split {global_x} slab rows across {world_size} workers"
        )));
    }
    let mut widths = vec![base; world_size];
    widths[world_size - 1] = global_x - consumed;
    Ok(widths)
}

/// Uniformly random split of the global seed budget across ranks.
pub fn distribute_seeds(total: usize, world_size: usize) -> Vec<usize> {
    let mut counts = vec![0usize; world_size];
    let mut rng = rand::thread_rng();
    for _ in 0..total {
        counts[rng.gen_range(0..world_size)] += 1;
    }
    counts
}

/// Expands the global configuration into one record per rank. Label
/// ranges are assigned by a running prefix sum over the per-rank seed
/// counts, so no two ranks ever share a label.
pub fn rank_configs(config: &SimConfig, world_size: usize) -> Result<Vec<RankConfig>, Error> {
    config.validate()?;
    let widths = plan_slabs(config.x_size, world_size)?;
    let seeds = distribute_seeds(config.random_seeds, world_size);
    let mut configs = Vec::with_capacity(world_size);
    let mut counter = 0usize;
    for rank in 0..world_size {
        configs.push(
            RankConfig::builder()
                .periodic(config.periodic)
                .method(config.method)
                .x_size(widths[rank] as u32)
                .y_size(config.y_size as u32)
                .z_size(config.z_size as u32)
                .seed_count(seeds[rank] as u32)
                .seed_counter_start(counter as u32)
                .max_seeds(config.random_seeds as u32)
                .mc_iterations(config.mc_iterations as u32)
                .mc_kt(config.mc_kt)
                .build(),
        );
        counter += seeds[rank];
    }
    Ok(configs)
}

/// Drives one rank end to end: config scatter, seeding, growth,
/// relaxation, board gather. Rank 0 supplies the global configuration
/// and is the only rank that returns a board.
pub async fn run_rank(mut link: Endpoint, config: Option<SimConfig>) -> Result<Option<Board>, Error> {
    let rank_config = if link.rank() == 0 {
        let config = config.ok_or_else(|| {
            Error::InvalidConfig("rank 0 needs the global configuration".into())
        })?;
        let mut configs = rank_configs(&config, link.world_size())?;
        for (peer, rank_config) in configs.iter().enumerate().skip(1) {
            link.send(peer, Tag::RankConfig, encode_payload(rank_config)?)?;
        }
        configs.swap_remove(0)
    } else {
        decode_payload(&link.recv(0, Tag::RankConfig).await?)?
    };
    debug!("rank {} configured: {:?}", link.rank(), rank_config);

    let mut automaton = Automaton::new(&rank_config, link)?;
    automaton.scatter_seeds();
    automaton.generate_structure().await?;
    automaton.relax()?;
    automaton.assemble_board().await
}

/// Runs the whole simulation inside this process, one task per rank,
/// and returns the assembled board. `world_size == 1` is the
/// single-process variant of the same engine.
pub async fn run_local(config: SimConfig, world_size: usize) -> Result<Board, Error> {
    if world_size == 0 {
        return Err(Error::InvalidConfig("world size must be at least 1".into()));
    }
    let mut workers = Vec::with_capacity(world_size);
    for link in Fabric::new(world_size) {
        let config = (link.rank() == 0).then(|| config.clone());
        workers.push(tokio::spawn(run_rank(link, config)));
    }
    let mut board = None;
    for worker in futures::future::join_all(workers).await {
        if let Some(assembled) = worker?? {
            board = Some(assembled);
        }
    }
    board.ok_or_else(|| Error::InvalidConfig("rank 0 assembled no board".into()))
}
