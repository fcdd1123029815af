use polygrain::sim::{
    automaton::Automaton,
    bootstrap::run_local,
    comm::fabric::Fabric,
    config::{RankConfig, SimConfig},
    neighbors::Neighborhood,
};

fn solo_config(method: Neighborhood, size: (u32, u32, u32), max_seeds: u32) -> RankConfig {
    RankConfig::builder()
        .periodic(false)
        .method(method)
        .x_size(size.0)
        .y_size(size.1)
        .z_size(size.2)
        .seed_count(0)
        .seed_counter_start(0)
        .max_seeds(max_seeds)
        .mc_iterations(0)
        .mc_kt(0.6)
        .build()
}

/// Total disagreement count over the owned slab.
fn boundary_energy(automaton: &Automaton) -> u64 {
    let lattice = automaton.lattice();
    let slab = automaton.slab();
    let (_, y_size, z_size) = lattice.dims();
    let mut energy = 0u64;
    for x in slab.x_begin()..slab.x_end() {
        for y in 0..y_size {
            for z in 0..z_size {
                let state = lattice.state_at(x, y, z);
                for &(nx, ny, nz) in lattice.cell(x, y, z).neighbors() {
                    if lattice.state_at(nx, ny, nz) != state {
                        energy += 1;
                    }
                }
            }
        }
    }
    energy
}

#[tokio::test]
async fn one_seed_claims_a_whole_small_lattice() {
    let mut endpoints = Fabric::new(1);
    let config = solo_config(Neighborhood::VonNeumann, (3, 3, 3), 1);
    let mut automaton = Automaton::new(&config, endpoints.remove(0)).unwrap();
    automaton.place_seed(1, 1, 1, 1);
    automaton.generate_structure().await.unwrap();
    let board = automaton.assemble_board().await.unwrap().unwrap();
    assert_eq!(board.dims(), (3, 3, 3));
    assert_eq!(board.cells().len(), 27);
    assert!(board.cells().iter().all(|&label| label == 1));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn two_ranks_meet_at_the_slab_boundary() {
    let mut workers = Vec::new();
    for link in Fabric::new(2) {
        workers.push(tokio::spawn(async move {
            let rank = link.rank();
            let config = RankConfig::builder()
                .periodic(false)
                .method(Neighborhood::VonNeumann)
                .x_size(2)
                .y_size(1)
                .z_size(1)
                .seed_count(0)
                .seed_counter_start(rank as u32)
                .max_seeds(2)
                .mc_iterations(0)
                .mc_kt(0.6)
                .build();
            let mut automaton = Automaton::new(&config, link).unwrap();
            if rank == 0 {
                // first rank owns local rows [0, 2)
                automaton.place_seed(0, 0, 0, 1);
            } else {
                // last rank owns local rows [1, 3)
                automaton.place_seed(2, 0, 0, 2);
            }
            automaton.generate_structure().await.unwrap();

            // after convergence each ghost row mirrors the neighbor's
            // true owned boundary value
            let slab = *automaton.slab();
            if rank == 0 {
                let ghost_x = slab.right_ghost_x().unwrap();
                assert_eq!(automaton.lattice().state_at(ghost_x, 0, 0), 2);
            } else {
                let ghost_x = slab.left_ghost_x().unwrap();
                assert_eq!(automaton.lattice().state_at(ghost_x, 0, 0), 1);
            }
            automaton.assemble_board().await.unwrap()
        }));
    }
    let mut board = None;
    for worker in workers {
        if let Some(assembled) = worker.await.unwrap() {
            board = Some(assembled);
        }
    }
    assert_eq!(board.unwrap().cells(), &[1, 1, 2, 2]);
}

#[tokio::test]
async fn zero_relaxation_budget_changes_nothing() {
    let mut endpoints = Fabric::new(1);
    let config = solo_config(Neighborhood::Moore, (4, 4, 4), 2);
    let mut automaton = Automaton::new(&config, endpoints.remove(0)).unwrap();
    automaton.place_seed(0, 0, 0, 1);
    automaton.place_seed(3, 3, 3, 2);
    automaton.generate_structure().await.unwrap();
    let grown = automaton.owned_labels();
    automaton.relax().unwrap();
    assert_eq!(automaton.owned_labels(), grown);
}

#[tokio::test]
async fn relaxation_never_raises_the_boundary_energy() {
    let mut endpoints = Fabric::new(1);
    let mut config = solo_config(Neighborhood::Moore, (5, 5, 5), 3);
    config.mc_iterations = 4;
    let mut automaton = Automaton::new(&config, endpoints.remove(0)).unwrap();
    automaton.place_seed(0, 0, 0, 1);
    automaton.place_seed(4, 4, 0, 2);
    automaton.place_seed(2, 2, 4, 3);
    automaton.generate_structure().await.unwrap();
    let before = boundary_energy(&automaton);
    automaton.relax().unwrap();
    let after = boundary_energy(&automaton);
    assert!(after <= before, "energy went from {before} to {after}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn growth_fills_every_cell_across_ranks() {
    let config = SimConfig {
        periodic: false,
        method: Neighborhood::Moore,
        x_size: 8,
        y_size: 4,
        z_size: 4,
        random_seeds: 5,
        mc_iterations: 2,
        mc_kt: 0.6,
    };
    let board = run_local(config, 3).await.unwrap();
    assert_eq!(board.dims(), (8, 4, 4));
    assert!(board
        .cells()
        .iter()
        .all(|&label| label >= 1 && label <= 5));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn periodic_topology_links_the_outer_ranks() {
    let config = SimConfig {
        periodic: true,
        method: Neighborhood::Moore,
        x_size: 6,
        y_size: 3,
        z_size: 3,
        random_seeds: 4,
        mc_iterations: 1,
        mc_kt: 0.6,
    };
    let board = run_local(config, 2).await.unwrap();
    assert_eq!(board.dims(), (6, 3, 3));
    assert!(board
        .cells()
        .iter()
        .all(|&label| label >= 1 && label <= 4));
}

#[tokio::test]
async fn the_single_worker_case_subsumes_the_serial_variant() {
    let config = SimConfig {
        periodic: false,
        method: Neighborhood::VonNeumann,
        x_size: 6,
        y_size: 2,
        z_size: 2,
        random_seeds: 3,
        mc_iterations: 0,
        mc_kt: 0.6,
    };
    let board = run_local(config, 1).await.unwrap();
    assert_eq!(board.dims(), (6, 2, 2));
    assert!(board.cells().iter().all(|&label| label >= 1 && label <= 3));
}
