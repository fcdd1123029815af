use rand::{seq::SliceRandom, Rng};
use tracing::{debug, trace, warn};

use super::{
    board::Board,
    cell::Lattice,
    comm::{
        error::Error as CommError,
        fabric::Endpoint,
        wire::{decode_batch, decode_payload, encode_batch, encode_payload, SingleCell, Tag},
    },
    config::RankConfig,
    error::Error,
    neighbors::link_neighbors,
    partition::Slab,
};

/// One rank's share of the simulation: the padded slab, the bounds it
/// owns, and the fabric endpoint that keeps the neighboring ghost rows
/// current.
///
/// The two phases differ in how they use the endpoint. Growth batches
/// boundary updates per iteration behind a barrier; relaxation fires
/// individual migration notices the moment a boundary cell changes and
/// drains inbound notices opportunistically between cell visits.
pub struct Automaton {
    slab: Slab,
    lattice: Lattice,
    previous: Vec<i32>,
    left_border: Vec<SingleCell>,
    right_border: Vec<SingleCell>,
    max_seeds: usize,
    seed_counter: i32,
    seed_count: u32,
    mc_iterations: u32,
    link: Endpoint,
}

impl Automaton {
    pub fn new(config: &RankConfig, link: Endpoint) -> Result<Self, Error> {
        if config.x_size == 0 || config.y_size == 0 || config.z_size == 0 {
            return Err(Error::InvalidConfig(format!(
                "rank {} got a degenerate slab of {}x{}x{}",
                link.rank(),
                config.x_size,
                config.y_size,
                config.z_size
            )));
        }
        if config.seed_counter_start + config.seed_count > config.max_seeds {
            return Err(Error::InvalidConfig(format!(
                "rank {} label range {}..={} exceeds the global maximum {}",
                link.rank(),
                config.seed_counter_start + 1,
                config.seed_counter_start + config.seed_count,
                config.max_seeds
            )));
        }
        let slab = Slab::new(
            link.rank(),
            link.world_size(),
            config.x_size as usize,
            config.periodic,
        );
        let mut lattice = Lattice::new(
            slab.padded_x(),
            config.y_size as usize,
            config.z_size as usize,
        );
        link_neighbors(&mut lattice, config.method, config.periodic);
        Ok(Self {
            slab,
            previous: vec![0; lattice.len()],
            lattice,
            left_border: Vec::new(),
            right_border: Vec::new(),
            max_seeds: config.max_seeds as usize,
            seed_counter: config.seed_counter_start as i32,
            seed_count: config.seed_count,
            mc_iterations: config.mc_iterations,
            link,
        })
    }

    pub fn slab(&self) -> &Slab {
        &self.slab
    }

    pub fn lattice(&self) -> &Lattice {
        &self.lattice
    }

    /// Drops this rank's seeds on uniformly random owned cells,
    /// continuing the globally disjoint label counter handed out at
    /// bootstrap. Two seeds may land on the same cell; the later one
    /// wins and the earlier label simply never appears, as in any
    /// uniform scatter.
    pub fn scatter_seeds(&mut self) {
        let mut rng = rand::thread_rng();
        for _ in 0..self.seed_count {
            let x = rng.gen_range(self.slab.x_begin()..self.slab.x_end());
            let y = rng.gen_range(0..self.lattice.y_size());
            let z = rng.gen_range(0..self.lattice.z_size());
            self.seed_counter += 1;
            let label = self.seed_counter;
            self.place_seed(x, y, z, label);
        }
    }

    /// Places one seed at local slab coordinates. Seeds on a sendable
    /// boundary row are queued so the first border exchange publishes
    /// them to the neighbor's ghost row.
    pub fn place_seed(&mut self, x: usize, y: usize, z: usize, label: i32) {
        debug_assert!(label > 0 && label as usize <= self.max_seeds);
        self.lattice.set_state(x, y, z, label);
        if self.slab.left_sendable(x) {
            self.left_border.push(SingleCell {
                y: y as i32,
                z: z as i32,
                state: label,
            });
        }
        if self.slab.right_sendable(x) {
            self.right_border.push(SingleCell {
                y: y as i32,
                z: z as i32,
                state: label,
            });
        }
    }

    /// Runs the growth phase to its fixed point. Every rank keeps
    /// iterating until no rank saw an unoccupied owned cell, so the
    /// whole group leaves this loop on the same iteration.
    pub async fn generate_structure(&mut self) -> Result<(), Error> {
        let mut iterations = 0u32;
        loop {
            self.exchange_borders().await?;
            self.lattice.snapshot_into(&mut self.previous);
            let active = self.grow_sweep();
            iterations += 1;
            if !self.any_rank_active(active).await? {
                break;
            }
        }
        debug!("rank {} growth converged after {} iterations", self.link.rank(), iterations);
        Ok(())
    }

    /// Barrier-gated exchange of the accumulated boundary updates with
    /// both slab neighbors. Received records land in the matching ghost
    /// row; both buffers are cleared once sent.
    async fn exchange_borders(&mut self) -> Result<(), Error> {
        self.link.barrier().await;
        if let Some(left) = self.slab.left_neighbor() {
            self.link
                .send(left, Tag::LeftBorder, encode_batch(&self.left_border))?;
        }
        if let Some(right) = self.slab.right_neighbor() {
            self.link
                .send(right, Tag::RightBorder, encode_batch(&self.right_border))?;
        }
        self.left_border.clear();
        self.right_border.clear();

        // the left peer's right boundary mirrors into our left ghost
        // row, and vice versa
        if let (Some(left), Some(ghost_x)) = (self.slab.left_neighbor(), self.slab.left_ghost_x()) {
            let payload = self.link.recv(left, Tag::RightBorder).await?;
            for cell in decode_batch(&payload)? {
                self.lattice
                    .set_state(ghost_x, cell.y as usize, cell.z as usize, cell.state);
            }
        }
        if let (Some(right), Some(ghost_x)) =
            (self.slab.right_neighbor(), self.slab.right_ghost_x())
        {
            let payload = self.link.recv(right, Tag::LeftBorder).await?;
            for cell in decode_batch(&payload)? {
                self.lattice
                    .set_state(ghost_x, cell.y as usize, cell.z as usize, cell.state);
            }
        }
        Ok(())
    }

    /// One majority-vote pass over the owned slab against the previous
    /// snapshot. Returns true if any owned cell was still unoccupied
    /// when examined, whether or not it could be labeled — the phase
    /// only ends once the slab is full, not once changes stop.
    fn grow_sweep(&mut self) -> bool {
        let mut active = false;
        let mut tally = vec![0u32; self.max_seeds + 1];
        let (_, y_size, z_size) = self.lattice.dims();
        for x in self.slab.x_begin()..self.slab.x_end() {
            for y in 0..y_size {
                for z in 0..z_size {
                    if self.lattice.state_at(x, y, z) != 0 {
                        continue;
                    }
                    active = true;
                    let winner = self.majority_vote(x, y, z, &mut tally);
                    if winner == 0 {
                        continue;
                    }
                    self.lattice.set_state(x, y, z, winner);
                    if self.slab.left_sendable(x) {
                        self.left_border.push(SingleCell {
                            y: y as i32,
                            z: z as i32,
                            state: winner,
                        });
                    }
                    if self.slab.right_sendable(x) {
                        self.right_border.push(SingleCell {
                            y: y as i32,
                            z: z as i32,
                            state: winner,
                        });
                    }
                }
            }
        }
        active
    }

    /// Tallies the previous-step labels around (x, y, z). The first
    /// maximum wins, so ties go to the lowest label; 0 means every
    /// neighbor was unoccupied.
    fn majority_vote(&self, x: usize, y: usize, z: usize, tally: &mut [u32]) -> i32 {
        tally.fill(0);
        for &(nx, ny, nz) in self.lattice.cell(x, y, z).neighbors() {
            let state = self.previous[self.lattice.index(nx, ny, nz)];
            if state > 0 {
                tally[state as usize] += 1;
            }
        }
        let mut winner = 0usize;
        let mut best = 0u32;
        for (label, &count) in tally.iter().enumerate() {
            if count > best {
                winner = label;
                best = count;
            }
        }
        winner as i32
    }

    /// Distributed termination check: every rank's activity flag is
    /// OR-combined on rank 0 and the result pushed back out. Two hops
    /// instead of an all-reduce keeps the primitive set down to plain
    /// sends and receives.
    async fn any_rank_active(&mut self, local: bool) -> Result<bool, Error> {
        if self.link.world_size() == 1 {
            return Ok(local);
        }
        if self.link.rank() == 0 {
            let mut combined = local;
            for peer in 1..self.link.world_size() {
                combined |= read_flag(&self.link.recv(peer, Tag::Working).await?)?;
            }
            for peer in 1..self.link.world_size() {
                self.link.send(peer, Tag::Working, vec![combined as u8])?;
            }
            Ok(combined)
        } else {
            self.link.send(0, Tag::Working, vec![local as u8])?;
            Ok(read_flag(&self.link.recv(0, Tag::Working).await?)?)
        }
    }

    /// Runs the configured number of relaxation sweeps. Unlike growth
    /// there is no convergence detection; the budget is always spent.
    pub fn relax(&mut self) -> Result<(), Error> {
        for sweep in 0..self.mc_iterations {
            self.relax_sweep()?;
            trace!("rank {} finished relaxation sweep {}", self.link.rank(), sweep);
        }
        Ok(())
    }

    /// One Potts pass: visit every owned cell in a fresh random order
    /// and take the first candidate label that does not raise the
    /// cell's boundary energy.
    fn relax_sweep(&mut self) -> Result<(), Error> {
        let (_, y_size, z_size) = self.lattice.dims();
        let mut order = Vec::with_capacity(self.slab.owned_x() * y_size * z_size);
        for x in self.slab.x_begin()..self.slab.x_end() {
            for y in 0..y_size {
                for z in 0..z_size {
                    order.push((x, y, z));
                }
            }
        }
        order.shuffle(&mut rand::thread_rng());

        for (x, y, z) in order {
            self.absorb_migrants()?;
            let current = self.lattice.state_at(x, y, z);
            let current_energy = self.energy_as(x, y, z, current);
            for candidate in self.candidate_states(x, y, z) {
                if self.energy_as(x, y, z, candidate) <= current_energy {
                    if candidate != current {
                        self.lattice.set_state(x, y, z, candidate);
                        self.notify_migration(x, y, z, candidate)?;
                    }
                    break;
                }
            }
        }
        Ok(())
    }

    /// Distinct labels currently present around (x, y, z), in
    /// neighbor-list order.
    fn candidate_states(&self, x: usize, y: usize, z: usize) -> Vec<i32> {
        let neighbors = self.lattice.cell(x, y, z).neighbors();
        let mut candidates = Vec::with_capacity(neighbors.len());
        for &(nx, ny, nz) in neighbors {
            let state = self.lattice.state_at(nx, ny, nz);
            if !candidates.contains(&state) {
                candidates.push(state);
            }
        }
        candidates
    }

    /// How many neighbors would disagree with `state` at (x, y, z).
    fn energy_as(&self, x: usize, y: usize, z: usize, state: i32) -> u32 {
        let mut energy = 0;
        for &(nx, ny, nz) in self.lattice.cell(x, y, z).neighbors() {
            if self.lattice.state_at(nx, ny, nz) != state {
                energy += 1;
            }
        }
        energy
    }

    /// Pushes a changed boundary cell to whichever neighbor mirrors it,
    /// so that rank's ghost copy stays current without waiting for a
    /// collective step.
    fn notify_migration(&mut self, x: usize, y: usize, z: usize, state: i32) -> Result<(), Error> {
        let record = SingleCell {
            y: y as i32,
            z: z as i32,
            state,
        };
        if self.slab.left_sendable(x) {
            if let Some(left) = self.slab.left_neighbor() {
                self.link.send(left, Tag::Migrant, record.to_bytes())?;
            }
        }
        if self.slab.right_sendable(x) {
            if let Some(right) = self.slab.right_neighbor() {
                self.link.send(right, Tag::Migrant, record.to_bytes())?;
            }
        }
        Ok(())
    }

    /// Applies every migration notice that has already arrived, without
    /// waiting for more. A notice from a rank that is neither slab
    /// neighbor indicates a partition mismatch; it is reported and
    /// dropped.
    fn absorb_migrants(&mut self) -> Result<(), Error> {
        while let Some((from, payload)) = self.link.try_recv(Tag::Migrant) {
            let record = SingleCell::read_from(&payload)?;
            let ghost_x = if self.slab.left_neighbor() == Some(from) {
                self.slab.left_ghost_x()
            } else if self.slab.right_neighbor() == Some(from) {
                self.slab.right_ghost_x()
            } else {
                None
            };
            match ghost_x {
                Some(ghost_x) => self.lattice.set_state(
                    ghost_x,
                    record.y as usize,
                    record.z as usize,
                    record.state,
                ),
                None => warn!(
                    "rank {} received a migration notice from rank {}, which is not a slab neighbor",
                    self.link.rank(),
                    from
                ),
            }
        }
        Ok(())
    }

    /// Owned labels with the ghost rows stripped, x-major.
    pub fn owned_labels(&self) -> Vec<i32> {
        let (_, y_size, z_size) = self.lattice.dims();
        let mut labels = Vec::with_capacity(self.slab.owned_x() * y_size * z_size);
        for x in self.slab.x_begin()..self.slab.x_end() {
            for y in 0..y_size {
                for z in 0..z_size {
                    labels.push(self.lattice.state_at(x, y, z));
                }
            }
        }
        labels
    }

    /// Collects every rank's owned slab on rank 0, concatenated in rank
    /// order into the global board. Returns `None` on the other ranks.
    pub async fn assemble_board(&mut self) -> Result<Option<Board>, Error> {
        // relaxation has no collective step of its own; wait for the
        // whole group before the migrant channels start tearing down
        self.link.barrier().await;
        let labels = self.owned_labels();
        if self.link.rank() != 0 {
            self.link.send(0, Tag::Board, encode_payload(&labels)?)?;
            return Ok(None);
        }
        let (_, y_size, z_size) = self.lattice.dims();
        let mut cells = labels;
        for peer in 1..self.link.world_size() {
            let payload = self.link.recv(peer, Tag::Board).await?;
            let slab: Vec<i32> = decode_payload(&payload)?;
            cells.extend(slab);
        }
        let x_size = cells.len() / (y_size * z_size);
        Ok(Some(Board::new(x_size, y_size, z_size, cells)))
    }
}

fn read_flag(payload: &[u8]) -> Result<bool, CommError> {
    match payload {
        [flag] => Ok(*flag != 0),
        _ => Err(CommError::TruncatedRecord),
    }
}
