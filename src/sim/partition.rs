/// This rank's x-slab of the global lattice: the padded width, the
/// half-open range of rows it owns, and the logical neighbors it
/// mirrors rows with.
///
/// Padding depends on position and topology. Periodic topologies give
/// every rank a ghost row on both sides and link the first and last
/// ranks together; in a clamped topology the outermost ranks only pad
/// the side that faces another rank. Ghost rows are exactly the
/// complement of the owned range.
#[derive(Clone, Copy, Debug)]
pub struct Slab {
    rank: usize,
    world_size: usize,
    periodic: bool,
    padded_x: usize,
    x_begin: usize,
    x_end: usize,
}

impl Slab {
    /// `owned_x` is the unpadded row count this rank owns.
    pub fn new(rank: usize, world_size: usize, owned_x: usize, periodic: bool) -> Self {
        let (padded_x, x_begin, x_end) = if periodic {
            (owned_x + 2, 1, owned_x + 1)
        } else if world_size == 1 {
            (owned_x, 0, owned_x)
        } else if rank == 0 {
            (owned_x + 1, 0, owned_x)
        } else if rank == world_size - 1 {
            (owned_x + 1, 1, owned_x + 1)
        } else {
            (owned_x + 2, 1, owned_x + 1)
        };
        Self {
            rank,
            world_size,
            periodic,
            padded_x,
            x_begin,
            x_end,
        }
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn padded_x(&self) -> usize {
        self.padded_x
    }

    pub fn x_begin(&self) -> usize {
        self.x_begin
    }

    pub fn x_end(&self) -> usize {
        self.x_end
    }

    pub fn owned_x(&self) -> usize {
        self.x_end - self.x_begin
    }

    /// The rank whose slab precedes this one, if any. At world size 1
    /// a periodic rank is its own neighbor on both sides.
    pub fn left_neighbor(&self) -> Option<usize> {
        if self.periodic {
            Some((self.rank + self.world_size - 1) % self.world_size)
        } else if self.rank > 0 {
            Some(self.rank - 1)
        } else {
            None
        }
    }

    /// The rank whose slab follows this one, if any.
    pub fn right_neighbor(&self) -> Option<usize> {
        if self.periodic {
            Some((self.rank + 1) % self.world_size)
        } else if self.rank + 1 < self.world_size {
            Some(self.rank + 1)
        } else {
            None
        }
    }

    /// Ghost row mirroring the left neighbor's last owned row.
    pub fn left_ghost_x(&self) -> Option<usize> {
        self.left_neighbor().map(|_| self.x_begin - 1)
    }

    /// Ghost row mirroring the right neighbor's first owned row.
    pub fn right_ghost_x(&self) -> Option<usize> {
        self.right_neighbor().map(|_| self.x_end)
    }

    /// True if `x` is the owned row the left neighbor keeps a ghost
    /// copy of.
    pub fn left_sendable(&self, x: usize) -> bool {
        self.left_neighbor().is_some() && x == self.x_begin
    }

    /// True if `x` is the owned row the right neighbor keeps a ghost
    /// copy of.
    pub fn right_sendable(&self, x: usize) -> bool {
        self.right_neighbor().is_some() && x + 1 == self.x_end
    }
}
