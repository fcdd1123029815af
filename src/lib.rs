//! Grain-growth simulation over a 3D lattice, partitioned along the x
//! axis across message-passing workers.

pub mod sim;
