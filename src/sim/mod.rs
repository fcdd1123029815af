pub mod automaton;
pub mod board;
pub mod bootstrap;
pub mod cell;
pub mod comm;
pub mod config;
pub mod error;
pub mod neighbors;
pub mod partition;

// The lattice is split into x-slabs, one per worker. Each worker runs as
// its own task and exclusively owns its slab's state machine; the only
// shared surface between slabs is the ghost rows, and those are mutated
// purely by applying messages received from the two logical neighbors.
// No locks exist anywhere in the simulation because no state is ever
// read across a partition boundary directly.

// The growth phase is synchronous: a barrier-gated border exchange at
// the top of every iteration means all workers march through the same
// iteration count, and a reduce-then-broadcast activity check on rank 0
// decides collectively when the lattice is full. The relaxation phase
// deliberately drops that rigor. Cell migrations are fired at neighbors
// as they happen and drained opportunistically, so a worker may smooth
// against a ghost value that is up to one sweep stale. That trade is
// acceptable because relaxation is a heuristic pass over an already
// complete structure, and it keeps the workers from serializing on each
// other's sweep order.
