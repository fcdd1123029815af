use std::io;

use tokio::task::JoinError;

use super::comm;

/// Simulation-level failures. Anything that would leave a worker with
/// an unusable slab is caught here before the first sweep runs;
/// transport problems bubble up from the messaging layer.
#[derive(Debug)]
pub enum Error {
    Io(io::Error),
    Comm(comm::error::Error),
    InvalidConfig(String),
    MalformedBoard(String),
    WorkerDied(JoinError),
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<comm::error::Error> for Error {
    fn from(e: comm::error::Error) -> Self {
        Self::Comm(e)
    }
}

impl From<JoinError> for Error {
    fn from(e: JoinError) -> Self {
        Self::WorkerDied(e)
    }
}
