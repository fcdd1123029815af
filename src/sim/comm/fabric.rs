use std::sync::Arc;

use hashbrown::HashMap;
use tokio::sync::{mpsc, Barrier};

use super::{error::Error, wire::Tag};

// The fabric gives a fixed group of workers the five primitives the
// engines need: fire-and-forget tagged sends, blocking receives, a
// non-blocking probe, a barrier, and (built from those) rank-0
// broadcasts. Every ordered (sender, receiver, tag) triple owns a
// dedicated unbounded channel, so FIFO-per-tag-per-sender ordering
// holds by construction and a send can never deadlock a worker.

/// Builds the endpoints for a worker group.
pub struct Fabric;

impl Fabric {
    pub fn new(world_size: usize) -> Vec<Endpoint> {
        let barrier = Arc::new(Barrier::new(world_size));
        let mut senders: Vec<HashMap<(usize, Tag), mpsc::UnboundedSender<Vec<u8>>>> =
            (0..world_size).map(|_| HashMap::new()).collect();
        let mut inboxes: Vec<HashMap<(usize, Tag), mpsc::UnboundedReceiver<Vec<u8>>>> =
            (0..world_size).map(|_| HashMap::new()).collect();
        for src in 0..world_size {
            for dst in 0..world_size {
                for tag in Tag::ALL {
                    let (tx, rx) = mpsc::unbounded_channel();
                    senders[src].insert((dst, tag), tx);
                    inboxes[dst].insert((src, tag), rx);
                }
            }
        }
        senders
            .into_iter()
            .zip(inboxes)
            .enumerate()
            .map(|(rank, (senders, inboxes))| Endpoint {
                rank,
                world_size,
                senders,
                inboxes,
                barrier: barrier.clone(),
            })
            .collect()
    }
}

/// One worker's handle into the fabric. Owned exclusively by that
/// worker's task.
pub struct Endpoint {
    rank: usize,
    world_size: usize,
    senders: HashMap<(usize, Tag), mpsc::UnboundedSender<Vec<u8>>>,
    inboxes: HashMap<(usize, Tag), mpsc::UnboundedReceiver<Vec<u8>>>,
    barrier: Arc<Barrier>,
}

impl Endpoint {
    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn world_size(&self) -> usize {
        self.world_size
    }

    /// Queues a payload for `to`. Never blocks; delivery order per
    /// (sender, tag) matches send order.
    pub fn send(&self, to: usize, tag: Tag, payload: Vec<u8>) -> Result<(), Error> {
        self.senders
            .get(&(to, tag))
            .ok_or(Error::UnknownPeer(to))?
            .send(payload)
            .map_err(|_| Error::ChannelClosed(to))
    }

    /// Waits for the next payload from `from` with the given tag.
    pub async fn recv(&mut self, from: usize, tag: Tag) -> Result<Vec<u8>, Error> {
        match self.inboxes.get_mut(&(from, tag)) {
            Some(rx) => rx.recv().await.ok_or(Error::ChannelClosed(from)),
            None => Err(Error::UnknownPeer(from)),
        }
    }

    /// Non-blocking probe: returns an already-delivered payload with
    /// the given tag from any rank, or `None` without waiting.
    pub fn try_recv(&mut self, tag: Tag) -> Option<(usize, Vec<u8>)> {
        for ((from, t), rx) in self.inboxes.iter_mut() {
            if *t != tag {
                continue;
            }
            if let Ok(payload) = rx.try_recv() {
                return Some((*from, payload));
            }
        }
        None
    }

    /// Parks until every rank in the group has arrived.
    pub async fn barrier(&self) {
        self.barrier.wait().await;
    }
}
