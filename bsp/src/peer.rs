use std::sync::{Arc, Barrier};

use parking_lot::Mutex;

use crate::TrainingMessage;

/// The inter-worker channel of one training participant.
///
/// Messages sent before [`sync`](Peer::sync) become visible to their target
/// only after the barrier, so delivery order inside a superstep carries no
/// meaning and aggregation has to be commutative.
pub trait Peer {
    fn self_index(&self) -> usize;

    fn peer_count(&self) -> usize;

    /// Queues `message` for `target`, deliverable after the next barrier.
    fn send(&self, target: usize, message: TrainingMessage);

    /// Blocks until every peer reached the same barrier.
    fn sync(&self);

    /// Takes every message delivered to this peer so far.
    fn drain_messages(&self) -> Vec<TrainingMessage>;
}

struct Mailbox {
    staged: Mutex<Vec<TrainingMessage>>,
    ready: Mutex<Vec<TrainingMessage>>,
}

struct Shared {
    barrier: Barrier,
    mailboxes: Vec<Mailbox>,
}

/// One handle of an in-process cluster: plain blocking threads over a
/// shared barrier, with two-phase publication so that nobody can stage a
/// next-round message into a mailbox that has not been flipped yet.
pub struct LocalPeer {
    index: usize,
    shared: Arc<Shared>,
}

/// Creates the peer handles of an in-process cluster.
///
/// # Arguments
/// * `workers` - The number of members meeting at each barrier.
///
/// # Returns
/// One `LocalPeer` per worker, indexed in order.
///
/// # Panics
/// If `workers` is zero.
pub fn local_cluster(workers: usize) -> Vec<LocalPeer> {
    assert!(workers > 0, "a cluster needs at least one worker");
    let shared = Arc::new(Shared {
        barrier: Barrier::new(workers),
        mailboxes: (0..workers)
            .map(|_| Mailbox {
                staged: Mutex::new(Vec::new()),
                ready: Mutex::new(Vec::new()),
            })
            .collect(),
    });
    (0..workers)
        .map(|index| LocalPeer {
            index,
            shared: Arc::clone(&shared),
        })
        .collect()
}

impl Peer for LocalPeer {
    fn self_index(&self) -> usize {
        self.index
    }

    fn peer_count(&self) -> usize {
        self.shared.mailboxes.len()
    }

    /// # Panics
    /// If `target` is not a member of the cluster.
    fn send(&self, target: usize, message: TrainingMessage) {
        self.shared.mailboxes[target].staged.lock().push(message);
    }

    fn sync(&self) {
        self.shared.barrier.wait();
        // every peer publishes its own mailbox between the two waits
        let mailbox = &self.shared.mailboxes[self.index];
        let staged = std::mem::take(&mut *mailbox.staged.lock());
        mailbox.ready.lock().extend(staged);
        self.shared.barrier.wait();
    }

    fn drain_messages(&self) -> Vec<TrainingMessage> {
        std::mem::take(&mut *self.shared.mailboxes[self.index].ready.lock())
    }
}
