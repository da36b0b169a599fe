//! A shared in-memory "ether" standing in for the physical radio link, so
//! the demo can run one hub and several nodes in a single process with no
//! real hardware.

use aquamesh::radio::{Radio, RadioError};
use aquamesh_wire::PeerId;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct Mailboxes {
    queues: HashMap<PeerId, VecDeque<(PeerId, Vec<u8>)>>,
}

/// Shared medium: every [`InProcRadio`] writes into it, every device drains
/// its own mailbox out of it each tick.
#[derive(Default)]
pub struct Ether {
    inner: Mutex<Mailboxes>,
}

impl Ether {
    pub fn new() -> Arc<Self> {
        Arc::new(Ether::default())
    }

    pub fn register(&self, peer: PeerId) {
        self.inner.lock().unwrap().queues.entry(peer).or_default();
    }

    fn deliver(&self, from: PeerId, dest: PeerId, bytes: &[u8]) {
        let mut mailboxes = self.inner.lock().unwrap();
        if dest.is_broadcast() {
            for (peer, queue) in mailboxes.queues.iter_mut() {
                if *peer != from {
                    queue.push_back((from, bytes.to_vec()));
                }
            }
        } else if let Some(queue) = mailboxes.queues.get_mut(&dest) {
            queue.push_back((from, bytes.to_vec()));
        }
    }

    /// Pop every frame queued for `peer` since the last drain.
    pub fn drain(&self, peer: PeerId) -> Vec<(PeerId, Vec<u8>)> {
        let mut mailboxes = self.inner.lock().unwrap();
        mailboxes
            .queues
            .get_mut(&peer)
            .map(|q| q.drain(..).collect())
            .unwrap_or_default()
    }
}

/// A [`Radio`] backed by a shared [`Ether`] rather than real hardware.
pub struct InProcRadio {
    ether: Arc<Ether>,
    self_peer: PeerId,
}

impl InProcRadio {
    pub fn new(ether: Arc<Ether>, self_peer: PeerId) -> Self {
        ether.register(self_peer);
        InProcRadio { ether, self_peer }
    }
}

impl Radio for InProcRadio {
    fn send(&mut self, dest: PeerId, bytes: &[u8]) -> Result<(), RadioError> {
        self.ether.deliver(self.self_peer, dest, bytes);
        Ok(())
    }
}
