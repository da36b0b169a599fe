//! Peer registry (spec.md §4.5): tracks online/offline state for mapped
//! peers and holds the bounded table of unmapped nodes waiting to be
//! provisioned.

use aquamesh_wire::{NodeKind, PeerId};
use std::collections::HashMap;

/// Everything the core tracks about one mapped (provisioned) peer.
#[derive(Debug, Clone)]
pub struct PeerState {
    pub node_kind: NodeKind,
    pub tank_id: u8,
    pub last_rx_ms: u64,
    pub last_rx_seq: Option<u8>,
    pub out_seq: u8,
    pub online: bool,
    pub reassembly: Option<crate::reassembly::ReassemblySlot>,
}

impl PeerState {
    fn new(node_kind: NodeKind, tank_id: u8, now_ms: u64) -> Self {
        PeerState {
            node_kind,
            tank_id,
            last_rx_ms: now_ms,
            last_rx_seq: None,
            out_seq: 0,
            online: true,
            reassembly: None,
        }
    }
}

/// A node that has announced itself but is not yet provisioned
/// (spec.md §3/§4.5 — capped FIFO table, oldest entry evicted on overflow).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnmappedEntry {
    pub peer: PeerId,
    pub node_kind: NodeKind,
    pub firmware_version: u8,
    pub capabilities: u8,
    pub first_seen_ms: u64,
    pub last_seen_ms: u64,
    pub announce_count: u32,
}

/// Table of unmapped peers, capped at `capacity` entries.
#[derive(Debug)]
pub struct UnmappedTable {
    entries: Vec<UnmappedEntry>,
    order: Vec<PeerId>,
    capacity: usize,
}

impl UnmappedTable {
    pub fn new(capacity: usize) -> Self {
        UnmappedTable {
            entries: Vec::with_capacity(capacity),
            order: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Record (or refresh) an Announce from an unmapped peer. Returns
    /// `true` if this is the peer's first appearance in the table.
    pub fn observe(
        &mut self,
        peer: PeerId,
        node_kind: NodeKind,
        firmware_version: u8,
        capabilities: u8,
        now_ms: u64,
    ) -> bool {
        if let Some(existing) = self.entries.iter_mut().find(|e| e.peer == peer) {
            existing.last_seen_ms = now_ms;
            existing.node_kind = node_kind;
            existing.firmware_version = firmware_version;
            existing.capabilities = capabilities;
            existing.announce_count += 1;
            return false;
        }
        if self.entries.len() >= self.capacity {
            let oldest = self.order.remove(0);
            self.entries.retain(|e| e.peer != oldest);
        }
        self.entries.push(UnmappedEntry {
            peer,
            node_kind,
            firmware_version,
            capabilities,
            first_seen_ms: now_ms,
            last_seen_ms: now_ms,
            announce_count: 1,
        });
        self.order.push(peer);
        true
    }

    /// The entry for `peer`, if it's currently unmapped.
    pub fn get(&self, peer: PeerId) -> Option<&UnmappedEntry> {
        self.entries.iter().find(|e| e.peer == peer)
    }

    pub fn remove(&mut self, peer: PeerId) {
        self.entries.retain(|e| e.peer != peer);
        self.order.retain(|p| *p != peer);
    }

    pub fn entries(&self) -> &[UnmappedEntry] {
        &self.entries
    }
}

/// Registry of mapped peers, keyed by radio address.
#[derive(Debug, Default)]
pub struct PeerRegistry {
    peers: HashMap<PeerId, PeerState>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        PeerRegistry::default()
    }

    /// Provision a peer: known from here on regardless of Announce/Config
    /// traffic. Re-provisioning an already-known peer refreshes its kind
    /// and tank assignment but preserves sequence/online bookkeeping.
    pub fn register(&mut self, peer: PeerId, node_kind: NodeKind, tank_id: u8, now_ms: u64) {
        match self.peers.get_mut(&peer) {
            Some(existing) => {
                existing.node_kind = node_kind;
                existing.tank_id = tank_id;
            }
            None => {
                self.peers.insert(peer, PeerState::new(node_kind, tank_id, now_ms));
            }
        }
    }

    pub fn deregister(&mut self, peer: PeerId) -> Option<PeerState> {
        self.peers.remove(&peer)
    }

    pub fn get(&self, peer: PeerId) -> Option<&PeerState> {
        self.peers.get(&peer)
    }

    pub fn get_mut(&mut self, peer: PeerId) -> Option<&mut PeerState> {
        self.peers.get_mut(&peer)
    }

    pub fn is_mapped(&self, peer: PeerId) -> bool {
        self.peers.contains_key(&peer)
    }

    pub fn is_online(&self, peer: PeerId) -> bool {
        self.peers.get(&peer).is_some_and(|p| p.online)
    }

    /// Record a fresh, successfully-decoded frame from `peer`, marking it
    /// online if it had lapsed.
    ///
    /// Returns `true` if this transitions the peer from offline to online.
    pub fn on_rx(&mut self, peer: PeerId, now_ms: u64) -> bool {
        let Some(state) = self.peers.get_mut(&peer) else {
            return false;
        };
        state.last_rx_ms = now_ms;
        let was_offline = !state.online;
        state.online = true;
        was_offline
    }

    /// Sweep all mapped peers for heartbeat timeout, returning the peers
    /// that just transitioned online -> offline.
    pub fn sweep(&mut self, now_ms: u64, timeout_ms: u64) -> Vec<PeerId> {
        let mut newly_offline = Vec::new();
        for (peer, state) in &mut self.peers {
            if state.online && now_ms.saturating_sub(state.last_rx_ms) >= timeout_ms {
                state.online = false;
                newly_offline.push(*peer);
            }
        }
        newly_offline
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PeerId, &PeerState)> {
        self.peers.iter()
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}
