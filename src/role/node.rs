//! Node-side state machine (spec.md §4.7).
//!
//! A node has exactly one peer: the hub. It announces itself on boot,
//! waits for an `Ack`, then heartbeats while connected. Losing heartbeats
//! from the hub (there are none to lose — the hub doesn't heartbeat nodes;
//! rather the node's own outbound heartbeats going unanswered for too long,
//! tracked via `last_ack_ms`) drops it into `LostConnection`, from which it
//! falls back to re-announcing.

use crate::callbacks::{Callbacks, CommandEvent, ConfigEvent};
use crate::reassembly::{self, ReassemblySlot};
use crate::stats::AtomicStatistics;
use aquamesh_wire::{ack_codes, status_codes, Message, NodeKind, PeerId};

/// Connection state of a node relative to its hub (spec.md §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    AwaitingAck,
    Connected,
    LostConnection,
}

/// What the node wants to do as a result of processing a frame or a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeAction {
    None,
    SendAnnounce,
    SendHeartbeat,
    /// Report back to the hub after a `Config` (`command_id = 0`) or a
    /// completed `Command` (`command_id` echoed) (spec.md §4.7).
    SendStatus { command_id: u8, status_code: u8 },
    /// The hub's supervisory deadline elapsed with no Ack/traffic: the
    /// caller's fail-safe hook (if any) should run before falling back to
    /// `AwaitingAck`.
    EnterFailSafe,
}

/// Mutable node-role bookkeeping, owned by `Core` for the node role.
#[derive(Debug, Clone)]
pub struct Node {
    pub state: NodeState,
    /// The hub's address, learned from whoever `Ack`s our `Announce`
    /// (spec.md §4.7). `None` until the first `Ack` arrives.
    pub hub: Option<PeerId>,
    pub node_kind: NodeKind,
    pub firmware_version: u8,
    pub capabilities: u8,
    pub tank_id: u8,
    pub last_hub_rx_ms: u64,
    pub last_rx_seq: Option<u8>,
    pub last_announce_ms: u64,
    pub out_seq: u8,
    pub reassembly: Option<ReassemblySlot>,
}

impl Node {
    /// `tank_id` is the node's persisted assignment (`0` if never
    /// provisioned) — spec.md §4.7: "construct the Announce frame from
    /// persisted tank_id".
    pub fn new(tank_id: u8, node_kind: NodeKind, firmware_version: u8, capabilities: u8, now_ms: u64) -> Self {
        Node {
            state: NodeState::AwaitingAck,
            hub: None,
            node_kind,
            firmware_version,
            capabilities,
            tank_id,
            last_hub_rx_ms: now_ms,
            last_rx_seq: None,
            last_announce_ms: now_ms,
            out_seq: 0,
            reassembly: None,
        }
    }
}

/// Dispatch one decoded frame received from the hub.
///
/// `from` is the sender of this frame. Until the first `Ack`, the node
/// doesn't yet know its hub's address, so this is how it learns it.
pub fn handle_frame(
    node: &mut Node,
    from: PeerId,
    msg: &Message,
    now_ms: u64,
    max_message_bytes: usize,
    reassembly_timeout_ms: u64,
    stats: &AtomicStatistics,
    callbacks: &mut Callbacks,
) -> NodeAction {
    let was_lost = node.state != NodeState::Connected;
    node.last_hub_rx_ms = now_ms;

    match msg {
        Message::Ack(_, p) => {
            if p.ack_code == ack_codes::ACCEPTED_KNOWN {
                node.tank_id = msg.header().tank_id;
            }
            node.hub = Some(from);
            node.state = NodeState::Connected;
            callbacks.fire_ack(from, p.ack_code);
            if was_lost {
                callbacks.fire_peer_online(from);
            }
            NodeAction::None
        }
        Message::Config(_, p) => {
            node.tank_id = msg.header().tank_id;
            node.hub = Some(from);
            node.state = NodeState::Connected;
            callbacks.fire_config(ConfigEvent {
                from,
                device_name: p.device_name,
                config_data: p.config_data,
            });
            NodeAction::SendStatus { command_id: 0, status_code: status_codes::OK }
        }
        Message::Command(_, p) => {
            let result = reassembly::accept_fragment(
                &mut node.reassembly,
                p.command_id,
                p.fragment_seq,
                p.final_fragment,
                &p.payload,
                now_ms,
                reassembly_timeout_ms,
                max_message_bytes,
            );
            use reassembly::{FragmentStatus, ResetReason};
            if let Some(reason) = result.dropped_previous {
                match reason {
                    ResetReason::Timeout => stats.reassembly_timeouts(),
                    ResetReason::OutOfOrder | ResetReason::ReplacedByNewFragmentZero => {
                        stats.reassembly_errors();
                    }
                }
            }
            match result.status {
                FragmentStatus::Accepted => {
                    stats.fragments_received();
                }
                FragmentStatus::Completed => {
                    stats.fragments_received();
                    let command_id = node.reassembly.as_ref().unwrap().command_id;
                    let payload = node.reassembly.as_ref().unwrap().buffer.as_slice().to_vec();
                    reassembly::clear(&mut node.reassembly);
                    callbacks.fire_command(CommandEvent {
                        from,
                        command_id,
                        payload,
                    });
                    return NodeAction::SendStatus { command_id, status_code: status_codes::OK };
                }
                FragmentStatus::IgnoredNoActiveSlot => {
                    stats.reassembly_errors();
                }
            }
            NodeAction::None
        }
        _ => NodeAction::None,
    }
}

/// Periodic tick (spec.md §4.7): decide whether to announce, heartbeat, or
/// trip the supervisory fail-safe.
pub fn tick(
    node: &mut Node,
    now_ms: u64,
    heartbeat_interval_ms: u64,
    heartbeat_timeout_ms: u64,
    announce_rebroadcast_ms: u64,
) -> NodeAction {
    match node.state {
        NodeState::AwaitingAck => {
            if now_ms.saturating_sub(node.last_announce_ms) >= announce_rebroadcast_ms {
                node.last_announce_ms = now_ms;
                NodeAction::SendAnnounce
            } else {
                NodeAction::None
            }
        }
        NodeState::Connected => {
            if now_ms.saturating_sub(node.last_hub_rx_ms) > heartbeat_timeout_ms {
                node.state = NodeState::LostConnection;
                return NodeAction::EnterFailSafe;
            }
            NodeAction::SendHeartbeat
        }
        NodeState::LostConnection => {
            if now_ms.saturating_sub(node.last_announce_ms) >= announce_rebroadcast_ms {
                node.last_announce_ms = now_ms;
                node.state = NodeState::AwaitingAck;
                NodeAction::SendAnnounce
            } else {
                NodeAction::None
            }
        }
    }
}
