//! Hub-side event handling (spec.md §4.7).
//!
//! The hub tracks many node peers in a [`PeerRegistry`] and a bounded
//! [`UnmappedTable`] of not-yet-provisioned nodes. Dispatch here is pure:
//! it updates registry/unmapped state and fires user callbacks, and returns
//! what (if anything) needs to go back out over the radio — `Core` performs
//! the actual send so this module never touches a `Radio`.

use crate::callbacks::{Callbacks, HeartbeatEvent, StatusEvent};
use crate::registry::{PeerRegistry, UnmappedTable};
use crate::stats::AtomicStatistics;
use aquamesh_wire::{ack_codes, Message, PeerId};

/// What the hub wants to send in response to a just-processed frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HubAction {
    None,
    SendAck { dest: PeerId, tank_id: u8, ack_code: u8 },
}

/// Dispatch one decoded, already-deduplicated frame from `from`.
pub fn handle_frame(
    from: PeerId,
    msg: &Message,
    now_ms: u64,
    registry: &mut PeerRegistry,
    unmapped: &mut UnmappedTable,
    stats: &AtomicStatistics,
    callbacks: &mut Callbacks,
) -> HubAction {
    let header = msg.header();
    let was_offline_to_online = registry.on_rx(from, now_ms);
    if was_offline_to_online {
        callbacks.fire_peer_online(from);
    }

    match msg {
        Message::Announce(_, p) => {
            if registry.is_mapped(from) {
                callbacks.fire_announce(from, header.node_kind);
                return HubAction::SendAck {
                    dest: from,
                    tank_id: header.tank_id,
                    ack_code: ack_codes::ACCEPTED_KNOWN,
                };
            }
            // A non-zero tank_id on an Announce from an address the hub
            // doesn't recognize means the node kept its provisioning across
            // a reboot: re-register it directly instead of parking it in
            // the pending table again.
            if header.tank_id != 0 {
                registry.register(from, header.node_kind, header.tank_id, now_ms);
                unmapped.remove(from);
                callbacks.fire_announce(from, header.node_kind);
                return HubAction::SendAck {
                    dest: from,
                    tank_id: header.tank_id,
                    ack_code: ack_codes::ACCEPTED_KNOWN,
                };
            }
            if unmapped.observe(from, header.node_kind, p.firmware_version, p.capabilities, now_ms) {
                callbacks.fire_unmapped_discovered(from, header.node_kind);
            }
            callbacks.fire_announce(from, header.node_kind);
            HubAction::SendAck {
                dest: from,
                tank_id: 0,
                ack_code: ack_codes::ACCEPTED_PENDING,
            }
        }
        Message::Heartbeat(_, p) => {
            callbacks.fire_heartbeat(HeartbeatEvent {
                from,
                health: p.health,
                uptime_minutes: p.uptime_minutes,
            });
            HubAction::None
        }
        Message::Status(_, p) => {
            callbacks.fire_status(StatusEvent {
                from,
                command_id: p.command_id,
                status_code: p.status_code,
                status_data: p.status_data,
            });
            HubAction::None
        }
        Message::Ack(_, p) => {
            callbacks.fire_ack(from, p.ack_code);
            HubAction::None
        }
        // Config and Command both flow hub -> node; receiving either at the
        // hub is a protocol violation from a misbehaving or spoofed peer.
        Message::Config(..) | Message::Command(..) => {
            stats.dropped_on_intake();
            HubAction::None
        }
    }
}

/// Sweep the registry for stale peers, firing `on_peer_offline` for each.
pub fn sweep_offline(
    registry: &mut PeerRegistry,
    now_ms: u64,
    heartbeat_timeout_ms: u64,
    callbacks: &mut Callbacks,
) {
    for peer in registry.sweep(now_ms, heartbeat_timeout_ms) {
        callbacks.fire_peer_offline(peer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aquamesh_wire::{Header, HeartbeatPayload, MessageKind, NodeKind};

    fn heartbeat(tank_id: u8, node_kind: NodeKind) -> Message {
        Message::Heartbeat(
            Header {
                kind: MessageKind::Heartbeat,
                tank_id,
                node_kind,
                timestamp_ms: 0,
                sequence: 0,
            },
            HeartbeatPayload {
                health: 90,
                uptime_minutes: 10,
            },
        )
    }

    fn announce(tank_id: u8, node_kind: NodeKind) -> Message {
        Message::Announce(
            Header {
                kind: MessageKind::Announce,
                tank_id,
                node_kind,
                timestamp_ms: 0,
                sequence: 0,
            },
            aquamesh_wire::AnnouncePayload {
                firmware_version: 1,
                capabilities: 0,
                reserved: [0; 16],
            },
        )
    }

    #[test]
    fn fresh_announce_with_no_tank_goes_to_unmapped_table() {
        let mut registry = PeerRegistry::new();
        let mut unmapped = UnmappedTable::new(8);
        let stats = AtomicStatistics::default();
        let mut callbacks = Callbacks::default();
        let action = handle_frame(
            PeerId([1; 6]),
            &announce(0, NodeKind::Light),
            0,
            &mut registry,
            &mut unmapped,
            &stats,
            &mut callbacks,
        );
        assert_eq!(
            action,
            HubAction::SendAck { dest: PeerId([1; 6]), tank_id: 0, ack_code: ack_codes::ACCEPTED_PENDING }
        );
        assert!(!registry.is_mapped(PeerId([1; 6])));
        assert_eq!(unmapped.entries().len(), 1);
    }

    #[test]
    fn announce_with_existing_tank_id_reprovisions_directly() {
        let mut registry = PeerRegistry::new();
        let mut unmapped = UnmappedTable::new(8);
        let stats = AtomicStatistics::default();
        let mut callbacks = Callbacks::default();
        let action = handle_frame(
            PeerId([2; 6]),
            &announce(4, NodeKind::Doser),
            0,
            &mut registry,
            &mut unmapped,
            &stats,
            &mut callbacks,
        );
        assert_eq!(
            action,
            HubAction::SendAck { dest: PeerId([2; 6]), tank_id: 4, ack_code: ack_codes::ACCEPTED_KNOWN }
        );
        assert!(registry.is_mapped(PeerId([2; 6])));
        assert!(unmapped.entries().is_empty());
    }

    #[test]
    fn known_peer_announce_is_acked_known() {
        let mut registry = PeerRegistry::new();
        registry.register(PeerId([3; 6]), NodeKind::Sensor, 1, 0);
        let mut unmapped = UnmappedTable::new(8);
        let stats = AtomicStatistics::default();
        let mut callbacks = Callbacks::default();
        let action = handle_frame(
            PeerId([3; 6]),
            &announce(1, NodeKind::Sensor),
            0,
            &mut registry,
            &mut unmapped,
            &stats,
            &mut callbacks,
        );
        assert_eq!(
            action,
            HubAction::SendAck { dest: PeerId([3; 6]), tank_id: 1, ack_code: ack_codes::ACCEPTED_KNOWN }
        );
    }

    #[test]
    fn config_received_at_hub_is_dropped() {
        let mut registry = PeerRegistry::new();
        let mut unmapped = UnmappedTable::new(8);
        let stats = AtomicStatistics::default();
        let mut callbacks = Callbacks::default();
        let msg = Message::Config(
            Header { kind: MessageKind::Config, tank_id: 1, node_kind: NodeKind::Light, timestamp_ms: 0, sequence: 0 },
            aquamesh_wire::ConfigPayload { device_name: [0; 16], config_data: [0; 32] },
        );
        let action = handle_frame(PeerId([4; 6]), &msg, 0, &mut registry, &mut unmapped, &stats, &mut callbacks);
        assert_eq!(action, HubAction::None);
        assert_eq!(stats.snapshot().dropped_on_intake, 1);
    }

    #[test]
    fn sweep_offline_fires_callback_once() {
        let mut registry = PeerRegistry::new();
        registry.register(PeerId([5; 6]), NodeKind::Light, 1, 0);
        let mut callbacks = Callbacks::default();
        let seen = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let seen2 = seen.clone();
        callbacks.set_on_peer_offline(move |p| seen2.lock().unwrap().push(p));
        sweep_offline(&mut registry, 90_001, 90_000, &mut callbacks);
        sweep_offline(&mut registry, 200_000, 90_000, &mut callbacks);
        assert_eq!(seen.lock().unwrap().as_slice(), &[PeerId([5; 6])]);
    }
}
