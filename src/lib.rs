//! `aquamesh` is the wireless messaging core shared by the hub and the
//! controller nodes of an aquarium automation mesh: framing, per-peer
//! liveness tracking, fragment reassembly, and a retrying send path over a
//! caller-supplied [`Radio`].
//!
//! A process embeds exactly one [`Core`], configured at construction time
//! as either a [`Role::Hub`] (tracks many node peers) or a [`Role::Node`]
//! (tracks its one hub). Role-specific operations return
//! [`error::RoleMismatch`] if called against the other role — see
//! `DESIGN.md` for why this is a runtime check rather than a typestate
//! split.

pub mod callbacks;
pub mod clock;
pub mod config;
pub mod dedup;
pub mod error;
pub mod intake;
pub mod radio;
pub mod reassembly;
pub mod registry;
pub mod role;
pub mod send;
pub mod stats;

pub use aquamesh_wire as wire;

use aquamesh_wire::{
    decode, AckPayload, AnnouncePayload, ConfigPayload, Header, Message, MessageKind, NodeKind,
    PeerId, StatusPayload, BROADCAST,
};

use callbacks::Callbacks;
use clock::{Clock, SystemClock};
use config::{ConstructionError, CoreConfig};
use error::{ProvisionError, RoleMismatch, SendError};
use intake::IntakeQueue;
use registry::{PeerRegistry, PeerState, UnmappedEntry, UnmappedTable};
use role::node::{Node, NodeAction, NodeState};
use send::Gate;
use stats::{AtomicStatistics, Statistics};

/// Which side of the hub/node link a [`Core`] plays.
pub enum Role {
    Hub,
    /// A node doesn't need to know its hub's address up front — it
    /// broadcasts `Announce` and learns the hub's `PeerId` from whoever
    /// acks it (spec.md §4.7). `node_kind` and the persisted `tank_id`
    /// (`0` if never provisioned) describe the node's own identity.
    Node {
        tank_id: u8,
        node_kind: NodeKind,
        firmware_version: u8,
        capabilities: u8,
    },
}

enum RoleState {
    Hub {
        registry: PeerRegistry,
        unmapped: UnmappedTable,
        out_seq: u8,
    },
    Node(Node),
}

/// Outcome of a `Core::tick_node` call the embedding app should react to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeTick {
    /// Nothing to do this tick.
    Idle,
    /// An `Announce` or `Heartbeat` frame was sent (or attempted).
    Sent,
    /// The supervisory deadline elapsed; the caller's fail-safe logic (e.g.
    /// closing valves, disabling heaters) should run now.
    FailSafe,
}

/// The messaging core: radio framing, peer tracking, reassembly, and the
/// retrying send path, generic over the radio driver and (for tests) the
/// time source.
pub struct Core<R: radio::Radio, C: Clock = SystemClock> {
    radio: R,
    clock: C,
    config: CoreConfig,
    role: RoleState,
    intake: IntakeQueue,
    stats: AtomicStatistics,
    callbacks: Callbacks,
}

impl<R: radio::Radio> Core<R, SystemClock> {
    /// Construct a core with the real system clock.
    pub fn new(role: Role, radio: R, config: CoreConfig, now_ms: u64) -> Result<Self, ConstructionError> {
        Self::with_clock(role, radio, SystemClock, config, now_ms)
    }
}

impl<R: radio::Radio, C: Clock> Core<R, C> {
    /// Construct a core with an injected clock (tests use a fake one).
    pub fn with_clock(
        role: Role,
        radio: R,
        clock: C,
        config: CoreConfig,
        now_ms: u64,
    ) -> Result<Self, ConstructionError> {
        config.validate()?;
        let role_state = match role {
            Role::Hub => RoleState::Hub {
                registry: PeerRegistry::new(),
                unmapped: UnmappedTable::new(config.max_unmapped_entries),
                out_seq: 0,
            },
            Role::Node {
                tank_id,
                node_kind,
                firmware_version,
                capabilities,
            } => RoleState::Node(Node::new(tank_id, node_kind, firmware_version, capabilities, now_ms)),
        };
        Ok(Core {
            radio,
            clock,
            intake: IntakeQueue::new(config.rx_queue_capacity),
            stats: AtomicStatistics::default(),
            callbacks: Callbacks::default(),
            role: role_state,
            config,
        })
    }

    pub fn callbacks_mut(&mut self) -> &mut Callbacks {
        &mut self.callbacks
    }

    /// Direct access to the underlying radio driver, mainly so tests can
    /// inspect what a fake radio captured.
    pub fn radio_mut(&mut self) -> &mut R {
        &mut self.radio
    }

    pub fn statistics(&self) -> Statistics {
        self.stats.snapshot()
    }

    pub fn is_peer_online(&self, peer: PeerId) -> bool {
        match &self.role {
            RoleState::Hub { registry, .. } => registry.is_online(peer),
            RoleState::Node(node) => {
                node.hub == Some(peer) && node.state == NodeState::Connected
            }
        }
    }

    /// Snapshot of all mapped peers. Hub-only.
    pub fn peers(&self) -> Result<Vec<(PeerId, PeerState)>, RoleMismatch> {
        match &self.role {
            RoleState::Hub { registry, .. } => {
                Ok(registry.iter().map(|(p, s)| (*p, s.clone())).collect())
            }
            RoleState::Node(_) => Err(RoleMismatch { expected: "hub" }),
        }
    }

    /// Snapshot of not-yet-provisioned nodes. Hub-only.
    pub fn unmapped(&self) -> Result<Vec<UnmappedEntry>, RoleMismatch> {
        match &self.role {
            RoleState::Hub { unmapped, .. } => Ok(unmapped.entries().to_vec()),
            RoleState::Node(_) => Err(RoleMismatch { expected: "hub" }),
        }
    }

    /// Provision a node: send it a `Config` binding it to `tank_id` under
    /// `device_name`, retried up to `max_retries` times (spec.md §4.7).
    /// Hub-only. The node's `node_kind` is recovered from its unmapped
    /// entry (or its existing registry entry, for a re-provision) rather
    /// than asked of the caller — the hub already learned it from the
    /// node's `Announce`. On success, the peer leaves the unmapped table
    /// and becomes (or stays) a mapped `PeerState`; `on_peer_provisioned`
    /// fires. A failed send leaves state untouched so a repeated
    /// `provision` call is the caller's retry.
    pub fn provision(
        &mut self,
        peer: PeerId,
        device_name: [u8; 16],
        tank_id: u8,
        now_ms: u64,
    ) -> Result<(), ProvisionError> {
        let (node_kind, out_seq) = match &self.role {
            RoleState::Hub { registry, unmapped, out_seq } => {
                let node_kind = unmapped
                    .get(peer)
                    .map(|e| e.node_kind)
                    .or_else(|| registry.get(peer).map(|s| s.node_kind))
                    .unwrap_or(NodeKind::Unknown);
                (node_kind, *out_seq)
            }
            RoleState::Node(_) => return Err(RoleMismatch { expected: "hub" }.into()),
        };
        let header = Header {
            kind: MessageKind::Config,
            tank_id,
            node_kind: NodeKind::Hub,
            timestamp_ms: now_ms as u32,
            sequence: out_seq,
        };
        let msg = Message::Config(
            header,
            ConfigPayload { device_name, config_data: [0; 32] },
        );
        let online = self.is_peer_online(peer);
        send::send_with_retry(
            &mut self.radio,
            &self.clock,
            &self.stats,
            peer,
            online,
            Gate::Always,
            &msg,
            self.config.retry_base_delay_ms,
            self.config.max_retries,
        )?;
        let RoleState::Hub { registry, unmapped, out_seq } = &mut self.role else {
            unreachable!("checked hub role above");
        };
        *out_seq = out_seq.wrapping_add(1);
        registry.register(peer, node_kind, tank_id, now_ms);
        unmapped.remove(peer);
        self.callbacks.fire_peer_provisioned(peer);
        Ok(())
    }

    /// Remove a mapped peer entirely. Hub-only.
    pub fn deprovision(&mut self, peer: PeerId) -> Result<(), RoleMismatch> {
        match &mut self.role {
            RoleState::Hub { registry, .. } => {
                registry.deregister(peer);
                Ok(())
            }
            RoleState::Node(_) => Err(RoleMismatch { expected: "hub" }),
        }
    }

    /// Radio upcall entry point: copy a just-received datagram into the
    /// intake queue. Safe to call from a restricted interrupt context —
    /// never allocates, never blocks (spec.md §4.2/§5).
    pub fn on_receive(&self, peer: PeerId, bytes: &[u8]) {
        if self.intake.push(peer, bytes) {
            self.stats.dropped_on_intake();
        }
    }

    /// Drain the intake queue and advance per-role bookkeeping. Call this
    /// from the normal-context main loop, not from the radio upcall.
    pub fn tick(&mut self, now_ms: u64) {
        while let Some(slot) = self.intake.drain_one() {
            self.process_frame(slot.peer, slot.len as usize, &slot.buf, now_ms);
        }
        if let RoleState::Hub { registry, .. } = &mut self.role {
            role::hub::sweep_offline(registry, now_ms, self.config.heartbeat_timeout_ms, &mut self.callbacks);
        }
    }

    fn process_frame(&mut self, peer: PeerId, len: usize, buf: &[u8; aquamesh_wire::MTU], now_ms: u64) {
        let msg = match decode(&buf[..len]) {
            Ok(m) => m,
            Err(_) => {
                self.stats.dropped_on_intake();
                return;
            }
        };
        self.stats.received();

        match &mut self.role {
            RoleState::Hub { registry, unmapped, .. } => {
                let sequence = msg.header().sequence;
                let is_fragment_continuation =
                    matches!(&msg, Message::Command(_, p) if p.fragment_seq > 0);
                if !is_fragment_continuation {
                    if let Some(state) = registry.get(peer) {
                        if dedup::is_duplicate(state.last_rx_seq, sequence) {
                            self.stats.duplicates_ignored();
                            return;
                        }
                    }
                    if let Some(state) = registry.get_mut(peer) {
                        state.last_rx_seq = Some(sequence);
                    }
                }
                let action = role::hub::handle_frame(
                    peer,
                    &msg,
                    now_ms,
                    registry,
                    unmapped,
                    &self.stats,
                    &mut self.callbacks,
                );
                self.perform_hub_action(action, now_ms);
            }
            RoleState::Node(node) => {
                let sequence = msg.header().sequence;
                let is_fragment_continuation =
                    matches!(&msg, Message::Command(_, p) if p.fragment_seq > 0);
                if !is_fragment_continuation {
                    if dedup::is_duplicate(node.last_rx_seq, sequence) {
                        self.stats.duplicates_ignored();
                        return;
                    }
                    node.last_rx_seq = Some(sequence);
                }
                let action = role::node::handle_frame(
                    node,
                    peer,
                    &msg,
                    now_ms,
                    self.config.max_message_bytes,
                    self.config.reassembly_timeout_ms,
                    &self.stats,
                    &mut self.callbacks,
                );
                self.perform_node_action(action, now_ms);
            }
        }
    }

    fn perform_node_action(&mut self, action: NodeAction, now_ms: u64) {
        if let NodeAction::SendStatus { command_id, status_code } = action {
            let _ = self.send_status(command_id, status_code, [0; 32], now_ms);
        }
    }

    fn perform_hub_action(&mut self, action: role::hub::HubAction, now_ms: u64) {
        if let role::hub::HubAction::SendAck { dest, tank_id, ack_code } = action {
            let online = self.is_peer_online(dest);
            let RoleState::Hub { out_seq, .. } = &mut self.role else {
                unreachable!("hub action only produced while in hub role");
            };
            let header = Header {
                kind: MessageKind::Ack,
                tank_id,
                node_kind: NodeKind::Hub,
                timestamp_ms: now_ms as u32,
                sequence: *out_seq,
            };
            *out_seq = out_seq.wrapping_add(1);
            let msg = Message::Ack(header, AckPayload { ack_code, reserved: [0; 8] });
            let _ = send::send_raw(&mut self.radio, &self.stats, dest, online, Gate::Always, &msg);
        }
    }

    /// Advance node-role bookkeeping: re-announce, heartbeat, or trip the
    /// supervisory fail-safe. Node-only.
    pub fn tick_node(&mut self, now_ms: u64, health: u8, uptime_minutes: u16) -> Result<NodeTick, RoleMismatch> {
        self.tick(now_ms);
        let RoleState::Node(node) = &mut self.role else {
            return Err(RoleMismatch { expected: "node" });
        };
        let action = role::node::tick(
            node,
            now_ms,
            self.config.heartbeat_interval_ms,
            self.config.heartbeat_timeout_ms,
            self.config.announce_rebroadcast_ms,
        );
        match action {
            NodeAction::None => Ok(NodeTick::Idle),
            NodeAction::SendAnnounce => {
                self.send_announce(now_ms);
                Ok(NodeTick::Sent)
            }
            NodeAction::SendHeartbeat => {
                self.send_heartbeat(health, uptime_minutes, now_ms);
                Ok(NodeTick::Sent)
            }
            NodeAction::EnterFailSafe => Ok(NodeTick::FailSafe),
        }
    }

    fn send_announce(&mut self, now_ms: u64) {
        let RoleState::Node(node) = &mut self.role else { return };
        let header = Header {
            kind: MessageKind::Announce,
            tank_id: node.tank_id,
            node_kind: node.node_kind,
            timestamp_ms: now_ms as u32,
            sequence: node.out_seq,
        };
        node.out_seq = node.out_seq.wrapping_add(1);
        let msg = Message::Announce(
            header,
            AnnouncePayload {
                firmware_version: node.firmware_version,
                capabilities: node.capabilities,
                reserved: [0; 16],
            },
        );
        // Always broadcast: the node has no prior relationship with the
        // hub's address (spec.md §4.7 — "broadcast it"), and re-announcing
        // after a lost connection must reach the hub even if it rebooted
        // onto a different address.
        let _ = send::send_raw(&mut self.radio, &self.stats, BROADCAST, true, Gate::Always, &msg);
    }

    fn send_heartbeat(&mut self, health: u8, uptime_minutes: u16, now_ms: u64) {
        let RoleState::Node(node) = &mut self.role else { return };
        let Some(dest) = node.hub else { return };
        let header = Header {
            kind: MessageKind::Heartbeat,
            tank_id: node.tank_id,
            node_kind: node.node_kind,
            timestamp_ms: now_ms as u32,
            sequence: node.out_seq,
        };
        node.out_seq = node.out_seq.wrapping_add(1);
        let msg = Message::Heartbeat(header, aquamesh_wire::HeartbeatPayload { health, uptime_minutes });
        let online = self.is_peer_online(dest);
        let _ = send::send_raw(&mut self.radio, &self.stats, dest, online, Gate::OnlineOnly, &msg);
    }

    /// Report status (unsolicited telemetry if `command_id == 0`).
    /// Node-only.
    pub fn send_status(
        &mut self,
        command_id: u8,
        status_code: u8,
        status_data: [u8; 32],
        now_ms: u64,
    ) -> Result<(), RoleMismatch> {
        let RoleState::Node(node) = &mut self.role else {
            return Err(RoleMismatch { expected: "node" });
        };
        let Some(dest) = node.hub else {
            // No hub has acked us yet; there's nowhere to send a status to.
            return Ok(());
        };
        let header = Header {
            kind: MessageKind::Status,
            tank_id: node.tank_id,
            node_kind: node.node_kind,
            timestamp_ms: now_ms as u32,
            sequence: node.out_seq,
        };
        node.out_seq = node.out_seq.wrapping_add(1);
        let msg = Message::Status(header, StatusPayload { command_id, status_code, status_data });
        let online = self.is_peer_online(dest);
        let _ = send::send_with_retry(
            &mut self.radio,
            &self.clock,
            &self.stats,
            dest,
            online,
            Gate::OnlineOnly,
            &msg,
            self.config.retry_base_delay_ms,
            self.config.max_retries,
        );
        Ok(())
    }

    /// Assign (or reassign) a mapped node's tank and device configuration
    /// data. Hub-only; the peer must already be mapped.
    pub fn send_config(
        &mut self,
        dest: PeerId,
        tank_id: u8,
        device_name: [u8; 16],
        config_data: [u8; 32],
        now_ms: u64,
    ) -> Result<(), SendError> {
        let online = self.is_peer_online(dest);
        let RoleState::Hub { out_seq, .. } = &mut self.role else {
            return Err(SendError::PeerOffline);
        };
        let header = Header {
            kind: MessageKind::Config,
            tank_id,
            node_kind: NodeKind::Hub,
            timestamp_ms: now_ms as u32,
            sequence: *out_seq,
        };
        *out_seq = out_seq.wrapping_add(1);
        let msg = Message::Config(header, ConfigPayload { device_name, config_data });
        send::send_with_retry(
            &mut self.radio,
            &self.clock,
            &self.stats,
            dest,
            online,
            Gate::OnlineOnly,
            &msg,
            self.config.retry_base_delay_ms,
            self.config.max_retries,
        )
    }

    /// Send a (possibly multi-fragment) command to `dest`, gated by `gate`
    /// (spec.md §4.6/§6 — `Gate::Always` lets a caller push a command
    /// through before the peer is marked online, e.g. right after
    /// `provision`). Hub-only.
    #[allow(clippy::too_many_arguments)]
    pub fn send_command(
        &mut self,
        dest: PeerId,
        tank_id: u8,
        command_id: u8,
        payload: &[u8],
        gate: Gate,
        now_ms: u64,
    ) -> Result<(), SendError> {
        if payload.len() > self.config.max_message_bytes {
            return Err(SendError::PayloadTooLarge {
                max: self.config.max_message_bytes,
                actual: payload.len(),
            });
        }
        let online = self.is_peer_online(dest);
        let RoleState::Hub { out_seq, .. } = &mut self.role else {
            return Err(SendError::PeerOffline);
        };
        send::send_fragmented(
            &mut self.radio,
            &self.clock,
            &self.stats,
            dest,
            online,
            gate,
            tank_id,
            NodeKind::Hub,
            now_ms,
            out_seq,
            command_id,
            payload,
        )
    }
}
