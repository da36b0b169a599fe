//! User-supplied event hooks (spec.md §4.7 "upcalls").
//!
//! Boxed `FnMut` slots rather than a trait object the caller implements —
//! matches the teacher's `forwarder::uplink` callback-closure style more
//! closely than an observer-trait would, and lets the demo app wire
//! `tracing` calls directly into each hook without a wrapper type. Event
//! payloads are owned (copied out of the reassembly/decode buffers before
//! the callback fires) rather than borrowed, so a callback slot can be a
//! plain `'static` closure with no lifetime gymnastics.

use aquamesh_wire::{NodeKind, PeerId};

type Hook<T> = Option<Box<dyn FnMut(T) + Send>>;

/// Delivered on a successful `Config` decode addressed to this node.
pub struct ConfigEvent {
    pub from: PeerId,
    pub device_name: [u8; 16],
    pub config_data: [u8; 32],
}

/// Delivered once a fragmented (or single-frame) command finishes
/// reassembling.
pub struct CommandEvent {
    pub from: PeerId,
    pub command_id: u8,
    pub payload: Vec<u8>,
}

/// Delivered on a `Status` frame.
pub struct StatusEvent {
    pub from: PeerId,
    pub command_id: u8,
    pub status_code: u8,
    pub status_data: [u8; 32],
}

/// Delivered on every `Heartbeat`, mapped or not.
pub struct HeartbeatEvent {
    pub from: PeerId,
    pub health: u8,
    pub uptime_minutes: u16,
}

/// The set of upcalls a hub or node registers (spec.md §4.7).
#[derive(Default)]
pub struct Callbacks {
    on_announce: Hook<(PeerId, NodeKind)>,
    on_ack: Hook<(PeerId, u8)>,
    on_config: Hook<ConfigEvent>,
    on_command: Hook<CommandEvent>,
    on_status: Hook<StatusEvent>,
    on_heartbeat: Hook<HeartbeatEvent>,
    on_peer_online: Hook<PeerId>,
    on_peer_offline: Hook<PeerId>,
    on_unmapped_discovered: Hook<(PeerId, NodeKind)>,
    on_peer_provisioned: Hook<PeerId>,
}

macro_rules! setter {
    ($name:ident, $field:ident, $arg:ty) => {
        pub fn $name(&mut self, f: impl FnMut($arg) + Send + 'static) {
            self.$field = Some(Box::new(f));
        }
    };
}

impl Callbacks {
    setter!(set_on_announce, on_announce, (PeerId, NodeKind));
    setter!(set_on_ack, on_ack, (PeerId, u8));
    setter!(set_on_config, on_config, ConfigEvent);
    setter!(set_on_command, on_command, CommandEvent);
    setter!(set_on_status, on_status, StatusEvent);
    setter!(set_on_heartbeat, on_heartbeat, HeartbeatEvent);
    setter!(set_on_peer_online, on_peer_online, PeerId);
    setter!(set_on_peer_offline, on_peer_offline, PeerId);
    setter!(set_on_unmapped_discovered, on_unmapped_discovered, (PeerId, NodeKind));
    setter!(set_on_peer_provisioned, on_peer_provisioned, PeerId);

    pub fn fire_announce(&mut self, peer: PeerId, kind: NodeKind) {
        if let Some(f) = self.on_announce.as_mut() {
            f((peer, kind));
        }
    }

    pub fn fire_ack(&mut self, peer: PeerId, ack_code: u8) {
        if let Some(f) = self.on_ack.as_mut() {
            f((peer, ack_code));
        }
    }

    pub fn fire_config(&mut self, ev: ConfigEvent) {
        if let Some(f) = self.on_config.as_mut() {
            f(ev);
        }
    }

    pub fn fire_command(&mut self, ev: CommandEvent) {
        if let Some(f) = self.on_command.as_mut() {
            f(ev);
        }
    }

    pub fn fire_status(&mut self, ev: StatusEvent) {
        if let Some(f) = self.on_status.as_mut() {
            f(ev);
        }
    }

    pub fn fire_heartbeat(&mut self, ev: HeartbeatEvent) {
        if let Some(f) = self.on_heartbeat.as_mut() {
            f(ev);
        }
    }

    pub fn fire_peer_online(&mut self, peer: PeerId) {
        if let Some(f) = self.on_peer_online.as_mut() {
            f(peer);
        }
    }

    pub fn fire_peer_offline(&mut self, peer: PeerId) {
        if let Some(f) = self.on_peer_offline.as_mut() {
            f(peer);
        }
    }

    pub fn fire_unmapped_discovered(&mut self, peer: PeerId, kind: NodeKind) {
        if let Some(f) = self.on_unmapped_discovered.as_mut() {
            f((peer, kind));
        }
    }

    pub fn fire_peer_provisioned(&mut self, peer: PeerId) {
        if let Some(f) = self.on_peer_provisioned.as_mut() {
            f(peer);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn unset_hooks_are_no_ops() {
        let mut cb = Callbacks::default();
        cb.fire_announce(PeerId([0; 6]), NodeKind::Light);
        cb.fire_peer_online(PeerId([0; 6]));
    }

    #[test]
    fn registered_hook_fires_with_the_right_payload() {
        let seen = Arc::new(Mutex::new(None));
        let seen2 = seen.clone();
        let mut cb = Callbacks::default();
        cb.set_on_command(move |ev: CommandEvent| {
            *seen2.lock().unwrap() = Some((ev.command_id, ev.payload.clone()));
        });
        cb.fire_command(CommandEvent {
            from: PeerId([1; 6]),
            command_id: 7,
            payload: vec![1, 2, 3],
        });
        let got = seen.lock().unwrap().clone().unwrap();
        assert_eq!(got, (7, vec![1, 2, 3]));
    }
}
