//! End-to-end scenarios driving a hub `Core` and a node `Core` against each
//! other through `aquamesh_test_support`'s fakes, covering the spec's
//! concrete walkthroughs (discovery/provisioning, simple and fragmented
//! commands, reassembly timeout, and supervisory fail-safe/reconnect).

use aquamesh::config::CoreConfig;
use aquamesh::{Core, NodeTick, Role};
use aquamesh_test_support::FakeClock;
use aquamesh_wire::{decode, NodeKind, PeerId};

fn hub_peer() -> PeerId {
    PeerId([0xAA, 0, 0, 0, 0, 1])
}

fn node_peer() -> PeerId {
    PeerId([0xAA, 0, 0, 0, 0, 2])
}

struct Fixture {
    hub: Core<aquamesh_test_support::FakeRadio, FakeClock>,
    node: Core<aquamesh_test_support::FakeRadio, FakeClock>,
}

fn fixture(config: CoreConfig) -> Fixture {
    let hub = Core::with_clock(
        Role::Hub,
        aquamesh_test_support::FakeRadio::new(),
        FakeClock::new(0),
        config.clone(),
        0,
    )
    .unwrap();
    let node = Core::with_clock(
        Role::Node {
            tank_id: 0,
            node_kind: NodeKind::Doser,
            firmware_version: 1,
            capabilities: 0,
        },
        aquamesh_test_support::FakeRadio::new(),
        FakeClock::new(0),
        config,
        0,
    )
    .unwrap();
    Fixture { hub, node }
}

/// Deliver everything the node's fake radio has queued to the hub, and vice
/// versa, simulating one round trip over the ether.
fn exchange(fixture: &mut Fixture, now_ms: u64) {
    let node_to_hub: Vec<_> = fixture.node.radio_mut().sent_frames();
    fixture.node.radio_mut().sent.borrow_mut().clear();
    for frame in node_to_hub {
        fixture.hub.on_receive(node_peer(), &frame.bytes);
    }
    fixture.hub.tick(now_ms);

    let hub_to_node: Vec<_> = fixture.hub.radio_mut().sent_frames();
    fixture.hub.radio_mut().sent.borrow_mut().clear();
    for frame in hub_to_node {
        fixture.node.on_receive(hub_peer(), &frame.bytes);
    }
    fixture.node.tick(now_ms);
}

#[test]
fn fresh_node_is_discovered_then_provisioned_and_connects() {
    let mut f = fixture(CoreConfig::default());

    assert_eq!(f.node.tick_node(0, 95, 0).unwrap(), NodeTick::Sent);
    exchange(&mut f, 0);

    assert_eq!(f.hub.unmapped().unwrap().len(), 1);
    assert!(!f.hub.is_peer_online(node_peer()));

    f.hub.provision(node_peer(), [0u8; 16], 3, 0).unwrap();
    assert!(f.hub.peers().unwrap().iter().any(|(p, _)| *p == node_peer()));

    // Node re-announces; hub now knows it and acks it as known.
    assert_eq!(
        f.node.tick_node(5_001, 95, 0).unwrap(),
        NodeTick::Sent
    );
    exchange(&mut f, 5_001);

    assert!(f.hub.is_peer_online(node_peer()));
    assert!(f.node.is_peer_online(hub_peer()));
}

fn connect(f: &mut Fixture) {
    f.node.tick_node(0, 95, 0).unwrap();
    exchange(f, 0);
    f.hub.provision(node_peer(), [0u8; 16], 3, 0).unwrap();
    f.node.tick_node(5_001, 95, 0).unwrap();
    exchange(f, 5_001);
    assert!(f.node.is_peer_online(hub_peer()));
}

#[test]
fn single_frame_command_is_delivered_to_the_node() {
    let mut f = fixture(CoreConfig::default());
    connect(&mut f);

    let received = std::sync::Arc::new(std::sync::Mutex::new(None));
    let received2 = received.clone();
    f.node.callbacks_mut().set_on_command(move |ev| {
        *received2.lock().unwrap() = Some((ev.command_id, ev.payload));
    });

    f.hub.send_command(node_peer(), 3, 7, &[1, 2, 3], aquamesh::send::Gate::OnlineOnly, 6_000).unwrap();
    exchange(&mut f, 6_000);

    // A single fragment is one 32-byte window; the wire format carries no
    // length field, so the tail is zero-padded and callers interpret the
    // first `n` bytes themselves based on `command_id`.
    let (command_id, payload) = received.lock().unwrap().clone().unwrap();
    assert_eq!(command_id, 7);
    assert_eq!(payload.len(), 32);
    assert_eq!(&payload[..3], &[1, 2, 3]);
}

#[test]
fn fragmented_command_reassembles_into_one_event() {
    let mut f = fixture(CoreConfig::default());
    connect(&mut f);

    let received = std::sync::Arc::new(std::sync::Mutex::new(None));
    let received2 = received.clone();
    f.node.callbacks_mut().set_on_command(move |ev| {
        *received2.lock().unwrap() = Some((ev.command_id, ev.payload));
    });

    let payload = vec![0x42; 70]; // 3 fragments: 32 + 32 + 6
    f.hub.send_command(node_peer(), 3, 11, &payload, aquamesh::send::Gate::OnlineOnly, 6_000).unwrap();
    exchange(&mut f, 6_000);

    let (command_id, got) = received.lock().unwrap().clone().unwrap();
    assert_eq!(command_id, 11);
    assert_eq!(got.len(), 96); // padded to 32-byte window multiples
    assert_eq!(&got[..70], payload.as_slice());
}

#[test]
fn a_fragment_that_never_completes_eventually_times_out() {
    let mut f = fixture(CoreConfig::default());
    connect(&mut f);

    let payload = vec![0x7; 70];
    f.hub.send_command(node_peer(), 3, 4, &payload, aquamesh::send::Gate::OnlineOnly, 6_000).unwrap();

    // Only deliver the first of the three fragments to the node.
    let frames = f.hub.radio_mut().sent_frames();
    f.hub.radio_mut().sent.borrow_mut().clear();
    assert_eq!(frames.len(), 3);
    f.node.on_receive(hub_peer(), &frames[0].bytes);
    f.node.tick(6_000);
    assert_eq!(f.node.statistics().fragments_received, 1);

    // Long after the reassembly timeout, an unrelated fresh command arrives
    // and the stale partial reassembly is counted as a timeout, not silently
    // carried forward.
    let fresh = encode_single_fragment_command(9, &[1, 2, 3]);
    f.node.on_receive(hub_peer(), &fresh);
    f.node.tick(6_000 + 10_000);
    assert_eq!(f.node.statistics().reassembly_timeouts, 1);
}

fn encode_single_fragment_command(command_id: u8, payload: &[u8]) -> Vec<u8> {
    let mut window = [0u8; 32];
    window[..payload.len()].copy_from_slice(payload);
    let msg = aquamesh_wire::Message::Command(
        aquamesh_wire::Header {
            kind: aquamesh_wire::MessageKind::Command,
            tank_id: 3,
            node_kind: NodeKind::Hub,
            timestamp_ms: 0,
            sequence: 200,
        },
        aquamesh_wire::CommandPayload {
            command_id,
            fragment_seq: 0,
            final_fragment: true,
            payload: window,
        },
    );
    aquamesh_wire::encode(&msg).as_slice().to_vec()
}

#[test]
fn supervisory_timeout_trips_fail_safe_then_the_node_reconnects() {
    let mut f = fixture(CoreConfig::default());
    connect(&mut f);

    // No traffic from the hub arrives for longer than heartbeat_timeout_ms.
    let tick = f.node.tick_node(5_001 + 90_001, 95, 0).unwrap();
    assert_eq!(tick, NodeTick::FailSafe);
    assert!(!f.node.is_peer_online(hub_peer()));

    // The node falls back to AwaitingAck and re-announces; the hub (which
    // still remembers it from provisioning) acks it straight back to known.
    let announce_tick = f.node.tick_node(5_001 + 90_001 + 5_001, 95, 0).unwrap();
    assert_eq!(announce_tick, NodeTick::Sent);
    exchange(&mut f, 5_001 + 90_001 + 5_001);
    assert!(f.node.is_peer_online(hub_peer()));
}

#[test]
fn decode_of_a_real_sent_frame_round_trips() {
    let mut f = fixture(CoreConfig::default());
    f.node.tick_node(0, 95, 0).unwrap();
    let frame = f.node.radio_mut().last_sent().unwrap();
    assert!(decode(&frame.bytes).is_ok());
}
