//! Send path (spec.md §4.6): raw framing, bounded retry, and the
//! fragmenting sender for multi-frame commands.

use crate::clock::Clock;
use crate::error::SendError;
use crate::radio::{Radio, RadioError};
use crate::stats::AtomicStatistics;
use aquamesh_wire::{encode, CommandPayload, Header, Message, MessageKind, NodeKind, PeerId};

/// Whether a send requires the destination to currently be online.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    /// Send regardless of known online state (used for Announce/Ack/initial
    /// Config, where the peer isn't mapped yet or hasn't heartbeated).
    Always,
    /// Refuse with [`SendError::PeerOffline`] unless the peer is mapped and
    /// online.
    OnlineOnly,
}

/// Encode and hand one frame to the radio, gated by peer liveness.
pub fn send_raw<R: Radio>(
    radio: &mut R,
    stats: &AtomicStatistics,
    dest: PeerId,
    online: bool,
    gate: Gate,
    msg: &Message,
) -> Result<(), SendError> {
    if gate == Gate::OnlineOnly && !online {
        return Err(SendError::PeerOffline);
    }
    let frame = encode(msg);
    match radio.send(dest, frame.as_slice()) {
        Ok(()) => {
            stats.sent();
            Ok(())
        }
        Err(e) => {
            stats.send_failures();
            Err(SendError::Radio(e))
        }
    }
}

/// Send with exponential backoff: up to `max_retries` additional attempts
/// after the first, delays doubling from `base_delay_ms` (spec.md §4.6).
#[allow(clippy::too_many_arguments)]
pub fn send_with_retry<R: Radio, C: Clock>(
    radio: &mut R,
    clock: &C,
    stats: &AtomicStatistics,
    dest: PeerId,
    online: bool,
    gate: Gate,
    msg: &Message,
    base_delay_ms: u64,
    max_retries: u32,
) -> Result<(), SendError> {
    let mut attempt: u32 = 0;
    loop {
        match send_raw(radio, stats, dest, online, gate, msg) {
            Ok(()) => return Ok(()),
            Err(SendError::PeerOffline) => return Err(SendError::PeerOffline),
            Err(e) => {
                if attempt >= max_retries {
                    return Err(e);
                }
                stats.retries();
                clock.sleep(base_delay_ms << attempt);
                attempt += 1;
            }
        }
    }
}

/// Gap held between fragments so the receiver's intake queue can drain and
/// the physical link's per-packet duty cycle isn't overrun (spec.md §4.6).
pub const FRAGMENT_GAP_MS: u64 = 10;

/// Split `payload` into `Command` fragments of at most 32 bytes each and
/// send them in order, aborting on the first failure (spec.md §4.4/§4.6).
///
/// Each fragment is sent with a single [`send_raw`] attempt, never
/// [`send_with_retry`] — spec.md §4.4/§4.6 specify that fragment
/// retransmission is never attempted, since retrying mid-sequence could
/// race a caller's own re-attempt and interleave fragments of two logical
/// sends. A failed fragment aborts the whole logical message instead; the
/// caller decides whether to retry it from fragment 0.
///
/// `out_seq` is the header sequence counter; each fragment consumes the
/// next value and wraps at 256 like any other outbound frame.
#[allow(clippy::too_many_arguments)]
pub fn send_fragmented<R: Radio, C: Clock>(
    radio: &mut R,
    clock: &C,
    stats: &AtomicStatistics,
    dest: PeerId,
    online: bool,
    gate: Gate,
    tank_id: u8,
    node_kind: NodeKind,
    now_ms: u64,
    out_seq: &mut u8,
    command_id: u8,
    payload: &[u8],
) -> Result<(), SendError> {
    if gate == Gate::OnlineOnly && !online {
        return Err(SendError::PeerOffline);
    }
    let chunks: Vec<&[u8]> = if payload.is_empty() {
        vec![&[][..]]
    } else {
        payload.chunks(32).collect()
    };
    let last = chunks.len() - 1;
    for (i, chunk) in chunks.iter().enumerate() {
        let mut window = [0u8; 32];
        window[..chunk.len()].copy_from_slice(chunk);
        let header = Header {
            kind: MessageKind::Command,
            tank_id,
            node_kind,
            timestamp_ms: now_ms as u32,
            sequence: *out_seq,
        };
        let msg = Message::Command(
            header,
            CommandPayload {
                command_id,
                fragment_seq: i as u8,
                final_fragment: i == last,
                payload: window,
            },
        );
        send_raw(radio, stats, dest, online, gate, &msg)
            .map_err(|_| SendError::FragmentAborted(i as u8))?;
        *out_seq = out_seq.wrapping_add(1);
        stats.fragments_sent();
        if i != last {
            clock.sleep(FRAGMENT_GAP_MS);
        }
    }
    Ok(())
}
