//! Wire format for the aquamesh hub/node radio link.
//!
//! Bidirectional byte-slice <-> typed `Message` conversion for the six frame
//! kinds, bit-exact and allocation-free so two independent implementations of
//! this crate can interoperate over the physical link. See the workspace
//! `SPEC_FULL.md` §5.1 / spec.md §4.1 and §6 for the frozen layout.

use core::fmt;

/// Maximum transmission unit of the underlying link, in bytes.
pub const MTU: usize = 250;

/// Six bytes of `0xFF`: the distinguished broadcast address.
pub const BROADCAST: PeerId = PeerId([0xFF; 6]);

const HEADER_LEN: usize = 8;

// ---------------------------------------------------------------------------
// PeerId
// ---------------------------------------------------------------------------

/// An opaque 6-byte peer address. Ordered and compared by value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PeerId(pub [u8; 6]);

impl PeerId {
    pub const fn is_broadcast(&self) -> bool {
        self.0[0] == 0xFF
            && self.0[1] == 0xFF
            && self.0[2] == 0xFF
            && self.0[3] == 0xFF
            && self.0[4] == 0xFF
            && self.0[5] == 0xFF
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02X}:{b:02X}:{c:02X}:{d:02X}:{e:02X}:{g:02X}")
    }
}

impl From<[u8; 6]> for PeerId {
    fn from(bytes: [u8; 6]) -> Self {
        PeerId(bytes)
    }
}

// ---------------------------------------------------------------------------
// NodeKind
// ---------------------------------------------------------------------------

/// Device category discriminant (spec.md §6 wire table).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Unknown = 0,
    Hub = 1,
    Light = 2,
    Co2 = 3,
    Doser = 4,
    Sensor = 5,
    Heater = 6,
    Filter = 7,
    Feeder = 8,
    Repeater = 9,
}

impl NodeKind {
    pub const fn to_u8(self) -> u8 {
        self as u8
    }

    pub const fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0 => NodeKind::Unknown,
            1 => NodeKind::Hub,
            2 => NodeKind::Light,
            3 => NodeKind::Co2,
            4 => NodeKind::Doser,
            5 => NodeKind::Sensor,
            6 => NodeKind::Heater,
            7 => NodeKind::Filter,
            8 => NodeKind::Feeder,
            9 => NodeKind::Repeater,
            _ => return None,
        })
    }
}

// ---------------------------------------------------------------------------
// MessageKind
// ---------------------------------------------------------------------------

/// The frame discriminant at offset 0 of every header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Announce = 1,
    Ack = 2,
    Config = 3,
    Command = 4,
    Status = 5,
    Heartbeat = 6,
}

impl MessageKind {
    pub const fn to_u8(self) -> u8 {
        self as u8
    }

    pub const fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            1 => MessageKind::Announce,
            2 => MessageKind::Ack,
            3 => MessageKind::Config,
            4 => MessageKind::Command,
            5 => MessageKind::Status,
            6 => MessageKind::Heartbeat,
            _ => return None,
        })
    }

    /// Total on-wire frame length for this kind (header + payload).
    pub const fn frame_len(self) -> usize {
        HEADER_LEN
            + match self {
                MessageKind::Announce => 18,
                MessageKind::Ack => 9,
                MessageKind::Config => 48,
                MessageKind::Command => 35,
                MessageKind::Status => 34,
                MessageKind::Heartbeat => 3,
            }
    }
}

// ---------------------------------------------------------------------------
// Header
// ---------------------------------------------------------------------------

/// The 8-byte header present on every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub kind: MessageKind,
    pub tank_id: u8,
    pub node_kind: NodeKind,
    pub timestamp_ms: u32,
    pub sequence: u8,
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// Never fragmented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnnouncePayload {
    pub firmware_version: u8,
    pub capabilities: u8,
    pub reserved: [u8; 16],
}

/// Never fragmented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AckPayload {
    pub ack_code: u8,
    pub reserved: [u8; 8],
}

/// Frozen v1 ack codes (spec.md §4.7).
pub mod ack_codes {
    pub const ACCEPTED_PENDING: u8 = 0;
    pub const ACCEPTED_KNOWN: u8 = 1;
}

/// Frozen v1 status codes for the node's self-generated `Status` replies
/// (spec.md §4.7 — "emit `Status` echoing the `command_id` with a status
/// code"). Device-specific status codes are out of scope for the core;
/// these two cover the core's own auto-replies to `Config`/`Command`.
pub mod status_codes {
    pub const OK: u8 = 0;
    pub const ERROR: u8 = 1;
}

/// Single-frame; `header.tank_id` carries the assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigPayload {
    pub device_name: [u8; 16],
    pub config_data: [u8; 32],
}

/// May be fragmented; see spec.md §4.4.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandPayload {
    pub command_id: u8,
    pub fragment_seq: u8,
    pub final_fragment: bool,
    pub payload: [u8; 32],
}

/// Never fragmented. `command_id == 0` denotes unsolicited telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusPayload {
    pub command_id: u8,
    pub status_code: u8,
    pub status_data: [u8; 32],
}

/// Never fragmented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatPayload {
    pub health: u8,
    pub uptime_minutes: u16,
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// A fully decoded frame: header plus kind-specific payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message {
    Announce(Header, AnnouncePayload),
    Ack(Header, AckPayload),
    Config(Header, ConfigPayload),
    Command(Header, CommandPayload),
    Status(Header, StatusPayload),
    Heartbeat(Header, HeartbeatPayload),
}

impl Message {
    pub const fn header(&self) -> &Header {
        match self {
            Message::Announce(h, _)
            | Message::Ack(h, _)
            | Message::Config(h, _)
            | Message::Command(h, _)
            | Message::Status(h, _)
            | Message::Heartbeat(h, _) => h,
        }
    }

    pub const fn kind(&self) -> MessageKind {
        self.header().kind
    }
}

// ---------------------------------------------------------------------------
// Encoded frame buffer
// ---------------------------------------------------------------------------

/// A fixed-capacity buffer holding one encoded frame. Never heap-allocates.
#[derive(Debug, Clone, Copy)]
pub struct EncodedFrame {
    buf: [u8; MTU],
    len: usize,
}

impl EncodedFrame {
    pub fn as_slice(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Decode failure taxonomy (spec.md §4.1 / §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// Frame shorter than the 8-byte header.
    TooShort,
    /// `kind` byte is not one of the six known discriminants.
    UnknownKind(u8),
    /// Frame length disagrees with the length fixed for `kind`.
    LengthMismatch { expected: usize, actual: usize },
    /// A fixed-width field carried a value outside its valid range.
    FieldOutOfRange(&'static str),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::TooShort => write!(f, "frame shorter than header"),
            DecodeError::UnknownKind(k) => write!(f, "unknown message kind: {k}"),
            DecodeError::LengthMismatch { expected, actual } => {
                write!(f, "length mismatch: expected {expected}, got {actual}")
            }
            DecodeError::FieldOutOfRange(field) => write!(f, "field out of range: {field}"),
        }
    }
}

impl std::error::Error for DecodeError {}

/// Encode failure: only raised when a caller hands in a payload larger than
/// a single frame window can carry (the typed payload structs cannot
/// themselves violate this, so this exists for defensive API completeness).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadTooLarge {
    pub max: usize,
    pub actual: usize,
}

impl fmt::Display for PayloadTooLarge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "payload too large: max {} bytes, got {}",
            self.max, self.actual
        )
    }
}

impl std::error::Error for PayloadTooLarge {}

// ---------------------------------------------------------------------------
// encode / decode
// ---------------------------------------------------------------------------

fn write_header(buf: &mut [u8], header: &Header) {
    buf[0] = header.kind.to_u8();
    buf[1] = header.tank_id;
    buf[2] = header.node_kind.to_u8();
    buf[3..7].copy_from_slice(&header.timestamp_ms.to_le_bytes());
    buf[7] = header.sequence;
}

fn read_header(buf: &[u8]) -> Result<Header, DecodeError> {
    if buf.len() < HEADER_LEN {
        return Err(DecodeError::TooShort);
    }
    let kind = MessageKind::from_u8(buf[0]).ok_or(DecodeError::UnknownKind(buf[0]))?;
    let node_kind = NodeKind::from_u8(buf[2]).ok_or(DecodeError::FieldOutOfRange("node_kind"))?;
    let timestamp_ms = u32::from_le_bytes([buf[3], buf[4], buf[5], buf[6]]);
    Ok(Header {
        kind,
        tank_id: buf[1],
        node_kind,
        timestamp_ms,
        sequence: buf[7],
    })
}

/// Encode a message into a fixed-capacity frame buffer.
///
/// The output length is determined solely by `msg.kind()` (spec.md §4.1).
pub fn encode(msg: &Message) -> EncodedFrame {
    let mut buf = [0u8; MTU];
    let header = msg.header();
    write_header(&mut buf, header);
    let len = match msg {
        Message::Announce(_, p) => {
            buf[8] = p.firmware_version;
            buf[9] = p.capabilities;
            buf[10..26].copy_from_slice(&p.reserved);
            MessageKind::Announce.frame_len()
        }
        Message::Ack(_, p) => {
            buf[8] = p.ack_code;
            buf[9..17].copy_from_slice(&p.reserved);
            MessageKind::Ack.frame_len()
        }
        Message::Config(_, p) => {
            buf[8..24].copy_from_slice(&p.device_name);
            buf[24..56].copy_from_slice(&p.config_data);
            MessageKind::Config.frame_len()
        }
        Message::Command(_, p) => {
            buf[8] = p.command_id;
            buf[9] = p.fragment_seq;
            buf[10] = u8::from(p.final_fragment);
            buf[11..43].copy_from_slice(&p.payload);
            MessageKind::Command.frame_len()
        }
        Message::Status(_, p) => {
            buf[8] = p.command_id;
            buf[9] = p.status_code;
            buf[10..42].copy_from_slice(&p.status_data);
            MessageKind::Status.frame_len()
        }
        Message::Heartbeat(_, p) => {
            buf[8] = p.health;
            buf[9..11].copy_from_slice(&p.uptime_minutes.to_le_bytes());
            MessageKind::Heartbeat.frame_len()
        }
    };
    EncodedFrame { buf, len }
}

/// Decode a byte slice into a typed `Message`.
///
/// `tank_id`, `sequence`, and `timestamp_ms` pass through without semantic
/// interpretation; domain validation (online gating, provisioning, etc.)
/// lives above this crate.
pub fn decode(bytes: &[u8]) -> Result<Message, DecodeError> {
    let header = read_header(bytes)?;
    let expected = header.kind.frame_len();
    if bytes.len() != expected {
        return Err(DecodeError::LengthMismatch {
            expected,
            actual: bytes.len(),
        });
    }
    let msg = match header.kind {
        MessageKind::Announce => {
            let mut reserved = [0u8; 16];
            reserved.copy_from_slice(&bytes[10..26]);
            Message::Announce(
                header,
                AnnouncePayload {
                    firmware_version: bytes[8],
                    capabilities: bytes[9],
                    reserved,
                },
            )
        }
        MessageKind::Ack => {
            let mut reserved = [0u8; 8];
            reserved.copy_from_slice(&bytes[9..17]);
            Message::Ack(
                header,
                AckPayload {
                    ack_code: bytes[8],
                    reserved,
                },
            )
        }
        MessageKind::Config => {
            let mut device_name = [0u8; 16];
            device_name.copy_from_slice(&bytes[8..24]);
            let mut config_data = [0u8; 32];
            config_data.copy_from_slice(&bytes[24..56]);
            Message::Config(
                header,
                ConfigPayload {
                    device_name,
                    config_data,
                },
            )
        }
        MessageKind::Command => {
            let final_fragment = match bytes[10] {
                0 => false,
                1 => true,
                _ => return Err(DecodeError::FieldOutOfRange("final_fragment")),
            };
            let mut payload = [0u8; 32];
            payload.copy_from_slice(&bytes[11..43]);
            Message::Command(
                header,
                CommandPayload {
                    command_id: bytes[8],
                    fragment_seq: bytes[9],
                    final_fragment,
                    payload,
                },
            )
        }
        MessageKind::Status => {
            let mut status_data = [0u8; 32];
            status_data.copy_from_slice(&bytes[10..42]);
            Message::Status(
                header,
                StatusPayload {
                    command_id: bytes[8],
                    status_code: bytes[9],
                    status_data,
                },
            )
        }
        MessageKind::Heartbeat => {
            let health = bytes[8];
            if health > 100 {
                return Err(DecodeError::FieldOutOfRange("health"));
            }
            let uptime_minutes = u16::from_le_bytes([bytes[9], bytes[10]]);
            Message::Heartbeat(
                header,
                HeartbeatPayload {
                    health,
                    uptime_minutes,
                },
            )
        }
    };
    Ok(msg)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header(kind: MessageKind) -> Header {
        Header {
            kind,
            tank_id: 3,
            node_kind: NodeKind::Light,
            timestamp_ms: 123_456,
            sequence: 7,
        }
    }

    #[test]
    fn round_trip_announce() {
        let msg = Message::Announce(
            sample_header(MessageKind::Announce),
            AnnouncePayload {
                firmware_version: 2,
                capabilities: 0b0000_0011,
                reserved: [0; 16],
            },
        );
        let frame = encode(&msg);
        assert_eq!(frame.len(), MessageKind::Announce.frame_len());
        assert_eq!(decode(frame.as_slice()).unwrap(), msg);
    }

    #[test]
    fn round_trip_command_with_fragment() {
        let mut payload = [0u8; 32];
        payload[0] = 0xAB;
        let msg = Message::Command(
            sample_header(MessageKind::Command),
            CommandPayload {
                command_id: 9,
                fragment_seq: 2,
                final_fragment: true,
                payload,
            },
        );
        let frame = encode(&msg);
        assert_eq!(decode(frame.as_slice()).unwrap(), msg);
    }

    #[test]
    fn round_trip_heartbeat() {
        let msg = Message::Heartbeat(
            sample_header(MessageKind::Heartbeat),
            HeartbeatPayload {
                health: 100,
                uptime_minutes: 4000,
            },
        );
        let frame = encode(&msg);
        assert_eq!(decode(frame.as_slice()).unwrap(), msg);
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let mut bytes = [0u8; HEADER_LEN + 3];
        bytes[0] = 99;
        assert_eq!(decode(&bytes), Err(DecodeError::UnknownKind(99)));
    }

    #[test]
    fn too_short_is_rejected() {
        let bytes = [1u8; 4];
        assert_eq!(decode(&bytes), Err(DecodeError::TooShort));
    }

    #[test]
    fn length_mismatch_is_rejected() {
        let mut bytes = [0u8; HEADER_LEN + 2];
        bytes[0] = MessageKind::Heartbeat.to_u8();
        let err = decode(&bytes).unwrap_err();
        assert_eq!(
            err,
            DecodeError::LengthMismatch {
                expected: MessageKind::Heartbeat.frame_len(),
                actual: bytes.len(),
            }
        );
    }

    #[test]
    fn health_out_of_range_is_rejected() {
        let mut buf = [0u8; MTU];
        write_header(&mut buf, &sample_header(MessageKind::Heartbeat));
        buf[8] = 101;
        let bytes = &buf[..MessageKind::Heartbeat.frame_len()];
        assert_eq!(decode(bytes), Err(DecodeError::FieldOutOfRange("health")));
    }

    #[test]
    fn final_fragment_non_boolean_byte_is_rejected() {
        let mut buf = [0u8; MTU];
        write_header(&mut buf, &sample_header(MessageKind::Command));
        buf[10] = 7;
        let bytes = &buf[..MessageKind::Command.frame_len()];
        assert_eq!(
            decode(bytes),
            Err(DecodeError::FieldOutOfRange("final_fragment"))
        );
    }

    #[test]
    fn unknown_node_kind_is_rejected() {
        let mut buf = [0u8; MTU];
        write_header(&mut buf, &sample_header(MessageKind::Heartbeat));
        buf[2] = 200;
        let bytes = &buf[..MessageKind::Heartbeat.frame_len()];
        assert_eq!(decode(bytes), Err(DecodeError::FieldOutOfRange("node_kind")));
    }

    #[test]
    fn broadcast_address_is_all_ones() {
        assert!(BROADCAST.is_broadcast());
        assert_eq!(BROADCAST.0, [0xFF; 6]);
    }

    #[test]
    fn all_frames_fit_within_mtu() {
        for kind in [
            MessageKind::Announce,
            MessageKind::Ack,
            MessageKind::Config,
            MessageKind::Command,
            MessageKind::Status,
            MessageKind::Heartbeat,
        ] {
            assert!(kind.frame_len() <= MTU);
        }
    }
}
