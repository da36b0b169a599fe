//! Core construction-time configuration (spec.md §6 configuration surface).
//!
//! Unlike the teacher's `forwarder::config`, this is not a TOML loader — the
//! core is constructed programmatically (spec.md §6: "Construction:
//! `new(role, channel, radio)`"). The validated/defaulted two-struct shape is
//! still worth keeping: callers build a `CoreConfig`, override only the
//! fields they care about, and `Core::new` validates it once at
//! construction, surfacing bad values as `ConstructionError` per spec.md §7.

use core::fmt;

/// Tunable parameters, all defaulted to the values in spec.md §6.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    /// Radio channel (0..14 valid).
    pub channel: u8,
    /// Node heartbeat cadence.
    pub heartbeat_interval_ms: u64,
    /// Peer deemed offline after this gap.
    pub heartbeat_timeout_ms: u64,
    /// Node re-announce cadence while `AwaitingAck` / `LostConnection`.
    pub announce_rebroadcast_ms: u64,
    /// Drop a partial fragmented message after this long.
    pub reassembly_timeout_ms: u64,
    /// Exponential backoff base for `send_with_retry`.
    pub retry_base_delay_ms: u64,
    /// Retry cap for `send_with_retry`.
    pub max_retries: u32,
    /// Intake slots.
    pub rx_queue_capacity: usize,
    /// Reassembly buffer size per peer.
    pub max_message_bytes: usize,
    /// Cap on the unmapped table.
    pub max_unmapped_entries: usize,
}

impl Default for CoreConfig {
    fn default() -> Self {
        CoreConfig {
            channel: 6,
            heartbeat_interval_ms: 30_000,
            heartbeat_timeout_ms: 90_000,
            announce_rebroadcast_ms: 5_000,
            reassembly_timeout_ms: 1_500,
            retry_base_delay_ms: 100,
            max_retries: 3,
            rx_queue_capacity: 10,
            max_message_bytes: 512,
            max_unmapped_entries: 32,
        }
    }
}

/// Construction failure: bad config caught once, up front (spec.md §7).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstructionError {
    InvalidChannel(u8),
    ZeroCapacity(&'static str),
}

impl fmt::Display for ConstructionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstructionError::InvalidChannel(c) => {
                write!(f, "invalid radio channel {c} (must be 0..14)")
            }
            ConstructionError::ZeroCapacity(field) => {
                write!(f, "{field} must be non-zero")
            }
        }
    }
}

impl std::error::Error for ConstructionError {}

impl CoreConfig {
    pub fn validate(&self) -> Result<(), ConstructionError> {
        if self.channel >= 14 {
            return Err(ConstructionError::InvalidChannel(self.channel));
        }
        if self.rx_queue_capacity == 0 {
            return Err(ConstructionError::ZeroCapacity("rx_queue_capacity"));
        }
        if self.max_message_bytes == 0 {
            return Err(ConstructionError::ZeroCapacity("max_message_bytes"));
        }
        if self.max_unmapped_entries == 0 {
            return Err(ConstructionError::ZeroCapacity("max_unmapped_entries"));
        }
        Ok(())
    }
}
