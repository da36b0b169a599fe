//! Error taxonomy for the two categories that reach the user per spec.md §7:
//! synchronous send failures, and role-mismatch calls. Everything else
//! (decode errors, duplicates, reassembly anomalies, intake overflow) is
//! recovered locally and only shows up in `statistics()`.
//!
//! Manual `enum` + hand-written `Display`/`Error`, matching the teacher's
//! `UplinkError` in `services/forwarder/src/uplink.rs` rather than reaching
//! for `thiserror`.

use crate::radio::RadioError;
use core::fmt;

/// Failure returned by the send path (spec.md §4.6 / §7).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendError {
    /// `OnlineOnly` gate and the peer is not currently online.
    PeerOffline,
    /// The underlying radio driver rejected the frame.
    Radio(RadioError),
    /// A fragmented send aborted after successfully sending fragments
    /// `0..n`; `n` is the index of the fragment that failed.
    FragmentAborted(u8),
    /// Caller asked to send more than `max_message_bytes` in one logical
    /// command.
    PayloadTooLarge { max: usize, actual: usize },
}

impl fmt::Display for SendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SendError::PeerOffline => write!(f, "peer is offline"),
            SendError::Radio(e) => write!(f, "{e}"),
            SendError::FragmentAborted(i) => write!(f, "fragmented send aborted at fragment {i}"),
            SendError::PayloadTooLarge { max, actual } => {
                write!(f, "payload too large: max {max} bytes, got {actual}")
            }
        }
    }
}

impl std::error::Error for SendError {}

/// Returned when a hub-only or node-only API is called against the wrong
/// role. The core has exactly one role profile in any given process; this
/// is a programming-error guard, not a recoverable runtime condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleMismatch {
    pub expected: &'static str,
}

impl fmt::Display for RoleMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "this operation requires the {} role", self.expected)
    }
}

impl std::error::Error for RoleMismatch {}

/// `Core::provision` can fail either because the caller isn't a hub, or
/// because the `Config` send to the node itself failed (spec.md §4.7 /
/// §7: provisioning is retried via `send_with_retry` and its failure is a
/// synchronous send error, not a silently-recovered anomaly).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisionError {
    RoleMismatch(RoleMismatch),
    Send(SendError),
}

impl fmt::Display for ProvisionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProvisionError::RoleMismatch(e) => write!(f, "{e}"),
            ProvisionError::Send(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for ProvisionError {}

impl From<RoleMismatch> for ProvisionError {
    fn from(e: RoleMismatch) -> Self {
        ProvisionError::RoleMismatch(e)
    }
}

impl From<SendError> for ProvisionError {
    fn from(e: SendError) -> Self {
        ProvisionError::Send(e)
    }
}
