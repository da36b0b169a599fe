//! The radio driver trait consumed downward by the core (spec.md §6).

use aquamesh_wire::PeerId;
use core::fmt;

/// Synchronous, non-blocking radio send failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RadioError(pub String);

impl fmt::Display for RadioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "radio error: {}", self.0)
    }
}

impl std::error::Error for RadioError {}

/// Abstraction over the physical radio driver.
///
/// `send` must be synchronous and non-blocking, returning failure
/// immediately if the underlying driver rejects the frame. `add_peer` /
/// `remove_peer` are no-ops by default; override them if the driver
/// requires an explicit peer table (spec.md §6).
pub trait Radio {
    fn send(&mut self, dest: PeerId, bytes: &[u8]) -> Result<(), RadioError>;

    fn add_peer(&mut self, _mac: PeerId) {}

    fn remove_peer(&mut self, _mac: PeerId) {}
}
