//! Reassembly engine (spec.md §4.4): turns a sequence of single-frame
//! `Command` fragments into one logical message, one in-flight message per
//! peer.

/// A fixed-capacity append-only buffer. Capacity is reserved once, at
/// construction, and never grown — `try_extend` fails rather than
/// reallocating, standing in for the spec's `bounded::Vec<u8,
/// MAX_MESSAGE_BYTES>` in a crate that has no `heapless` dependency.
#[derive(Debug, Clone)]
pub struct BoundedBuffer {
    data: Vec<u8>,
    cap: usize,
}

impl BoundedBuffer {
    pub fn new(cap: usize) -> Self {
        BoundedBuffer {
            data: Vec::with_capacity(cap),
            cap,
        }
    }

    pub fn try_extend(&mut self, bytes: &[u8]) -> Result<(), ()> {
        if self.data.len() + bytes.len() > self.cap {
            return Err(());
        }
        self.data.extend_from_slice(bytes);
        Ok(())
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Per-peer reassembly state. At most one per peer (spec.md §3 invariants).
#[derive(Debug, Clone)]
pub struct ReassemblySlot {
    pub command_id: u8,
    pub expected_next_seq: u8,
    pub started_ms: u64,
    pub buffer: BoundedBuffer,
}

/// Why a slot was discarded, for statistics attribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetReason {
    /// `now - started_ms > reassembly_timeout_ms`.
    Timeout,
    /// Fragment arrived out of order, for the wrong command, or the buffer
    /// would overflow `max_message_bytes`.
    OutOfOrder,
    /// A new `fragment_seq == 0` arrived while already reassembling; the
    /// old (incomplete) message is discarded and a new one begins.
    ReplacedByNewFragmentZero,
}

/// What happened to the fragment that was just offered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentStatus {
    /// Appended; more fragments are still expected.
    Accepted,
    /// `final_fragment` fragment appended — the slot now holds the complete
    /// message. The caller must read `slot.buffer` and then clear the slot.
    Completed,
    /// `fragment_seq > 0` arrived with no active slot for this peer.
    IgnoredNoActiveSlot,
}

/// Outcome of offering one fragment to a peer's (possibly absent) slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FragmentResult {
    /// Set when a *previously* in-flight message was discarded as a side
    /// effect of processing this fragment (timeout noticed on arrival, or
    /// an out-of-order / overflowing fragment, or a restart).
    pub dropped_previous: Option<ResetReason>,
    pub status: FragmentStatus,
}

/// Advance the per-peer reassembly state machine by one fragment
/// (spec.md §4.4's state diagram).
///
/// `slot` is `PeerState::reassembly`. On `FragmentStatus::Completed` the
/// caller is responsible for reading `slot.as_ref().unwrap().buffer` (and
/// `command_id`) before the next call — this function does not clear a
/// completed slot itself so the caller can hand a borrowed slice to
/// `on_command` without an extra copy; call [`clear`] afterward.
pub fn accept_fragment(
    slot: &mut Option<ReassemblySlot>,
    command_id: u8,
    fragment_seq: u8,
    final_fragment: bool,
    payload: &[u8; 32],
    now_ms: u64,
    timeout_ms: u64,
    max_bytes: usize,
) -> FragmentResult {
    let mut dropped_previous = None;

    if let Some(existing) = slot.as_ref() {
        if now_ms.saturating_sub(existing.started_ms) > timeout_ms {
            *slot = None;
            dropped_previous = Some(ResetReason::Timeout);
        }
    }

    match slot.as_mut() {
        None => {
            if fragment_seq != 0 {
                return FragmentResult {
                    dropped_previous,
                    status: FragmentStatus::IgnoredNoActiveSlot,
                };
            }
            start_slot(slot, command_id, fragment_seq, final_fragment, payload, now_ms, max_bytes, dropped_previous)
        }
        Some(existing) => {
            if fragment_seq == 0 {
                dropped_previous = Some(ResetReason::ReplacedByNewFragmentZero);
                *slot = None;
                return start_slot(slot, command_id, fragment_seq, final_fragment, payload, now_ms, max_bytes, dropped_previous);
            }
            if fragment_seq != existing.expected_next_seq || command_id != existing.command_id {
                *slot = None;
                return FragmentResult {
                    dropped_previous: Some(ResetReason::OutOfOrder),
                    status: FragmentStatus::IgnoredNoActiveSlot,
                };
            }
            if existing.buffer.try_extend(payload).is_err() {
                *slot = None;
                return FragmentResult {
                    dropped_previous: Some(ResetReason::OutOfOrder),
                    status: FragmentStatus::IgnoredNoActiveSlot,
                };
            }
            existing.expected_next_seq = existing.expected_next_seq.wrapping_add(1);
            FragmentResult {
                dropped_previous,
                status: if final_fragment {
                    FragmentStatus::Completed
                } else {
                    FragmentStatus::Accepted
                },
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn start_slot(
    slot: &mut Option<ReassemblySlot>,
    command_id: u8,
    fragment_seq: u8,
    final_fragment: bool,
    payload: &[u8; 32],
    now_ms: u64,
    max_bytes: usize,
    dropped_previous: Option<ResetReason>,
) -> FragmentResult {
    debug_assert_eq!(fragment_seq, 0);
    let mut buffer = BoundedBuffer::new(max_bytes);
    if buffer.try_extend(payload).is_err() {
        return FragmentResult {
            dropped_previous: Some(ResetReason::OutOfOrder),
            status: FragmentStatus::IgnoredNoActiveSlot,
        };
    }
    *slot = Some(ReassemblySlot {
        command_id,
        expected_next_seq: 1,
        started_ms: now_ms,
        buffer,
    });
    FragmentResult {
        dropped_previous,
        status: if final_fragment {
            FragmentStatus::Completed
        } else {
            FragmentStatus::Accepted
        },
    }
}

/// Release a completed or abandoned slot, returning it to `Idle`.
pub fn clear(slot: &mut Option<ReassemblySlot>) {
    *slot = None;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(byte: u8) -> [u8; 32] {
        let mut w = [0u8; 32];
        w[0] = byte;
        w
    }

    #[test]
    fn single_fragment_completes_immediately() {
        let mut slot = None;
        let r = accept_fragment(&mut slot, 1, 0, true, &window(0xAA), 0, 1_500, 512);
        assert_eq!(r.status, FragmentStatus::Completed);
        assert_eq!(slot.unwrap().buffer.as_slice(), &window(0xAA)[..]);
    }

    #[test]
    fn three_fragment_command_reassembles_in_order() {
        let mut slot = None;
        assert_eq!(
            accept_fragment(&mut slot, 5, 0, false, &window(1), 0, 1_500, 512).status,
            FragmentStatus::Accepted
        );
        assert_eq!(
            accept_fragment(&mut slot, 5, 1, false, &window(2), 10, 1_500, 512).status,
            FragmentStatus::Accepted
        );
        let r = accept_fragment(&mut slot, 5, 2, true, &window(3), 20, 1_500, 512);
        assert_eq!(r.status, FragmentStatus::Completed);
        let buf = slot.unwrap().buffer;
        assert_eq!(buf.len(), 96);
        assert_eq!(buf.as_slice()[0], 1);
        assert_eq!(buf.as_slice()[32], 2);
        assert_eq!(buf.as_slice()[64], 3);
    }

    #[test]
    fn out_of_order_fragment_drops_slot() {
        let mut slot = None;
        accept_fragment(&mut slot, 5, 0, false, &window(1), 0, 1_500, 512);
        let r = accept_fragment(&mut slot, 5, 2, false, &window(3), 10, 1_500, 512);
        assert_eq!(r.status, FragmentStatus::IgnoredNoActiveSlot);
        assert_eq!(r.dropped_previous, Some(ResetReason::OutOfOrder));
        assert!(slot.is_none());
    }

    #[test]
    fn fragment_with_no_active_slot_is_ignored() {
        let mut slot = None;
        let r = accept_fragment(&mut slot, 5, 1, false, &window(1), 0, 1_500, 512);
        assert_eq!(r.status, FragmentStatus::IgnoredNoActiveSlot);
        assert_eq!(r.dropped_previous, None);
        assert!(slot.is_none());
    }

    #[test]
    fn timeout_is_enforced_on_next_arrival() {
        let mut slot = None;
        accept_fragment(&mut slot, 5, 0, false, &window(1), 0, 1_500, 512);
        // An unrelated fragment arrives long after the timeout; the old
        // slot must be dropped as a timeout, not silently reused.
        let r = accept_fragment(&mut slot, 9, 0, true, &window(9), 5_000, 1_500, 512);
        assert_eq!(r.dropped_previous, Some(ResetReason::Timeout));
        assert_eq!(r.status, FragmentStatus::Completed);
        assert_eq!(slot.unwrap().command_id, 9);
    }

    #[test]
    fn new_fragment_zero_while_reassembling_restarts_the_slot() {
        let mut slot = None;
        accept_fragment(&mut slot, 5, 0, false, &window(1), 0, 1_500, 512);
        let r = accept_fragment(&mut slot, 9, 0, true, &window(9), 100, 1_500, 512);
        assert_eq!(r.dropped_previous, Some(ResetReason::ReplacedByNewFragmentZero));
        assert_eq!(r.status, FragmentStatus::Completed);
        assert_eq!(slot.unwrap().command_id, 9);
    }

    #[test]
    fn fragment_that_would_overflow_the_buffer_drops_the_slot() {
        let mut slot = None;
        // max_bytes = 32: the second fragment doesn't fit.
        accept_fragment(&mut slot, 1, 0, false, &window(1), 0, 1_500, 32);
        let r = accept_fragment(&mut slot, 1, 1, true, &window(2), 10, 1_500, 32);
        assert_eq!(r.status, FragmentStatus::IgnoredNoActiveSlot);
        assert!(slot.is_none());
    }
}
