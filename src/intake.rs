//! Receive intake (spec.md §4.2): the handoff from the restricted radio
//! upcall context to normal execution.
//!
//! The queue is the one structure shared between the upcall and normal-context
//! code (spec.md §5). `push` must never allocate and must return in bounded
//! time regardless of what normal-context code is doing. We model the
//! "disable-interrupts-around-critical-section" option spec.md §9 allows as a
//! plain `std::sync::Mutex` guarding a pre-allocated ring, with `push` using
//! `try_lock` so a momentarily-busy drain loop never stalls the upcall —
//! contention (vastly rarer than an actually-full queue) is counted the same
//! way as overflow, since both are "the datagram didn't make it into the
//! queue" from the upcall's point of view. See DESIGN.md for the grounding
//! and the trade-off this records against a hand-rolled lock-free ring.

use aquamesh_wire::{PeerId, MTU};
use std::collections::VecDeque;
use std::sync::Mutex;

/// One queued datagram: the sender plus a copy of its raw bytes.
#[derive(Debug, Clone)]
pub struct RxSlot {
    pub peer: PeerId,
    pub len: u16,
    pub buf: [u8; MTU],
}

impl RxSlot {
    pub fn bytes(&self) -> &[u8] {
        &self.buf[..self.len as usize]
    }
}

struct Inner {
    queue: VecDeque<RxSlot>,
    capacity: usize,
}

/// Bounded queue of `RxSlot`s bridging the radio upcall and the drain loop.
pub struct IntakeQueue {
    inner: Mutex<Inner>,
}

impl IntakeQueue {
    pub fn new(capacity: usize) -> Self {
        IntakeQueue {
            inner: Mutex::new(Inner {
                queue: VecDeque::with_capacity(capacity),
                capacity,
            }),
        }
    }

    /// Copy a datagram into the queue. Callable from the radio upcall.
    ///
    /// Never allocates (the `VecDeque` was pre-sized at construction and
    /// never grows past `capacity`) and never blocks: on lock contention or
    /// a full queue, the *incoming* datagram is dropped and `true` is
    /// returned to indicate the drop so the caller can bump
    /// `dropped_on_intake`.
    #[must_use]
    pub fn push(&self, peer: PeerId, bytes: &[u8]) -> bool {
        let Ok(mut inner) = self.inner.try_lock() else {
            return true;
        };
        if inner.queue.len() >= inner.capacity {
            return true;
        }
        let mut buf = [0u8; MTU];
        let len = bytes.len().min(MTU);
        buf[..len].copy_from_slice(&bytes[..len]);
        inner.queue.push_back(RxSlot {
            peer,
            len: len as u16,
            buf,
        });
        false
    }

    /// Pop one slot, or `None` if the queue is empty. Normal-context only.
    pub fn drain_one(&self) -> Option<RxSlot> {
        self.inner.lock().ok().and_then(|mut inner| inner.queue.pop_front())
    }

    /// Current queue length (normal-context diagnostics only).
    pub fn len(&self) -> usize {
        self.inner.lock().map(|i| i.queue.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
