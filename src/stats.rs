//! Statistics counters (spec.md §6: "Statistics exposed").
//!
//! Backed by `AtomicU64`s so `intake_push` — invoked from the restricted
//! radio-upcall context, possibly concurrently with normal-context code
//! reading `statistics()` — never needs a lock. Grounded in the
//! `AtomicHubMetrics` pattern from the corpus's `horus_core` hub
//! (cache-friendly, `Ordering::Relaxed` throughout since these are
//! monitoring counters, not synchronization primitives).

use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time snapshot of all core counters, returned by
/// `Core::statistics()`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Statistics {
    pub sent: u64,
    pub received: u64,
    pub send_failures: u64,
    pub retries: u64,
    pub fragments_sent: u64,
    pub fragments_received: u64,
    pub reassembly_timeouts: u64,
    pub reassembly_errors: u64,
    pub duplicates_ignored: u64,
    pub dropped_on_intake: u64,
}

/// Live, atomically-updated counters.
#[derive(Debug, Default)]
pub struct AtomicStatistics {
    sent: AtomicU64,
    received: AtomicU64,
    send_failures: AtomicU64,
    retries: AtomicU64,
    fragments_sent: AtomicU64,
    fragments_received: AtomicU64,
    reassembly_timeouts: AtomicU64,
    reassembly_errors: AtomicU64,
    duplicates_ignored: AtomicU64,
    dropped_on_intake: AtomicU64,
}

macro_rules! counter_inc {
    ($name:ident) => {
        pub fn $name(&self) {
            self.$name.fetch_add(1, Ordering::Relaxed);
        }
    };
}

impl AtomicStatistics {
    counter_inc!(sent);
    counter_inc!(received);
    counter_inc!(send_failures);
    counter_inc!(retries);
    counter_inc!(fragments_sent);
    counter_inc!(fragments_received);
    counter_inc!(reassembly_timeouts);
    counter_inc!(reassembly_errors);
    counter_inc!(duplicates_ignored);
    counter_inc!(dropped_on_intake);

    pub fn snapshot(&self) -> Statistics {
        Statistics {
            sent: self.sent.load(Ordering::Relaxed),
            received: self.received.load(Ordering::Relaxed),
            send_failures: self.send_failures.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            fragments_sent: self.fragments_sent.load(Ordering::Relaxed),
            fragments_received: self.fragments_received.load(Ordering::Relaxed),
            reassembly_timeouts: self.reassembly_timeouts.load(Ordering::Relaxed),
            reassembly_errors: self.reassembly_errors.load(Ordering::Relaxed),
            duplicates_ignored: self.duplicates_ignored.load(Ordering::Relaxed),
            dropped_on_intake: self.dropped_on_intake.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_start_at_zero() {
        let stats = AtomicStatistics::default();
        assert_eq!(stats.snapshot(), Statistics::default());
    }

    #[test]
    fn increments_are_reflected_in_snapshot() {
        let stats = AtomicStatistics::default();
        stats.sent();
        stats.sent();
        stats.dropped_on_intake();
        let snap = stats.snapshot();
        assert_eq!(snap.sent, 2);
        assert_eq!(snap.dropped_on_intake, 1);
        assert_eq!(snap.received, 0);
    }
}
