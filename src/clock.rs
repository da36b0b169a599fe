//! Time source abstraction.
//!
//! `send_fragmented` and `send_with_retry` are the only intentional
//! blocking points in the hot path (spec.md §5) — they call [`Clock::sleep`]
//! directly rather than scheduling through `tick`, since this core targets a
//! single-threaded cooperative main loop with no async runtime. Tests swap in
//! a non-sleeping fake clock (see `aquamesh-test-support`) to stay fast and
//! deterministic.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub trait Clock {
    /// Milliseconds since an arbitrary epoch. Only used to seed
    /// `SystemClock`-backed demos; the core itself is driven by the
    /// `now_ms` the caller passes into `tick`.
    fn now_ms(&self) -> u64;

    /// Block the calling thread for `millis` milliseconds.
    fn sleep(&self, millis: u64);
}

/// Real wall-clock time via `std::thread::sleep`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }

    fn sleep(&self, millis: u64) {
        std::thread::sleep(Duration::from_millis(millis));
    }
}
