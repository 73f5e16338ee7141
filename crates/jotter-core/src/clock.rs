//! Injectable time source for note stamps.

use std::sync::atomic::{AtomicI64, Ordering};

/// Source of millisecond timestamps
pub trait Clock: Send + Sync + 'static {
    /// Current time in Unix milliseconds
    fn now_ms(&self) -> i64;

    /// Current time in whole Unix seconds, as token expiries are kept
    fn now_secs(&self) -> i64 {
        self.now_ms().div_euclid(1_000)
    }
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Manually driven clock for deterministic tests and replays
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    #[must_use]
    pub const fn new(start_ms: i64) -> Self {
        Self {
            now: AtomicI64::new(start_ms),
        }
    }

    pub fn set(&self, now_ms: i64) {
        self.now.store(now_ms, Ordering::SeqCst);
    }

    pub fn advance(&self, delta_ms: i64) {
        self.now.fetch_add(delta_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Stamp for a mutation of a record last stamped at `previous`.
///
/// Always strictly greater than `previous`, so a single writer never produces
/// a version that loses a last-writer-wins comparison against its own past.
pub fn next_stamp(clock: &dyn Clock, previous: Option<i64>) -> i64 {
    let now = clock.now_ms();
    match previous {
        Some(previous) if now <= previous => previous.saturating_add(1),
        _ => now,
    }
}
