//! Local wall-clock abstraction.
//!
//! The status registry's timestamps must never come from a remote node's own
//! clock -- only from the controller's local notion of "now", so that clock
//! skew between nodes cannot corrupt grace-period arithmetic. `ClockSource` is
//! the seam that lets tests replace the real clock with a deterministic one.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Source of the controller's local time, in milliseconds since the Unix epoch.
pub trait ClockSource: Send + Sync {
    /// Returns the current local time.
    fn now_ms(&self) -> u64;
}

/// Production clock backed by the system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl ClockSource for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock is before Unix epoch")
            .as_millis() as u64
    }
}

/// Deterministic clock for tests. Time only moves when explicitly advanced,
/// so scenario tests can assert on exact tick boundaries.
#[derive(Debug, Clone)]
pub struct FixedClock {
    millis: Arc<AtomicU64>,
}

impl FixedClock {
    /// Creates a clock starting at `initial_ms`.
    #[must_use]
    pub fn new(initial_ms: u64) -> Self {
        Self {
            millis: Arc::new(AtomicU64::new(initial_ms)),
        }
    }

    /// Advances the clock by `delta_ms` and returns the new time.
    pub fn advance(&self, delta_ms: u64) -> u64 {
        self.millis.fetch_add(delta_ms, Ordering::Relaxed) + delta_ms
    }

    /// Sets the clock to an absolute time.
    pub fn set(&self, millis: u64) {
        self.millis.store(millis, Ordering::Relaxed);
    }
}

impl ClockSource for FixedClock {
    fn now_ms(&self) -> u64 {
        self.millis.load(Ordering::Relaxed)
    }
}
