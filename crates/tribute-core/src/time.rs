//! Wall-clock time for expiry and scheduling
//!
//! Every deadline in the runtime is an absolute instant in epoch milliseconds,
//! computed once and compared against the current time on each check:
//! - `Millis` - an instant or a duration in milliseconds
//! - `Clock` - source of the current instant
//! - `SystemClock` - real wall clock
//! - `ManualClock` - settable clock for simulations and tests

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Epoch milliseconds, or a duration in milliseconds
pub type Millis = i64;

/// Duration of one host world tick
pub const GAME_TICK_MS: Millis = 600;

/// Source of the current wall-clock instant
pub trait Clock {
    fn now_ms(&self) -> Millis;
}

/// The system wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> Millis {
        chrono::Utc::now().timestamp_millis()
    }
}

/// A clock that only moves when told to
///
/// Clones share the same instant.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicI64>,
}

impl ManualClock {
    /// Create a clock frozen at `now`
    pub fn new(now: Millis) -> Self {
        Self {
            now: Arc::new(AtomicI64::new(now)),
        }
    }

    /// Jump to an absolute instant
    pub fn set(&self, now: Millis) {
        self.now.store(now, Ordering::SeqCst);
    }

    /// Move forward by `delta` milliseconds
    pub fn advance(&self, delta: Millis) -> Millis {
        self.now.fetch_add(delta, Ordering::SeqCst) + delta
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> Millis {
        self.now.load(Ordering::SeqCst)
    }
}

/// Format a duration as `1h 2m 3s` for notifications
pub fn format_duration(ms: Millis) -> String {
    let total = (ms.max(0) + 999) / 1000;
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;

    let mut parts = Vec::new();
    if hours > 0 {
        parts.push(format!("{}h", hours));
    }
    if minutes > 0 {
        parts.push(format!("{}m", minutes));
    }
    if seconds > 0 || parts.is_empty() {
        parts.push(format!("{}s", seconds));
    }
    parts.join(" ")
}
