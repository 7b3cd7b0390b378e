//! # Time Source
//!
//! STHs carry `issued_at` as Unix seconds. The log reads the current time
//! through [`Clock`] so that tests can pin it.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};

/// A source of the current Unix time in seconds.
pub trait Clock: Send + Sync {
    /// Current Unix time in whole seconds.
    fn now_unix(&self) -> i64;
}

/// Wall-clock time from the system, via chrono.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_unix(&self) -> i64 {
        Utc::now().timestamp()
    }
}

/// A manually driven clock for deterministic tests and replays.
#[derive(Debug)]
pub struct FixedClock(AtomicI64);

impl FixedClock {
    /// Create a clock frozen at `secs`.
    pub fn new(secs: i64) -> Self {
        Self(AtomicI64::new(secs))
    }

    /// Move the clock forward by `secs`.
    pub fn advance(&self, secs: i64) {
        self.0.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now_unix(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}

/// Render Unix seconds as RFC 3339 UTC (`YYYY-MM-DDTHH:MM:SSZ`).
///
/// Returns `None` for values chrono cannot represent.
pub fn format_unix(secs: i64) -> Option<String> {
    DateTime::<Utc>::from_timestamp(secs, 0)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
}
