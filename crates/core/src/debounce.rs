//! Debounce Guard
//!
//! Suppresses a repeated state-changing action requested within a short window
//! of the previous *accepted* one. Rejected calls are discarded, never queued.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;
use tokio::time::Instant;

pub const DEFAULT_DEBOUNCE_INTERVAL: Duration = Duration::from_secs(2);

/// Last-accepted timestamps per action kind, on the monotonic clock.
#[derive(Debug)]
pub struct DebounceGuard<K> {
    interval: Duration,
    last_accepted: Mutex<HashMap<K, Instant>>,
}

impl<K: Eq + Hash> DebounceGuard<K> {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_accepted: Mutex::new(HashMap::new()),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Returns `true` and records "now" when `kind` may proceed.
    ///
    /// Check and update happen under one lock, so two concurrent callers can
    /// never both be accepted inside the same window.
    pub fn allow(&self, kind: K) -> bool {
        self.allow_at(kind, Instant::now())
    }

    fn allow_at(&self, kind: K, now: Instant) -> bool {
        let mut last = self.last_accepted.lock();
        match last.get(&kind) {
            Some(previous) if now.saturating_duration_since(*previous) < self.interval => false,
            _ => {
                last.insert(kind, now);
                true
            }
        }
    }
}

impl<K: Eq + Hash> Default for DebounceGuard<K> {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE_INTERVAL)
    }
}
