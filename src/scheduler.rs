//! Publish cadence.
//!
//! The scheduler bounds the telemetry rate. The timer is advanced when a
//! publish attempt is *committed*, before its outcome is known, so a failed
//! attempt still consumes a full interval and never triggers a fast retry.

use std::time::Duration;

/// Fixed-interval publish scheduler. Times are milliseconds since boot.
#[derive(Debug, Clone)]
pub struct PublishScheduler {
    interval_ms: u64,
    last_publish_ms: u64,
}

impl PublishScheduler {
    /// Create a scheduler whose timer starts at boot (time zero), so the
    /// first publish is due one interval after boot.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval_ms: interval.as_millis() as u64,
            last_publish_ms: 0,
        }
    }

    /// Configured interval in milliseconds.
    pub fn interval_ms(&self) -> u64 {
        self.interval_ms
    }

    /// Timestamp of the last committed publish attempt.
    pub fn last_publish_ms(&self) -> u64 {
        self.last_publish_ms
    }

    /// True iff `now - last_publish >= interval`.
    ///
    /// Uses wrapping arithmetic so a wrapped millisecond counter still
    /// yields the elapsed time.
    pub fn due_now(&self, now_ms: u64) -> bool {
        now_ms.wrapping_sub(self.last_publish_ms) >= self.interval_ms
    }

    /// Record that a publish attempt is being made at `now_ms`.
    pub fn commit(&mut self, now_ms: u64) {
        self.last_publish_ms = now_ms;
    }

    /// Check and commit in one step: returns `true` and advances the timer
    /// when a publish is due.
    pub fn claim(&mut self, now_ms: u64) -> bool {
        // ---
        if self.due_now(now_ms) {
            self.commit(now_ms);
            true
        } else {
            false
        }
    }
}
