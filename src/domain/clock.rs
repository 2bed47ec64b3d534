// src/domain/clock.rs

//! Time sources.

/// Any wall-clock reading at or below this is treated as "never synced"
/// (2020-01-01T00:00:00Z).
pub const SYNC_SANITY_EPOCH_SECS: u64 = 1_577_836_800;

/// Platform clock operations.
pub trait Clock: Send + Sync {
    /// Milliseconds since boot from a monotonic source.
    fn uptime_ms(&self) -> u64;

    /// Current wall-clock time as milliseconds since the Unix epoch.
    ///
    /// On a device that has not synced, this reads close to zero.
    fn epoch_ms(&self) -> u64;

    /// Ask the platform to start synchronizing against `servers`.
    ///
    /// Returns immediately; completion is observed through
    /// [`Clock::epoch_ms`].
    fn request_sync(&mut self, servers: &[String]);
}

/// A best-effort timestamp attached to published records.
///
/// Only a synced timestamp is wall-clock time. Unsynced values count from
/// boot, so records carry them under a different field name (`ts_ms`)
/// rather than as server time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timestamp {
    /// Seconds: epoch seconds when synced, seconds since boot otherwise.
    pub secs: u64,
    /// Milliseconds: epoch millis when synced, millis since boot otherwise.
    pub millis: u64,
    /// Whether the values are wall-clock time.
    pub synced: bool,
}
