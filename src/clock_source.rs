//! Wall-clock synchronization.
//!
//! Timestamps on published records come from here. Until a sync succeeds
//! they degrade to time since boot; once synced the source stays synced for
//! the lifetime of the process (it is never re-synced, even after long link
//! outages).

use std::time::Duration;

use tokio::time::{sleep, Instant};

use crate::{log_debug, log_info, log_warn};
use crate::{Clock, ClockSyncConfig, Timestamp, SYNC_SANITY_EPOCH_SECS};

/// Whether wall-clock time is trustworthy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockSyncState {
    Unsynced,
    Synced,
}

/// Owns the platform clock and its sync state.
pub struct ClockSource {
    clock: Box<dyn Clock>,
    config: Option<ClockSyncConfig>,
    state: ClockSyncState,
    attempted: bool,
}

impl ClockSource {
    /// Create a clock source. `config: None` disables syncing entirely.
    pub fn new(clock: Box<dyn Clock>, config: Option<ClockSyncConfig>) -> Self {
        Self {
            clock,
            config,
            state: ClockSyncState::Unsynced,
            attempted: false,
        }
    }

    /// Current sync state.
    pub fn state(&self) -> ClockSyncState {
        self.state
    }

    /// Whether syncing is configured and has not yet succeeded.
    pub fn needs_sync(&self) -> bool {
        self.config.is_some() && self.state == ClockSyncState::Unsynced
    }

    /// Whether at least one sync attempt has been made.
    pub fn attempted(&self) -> bool {
        self.attempted
    }

    /// Milliseconds since boot.
    pub fn uptime_ms(&self) -> u64 {
        self.clock.uptime_ms()
    }

    /// Sync using the configured timeout for this attempt: the first-attempt
    /// timeout initially, the shorter retry timeout afterwards.
    ///
    /// Returns `Synced` immediately without touching the platform when
    /// already synced, and `Unsynced` when syncing is not configured.
    pub async fn sync(&mut self) -> ClockSyncState {
        // ---
        let Some(config) = &self.config else {
            return self.state;
        };
        let timeout = if self.attempted {
            config.retry_timeout
        } else {
            config.first_timeout
        };
        self.sync_with_timeout(timeout).await
    }

    /// Request a sync and wait up to `timeout` for the wall clock to pass
    /// the sanity threshold.
    pub async fn sync_with_timeout(&mut self, timeout: Duration) -> ClockSyncState {
        // ---
        if self.state == ClockSyncState::Synced {
            return self.state;
        }
        let Some(config) = &self.config else {
            return self.state;
        };

        let poll_interval = config.poll_interval;
        self.clock.request_sync(&config.servers);
        self.attempted = true;

        log_info!("clock: syncing via {:?}", config.servers);

        let start = Instant::now();
        loop {
            let epoch_secs = self.clock.epoch_ms() / 1000;
            if epoch_secs > SYNC_SANITY_EPOCH_SECS {
                self.state = ClockSyncState::Synced;
                log_info!("clock: synced, epoch {epoch_secs}s (UTC)");
                return self.state;
            }

            let elapsed = start.elapsed();
            if elapsed >= timeout {
                log_warn!("clock: sync timed out after {timeout:?}");
                return self.state;
            }

            log_debug!("clock: waiting for sync ({elapsed:?} elapsed)");
            sleep(poll_interval.min(timeout - elapsed)).await;
        }
    }

    /// Best-effort timestamp for a record.
    ///
    /// Wall-clock time once synced, time since boot otherwise.
    pub fn now(&self) -> Timestamp {
        // ---
        match self.state {
            ClockSyncState::Synced => {
                let millis = self.clock.epoch_ms();
                Timestamp {
                    secs: millis / 1000,
                    millis,
                    synced: true,
                }
            }
            ClockSyncState::Unsynced => {
                let millis = self.clock.uptime_ms();
                Timestamp {
                    secs: millis / 1000,
                    millis,
                    synced: false,
                }
            }
        }
    }
}
