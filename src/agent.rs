//! The device loop.
//!
//! One [`Agent`] owns every component and drives them from a single task,
//! strictly in sequence:
//!
//! ```text
//! ensure link ─┬─ down ──────────────────────────────────────► (next tick)
//!              └─ up ─► clock sync (while unsynced)
//!                       ─► ensure session (+ online status)
//!                       ─► pump
//!                       ─► scheduler due? ─► telemetry pipeline
//! ```
//!
//! No step's failure ends the loop; each is logged and retried on a later
//! iteration according to its component's policy.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;

use crate::clock_source::{ClockSource, ClockSyncState};
use crate::link_manager::LinkManager;
use crate::pipeline::{PublishOutcome, TelemetryPipeline};
use crate::scheduler::PublishScheduler;
use crate::session::{SessionEvent, SessionManager};
use crate::{log_debug, log_info, log_warn};
use crate::{Inbound, LinkState};

/// What one loop iteration did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickOutcome {
    /// Link state after the link step.
    pub link: LinkState,
    /// Clock sync state after the sync step.
    pub clock: ClockSyncState,
    /// Session step result; `None` when the iteration stopped at the link.
    pub session: Option<SessionEvent>,
    /// Inbound messages drained by the pump step.
    pub inbound: Vec<Inbound>,
    /// Pipeline result; `None` when no publish was due.
    pub publish: Option<PublishOutcome>,
}

/// Connectivity-and-publish loop.
///
/// Built with [`AgentBuilder`](crate::AgentBuilder).
pub struct Agent {
    // ---
    device_id: String,
    link: LinkManager,
    clock: ClockSource,
    session: SessionManager,
    scheduler: PublishScheduler,
    pipeline: TelemetryPipeline,
    idle_delay: Duration,
}

impl Agent {
    // ---
    pub(crate) fn new(
        device_id: String,
        link: LinkManager,
        clock: ClockSource,
        session: SessionManager,
        scheduler: PublishScheduler,
        pipeline: TelemetryPipeline,
        idle_delay: Duration,
    ) -> Self {
        Self {
            device_id,
            link,
            clock,
            session,
            scheduler,
            pipeline,
            idle_delay,
        }
    }

    /// Device identifier this agent publishes as.
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Publish scheduler state.
    pub fn scheduler(&self) -> &PublishScheduler {
        &self.scheduler
    }

    /// Session manager, for inspection.
    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    /// Current clock sync state.
    pub fn clock_state(&self) -> ClockSyncState {
        self.clock.state()
    }

    /// Run one loop iteration.
    pub async fn tick(&mut self) -> TickOutcome {
        // ---
        let mut outcome = TickOutcome {
            link: LinkState::Down,
            clock: self.clock.state(),
            session: None,
            inbound: Vec::new(),
            publish: None,
        };

        if let Err(err) = self.link.ensure_link_up().await {
            log_debug!("{}: skipping iteration: {err}", self.device_id);
            return outcome;
        }
        outcome.link = LinkState::Up;

        if self.clock.needs_sync() {
            outcome.clock = self.clock.sync().await;
        }

        let clock = &self.clock;
        match self.session.ensure_session(|| clock.now()).await {
            Ok(event) => outcome.session = Some(event),
            Err(err) => {
                log_warn!("{}: session unavailable: {err}", self.device_id);
                return outcome;
            }
        }

        outcome.inbound = self.session.pump().await;
        for _message in &outcome.inbound {
            log_info!(
                "{}: message on {}: {}",
                self.device_id,
                _message.source,
                String::from_utf8_lossy(&_message.payload)
            );
        }

        let now_ms = self.clock.uptime_ms();
        if self.scheduler.claim(now_ms) {
            let timestamp = self.clock.now();
            outcome.publish = Some(self.pipeline.run_once(&mut self.session, timestamp).await);
        }

        outcome
    }

    /// Run the loop forever.
    pub async fn run(&mut self) {
        self.run_until(std::future::pending::<()>()).await
    }

    /// Run the loop until `signal` resolves, then close the session.
    ///
    /// An iteration in progress when the signal fires is abandoned. No
    /// `offline` status is published.
    pub async fn run_until<F>(&mut self, signal: F)
    where
        F: Future<Output = ()>,
    {
        // ---
        tokio::pin!(signal);

        log_info!(
            "{}: starting loop ({} via {}, every {}ms)",
            self.device_id,
            self.pipeline.destination(),
            self.session.transport_id(),
            self.scheduler.interval_ms()
        );

        loop {
            tokio::select! {
                _ = &mut signal => break,
                _ = async {
                    self.tick().await;
                    sleep(self.idle_delay).await;
                } => {}
            }
        }

        log_info!("{}: stopping", self.device_id);
        if let Err(_err) = self.session.close().await {
            log_debug!("{}: close failed: {_err}", self.device_id);
        }
    }
}
