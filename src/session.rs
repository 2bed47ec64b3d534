//! Transport session lifecycle.
//!
//! [`SessionManager`] owns the transport session and hides the difference
//! between the two session shapes from the agent loop:
//!
//! - **Persistent** sessions are (re-)established with an unbounded,
//!   fixed-delay retry loop whenever they are found down, and every
//!   establishment is followed by one retained `online` status record.
//! - **Request/response** sessions have nothing to establish; the `online`
//!   status is written once per process.
//!
//! Status announcements always happen before any telemetry is published on
//! the same session.

use crate::retry::{retry_with_delay, RetryPolicy};
use crate::telemetry::{status_payload, DeviceStatus};
use crate::{log_debug, log_info, log_warn};
use crate::{
    //
    Destinations,
    Inbound,
    Record,
    Result,
    SessionPtr,
    SessionShape,
    Timestamp,
};

/// What [`SessionManager::ensure_session`] had to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// The session was already usable.
    Ready,
    /// A new session was established (persistent shape only).
    Established {
        /// Connect attempts it took, including the successful one.
        attempts: u32,
    },
}

/// Owns a transport session and its establishment policy.
pub struct SessionManager {
    // ---
    session: SessionPtr,
    device_id: String,
    destinations: Destinations,
    retry: RetryPolicy,
    status_announced: bool,
    establishments: u32,
}

impl SessionManager {
    /// Wrap `session`. Destinations are derived by the caller for the
    /// session's shape.
    pub fn new(
        session: SessionPtr,
        device_id: impl Into<String>,
        destinations: Destinations,
        retry: RetryPolicy,
    ) -> Self {
        // ---
        Self {
            session,
            device_id: device_id.into(),
            destinations,
            retry,
            status_announced: false,
            establishments: 0,
        }
    }

    /// Session shape of the underlying transport.
    pub fn shape(&self) -> SessionShape {
        self.session.shape()
    }

    /// Transport id of the underlying transport.
    pub fn transport_id(&self) -> &str {
        self.session.transport_id()
    }

    /// Destinations records are published to.
    pub fn destinations(&self) -> &Destinations {
        &self.destinations
    }

    /// Whether the session is currently usable.
    pub fn is_connected(&self) -> bool {
        self.session.is_connected()
    }

    /// Number of sessions established so far.
    pub fn establishments(&self) -> u32 {
        self.establishments
    }

    /// Make sure the session is usable, announcing `online` where due.
    ///
    /// For a persistent session that is down this blocks, retrying with the
    /// fixed delay, until the session is established; it never gives up.
    /// `now` supplies the timestamp for the status record.
    pub async fn ensure_session(&mut self, now: impl Fn() -> Timestamp) -> Result<SessionEvent> {
        // ---
        match self.session.shape() {
            SessionShape::RequestResponse => {
                if !self.status_announced {
                    self.status_announced = true;
                    self.announce_online(now()).await;
                }
                Ok(SessionEvent::Ready)
            }
            SessionShape::Persistent => {
                if self.session.is_connected() {
                    return Ok(SessionEvent::Ready);
                }

                let label = self.session.transport_id().to_string();
                log_info!("{label}: establishing session");

                let mut attempts = 0u32;
                retry_with_delay(&self.retry, &label, &mut self.session, |s: &mut SessionPtr| {
                    attempts += 1;
                    s.connect()
                })
                .await?;

                self.establishments += 1;
                log_info!("{label}: session established after {attempts} attempt(s)");

                self.announce_online(now()).await;
                self.status_announced = true;
                Ok(SessionEvent::Established { attempts })
            }
        }
    }

    /// Service inbound traffic and keepalive.
    ///
    /// A failure here means the session was lost; it is re-established by
    /// the next [`ensure_session`](Self::ensure_session).
    pub async fn pump(&mut self) -> Vec<Inbound> {
        // ---
        match self.session.pump().await {
            Ok(inbound) => inbound,
            Err(err) => {
                log_warn!("{}: session lost while pumping: {err}", self.transport_id());
                Vec::new()
            }
        }
    }

    /// Publish one record, returning the transport's verdict.
    pub async fn publish(&mut self, record: Record) -> Result<()> {
        self.session.publish(record).await
    }

    /// Close the underlying session.
    pub async fn close(&mut self) -> Result<()> {
        self.session.close().await
    }

    async fn announce_online(&mut self, timestamp: Timestamp) {
        // ---
        let payload = match status_payload(&self.device_id, DeviceStatus::Online, timestamp) {
            Ok(payload) => payload,
            Err(err) => {
                log_warn!("{}: cannot encode status: {err}", self.transport_id());
                return;
            }
        };

        let record = Record::status(self.destinations.status.clone(), payload);
        match self.session.publish(record).await {
            Ok(()) => log_info!(
                "{}: status online -> {}",
                self.transport_id(),
                self.destinations.status
            ),
            Err(err) => log_warn!(
                "{}: status publish to {} failed: {err}",
                self.transport_id(),
                self.destinations.status
            ),
        }
        log_debug!("{}: status announced", self.transport_id());
    }
}
