// src/transport/memory/transport.rs

//! In-memory transport implementation.
//!
//! This file contains the concrete implementation of the domain-level
//! `TransportSession` trait using in-process data structures only.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use crate::{
    // ---
    log_debug,
    Destination,
    Inbound,
    Record,
    Result,
    SessionBase,
    SessionPtr,
    SessionShape,
    TransportSession,
    UplinkConfig,
    UplinkError,
};

#[derive(Default)]
struct HubState {
    published: Vec<Record>,
    inbound: VecDeque<Inbound>,
    connected: bool,
    connect_attempts: u32,
    pump_calls: u32,
    fail_connects: u32,
    fail_publishes: u32,
    closed: bool,
}

/// Shared state behind an in-memory transport.
///
/// Records every publish and connect attempt, and lets the owner script
/// failures: refuse the next N connects, fail the next N publishes, drop
/// the session, or queue inbound messages for `pump()`.
///
/// # ⚠️  Testing Only - Subject to Change
///
/// **This type is exposed only for `sensor-uplink`'s own integration tests.**
/// It may change or be removed in future versions without a deprecation
/// cycle. **Production code should use
/// [`create_transport`](crate::create_transport)** instead.
///
/// ```
/// # use sensor_uplink::{MemoryHub, SessionShape, UplinkConfig};
/// # async fn example() -> sensor_uplink::Result<()> {
/// let hub = MemoryHub::new();
/// hub.fail_next_connects(2);
///
/// let config = UplinkConfig::memory("esp32_01");
/// let session = sensor_uplink::create_memory_transport_with_hub(
///     &config,
///     hub.clone(),
///     SessionShape::Persistent,
/// )
/// .await?;
/// # Ok(())
/// # }
/// ```
pub struct MemoryHub {
    // ---
    state: Mutex<HubState>,
}

/// Acquire mutex guard, ignoring poisoning
fn lock_ignore_poison<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    match m.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl MemoryHub {
    /// Create a new, empty hub.
    pub fn new() -> Arc<Self> {
        // ---
        Arc::new(Self::default())
    }

    fn state(&self) -> MutexGuard<'_, HubState> {
        lock_ignore_poison(&self.state)
    }

    /// Refuse the next `n` connect attempts.
    pub fn fail_next_connects(&self, n: u32) {
        self.state().fail_connects = n;
    }

    /// Fail the next `n` publishes.
    pub fn fail_next_publishes(&self, n: u32) {
        self.state().fail_publishes = n;
    }

    /// Simulate the remote end dropping the session.
    pub fn drop_session(&self) {
        self.state().connected = false;
    }

    /// Queue an inbound message for the next `pump()`.
    pub fn inject(&self, source: impl Into<Destination>, payload: impl Into<bytes::Bytes>) {
        // ---
        self.state().inbound.push_back(Inbound {
            source: source.into(),
            payload: payload.into(),
        });
    }

    /// Every record successfully published so far, in order.
    pub fn published(&self) -> Vec<Record> {
        self.state().published.clone()
    }

    /// Records published to `destination`, in order.
    pub fn published_to(&self, destination: &str) -> Vec<Record> {
        // ---
        self.state()
            .published
            .iter()
            .filter(|r| r.destination.as_str() == destination)
            .cloned()
            .collect()
    }

    /// Number of connect attempts, successful or not.
    pub fn connect_attempts(&self) -> u32 {
        self.state().connect_attempts
    }

    /// Number of `pump()` calls.
    pub fn pump_calls(&self) -> u32 {
        self.state().pump_calls
    }

    /// Whether a session is currently up.
    pub fn is_connected(&self) -> bool {
        self.state().connected
    }

    /// Whether `close()` has been called.
    pub fn is_closed(&self) -> bool {
        self.state().closed
    }
}

impl Default for MemoryHub {
    fn default() -> Self {
        // ---
        Self {
            state: Mutex::new(HubState::default()),
        }
    }
}

/// Process-global hub used by [`create_transport`].
static GLOBAL_HUB: OnceLock<Arc<MemoryHub>> = OnceLock::new();

fn global_hub() -> Arc<MemoryHub> {
    GLOBAL_HUB.get_or_init(MemoryHub::new).clone()
}

/// In-memory transport.
///
/// Routes every operation through a shared [`MemoryHub`].
struct MemoryTransport {
    // ---
    base: SessionBase,
    hub: Arc<MemoryHub>,
}

#[async_trait::async_trait]
impl TransportSession for MemoryTransport {
    // ---
    fn base(&self) -> &SessionBase {
        &self.base
    }

    fn is_connected(&self) -> bool {
        // ---
        match self.shape() {
            SessionShape::RequestResponse => true,
            SessionShape::Persistent => self.hub.is_connected(),
        }
    }

    async fn connect(&mut self) -> Result<()> {
        // ---
        let mut state = self.hub.state();
        state.connect_attempts += 1;

        if state.fail_connects > 0 {
            state.fail_connects -= 1;
            log_debug!("{}: connect refused (scripted)", self.base.transport_id);
            return Err(UplinkError::SessionLost);
        }

        state.connected = true;
        state.closed = false;
        Ok(())
    }

    async fn pump(&mut self) -> Result<Vec<Inbound>> {
        // ---
        let mut state = self.hub.state();
        state.pump_calls += 1;

        if self.base.shape == SessionShape::Persistent && !state.connected {
            return Err(UplinkError::SessionLost);
        }
        Ok(state.inbound.drain(..).collect())
    }

    async fn publish(&mut self, record: Record) -> Result<()> {
        // ---
        let mut state = self.hub.state();

        if self.base.shape == SessionShape::Persistent && !state.connected {
            return Err(UplinkError::SessionLost);
        }

        if state.fail_publishes > 0 {
            state.fail_publishes -= 1;
            log_debug!(
                "{}: publish to {} failed (scripted)",
                self.base.transport_id,
                record.destination
            );
            return Err(UplinkError::Status(503));
        }

        log_debug!(
            "{}: publish to {} ({} bytes)",
            self.base.transport_id,
            record.destination,
            record.payload.len()
        );
        state.published.push(record);
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        // ---
        let mut state = self.hub.state();
        state.connected = false;
        state.closed = true;
        Ok(())
    }
}

/// Create a persistent in-memory transport on the process-global hub.
///
/// # Errors
///
/// Currently infallible; always returns `Ok`.
pub async fn create_transport(config: &UplinkConfig) -> Result<SessionPtr> {
    // ---
    create_transport_with_hub(config, global_hub(), SessionShape::Persistent).await
}

/// Create an in-memory transport of the given shape on the provided hub.
///
/// # ⚠️  Testing Only - Subject to Change
///
/// **This function is exposed only for `sensor-uplink`'s own integration
/// tests.** It may change or be removed in future versions without a
/// deprecation cycle.
///
/// # Errors
///
/// Currently infallible; always returns `Ok`.
pub async fn create_transport_with_hub(
    config: &UplinkConfig,
    hub: Arc<MemoryHub>,
    shape: SessionShape,
) -> Result<SessionPtr> {
    // ---
    log_debug!("{}: create memory transport ({shape:?})", config.device_id);

    let transport = MemoryTransport {
        base: SessionBase::new(format!("memory:{}", config.device_id), shape),
        hub,
    };

    Ok(Box::new(transport))
}
