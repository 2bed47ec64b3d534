// src/domain/transport.rs

//! Transport session domain abstractions.
//!
//! This module defines the application-protocol session used by the agent to
//! deliver records. It intentionally avoids any reference to concrete
//! protocols or client libraries; an HTTP document store and an MQTT broker
//! both fit behind [`TransportSession`], differing only in their
//! [`SessionShape`].
//!
//! The transport layer is responsible only for delivering opaque records.
//! Scheduling, retries and status announcements are handled elsewhere.
//!
//! Concrete implementations of this interface live under `src/transport/`.
use crate::Result;
use bytes::Bytes;
use std::fmt;
use std::sync::Arc;

/// How a transport holds its application-level session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionShape {
    // ---
    /// A session is built for each publish and released afterwards
    /// (HTTP-style). There is no standing state between publishes.
    RequestResponse,

    /// A session survives across publishes and must be monitored, pumped,
    /// and re-established when lost (MQTT-style).
    Persistent,
}

/// Shared base state for all transport session implementations.
///
/// Each concrete transport embeds this as a field named `base` and returns
/// it from [`TransportSession::base`], so the default trait methods can
/// delegate here instead of repeating logic.
#[derive(Debug, Clone)]
pub struct SessionBase {
    /// Identifier used as the log prefix for this transport.
    pub transport_id: String,
    /// Session shape of the transport.
    pub shape: SessionShape,
}

impl SessionBase {
    /// Create a new `SessionBase`.
    pub fn new(transport_id: impl Into<String>, shape: SessionShape) -> Self {
        Self {
            transport_id: transport_id.into(),
            shape,
        }
    }
}

/// A transport destination.
///
/// Interpreted by the transport: an MQTT topic, or a database path that the
/// HTTP transport turns into a document URL. Destinations are immutable and
/// cheap to clone.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Destination(pub Arc<str>);

impl Destination {
    /// Borrow the destination as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<T> From<T> for Destination
where
    T: Into<Arc<str>>,
{
    fn from(value: T) -> Self {
        // ---
        Destination(value.into())
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The pair of destinations a device publishes to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Destinations {
    /// Where telemetry records go (append / non-retained).
    pub telemetry: Destination,
    /// Where the status record goes (replace / retained).
    pub status: Destination,
}

/// Write semantics requested for a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Create a new record under the destination (HTTP POST).
    Append,
    /// Overwrite the record at the destination (HTTP PUT).
    Replace,
}

/// An opaque record handed to a transport for delivery.
#[derive(Clone, Debug)]
pub struct Record {
    // ---
    /// Delivery destination.
    pub destination: Destination,

    /// Serialized payload bytes, typically compact JSON.
    pub payload: Bytes,

    /// Append or replace semantics; ignored by transports without documents.
    pub write: WriteMode,

    /// Ask the broker to retain the record for late subscribers.
    pub retain: bool,

    /// Payload format (e.g. "application/json").
    pub content_type: Arc<str>,
}

impl Record {
    // ---
    /// Create a telemetry record: appended, not retained.
    pub fn telemetry(destination: Destination, payload: Bytes) -> Self {
        // ---
        Self {
            destination,
            payload,
            write: WriteMode::Append,
            retain: false,
            content_type: Arc::from("application/json"),
        }
    }

    /// Create a status record: replaced in place and retained.
    pub fn status(destination: Destination, payload: Bytes) -> Self {
        // ---
        Self {
            destination,
            payload,
            write: WriteMode::Replace,
            retain: true,
            content_type: Arc::from("application/json"),
        }
    }
}

/// A message received on a persistent session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Inbound {
    /// Topic the message arrived on.
    pub source: Destination,
    /// Raw payload.
    pub payload: Bytes,
}

/// Transport session abstraction.
///
/// Implementations must ensure that:
/// - `publish()` reports success only when the record was handed to the
///   remote end (2xx for HTTP, packet written for MQTT).
/// - `pump()` never blocks longer than a short slice; it services keepalive
///   and inbound traffic and returns whatever arrived.
/// - A lost session is reflected by `is_connected()` returning `false`.
///
/// The memory transport serves as the reference implementation of these
/// semantics.
///
/// # Notes
///
/// This trait uses `async_trait`; the expanded documentation may show explicit
/// lifetimes and a boxed `Future`. Consumers should treat methods as normal
/// `async fn`s.
#[async_trait::async_trait]
pub trait TransportSession: Send {
    // ---
    /// Returns a reference to the shared base state.
    fn base(&self) -> &SessionBase;

    /// Returns the transport id used for logging.
    fn transport_id(&self) -> &str {
        &self.base().transport_id
    }

    /// Returns the session shape of the transport.
    fn shape(&self) -> SessionShape {
        self.base().shape
    }

    /// Whether a session is currently established.
    ///
    /// Request/response transports have no standing session and report
    /// `true`; each publish builds its own.
    fn is_connected(&self) -> bool;

    /// Make one attempt to establish the session.
    ///
    /// Bounded by the transport's own connect timeout. Retrying is the
    /// caller's concern.
    async fn connect(&mut self) -> Result<()>;

    /// Service inbound control traffic and keepalive.
    ///
    /// Must be called every loop iteration on persistent sessions.
    async fn pump(&mut self) -> Result<Vec<Inbound>>;

    /// Deliver a single record.
    async fn publish(&mut self, record: Record) -> Result<()>;

    /// Close the session and release any associated resources.
    async fn close(&mut self) -> Result<()>;
}

/// Owned transport session pointer.
///
/// The loop is single-threaded, so the session is exclusively owned by
/// whichever component drives it.
pub type SessionPtr = Box<dyn TransportSession>;

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_destination_from_owned_and_borrowed() {
        // ---
        let owned = Destination::from(String::from("plant/esp32_01/telemetry"));
        let borrowed = Destination::from("plant/esp32_01/telemetry");

        assert_eq!(owned, borrowed);
        assert_eq!(owned.to_string(), "plant/esp32_01/telemetry");

        let set: HashSet<Destination> = [owned, borrowed].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_record_constructors() {
        // ---
        let telemetry = Record::telemetry("t".into(), Bytes::from_static(b"{}"));
        assert_eq!(telemetry.write, WriteMode::Append);
        assert!(!telemetry.retain);

        let status = Record::status("s".into(), Bytes::from_static(b"{}"));
        assert_eq!(status.write, WriteMode::Replace);
        assert!(status.retain);
        assert_eq!(&*status.content_type, "application/json");
    }
}
