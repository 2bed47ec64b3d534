//! MQTT transport implementation using `rumqttc`.
//!
//! This module provides an implementation of the `TransportSession` trait
//! backed by an MQTT broker connection.
//!
//! ## Concurrency model
//!
//! The transport owns the `AsyncClient` and its `EventLoop` directly. There
//! is no background task: the agent loop is the only driver, and every
//! interaction with the broker happens inside `connect()`, `pump()`,
//! `publish()` or `close()`. Between calls the event loop is idle, so
//! `pump()` must be called every iteration to keep the session alive.
//!
//! ## Connection behavior
//!
//! `connect()` builds a **fresh** client and polls its event loop until the
//! broker's CONNACK arrives, bounded by the configured connect timeout.
//! Configured topics are re-subscribed after every successful CONNACK.
//!
//! Any event-loop error drops the session; `is_connected()` then reports
//! `false` and the session manager reconnects with a new client.
//!
//! ## Message delivery semantics
//!
//! - Publishes use QoS 0 (at most once); the retain flag comes from the record.
//! - `publish()` returns once the packet has been written to the socket.
//! - Inbound publishes seen while flushing are buffered and returned by the
//!   next `pump()`.

use rumqttc::{
    //
    AsyncClient,
    ConnectReturnCode,
    Event,
    EventLoop,
    MqttOptions,
    Outgoing,
    Packet,
    Publish,
    QoS,
};

use std::time::Duration;

use tokio::time::timeout;

use crate::{
    //
    log_debug,
    log_error,
    log_info,
    log_warn,
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

/// How long a single `pump()` waits for the next ready event.
const PUMP_SLICE: Duration = Duration::from_millis(5);

/// Upper bound on events handled by one `pump()` call.
const PUMP_MAX_EVENTS: usize = 64;

/// Bound on the DISCONNECT flush in `close()`.
const CLOSE_TIMEOUT: Duration = Duration::from_millis(500);

/// Request channel capacity of the underlying client.
const CLIENT_CAPACITY: usize = 10;

/// Broker connection parameters, resolved once at creation.
#[derive(Debug, Clone)]
struct BrokerParams {
    client_id: String,
    host: String,
    port: u16,
    keep_alive: Option<Duration>,
}

/// Live client and event loop for one established session.
struct Connection {
    client: AsyncClient,
    event_loop: EventLoop,
}

/// MQTT-based implementation of the `TransportSession` trait.
///
/// Represents a single persistent broker session and provides best-effort,
/// non-durable delivery consistent with memory transport semantics.
pub struct RumqttcTransport {
    // ---
    base: SessionBase,
    params: BrokerParams,
    connect_timeout: Duration,
    request_timeout: Duration,
    subscriptions: Vec<String>,
    conn: Option<Connection>,
    pending: Vec<Inbound>,
}

impl RumqttcTransport {
    // ---

    fn new(transport_id: impl Into<String>, params: BrokerParams, config: &UplinkConfig) -> Self {
        // ---
        Self {
            base: SessionBase::new(transport_id, SessionShape::Persistent),
            params,
            connect_timeout: config.connect_timeout,
            request_timeout: config.request_timeout,
            subscriptions: config.subscriptions.clone(),
            conn: None,
            pending: Vec::new(),
        }
    }

    fn options(&self) -> MqttOptions {
        // ---
        let params = &self.params;
        let mut options = MqttOptions::new(&params.client_id, &params.host, params.port);
        if let Some(keep_alive) = params.keep_alive {
            options.set_keep_alive(keep_alive);
        }
        options
    }

    /// Forget the current session after a fatal event-loop error.
    fn drop_session(&mut self, err: &rumqttc::ConnectionError) {
        // ---
        if is_disconnect(err) {
            log_error!("{}: broker disconnected: {err}", self.base.transport_id);
        } else {
            log_error!("{}: mqtt error: {err}", self.base.transport_id);
        }
        self.conn = None;
    }

    /// Processes connection acknowledgment from the broker.
    ///
    /// Returns `true` when the broker accepted the session.
    fn handle_connack(&self, connack: &rumqttc::ConnAck) -> bool {
        // ---
        if connack.code == ConnectReturnCode::Success {
            log_info!(
                "{}: connected to broker {}:{} as {}",
                self.base.transport_id,
                self.params.host,
                self.params.port,
                self.params.client_id
            );
            true
        } else {
            log_error!(
                "{}: connection refused: {:?}",
                self.base.transport_id,
                connack.code
            );
            false
        }
    }

    fn handle_incoming(&mut self, publish: Publish) {
        // ---
        log_debug!(
            "{}: inbound on {} ({} bytes)",
            self.base.transport_id,
            publish.topic,
            publish.payload.len()
        );
        self.pending.push(Inbound {
            source: publish.topic.into(),
            payload: publish.payload,
        });
    }
}

fn is_disconnect(err: &rumqttc::ConnectionError) -> bool {
    // ---
    matches!(
        err,
        rumqttc::ConnectionError::Io(_) | rumqttc::ConnectionError::MqttState(_)
    )
}

#[async_trait::async_trait]
impl TransportSession for RumqttcTransport {
    // ---

    fn base(&self) -> &SessionBase {
        &self.base
    }

    fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    async fn connect(&mut self) -> Result<()> {
        // ---
        self.conn = None;

        let (client, mut event_loop) = AsyncClient::new(self.options(), CLIENT_CAPACITY);

        log_debug!(
            "{}: connecting to {}:{}",
            self.base.transport_id,
            self.params.host,
            self.params.port
        );

        let connack = timeout(self.connect_timeout, async {
            loop {
                match event_loop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(connack))) => return Ok(connack),
                    Ok(_event) => continue,
                    Err(err) => return Err(err),
                }
            }
        })
        .await;

        let connack = match connack {
            Ok(Ok(connack)) => connack,
            Ok(Err(err)) => {
                self.drop_session(&err);
                return Err(UplinkError::SessionLost);
            }
            Err(_elapsed) => {
                log_warn!(
                    "{}: no CONNACK within {:?}",
                    self.base.transport_id,
                    self.connect_timeout
                );
                return Err(UplinkError::Timeout);
            }
        };

        if !self.handle_connack(&connack) {
            return Err(UplinkError::SessionLost);
        }

        for topic in &self.subscriptions {
            match client.subscribe(topic, QoS::AtMostOnce).await {
                Ok(()) => log_info!("{}: subscribed to {topic}", self.base.transport_id),
                Err(_err) => log_error!(
                    "{}: subscribe failed for {topic}: {_err}",
                    self.base.transport_id
                ),
            }
        }

        self.conn = Some(Connection { client, event_loop });
        Ok(())
    }

    async fn pump(&mut self) -> Result<Vec<Inbound>> {
        // ---
        let mut failure = None;
        let mut remote_disconnect = false;

        if let Some(conn) = self.conn.as_mut() {
            let mut incoming = Vec::new();

            for _ in 0..PUMP_MAX_EVENTS {
                match timeout(PUMP_SLICE, conn.event_loop.poll()).await {
                    Err(_elapsed) => break,
                    Ok(Ok(Event::Incoming(Packet::Publish(publish)))) => incoming.push(publish),
                    Ok(Ok(Event::Incoming(Packet::Disconnect))) => {
                        remote_disconnect = true;
                        break;
                    }
                    Ok(Ok(_event)) => {
                        log_debug!("{}: mqtt event: {:?}", self.base.transport_id, _event);
                    }
                    Ok(Err(err)) => {
                        failure = Some(err);
                        break;
                    }
                }
            }

            for publish in incoming {
                self.handle_incoming(publish);
            }
        } else {
            return Err(UplinkError::SessionLost);
        }

        if let Some(err) = failure {
            self.drop_session(&err);
            return Err(UplinkError::SessionLost);
        }
        if remote_disconnect {
            log_warn!("{}: broker closed the session", self.base.transport_id);
            self.conn = None;
            return Err(UplinkError::SessionLost);
        }

        Ok(std::mem::take(&mut self.pending))
    }

    async fn publish(&mut self, record: Record) -> Result<()> {
        // ---
        let Some(conn) = self.conn.as_mut() else {
            return Err(UplinkError::SessionLost);
        };

        let topic = record.destination.as_str();

        if let Err(err) = conn
            .client
            .publish(topic, QoS::AtMostOnce, record.retain, record.payload.to_vec())
            .await
        {
            log_error!(
                "{}: publish failed for topic {topic}: {err}",
                self.base.transport_id
            );
            return Err(UplinkError::Transport(err.to_string()));
        }

        // Drive the event loop until the packet has been written.
        let mut incoming = Vec::new();
        let flushed = timeout(self.request_timeout, async {
            loop {
                match conn.event_loop.poll().await {
                    Ok(Event::Outgoing(Outgoing::Publish(_))) => return Ok(()),
                    Ok(Event::Incoming(Packet::Publish(publish))) => incoming.push(publish),
                    Ok(_event) => continue,
                    Err(err) => return Err(err),
                }
            }
        })
        .await;

        for publish in incoming {
            self.handle_incoming(publish);
        }

        match flushed {
            Ok(Ok(())) => {
                log_debug!(
                    "{}: published {} bytes to {} (retain={})",
                    self.base.transport_id,
                    record.payload.len(),
                    record.destination,
                    record.retain
                );
                Ok(())
            }
            Ok(Err(err)) => {
                self.drop_session(&err);
                Err(UplinkError::SessionLost)
            }
            Err(_elapsed) => {
                log_warn!(
                    "{}: publish to {} not flushed within {:?}",
                    self.base.transport_id,
                    record.destination,
                    self.request_timeout
                );
                Err(UplinkError::Timeout)
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        // ---
        let Some(mut conn) = self.conn.take() else {
            return Ok(());
        };

        log_debug!("{}: disconnecting mqtt client", self.base.transport_id);

        if let Err(_err) = conn.client.disconnect().await {
            log_debug!("{}: mqtt disconnect failed: {_err}", self.base.transport_id);
            return Ok(());
        }

        let _ = timeout(CLOSE_TIMEOUT, async {
            loop {
                match conn.event_loop.poll().await {
                    Ok(Event::Outgoing(Outgoing::Disconnect)) | Err(_) => break,
                    Ok(_) => continue,
                }
            }
        })
        .await;

        Ok(())
    }
}

/// Creates a rumqttc-based MQTT transport from the given configuration.
///
/// # Errors
///
/// Returns an error if:
/// - No transport URI is configured
/// - The port in the broker URI is not a number
///
/// # Connection Behavior
///
/// No network activity happens here; the broker connection is established
/// by the first `connect()` call.
pub async fn create_transport(config: &UplinkConfig) -> Result<SessionPtr> {
    // ---
    let params = broker_params(config)?;
    Ok(Box::new(RumqttcTransport::new("rumqttc", params, config)))
}

/// Resolves broker parameters from the given configuration.
fn broker_params(config: &UplinkConfig) -> Result<BrokerParams> {
    // ---
    let broker_addr = config
        .transport_uri
        .as_deref()
        .ok_or_else(|| UplinkError::MissingConfig("transport_uri".into()))?;

    // Parse broker address (e.g., "mqtt://localhost:1883")
    let url = broker_addr
        .strip_prefix("mqtt://")
        .or_else(|| broker_addr.strip_prefix("tcp://"))
        .unwrap_or(broker_addr)
        .trim_end_matches('/');

    let (host, port) = match url.split_once(':') {
        Some((h, p)) => (
            h,
            p.parse().map_err(|_err| {
                log_error!("rumqttc: invalid port in broker URI {broker_addr}: {_err}");
                UplinkError::ConfigConflict(format!("invalid port in broker URI {broker_addr}"))
            })?,
        ),
        None => (url, 1883),
    };

    Ok(BrokerParams {
        client_id: config.resolve_client_id(None),
        host: host.to_string(),
        port,
        keep_alive: config
            .keep_alive_secs
            .map(|secs| Duration::from_secs(u64::from(secs))),
    })
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    const CONNACK_ACCEPTED: [u8; 4] = [0x20, 0x02, 0x00, 0x00];

    /// Read one MQTT control packet: fixed-header byte and body.
    async fn read_packet(socket: &mut TcpStream) -> Option<(u8, Vec<u8>)> {
        // ---
        let header = socket.read_u8().await.ok()?;
        let mut length = 0usize;
        let mut shift = 0;
        loop {
            let byte = socket.read_u8().await.ok()?;
            length |= usize::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                break;
            }
            shift += 7;
        }
        let mut body = vec![0u8; length];
        socket.read_exact(&mut body).await.ok()?;
        Some((header, body))
    }

    /// Accept one client, acknowledge its CONNECT, record packet headers up
    /// to and including the first PUBLISH, then hang up.
    async fn broker_once() -> (String, tokio::task::JoinHandle<Vec<(u8, Vec<u8>)>>) {
        // ---
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();

            let (connect, _) = read_packet(&mut socket).await.unwrap();
            assert_eq!(connect >> 4, 1, "first packet must be CONNECT");
            socket.write_all(&CONNACK_ACCEPTED).await.unwrap();

            let mut packets = Vec::new();
            while let Some((header, body)) = read_packet(&mut socket).await {
                let is_publish = header >> 4 == 3;
                packets.push((header, body));
                if is_publish {
                    break;
                }
            }
            packets
        });

        (format!("mqtt://{addr}"), handle)
    }

    #[test]
    fn test_broker_params_from_uri() {
        // ---
        let config = UplinkConfig::with_uri("mqtt://broker.local:1884", "esp32_01")
            .with_client_id("esp32-AABBCC")
            .with_keep_alive_secs(30);

        let params = broker_params(&config).unwrap();
        assert_eq!(params.host, "broker.local");
        assert_eq!(params.port, 1884);
        assert_eq!(params.client_id, "esp32-AABBCC");
        assert_eq!(params.keep_alive, Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_broker_params_default_port() {
        // ---
        let config = UplinkConfig::with_uri("tcp://10.0.0.5", "esp32_01");

        let params = broker_params(&config).unwrap();
        assert_eq!(params.host, "10.0.0.5");
        assert_eq!(params.port, 1883);
        assert_eq!(params.client_id, "uplink-esp32_01");
    }

    #[test]
    fn test_broker_params_rejects_bad_port() {
        // ---
        let config = UplinkConfig::with_uri("mqtt://broker:eighty", "esp32_01");
        assert!(matches!(
            broker_params(&config),
            Err(UplinkError::ConfigConflict(_))
        ));
    }

    #[tokio::test]
    async fn test_unconnected_session_reports_lost() {
        // ---
        let config = UplinkConfig::with_uri("mqtt://127.0.0.1:1883", "esp32_01");
        let mut session = create_transport(&config).await.unwrap();

        assert_eq!(session.shape(), SessionShape::Persistent);
        assert!(!session.is_connected());
        assert!(matches!(
            session.pump().await,
            Err(UplinkError::SessionLost)
        ));
        let record = Record::telemetry("plant/esp32_01/telemetry".into(), "{}".into());
        assert!(matches!(
            session.publish(record).await,
            Err(UplinkError::SessionLost)
        ));
        session.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_session_subscribes_publishes_retained_and_detects_loss() {
        // ---
        // Arrange
        // ---
        let (uri, broker) = broker_once().await;
        let config = UplinkConfig::with_uri(uri, "esp32_01").with_subscription("plant/esp32_01/cmd");
        let mut session = create_transport(&config).await.unwrap();

        // ---
        // Act
        // ---
        session.connect().await.expect("CONNACK should establish the session");
        assert!(session.is_connected());

        let status = Record::status(
            "plant/esp32_01/status".into(),
            r#"{"device_id":"esp32_01","status":"online"}"#.into(),
        );
        session.publish(status).await.expect("status publish should flush");

        let packets = broker.await.unwrap();

        // ---
        // Assert
        // ---
        let headers: Vec<u8> = packets.iter().map(|(header, _)| *header).collect();
        assert_eq!(headers.first(), Some(&0x82), "SUBSCRIBE follows CONNACK");

        let (publish, body) = packets.last().unwrap();
        let publish = *publish;
        assert_eq!(publish >> 4, 3);
        assert_eq!(publish & 0x01, 0x01, "status must be retained");
        assert_eq!((publish >> 1) & 0x03, 0, "QoS 0");

        let topic_len = usize::from(u16::from_be_bytes([body[0], body[1]]));
        assert_eq!(&body[2..2 + topic_len], b"plant/esp32_01/status");

        // the broker hung up; pumping must notice
        let mut lost = false;
        for _ in 0..200 {
            if matches!(session.pump().await, Err(UplinkError::SessionLost)) {
                lost = true;
                break;
            }
        }
        assert!(lost, "pump should report the lost session");
        assert!(!session.is_connected());
    }
}
