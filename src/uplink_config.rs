//! Public, transport-agnostic uplink configuration.
//!
//! This type intentionally contains no protocol-library options (e.g. MQTT
//! client options or HTTP client builders). Transport layers interpret it
//! into concrete connection settings.

use std::time::Duration;

use crate::{Destination, Destinations, LinkCredentials, Result, SessionShape, UplinkError};

/// Link connect policy.
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Network credentials.
    pub credentials: LinkCredentials,

    /// How long a single connect attempt may block.
    pub connect_timeout: Duration,

    /// How often link status is polled while connecting.
    pub poll_interval: Duration,
}

impl Default for LinkConfig {
    /// - `connect_timeout`: 20s
    /// - `poll_interval`: 500ms
    fn default() -> Self {
        Self {
            credentials: LinkCredentials::default(),
            connect_timeout: Duration::from_secs(20),
            poll_interval: Duration::from_millis(500),
        }
    }
}

/// Wall-clock synchronization settings.
///
/// When absent from [`UplinkConfig`], the agent never syncs and timestamps
/// are always relative to boot.
#[derive(Debug, Clone)]
pub struct ClockSyncConfig {
    /// Time servers, tried in order by the platform.
    pub servers: Vec<String>,

    /// Timeout for the first sync attempt.
    pub first_timeout: Duration,

    /// Timeout for each later attempt, made once per loop iteration while
    /// still unsynced.
    pub retry_timeout: Duration,

    /// How often the wall clock is checked while waiting.
    pub poll_interval: Duration,
}

impl Default for ClockSyncConfig {
    /// - `servers`: `pool.ntp.org`, `time.nist.gov`
    /// - `first_timeout`: 15s
    /// - `retry_timeout`: 8s
    /// - `poll_interval`: 500ms
    fn default() -> Self {
        Self {
            servers: vec!["pool.ntp.org".to_string(), "time.nist.gov".to_string()],
            first_timeout: Duration::from_secs(15),
            retry_timeout: Duration::from_secs(8),
            poll_interval: Duration::from_millis(500),
        }
    }
}

/// Supported sensor models.
///
/// A DHT11 reports whole degrees and whole percent; a DHT22 reports tenths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SensorKind {
    Dht11,
    #[default]
    Dht22,
}

impl std::str::FromStr for SensorKind {
    type Err = UplinkError;

    fn from_str(s: &str) -> Result<Self> {
        // ---
        match s.to_ascii_lowercase().as_str() {
            "dht11" => Ok(SensorKind::Dht11),
            "dht22" | "am2302" => Ok(SensorKind::Dht22),
            other => Err(UplinkError::ConfigConflict(format!("unknown sensor kind: {other}"))),
        }
    }
}

/// Sensor wiring, handed to the sensor adapter.
#[derive(Debug, Clone, Copy)]
pub struct SensorConfig {
    /// Data pin the sensor is wired to.
    pub pin: u8,
    /// Sensor model.
    pub kind: SensorKind,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            pin: 22,
            kind: SensorKind::default(),
        }
    }
}

/// Uplink configuration and connection parameters.
#[derive(Debug, Clone)]
pub struct UplinkConfig {
    // ---
    /// Device identifier written into every record.
    pub device_id: String,

    /// Transport URI.
    ///
    /// `mqtt://host:port` (or `tcp://`) selects the broker transport,
    /// `http://` / `https://` the document-store transport (the database
    /// base URL), `memory://` the in-process transport.
    pub transport_uri: Option<String>,

    /// Explicit transport type override (`"rumqttc"`, `"http"`, `"memory"`).
    ///
    /// If `None`, the URI scheme decides.
    pub transport_type: Option<String>,

    /// MQTT client identifier. Derived from the link's hardware address
    /// when `None`.
    pub client_id: Option<String>,

    /// Broker keep-alive interval in seconds.
    pub keep_alive_secs: Option<u16>,

    /// First segment of every topic and database path.
    pub topic_root: String,

    /// Link connect policy.
    pub link: LinkConfig,

    /// Clock sync settings; `None` disables syncing.
    pub clock_sync: Option<ClockSyncConfig>,

    /// Sensor wiring.
    pub sensor: SensorConfig,

    /// Minimum interval between telemetry publishes.
    ///
    /// Default: 5 seconds
    pub publish_interval: Duration,

    /// Fixed delay between session establishment attempts.
    ///
    /// Default: 1.5 seconds
    pub session_retry_delay: Duration,

    /// Bound on a single session connect attempt (CONNACK wait).
    pub connect_timeout: Duration,

    /// Bound on a single publish (HTTP request, MQTT flush).
    pub request_timeout: Duration,

    /// Skip TLS certificate verification on HTTPS endpoints.
    ///
    /// Off by default. Turning it on is insecure and logged as a warning.
    pub accept_invalid_certs: bool,

    /// Topics a persistent session subscribes to after each connect.
    pub subscriptions: Vec<String>,

    /// Idle delay between loop iterations in [`Agent::run`](crate::Agent::run).
    pub idle_delay: Duration,
}

impl UplinkConfig {
    /// Create a new `UplinkConfig` for the given transport URI.
    pub fn with_uri(transport_uri: impl Into<String>, device_id: impl Into<String>) -> Self {
        Self {
            transport_uri: Some(transport_uri.into()),
            ..Self::memory(device_id)
        }
    }

    /// Create a memory transport config (no broker, no network).
    pub fn memory(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            transport_uri: None,
            transport_type: None,
            client_id: None,
            keep_alive_secs: None,
            topic_root: "plant".to_string(),
            link: LinkConfig::default(),
            clock_sync: None,
            sensor: SensorConfig::default(),
            publish_interval: Duration::from_millis(5000),
            session_retry_delay: Duration::from_millis(1500),
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(10),
            accept_invalid_certs: false,
            subscriptions: Vec::new(),
            idle_delay: Duration::from_millis(20),
        }
    }

    /// Set an explicit transport type.
    pub fn with_transport_type(mut self, transport_type: impl Into<String>) -> Self {
        self.transport_type = Some(transport_type.into());
        self
    }

    /// Set an explicit MQTT client identifier.
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Set an explicit keep-alive interval.
    pub fn with_keep_alive_secs(mut self, secs: u16) -> Self {
        self.keep_alive_secs = Some(secs);
        self
    }

    /// Set the topic / path root (default `"plant"`).
    pub fn with_topic_root(mut self, root: impl Into<String>) -> Self {
        self.topic_root = root.into();
        self
    }

    /// Set network credentials.
    pub fn with_credentials(mut self, ssid: impl Into<String>, password: impl Into<String>) -> Self {
        self.link.credentials = LinkCredentials {
            ssid: ssid.into(),
            password: password.into(),
        };
        self
    }

    /// Set the link connect timeout.
    pub fn with_link_timeout(mut self, timeout: Duration) -> Self {
        self.link.connect_timeout = timeout;
        self
    }

    /// Enable wall-clock synchronization.
    pub fn with_clock_sync(mut self, clock_sync: ClockSyncConfig) -> Self {
        self.clock_sync = Some(clock_sync);
        self
    }

    /// Set sensor wiring.
    pub fn with_sensor(mut self, sensor: SensorConfig) -> Self {
        self.sensor = sensor;
        self
    }

    /// Set the publish interval.
    pub fn with_publish_interval(mut self, interval: Duration) -> Self {
        self.publish_interval = interval;
        self
    }

    /// Set the fixed session retry delay.
    pub fn with_session_retry_delay(mut self, delay: Duration) -> Self {
        self.session_retry_delay = delay;
        self
    }

    /// Set the per-request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Disable TLS certificate verification. Insecure; for lab use only.
    pub fn with_insecure_tls(mut self) -> Self {
        self.accept_invalid_certs = true;
        self
    }

    /// Add a topic the persistent session subscribes to.
    pub fn with_subscription(mut self, topic: impl Into<String>) -> Self {
        self.subscriptions.push(topic.into());
        self
    }

    /// Set the idle delay between loop iterations.
    pub fn with_idle_delay(mut self, delay: Duration) -> Self {
        self.idle_delay = delay;
        self
    }

    /// Destinations for this device under the given session shape.
    ///
    /// Persistent sessions publish to topics
    /// (`<root>/<device>/telemetry`, `<root>/<device>/status`);
    /// request/response sessions write to database paths
    /// (`/<root>/<device>/readings`, `/<root>/<device>/status`).
    pub fn destinations(&self, shape: SessionShape) -> Destinations {
        // ---
        let prefix = format!("{}/{}", self.topic_root, self.device_id);

        match shape {
            SessionShape::Persistent => Destinations {
                telemetry: Destination::from(format!("{prefix}/telemetry")),
                status: Destination::from(format!("{prefix}/status")),
            },
            SessionShape::RequestResponse => Destinations {
                telemetry: Destination::from(format!("/{prefix}/readings")),
                status: Destination::from(format!("/{prefix}/status")),
            },
        }
    }

    /// Database path where relayed status records are appended.
    pub fn status_log_path(&self) -> Destination {
        Destination::from(format!("/{}/{}/status_log", self.topic_root, self.device_id))
    }

    /// MQTT client identifier to use.
    ///
    /// An explicit `client_id` wins; otherwise the id is derived from the
    /// hardware address so it is stable across reboots.
    pub fn resolve_client_id(&self, hardware_address: Option<&str>) -> String {
        // ---
        if let Some(id) = &self.client_id {
            return id.clone();
        }

        match hardware_address {
            Some(mac) => format!("{}-{}", self.device_id, mac.replace(':', "")),
            None => format!("uplink-{}", self.device_id),
        }
    }
}
