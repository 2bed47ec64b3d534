//! Keep a sensor device connected and publishing telemetry at a fixed cadence
//!
//! This library implements the connectivity-and-publish loop of a small
//! data-acquisition device: it keeps the network link and an application
//! session (MQTT broker or HTTP document store) up, announces the device as
//! `online`, and publishes one validated, timestamped temperature/humidity
//! sample per interval despite transient link, clock and transport failures.
//!

// Import all sub modules once...
mod domain;
mod macros;
mod transport;

mod agent;
mod agent_builder;
mod clock_source;
mod host;
mod link_manager;
mod pipeline;
mod relay;
mod retry;
mod scheduler;
mod session;
mod telemetry;
mod uplink_config;

mod error;

pub(crate) use macros::{log_debug, log_error, log_info, log_warn};

// Re-export main types
pub use agent::{Agent, TickOutcome};
pub use agent_builder::AgentBuilder;
pub use relay::{Relay, Route};

pub use clock_source::{ClockSource, ClockSyncState};
pub use link_manager::LinkManager;
pub use pipeline::{PublishOutcome, TelemetryPipeline};
pub use retry::RetryPolicy;
pub use scheduler::PublishScheduler;
pub use session::{SessionEvent, SessionManager};

pub use telemetry::{
    //
    celsius_to_fahrenheit,
    fahrenheit_to_celsius,
    heat_index,
    status_payload,
    DeviceStatus,
    RawReadings,
    TelemetrySample,
};

pub use host::{HostLink, SimulatedSensor, SystemClock};

pub use uplink_config::{ClockSyncConfig, LinkConfig, SensorConfig, SensorKind, UplinkConfig};

pub use error::{Result, UplinkError};

pub use transport::{create_memory_transport, create_memory_transport_with_hub, create_transport, MemoryHub};

pub use transport::{create_http_transport, create_rumqttc_transport};

// --- public re-exports
pub use domain::{
    //
    Clock,
    Destination,
    Destinations,
    Inbound,
    Link,
    LinkCredentials,
    LinkState,
    Record,
    Sensor,
    SessionBase,
    SessionPtr,
    SessionShape,
    TemperatureUnit,
    Timestamp,
    TransportSession,
    WriteMode,
    SYNC_SANITY_EPOCH_SECS,
};
