//! Agent builder.
//!
//! Provides a fluent builder API for assembling an [`Agent`] from a
//! configuration and the platform collaborators (link, clock, sensor).

use crate::clock_source::ClockSource;
use crate::link_manager::LinkManager;
use crate::pipeline::TelemetryPipeline;
use crate::retry::RetryPolicy;
use crate::scheduler::PublishScheduler;
use crate::session::SessionManager;
use crate::{log_info, Agent, Clock, Link, Result, Sensor, SessionPtr, UplinkConfig, UplinkError};

/// Builder for creating [`Agent`] instances.
///
/// # Examples
///
/// ```no_run
/// use sensor_uplink::{AgentBuilder, HostLink, SimulatedSensor, SystemClock, UplinkConfig};
///
/// # async fn example() -> sensor_uplink::Result<()> {
/// let config = UplinkConfig::with_uri("mqtt://localhost:1883", "esp32_01");
///
/// let mut agent = AgentBuilder::new(config)
///     .link(Box::new(HostLink::new()))
///     .clock(Box::new(SystemClock::new()))
///     .sensor(Box::new(SimulatedSensor::new()))
///     .build()
///     .await?;
///
/// agent.run().await;
/// # Ok(())
/// # }
/// ```
pub struct AgentBuilder {
    // ---
    config: UplinkConfig,
    link: Option<Box<dyn Link>>,
    clock: Option<Box<dyn Clock>>,
    sensor: Option<Box<dyn Sensor>>,

    // Pre-built session (optional, default: created from the config)
    session: Option<SessionPtr>,

    // Session connect attempts cap (optional, default: unbounded)
    session_max_attempts: Option<u32>,
}

impl AgentBuilder {
    /// Create a new agent builder from `config`.
    pub fn new(config: UplinkConfig) -> Self {
        // ---
        Self {
            config,
            link: None,
            clock: None,
            sensor: None,
            session: None,
            session_max_attempts: None,
        }
    }

    /// Set the network link driver (required).
    pub fn link(mut self, link: Box<dyn Link>) -> Self {
        self.link = Some(link);
        self
    }

    /// Set the platform clock (required).
    pub fn clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Set the sensor driver (required).
    pub fn sensor(mut self, sensor: Box<dyn Sensor>) -> Self {
        self.sensor = Some(sensor);
        self
    }

    /// Use an already created transport session instead of creating one
    /// from the configuration.
    pub fn session(mut self, session: SessionPtr) -> Self {
        self.session = Some(session);
        self
    }

    /// Cap session connect attempts.
    ///
    /// Default: unbounded. A capped agent reports the session as
    /// unavailable for the iteration once the cap is hit and tries again on
    /// the next one.
    pub fn session_max_attempts(mut self, attempts: u32) -> Self {
        self.session_max_attempts = Some(attempts);
        self
    }

    /// Build the agent (consumes self).
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - `device_id` is empty, or a link, clock or sensor is missing
    /// - No transport URI is configured and no session was supplied
    /// - The publish interval or a session attempt cap is zero
    /// - Transport creation fails
    pub async fn build(self) -> Result<Agent> {
        // ---
        let mut config = self.config;

        if config.device_id.is_empty() {
            return Err(UplinkError::MissingConfig("device_id".into()));
        }
        let link = self
            .link
            .ok_or_else(|| UplinkError::MissingConfig("link".into()))?;
        let clock = self
            .clock
            .ok_or_else(|| UplinkError::MissingConfig("clock".into()))?;
        let sensor = self
            .sensor
            .ok_or_else(|| UplinkError::MissingConfig("sensor".into()))?;

        if config.publish_interval.is_zero() {
            return Err(UplinkError::ConfigConflict(
                "publish_interval must be greater than zero".into(),
            ));
        }
        if self.session_max_attempts == Some(0) {
            return Err(UplinkError::ConfigConflict(
                "session_max_attempts must be at least 1".into(),
            ));
        }

        // client_id: explicit override, else derived from the hardware address
        let client_id = config.resolve_client_id(link.hardware_address().as_deref());
        config.client_id = Some(client_id);

        let session = match self.session {
            Some(session) => session,
            None => {
                let memory_only = config.transport_type.as_deref() == Some("memory");
                if config.transport_uri.is_none() && !memory_only {
                    return Err(UplinkError::MissingConfig("transport_uri".into()));
                }
                crate::create_transport(&config).await?
            }
        };

        let retry = match self.session_max_attempts {
            Some(max) => RetryPolicy::bounded(config.session_retry_delay, max),
            None => RetryPolicy::forever(config.session_retry_delay),
        };

        let destinations = config.destinations(session.shape());

        log_info!(
            "{}: {} session via {} (telemetry -> {}, status -> {})",
            config.device_id,
            match session.shape() {
                crate::SessionShape::Persistent => "persistent",
                crate::SessionShape::RequestResponse => "request/response",
            },
            session.transport_id(),
            destinations.telemetry,
            destinations.status
        );

        let pipeline = TelemetryPipeline::new(
            sensor,
            config.device_id.clone(),
            destinations.telemetry.clone(),
        );
        let session = SessionManager::new(session, config.device_id.clone(), destinations, retry);

        Ok(Agent::new(
            config.device_id.clone(),
            LinkManager::new(link, config.link.clone()),
            ClockSource::new(clock, config.clock_sync.clone()),
            session,
            PublishScheduler::new(config.publish_interval),
            pipeline,
            config.idle_delay,
        ))
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::{LinkCredentials, LinkState, TemperatureUnit};
    use std::net::IpAddr;

    struct UpLink;

    impl Link for UpLink {
        fn state(&self) -> LinkState {
            LinkState::Up
        }
        fn begin(&mut self, _credentials: &LinkCredentials) {}
        fn local_addr(&self) -> Option<IpAddr> {
            None
        }
        fn hardware_address(&self) -> Option<String> {
            Some("24:6F:28:AA:BB:CC".into())
        }
    }

    struct ZeroClock;

    impl Clock for ZeroClock {
        fn uptime_ms(&self) -> u64 {
            0
        }
        fn epoch_ms(&self) -> u64 {
            0
        }
        fn request_sync(&mut self, _servers: &[String]) {}
    }

    struct NanSensor;

    impl Sensor for NanSensor {
        fn read_humidity(&mut self) -> f32 {
            f32::NAN
        }
        fn read_temperature(&mut self, _unit: TemperatureUnit) -> f32 {
            f32::NAN
        }
    }

    fn builder(config: UplinkConfig) -> AgentBuilder {
        AgentBuilder::new(config)
            .link(Box::new(UpLink))
            .clock(Box::new(ZeroClock))
            .sensor(Box::new(NanSensor))
    }

    #[tokio::test]
    async fn test_missing_collaborators() {
        // ---
        let result = AgentBuilder::new(UplinkConfig::memory("dev"))
            .clock(Box::new(ZeroClock))
            .sensor(Box::new(NanSensor))
            .build()
            .await;
        assert!(matches!(result, Err(UplinkError::MissingConfig(field)) if field == "link"));

        let result = builder(UplinkConfig::memory("")).build().await;
        assert!(matches!(result, Err(UplinkError::MissingConfig(field)) if field == "device_id"));
    }

    #[tokio::test]
    async fn test_missing_uri() {
        // ---
        let result = builder(UplinkConfig::memory("dev")).build().await;
        assert!(matches!(result, Err(UplinkError::MissingConfig(field)) if field == "transport_uri"));

        let agent = builder(UplinkConfig::memory("dev").with_transport_type("memory"))
            .build()
            .await
            .unwrap();
        assert_eq!(agent.device_id(), "dev");
    }

    #[tokio::test]
    async fn test_zero_interval_conflicts() {
        // ---
        let config = UplinkConfig::with_uri("memory://", "dev")
            .with_publish_interval(std::time::Duration::ZERO);
        let result = builder(config).build().await;
        assert!(matches!(result, Err(UplinkError::ConfigConflict(_))));

        let result = builder(UplinkConfig::with_uri("memory://", "dev"))
            .session_max_attempts(0)
            .build()
            .await;
        assert!(matches!(result, Err(UplinkError::ConfigConflict(_))));
    }

    #[cfg(feature = "transport_rumqttc")]
    #[tokio::test]
    async fn test_destinations_follow_transport() {
        // ---
        let agent = builder(UplinkConfig::with_uri("mqtt://localhost:1883", "esp32_01"))
            .build()
            .await
            .unwrap();
        assert_eq!(
            agent.session().destinations().status.as_str(),
            "plant/esp32_01/status"
        );
        assert_eq!(agent.session().transport_id(), "rumqttc");
    }
}
