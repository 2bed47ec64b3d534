//! Broker-to-database relay.
//!
//! A [`Relay`] listens on a persistent session subscribed to a device's
//! telemetry and status topics and appends every message it receives to a
//! document store through a request/response session:
//!
//! | topic                      | database path                  |
//! |----------------------------|--------------------------------|
//! | `<root>/<id>/telemetry`    | `/<root>/<id>/readings`        |
//! | `<root>/<id>/status`       | `/<root>/<id>/status_log`      |
//!
//! Each forwarded object is stamped with `server_ts` (epoch seconds at the
//! relay). Field values are forwarded verbatim, so two-decimal numbers keep
//! their formatting. Messages that are not JSON objects, or arrive on other
//! topics, are skipped. Failed forwards are logged and dropped.

use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

use serde_json::value::RawValue;
use tokio::time::sleep;

use crate::pipeline::PublishOutcome;
use crate::retry::{retry_with_delay, RetryPolicy};
use crate::{log_debug, log_info, log_warn};
use crate::{
    //
    Clock,
    Destination,
    Inbound,
    Record,
    Result,
    SessionPtr,
    SessionShape,
    UplinkConfig,
    UplinkError,
};

/// One topic → path forwarding rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub topic: Destination,
    pub path: Destination,
}

/// Forwards broker messages into a document store.
pub struct Relay {
    // ---
    source: SessionPtr,
    sink: SessionPtr,
    clock: Box<dyn Clock>,
    routes: Vec<Route>,
    retry: RetryPolicy,
    idle_delay: Duration,
}

impl Relay {
    /// Create a relay for `config.device_id`.
    ///
    /// `source` must be a persistent session created from a config carrying
    /// [`Relay::subscriptions`]; `sink` a request/response session.
    ///
    /// # Errors
    ///
    /// [`UplinkError::ConfigConflict`] if either session has the wrong shape.
    pub fn new(
        config: &UplinkConfig,
        source: SessionPtr,
        sink: SessionPtr,
        clock: Box<dyn Clock>,
    ) -> Result<Self> {
        // ---
        if source.shape() != SessionShape::Persistent {
            return Err(UplinkError::ConfigConflict(format!(
                "relay source {} must be a persistent session",
                source.transport_id()
            )));
        }
        if sink.shape() != SessionShape::RequestResponse {
            return Err(UplinkError::ConfigConflict(format!(
                "relay sink {} must be a request/response session",
                sink.transport_id()
            )));
        }

        Ok(Self {
            source,
            sink,
            clock,
            routes: Self::routes(config),
            retry: RetryPolicy::forever(config.session_retry_delay),
            idle_delay: config.idle_delay,
        })
    }

    /// Forwarding rules for `config.device_id`.
    pub fn routes(config: &UplinkConfig) -> Vec<Route> {
        // ---
        let topics = config.destinations(SessionShape::Persistent);
        let paths = config.destinations(SessionShape::RequestResponse);

        vec![
            Route {
                topic: topics.telemetry,
                path: paths.telemetry,
            },
            Route {
                topic: topics.status,
                path: config.status_log_path(),
            },
        ]
    }

    /// Topics the source session must subscribe to.
    pub fn subscriptions(config: &UplinkConfig) -> Vec<String> {
        Self::routes(config)
            .into_iter()
            .map(|route| route.topic.as_str().to_string())
            .collect()
    }

    /// Forward one inbound message.
    pub async fn forward(&mut self, message: &Inbound) -> PublishOutcome {
        // ---
        let Some(route) = self.routes.iter().find(|r| r.topic == message.source) else {
            log_debug!("relay: no route for {}", message.source);
            return PublishOutcome::Skipped;
        };
        let path = route.path.clone();

        let server_ts = self.clock.epoch_ms() / 1000;
        let payload = match stamp(&message.payload, server_ts) {
            Ok(payload) => payload,
            Err(err) => {
                log_warn!("relay: skipping message on {}: {err}", message.source);
                return PublishOutcome::Skipped;
            }
        };

        match self.sink.publish(Record::telemetry(path.clone(), payload)).await {
            Ok(()) => {
                log_info!("relay: {} -> {path}", message.source);
                PublishOutcome::Published
            }
            Err(err) => {
                log_warn!("relay: forward {} -> {path} failed: {err}", message.source);
                PublishOutcome::Failed
            }
        }
    }

    /// Ensure the source session is up, pump it, and forward what arrived.
    pub async fn step(&mut self) -> Vec<PublishOutcome> {
        // ---
        if !self.source.is_connected() {
            let label = self.source.transport_id().to_string();
            if let Err(err) =
                retry_with_delay(&self.retry, &label, &mut self.source, |s: &mut SessionPtr| {
                    s.connect()
                })
                .await
            {
                log_warn!("relay: source unavailable: {err}");
                return Vec::new();
            }
            log_info!("relay: listening on {label}");
        }

        let messages = match self.source.pump().await {
            Ok(messages) => messages,
            Err(err) => {
                log_warn!("relay: source lost: {err}");
                return Vec::new();
            }
        };

        let mut outcomes = Vec::with_capacity(messages.len());
        for message in &messages {
            outcomes.push(self.forward(message).await);
        }
        outcomes
    }

    /// Relay until `signal` resolves, then close both sessions.
    pub async fn run_until<F>(&mut self, signal: F)
    where
        F: Future<Output = ()>,
    {
        // ---
        tokio::pin!(signal);

        loop {
            tokio::select! {
                _ = &mut signal => break,
                _ = async {
                    self.step().await;
                    sleep(self.idle_delay).await;
                } => {}
            }
        }

        log_info!("relay: stopping");
        if let Err(_err) = self.source.close().await {
            log_debug!("relay: closing {} failed: {_err}", self.source.transport_id());
        }
        if let Err(_err) = self.sink.close().await {
            log_debug!("relay: closing {} failed: {_err}", self.sink.transport_id());
        }
    }
}

/// Parse `payload` as a JSON object and set `server_ts` on it.
///
/// Values are kept as raw JSON text so number formatting survives.
fn stamp(payload: &[u8], server_ts: u64) -> Result<bytes::Bytes> {
    // ---
    let mut object: BTreeMap<String, Box<RawValue>> = serde_json::from_slice(payload)?;
    object.insert(
        "server_ts".to_string(),
        RawValue::from_string(server_ts.to_string())?,
    );
    Ok(bytes::Bytes::from(serde_json::to_vec(&object)?))
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_stamp_keeps_raw_numbers() {
        // ---
        let stamped = stamp(br#"{"humidity":60.10,"device_id":"esp32_01"}"#, 1_700_000_000).unwrap();
        assert_eq!(
            std::str::from_utf8(&stamped).unwrap(),
            r#"{"device_id":"esp32_01","humidity":60.10,"server_ts":1700000000}"#
        );
    }

    #[test]
    fn test_stamp_overwrites_existing_server_ts() {
        // ---
        let stamped = stamp(br#"{"server_ts":5}"#, 42).unwrap();
        assert_eq!(std::str::from_utf8(&stamped).unwrap(), r#"{"server_ts":42}"#);
    }

    #[test]
    fn test_stamp_rejects_non_objects() {
        // ---
        assert!(matches!(stamp(b"[1,2]", 1), Err(UplinkError::Serialization(_))));
        assert!(matches!(stamp(b"online", 1), Err(UplinkError::Serialization(_))));
    }

    #[test]
    fn test_routes() {
        // ---
        let config = UplinkConfig::memory("esp32_01");
        assert_eq!(
            Relay::subscriptions(&config),
            vec!["plant/esp32_01/telemetry", "plant/esp32_01/status"]
        );
        let routes = Relay::routes(&config);
        assert_eq!(routes[0].path.as_str(), "/plant/esp32_01/readings");
        assert_eq!(routes[1].path.as_str(), "/plant/esp32_01/status_log");
    }
}
