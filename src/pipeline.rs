//! One telemetry publish cycle.
//!
//! acquire → validate → derive → stamp → serialize → publish.
//!
//! A sample with any NaN reading is dropped before the transport is
//! touched. A failed publish is logged and dropped; nothing is queued.

use crate::session::SessionManager;
use crate::telemetry::{RawReadings, TelemetrySample};
use crate::{log_debug, log_info, log_warn};
use crate::{Destination, Record, Sensor, TemperatureUnit, Timestamp};

/// Result of one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// The transport accepted the record.
    Published,
    /// The transport was called and reported failure. The sample is lost.
    Failed,
    /// The sample was rejected before any transport call.
    Skipped,
}

/// Telemetry pipeline bound to one sensor and one destination.
pub struct TelemetryPipeline {
    sensor: Box<dyn Sensor>,
    device_id: String,
    destination: Destination,
}

impl TelemetryPipeline {
    // ---
    pub fn new(sensor: Box<dyn Sensor>, device_id: impl Into<String>, destination: Destination) -> Self {
        Self {
            sensor,
            device_id: device_id.into(),
            destination,
        }
    }

    /// Destination telemetry is published to.
    pub fn destination(&self) -> &Destination {
        &self.destination
    }

    /// Acquire and validate one sample, stamped with `timestamp`.
    ///
    /// Returns `None` (after logging) if any reading is NaN.
    pub fn acquire(&mut self, timestamp: Timestamp) -> Option<TelemetrySample> {
        // ---
        let readings = RawReadings {
            humidity: self.sensor.read_humidity(),
            temperature_c: self.sensor.read_temperature(TemperatureUnit::Celsius),
            temperature_f: self.sensor.read_temperature(TemperatureUnit::Fahrenheit),
        };

        let readings = match readings.validate() {
            Ok(readings) => readings,
            Err(err) => {
                log_warn!("pipeline: sensor read failed, skipping cycle: {err}");
                return None;
            }
        };

        let heat_index_c = self.sensor.heat_index(
            readings.temperature_c,
            readings.humidity,
            TemperatureUnit::Celsius,
        );
        let heat_index_f = self.sensor.heat_index(
            readings.temperature_f,
            readings.humidity,
            TemperatureUnit::Fahrenheit,
        );

        Some(TelemetrySample::new(readings, heat_index_c, heat_index_f, timestamp))
    }

    /// Run one full cycle against `session`.
    pub async fn run_once(&mut self, session: &mut SessionManager, timestamp: Timestamp) -> PublishOutcome {
        // ---
        let Some(sample) = self.acquire(timestamp) else {
            return PublishOutcome::Skipped;
        };

        let payload = match sample.to_payload(&self.device_id) {
            Ok(payload) => payload,
            Err(err) => {
                log_warn!("pipeline: cannot encode sample: {err}");
                return PublishOutcome::Skipped;
            }
        };

        log_debug!(
            "pipeline: h={:.2}% t={:.2}C/{:.2}F hi={:.2}C/{:.2}F",
            sample.humidity,
            sample.temperature_c,
            sample.temperature_f,
            sample.heat_index_c,
            sample.heat_index_f
        );

        let record = Record::telemetry(self.destination.clone(), payload);
        match session.publish(record).await {
            Ok(()) => {
                log_info!("pipeline: publish OK -> {}", self.destination);
                PublishOutcome::Published
            }
            Err(err) => {
                log_warn!("pipeline: publish FAILED -> {}: {err}", self.destination);
                PublishOutcome::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::retry::RetryPolicy;
    use crate::{create_memory_transport_with_hub, MemoryHub, SessionShape, UplinkConfig};
    use std::sync::Arc;

    struct FixedSensor {
        humidity: f32,
        celsius: f32,
        fahrenheit: f32,
    }

    impl Sensor for FixedSensor {
        fn read_humidity(&mut self) -> f32 {
            self.humidity
        }

        fn read_temperature(&mut self, unit: TemperatureUnit) -> f32 {
            match unit {
                TemperatureUnit::Celsius => self.celsius,
                TemperatureUnit::Fahrenheit => self.fahrenheit,
            }
        }
    }

    fn ts() -> Timestamp {
        Timestamp {
            secs: 1_700_000_000,
            millis: 1_700_000_000_123,
            synced: true,
        }
    }

    async fn request_response_session(hub: Arc<MemoryHub>) -> SessionManager {
        // ---
        let config = UplinkConfig::memory("esp32_01");
        let session = create_memory_transport_with_hub(&config, hub, SessionShape::RequestResponse)
            .await
            .unwrap();
        SessionManager::new(
            session,
            "esp32_01",
            config.destinations(SessionShape::RequestResponse),
            RetryPolicy::default(),
        )
    }

    fn pipeline(humidity: f32, celsius: f32, fahrenheit: f32) -> TelemetryPipeline {
        TelemetryPipeline::new(
            Box::new(FixedSensor {
                humidity,
                celsius,
                fahrenheit,
            }),
            "esp32_01",
            Destination::from("/plant/esp32_01/readings"),
        )
    }

    struct CalibratedSensor;

    impl Sensor for CalibratedSensor {
        fn read_humidity(&mut self) -> f32 {
            50.0
        }

        fn read_temperature(&mut self, unit: TemperatureUnit) -> f32 {
            match unit {
                TemperatureUnit::Celsius => 25.0,
                TemperatureUnit::Fahrenheit => 77.0,
            }
        }

        fn heat_index(&self, _temperature: f32, _humidity: f32, unit: TemperatureUnit) -> f32 {
            match unit {
                TemperatureUnit::Celsius => 1.0,
                TemperatureUnit::Fahrenheit => 2.0,
            }
        }
    }

    #[test]
    fn test_sample_uses_sensor_heat_index() {
        // ---
        let mut pipeline = TelemetryPipeline::new(
            Box::new(CalibratedSensor),
            "esp32_01",
            Destination::from("/plant/esp32_01/readings"),
        );

        let sample = pipeline.acquire(ts()).expect("sample should validate");

        assert_eq!(sample.heat_index_c, 1.0);
        assert_eq!(sample.heat_index_f, 2.0);
        assert_eq!(sample.humidity, 50.0);
        assert_eq!(sample.timestamp, ts());
    }

    #[tokio::test]
    async fn test_nan_reading_never_reaches_transport() {
        // ---
        let hub = MemoryHub::new();
        let mut session = request_response_session(hub.clone()).await;

        for (h, c, f) in [
            (f32::NAN, 22.0, 71.6),
            (50.0, f32::NAN, 71.6),
            (50.0, 22.0, f32::NAN),
        ] {
            let outcome = pipeline(h, c, f).run_once(&mut session, ts()).await;
            assert_eq!(outcome, PublishOutcome::Skipped);
        }
        assert!(hub.published().is_empty());
    }

    #[tokio::test]
    async fn test_reference_sample_payload() {
        // ---
        let hub = MemoryHub::new();
        let mut session = request_response_session(hub.clone()).await;

        let outcome = pipeline(50.0, 25.0, 77.0).run_once(&mut session, ts()).await;
        assert_eq!(outcome, PublishOutcome::Published);

        let published = hub.published_to("/plant/esp32_01/readings");
        assert_eq!(published.len(), 1);
        assert_eq!(
            std::str::from_utf8(&published[0].payload).unwrap(),
            r#"{"device_id":"esp32_01","server_ts":1700000000,"server_ts_ms":1700000000123,"humidity":50.00,"temp_c":25.00,"temp_f":77.00,"heat_index_c":24.86,"heat_index_f":76.75}"#
        );
    }

    #[tokio::test]
    async fn test_failed_publish_is_reported_not_retried() {
        // ---
        let hub = MemoryHub::new();
        let mut session = request_response_session(hub.clone()).await;
        hub.fail_next_publishes(1);

        let mut pipeline = pipeline(60.1, 22.3, 72.14);
        assert_eq!(pipeline.run_once(&mut session, ts()).await, PublishOutcome::Failed);
        assert!(hub.published().is_empty());

        assert_eq!(pipeline.run_once(&mut session, ts()).await, PublishOutcome::Published);
        assert_eq!(hub.published().len(), 1);
    }
}
