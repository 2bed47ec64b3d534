//! Telemetry and status records.
//!
//! A [`TelemetrySample`] is created once per publish cycle, never mutated,
//! and discarded after it has been serialized and handed to the transport.
//! Serialization goes through serde with a fixed field set; every measured
//! value is written as a JSON number with exactly two decimals.

use bytes::Bytes;
use serde::ser::Error as _;
use serde::{Serialize, Serializer};
use serde_json::value::RawValue;

use crate::{Result, TemperatureUnit, Timestamp, UplinkError};

/// Convert Celsius to Fahrenheit.
pub fn celsius_to_fahrenheit(celsius: f32) -> f32 {
    celsius * 1.8 + 32.0
}

/// Convert Fahrenheit to Celsius.
pub fn fahrenheit_to_celsius(fahrenheit: f32) -> f32 {
    (fahrenheit - 32.0) / 1.8
}

/// Heat index via the Rothfusz regression.
///
/// Uses Steadman's simple formula first and switches to the full regression
/// (with the NWS low-humidity and high-humidity adjustments) once the simple
/// result exceeds 79°F. The result is in the same unit as `temperature`.
pub fn heat_index(temperature: f32, humidity: f32, unit: TemperatureUnit) -> f32 {
    // ---
    let t = f64::from(match unit {
        TemperatureUnit::Celsius => celsius_to_fahrenheit(temperature),
        TemperatureUnit::Fahrenheit => temperature,
    });
    let rh = f64::from(humidity);

    let mut hi = 0.5 * (t + 61.0 + ((t - 68.0) * 1.2) + (rh * 0.094));

    if hi > 79.0 {
        hi = -42.379 + 2.049_015_23 * t + 10.143_331_27 * rh
            - 0.224_755_41 * t * rh
            - 0.006_837_83 * t * t
            - 0.054_817_17 * rh * rh
            + 0.001_228_74 * t * t * rh
            + 0.000_852_82 * t * rh * rh
            - 0.000_001_99 * t * t * rh * rh;

        if rh < 13.0 && (80.0..=112.0).contains(&t) {
            hi -= ((13.0 - rh) * 0.25) * ((17.0 - (t - 95.0).abs()) * 0.058_82).sqrt();
        } else if rh > 85.0 && (80.0..=87.0).contains(&t) {
            hi += ((rh - 85.0) * 0.1) * ((87.0 - t) * 0.2);
        }
    }

    let hi = hi as f32;
    match unit {
        TemperatureUnit::Celsius => fahrenheit_to_celsius(hi),
        TemperatureUnit::Fahrenheit => hi,
    }
}

/// Raw readings from one sensor acquisition, before validation.
#[derive(Debug, Clone, Copy)]
pub struct RawReadings {
    pub humidity: f32,
    pub temperature_c: f32,
    pub temperature_f: f32,
}

impl RawReadings {
    /// Reject the acquisition if any reading is not a number.
    pub fn validate(self) -> Result<Self> {
        // ---
        if self.humidity.is_nan() {
            return Err(UplinkError::InvalidSample("humidity"));
        }
        if self.temperature_c.is_nan() {
            return Err(UplinkError::InvalidSample("temp_c"));
        }
        if self.temperature_f.is_nan() {
            return Err(UplinkError::InvalidSample("temp_f"));
        }
        Ok(self)
    }
}

/// One validated, timestamped measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetrySample {
    pub humidity: f32,
    pub temperature_c: f32,
    pub temperature_f: f32,
    pub heat_index_c: f32,
    pub heat_index_f: f32,
    pub timestamp: Timestamp,
}

impl TelemetrySample {
    /// Build a sample from validated readings and the heat indices the
    /// sensor derived for them.
    pub fn new(readings: RawReadings, heat_index_c: f32, heat_index_f: f32, timestamp: Timestamp) -> Self {
        // ---
        Self {
            humidity: readings.humidity,
            temperature_c: readings.temperature_c,
            temperature_f: readings.temperature_f,
            heat_index_c,
            heat_index_f,
            timestamp,
        }
    }

    /// Serialize for `device_id` as compact JSON.
    ///
    /// A synced timestamp is written as `server_ts` / `server_ts_ms`. An
    /// unsynced one only counts time since boot and is written as `ts_ms`.
    pub fn to_payload(&self, device_id: &str) -> Result<Bytes> {
        // ---
        let (server_ts, server_ts_ms, ts_ms) = if self.timestamp.synced {
            (Some(self.timestamp.secs), Some(self.timestamp.millis), None)
        } else {
            (None, None, Some(self.timestamp.millis))
        };

        let record = TelemetryRecord {
            device_id,
            server_ts,
            server_ts_ms,
            ts_ms,
            humidity: self.humidity,
            temp_c: self.temperature_c,
            temp_f: self.temperature_f,
            heat_index_c: self.heat_index_c,
            heat_index_f: self.heat_index_f,
        };
        Ok(Bytes::from(serde_json::to_vec(&record)?))
    }
}

/// Wire schema of a telemetry record.
#[derive(Serialize)]
struct TelemetryRecord<'a> {
    device_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    server_ts: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    server_ts_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ts_ms: Option<u64>,
    #[serde(serialize_with = "two_decimals")]
    humidity: f32,
    #[serde(serialize_with = "two_decimals")]
    temp_c: f32,
    #[serde(serialize_with = "two_decimals")]
    temp_f: f32,
    #[serde(serialize_with = "two_decimals")]
    heat_index_c: f32,
    #[serde(serialize_with = "two_decimals")]
    heat_index_f: f32,
}

/// Device liveness value carried in the status record.
///
/// Only `Online` exists: the device has no shutdown path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    Online,
}

/// Wire schema of the status record.
#[derive(Serialize)]
struct StatusRecord<'a> {
    device_id: &'a str,
    status: DeviceStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    server_ts: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    server_ts_ms: Option<u64>,
}

/// Serialize the status record; timestamps are included only when the
/// clock is synced.
pub fn status_payload(device_id: &str, status: DeviceStatus, timestamp: Timestamp) -> Result<Bytes> {
    // ---
    let (server_ts, server_ts_ms) = if timestamp.synced {
        (Some(timestamp.secs), Some(timestamp.millis))
    } else {
        (None, None)
    };

    let record = StatusRecord {
        device_id,
        status,
        server_ts,
        server_ts_ms,
    };
    Ok(Bytes::from(serde_json::to_vec(&record)?))
}

/// Write a float as a JSON number with exactly two decimals.
fn two_decimals<S: Serializer>(value: &f32, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    // ---
    let raw = RawValue::from_string(format!("{value:.2}")).map_err(S::Error::custom)?;
    raw.serialize(serializer)
}
