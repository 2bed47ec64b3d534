// src/domain/sensor.rs

//! Sensor abstraction.
//!
//! Mirrors a temperature/humidity driver: each read either returns a value
//! or `NaN` when the sensor did not answer or failed its checksum.

/// Temperature scale for a reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemperatureUnit {
    Celsius,
    Fahrenheit,
}

/// Temperature/humidity sensor driver.
///
/// Reads are synchronous: the sensor protocol is a short bit-banged
/// exchange that the driver completes inline.
pub trait Sensor: Send {
    /// Relative humidity in percent, or `NaN` on failure.
    fn read_humidity(&mut self) -> f32;

    /// Temperature in `unit`, or `NaN` on failure.
    fn read_temperature(&mut self, unit: TemperatureUnit) -> f32;

    /// Heat index for a temperature in `unit` and a relative humidity.
    ///
    /// Drivers that ship their own formula may override this; the default
    /// is the Rothfusz regression used for published telemetry.
    fn heat_index(&self, temperature: f32, humidity: f32, unit: TemperatureUnit) -> f32 {
        crate::telemetry::heat_index(temperature, humidity, unit)
    }
}
