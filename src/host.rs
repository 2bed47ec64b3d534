//! Host adapters.
//!
//! Stand-ins for the device drivers so the agent can run on a workstation:
//! the host's own network is the link, the OS clock is the clock, and the
//! sensor is simulated.

use std::net::{IpAddr, UdpSocket};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use crate::telemetry::celsius_to_fahrenheit;
use crate::{log_debug, log_info};
use crate::{Clock, Link, LinkCredentials, LinkState, Sensor, SensorConfig, SensorKind, TemperatureUnit};

/// Well-known address used only to select the outbound interface.
const PROBE_ADDR: &str = "192.0.2.1:9";

/// The host's network connection as a link.
///
/// The link is up whenever the host has a route off the machine. `begin()`
/// has nothing to associate with and only logs.
#[derive(Debug, Default)]
pub struct HostLink {
    hardware_address: Option<String>,
}

impl HostLink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report `address` as the interface's hardware address.
    pub fn with_hardware_address(mut self, address: impl Into<String>) -> Self {
        self.hardware_address = Some(address.into());
        self
    }
}

impl Link for HostLink {
    // ---
    fn state(&self) -> LinkState {
        match self.local_addr() {
            Some(_) => LinkState::Up,
            None => LinkState::Down,
        }
    }

    fn begin(&mut self, credentials: &LinkCredentials) {
        log_debug!("host link: '{}' is managed by the OS", credentials.ssid);
    }

    /// Address of the interface used for outbound traffic.
    ///
    /// Connecting a UDP socket sends nothing; it only makes the OS pick a
    /// route and a source address.
    fn local_addr(&self) -> Option<IpAddr> {
        // ---
        let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
        socket.connect(PROBE_ADDR).ok()?;
        let addr = socket.local_addr().ok()?.ip();
        (!addr.is_unspecified()).then_some(addr)
    }

    fn hardware_address(&self) -> Option<String> {
        self.hardware_address.clone()
    }
}

/// OS wall clock plus a monotonic uptime counter.
#[derive(Debug)]
pub struct SystemClock {
    boot: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            boot: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    // ---
    fn uptime_ms(&self) -> u64 {
        self.boot.elapsed().as_millis() as u64
    }

    fn epoch_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }

    fn request_sync(&mut self, servers: &[String]) {
        log_info!("host clock: OS keeps time, ignoring {servers:?}");
    }
}

/// Deterministic temperature/humidity source.
///
/// Readings drift slowly along two sine waves so consecutive samples
/// differ, quantized to the resolution of the configured sensor model.
/// Optionally every `n`-th acquisition fails the way a real driver does,
/// by returning NaN.
#[derive(Debug, Default)]
pub struct SimulatedSensor {
    kind: SensorKind,
    acquisitions: u64,
    fail_every: Option<u64>,
}

impl SimulatedSensor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate the sensor model wired as described by `config`.
    pub fn from_config(config: &SensorConfig) -> Self {
        // ---
        log_info!("sensor: simulating {:?} on pin {}", config.kind, config.pin);
        Self {
            kind: config.kind,
            ..Self::default()
        }
    }

    /// Fail every `n`-th acquisition (`n == 0` disables failures).
    pub fn with_failure_every(mut self, n: u64) -> Self {
        self.fail_every = (n > 0).then_some(n);
        self
    }

    fn failing(&self) -> bool {
        matches!(self.fail_every, Some(n) if self.acquisitions % n == 0)
    }

    fn quantize(&self, value: f32) -> f32 {
        match self.kind {
            SensorKind::Dht11 => value.round(),
            SensorKind::Dht22 => (value * 10.0).round() / 10.0,
        }
    }

    fn celsius(&self) -> f32 {
        let phase = self.acquisitions as f32 / 15.0;
        self.quantize(22.0 + 2.5 * phase.sin())
    }
}

impl Sensor for SimulatedSensor {
    // ---
    /// Starts a new acquisition; temperature reads return the same sample.
    fn read_humidity(&mut self) -> f32 {
        self.acquisitions += 1;
        if self.failing() {
            return f32::NAN;
        }
        let phase = self.acquisitions as f32 / 10.0;
        self.quantize(55.0 + 8.0 * phase.cos())
    }

    fn read_temperature(&mut self, unit: TemperatureUnit) -> f32 {
        // ---
        if self.failing() {
            return f32::NAN;
        }
        match unit {
            TemperatureUnit::Celsius => self.celsius(),
            TemperatureUnit::Fahrenheit => celsius_to_fahrenheit(self.celsius()),
        }
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn test_simulated_sensor_is_consistent() {
        // ---
        let mut sensor = SimulatedSensor::new();
        let h = sensor.read_humidity();
        let c = sensor.read_temperature(TemperatureUnit::Celsius);
        let f = sensor.read_temperature(TemperatureUnit::Fahrenheit);

        assert!((0.0..=100.0).contains(&h));
        assert!((f - (c * 1.8 + 32.0)).abs() < 1e-4);
    }

    #[test]
    fn test_simulated_sensor_failures() {
        // ---
        let mut sensor = SimulatedSensor::new().with_failure_every(3);
        let mut failed = Vec::new();
        for _ in 0..6 {
            let h = sensor.read_humidity();
            let c = sensor.read_temperature(TemperatureUnit::Celsius);
            failed.push(h.is_nan() && c.is_nan());
        }
        assert_eq!(failed, vec![false, false, true, false, false, true]);
    }

    #[test]
    fn test_dht11_reports_whole_numbers() {
        // ---
        let config = SensorConfig {
            pin: 4,
            kind: SensorKind::Dht11,
        };
        let mut sensor = SimulatedSensor::from_config(&config);
        for _ in 0..20 {
            let h = sensor.read_humidity();
            let c = sensor.read_temperature(TemperatureUnit::Celsius);
            assert_eq!(h, h.trunc());
            assert_eq!(c, c.trunc());
        }
    }

    #[test]
    fn test_dht22_reports_tenths() {
        // ---
        let mut sensor = SimulatedSensor::from_config(&SensorConfig::default());
        let h = sensor.read_humidity();
        let c = sensor.read_temperature(TemperatureUnit::Celsius);
        assert!(((h * 10.0) - (h * 10.0).round()).abs() < 1e-3);
        assert!(((c * 10.0) - (c * 10.0).round()).abs() < 1e-3);
    }

    #[test]
    fn test_system_clock_is_past_sanity_threshold() {
        // ---
        let clock = SystemClock::new();
        assert!(clock.epoch_ms() / 1000 > crate::SYNC_SANITY_EPOCH_SECS);
        assert!(clock.uptime_ms() < 60_000);
    }

    #[test]
    fn test_host_link_reports_hardware_address() {
        // ---
        let link = HostLink::new().with_hardware_address("24:6F:28:AA:BB:CC");
        assert_eq!(link.hardware_address().as_deref(), Some("24:6F:28:AA:BB:CC"));
    }
}
