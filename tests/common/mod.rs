//! Stub collaborators shared by the integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::time::Instant;

use sensor_uplink::{
    //
    Clock,
    Link,
    LinkCredentials,
    LinkState,
    Sensor,
    TemperatureUnit,
};

/// Link whose state is flipped from the test.
pub struct SwitchLink {
    up: Arc<AtomicBool>,
}

impl SwitchLink {
    pub fn new(up: bool) -> (Self, Arc<AtomicBool>) {
        let flag = Arc::new(AtomicBool::new(up));
        (Self { up: flag.clone() }, flag)
    }
}

impl Link for SwitchLink {
    fn state(&self) -> LinkState {
        if self.up.load(Ordering::SeqCst) {
            LinkState::Up
        } else {
            LinkState::Down
        }
    }

    fn begin(&mut self, _credentials: &LinkCredentials) {}

    fn local_addr(&self) -> Option<IpAddr> {
        Some(IpAddr::V4(Ipv4Addr::new(192, 168, 4, 2)))
    }

    fn hardware_address(&self) -> Option<String> {
        Some("24:6F:28:AA:BB:CC".into())
    }
}

/// Clock driven by tokio's (pausable) time; wall time is always synced.
pub struct TestClock {
    boot: Instant,
}

pub const TEST_EPOCH_MS: u64 = 1_700_000_000_000;

impl TestClock {
    pub fn new() -> Self {
        Self {
            boot: Instant::now(),
        }
    }
}

impl Clock for TestClock {
    fn uptime_ms(&self) -> u64 {
        self.boot.elapsed().as_millis() as u64
    }

    fn epoch_ms(&self) -> u64 {
        TEST_EPOCH_MS + self.uptime_ms()
    }

    fn request_sync(&mut self, _servers: &[String]) {}
}

/// Sensor replaying a script of (humidity, celsius, fahrenheit) samples;
/// the last sample repeats forever.
pub struct ScriptedSensor {
    script: VecDeque<(f32, f32, f32)>,
    current: (f32, f32, f32),
}

impl ScriptedSensor {
    pub fn new(samples: &[(f32, f32, f32)]) -> Self {
        Self {
            script: samples.iter().copied().collect(),
            current: (f32::NAN, f32::NAN, f32::NAN),
        }
    }

    pub fn constant(humidity: f32, celsius: f32, fahrenheit: f32) -> Self {
        Self::new(&[(humidity, celsius, fahrenheit)])
    }
}

impl Sensor for ScriptedSensor {
    fn read_humidity(&mut self) -> f32 {
        if let Some(next) = self.script.pop_front() {
            self.current = next;
        }
        self.current.0
    }

    fn read_temperature(&mut self, unit: TemperatureUnit) -> f32 {
        match unit {
            TemperatureUnit::Celsius => self.current.1,
            TemperatureUnit::Fahrenheit => self.current.2,
        }
    }
}
