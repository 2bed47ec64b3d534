//! Sensor uplink agent.
//!
//! Runs the connectivity-and-publish loop on the host, with the host network
//! as the link, the OS clock and a simulated sensor.
//!
//! Run with: cargo run --bin uplink-agent
//!
//! Environment:
//! - `UPLINK_URI`          transport URI (default `mqtt://localhost:1883`);
//!   use `https://<db>.firebaseio.com` for the document-store transport
//! - `UPLINK_DEVICE_ID`    device identifier (default `esp32_01`)
//! - `UPLINK_INTERVAL_MS`  publish interval (default 5000)
//! - `UPLINK_CLIENT_ID`    MQTT client id (default derived from `UPLINK_MAC`)
//! - `UPLINK_MAC`          hardware address reported by the link
//! - `UPLINK_SENSOR`       sensor model, `dht11` or `dht22` (default `dht22`)
//! - `UPLINK_SENSOR_PIN`   data pin the sensor is wired to (default 22)
//! - `UPLINK_SENSOR_FAIL_EVERY`  make every n-th simulated read fail
//! - `UPLINK_INSECURE_TLS` set to `1` to skip certificate verification
//! - `RUST_LOG`            log filter, e.g. `info` or `sensor_uplink=debug`

use std::time::Duration;

use sensor_uplink::{
    //
    AgentBuilder,
    ClockSyncConfig,
    HostLink,
    Result,
    SensorConfig,
    SimulatedSensor,
    SystemClock,
    UplinkConfig,
    UplinkError,
};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(true)
        .with_line_number(true)
        .init();

    let uri = std::env::var("UPLINK_URI").unwrap_or_else(|_| "mqtt://localhost:1883".to_string());
    let device_id = std::env::var("UPLINK_DEVICE_ID").unwrap_or_else(|_| "esp32_01".to_string());

    let mut config = UplinkConfig::with_uri(&uri, &device_id)
        .with_publish_interval(Duration::from_millis(env_number("UPLINK_INTERVAL_MS", 5000)?))
        .with_clock_sync(ClockSyncConfig::default());

    if let Ok(client_id) = std::env::var("UPLINK_CLIENT_ID") {
        config = config.with_client_id(client_id);
    }
    if std::env::var("UPLINK_INSECURE_TLS").as_deref() == Ok("1") {
        config = config.with_insecure_tls();
    }

    let mut link = HostLink::new();
    if let Ok(mac) = std::env::var("UPLINK_MAC") {
        link = link.with_hardware_address(mac);
    }

    let mut sensor_config = SensorConfig::default();
    if let Ok(kind) = std::env::var("UPLINK_SENSOR") {
        sensor_config.kind = kind.parse()?;
    }
    let pin = env_number("UPLINK_SENSOR_PIN", u64::from(sensor_config.pin))?;
    sensor_config.pin = u8::try_from(pin)
        .map_err(|_| UplinkError::ConfigConflict(format!("UPLINK_SENSOR_PIN={pin} is out of range")))?;
    config = config.with_sensor(sensor_config);

    let sensor = SimulatedSensor::from_config(&config.sensor)
        .with_failure_every(env_number("UPLINK_SENSOR_FAIL_EVERY", 0)?);

    let mut agent = AgentBuilder::new(config)
        .link(Box::new(link))
        .clock(Box::new(SystemClock::new()))
        .sensor(Box::new(sensor))
        .build()
        .await?;

    println!("uplink-agent publishing as device_id={device_id} via {uri}");

    // Block until Ctrl+C
    agent
        .run_until(async {
            tokio::signal::ctrl_c().await.ok();
        })
        .await;

    Ok(())
}

fn env_number(name: &str, default: u64) -> Result<u64> {
    // ---
    match std::env::var(name) {
        Ok(value) => value
            .parse()
            .map_err(|_| UplinkError::ConfigConflict(format!("{name}={value} is not a number"))),
        Err(_) => Ok(default),
    }
}
