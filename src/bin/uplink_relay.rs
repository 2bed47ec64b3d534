//! Broker-to-database relay.
//!
//! Subscribes to a device's telemetry and status topics on an MQTT broker
//! and appends every message to an HTTP document store, stamped with the
//! relay's receive time.
//!
//! Run with: cargo run --bin uplink-relay
//!
//! Environment:
//! - `BROKER_URI`        MQTT broker (default `mqtt://localhost:1883`)
//! - `UPLINK_DB_URL`     document store base URL (required)
//! - `UPLINK_DEVICE_ID`  device to relay (default `esp32_01`)
//! - `RUST_LOG`          log filter

use sensor_uplink::{
    //
    create_http_transport,
    create_rumqttc_transport,
    Relay,
    Result,
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

    let broker_uri =
        std::env::var("BROKER_URI").unwrap_or_else(|_| "mqtt://localhost:1883".to_string());
    let db_url = std::env::var("UPLINK_DB_URL")
        .map_err(|_| UplinkError::MissingConfig("UPLINK_DB_URL".into()))?;
    let device_id = std::env::var("UPLINK_DEVICE_ID").unwrap_or_else(|_| "esp32_01".to_string());

    let mut broker_config = UplinkConfig::with_uri(&broker_uri, &device_id)
        .with_client_id(format!("relay-{device_id}"));
    for topic in Relay::subscriptions(&broker_config) {
        broker_config = broker_config.with_subscription(topic);
    }
    let db_config = UplinkConfig::with_uri(&db_url, &device_id);

    let source = create_rumqttc_transport(&broker_config).await?;
    let sink = create_http_transport(&db_config).await?;

    let mut relay = Relay::new(&broker_config, source, sink, Box::new(SystemClock::new()))?;

    println!("uplink-relay forwarding {device_id} from {broker_uri} to {db_url}");

    // Block until Ctrl+C
    relay
        .run_until(async {
            tokio::signal::ctrl_c().await.ok();
        })
        .await;

    Ok(())
}
