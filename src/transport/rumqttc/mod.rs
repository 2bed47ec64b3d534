//! MQTT transport implementation based on rumqttc.
//!
//! This module adapts the rumqttc API to the domain-level `TransportSession`
//! trait without leaking MQTT concepts upward.
//!
//! # Features
//!
//! - Single-owner client and event loop, driven by the agent's `pump()`
//! - Fresh client per connect, bounded CONNACK wait
//! - Re-subscription of configured topics after every CONNACK
//! - Retained publishes for status records
//!
//! # Usage
//!
//! Enabled by default through the `transport_rumqttc` feature:
//!
//! ```toml
//! [dependencies]
//! sensor-uplink = { version = "0.1", features = ["transport_rumqttc"] }
//! ```

mod transport;
pub use transport::create_transport;
