//! HTTP document-store transport based on reqwest.
//!
//! Each record becomes one HTTPS request against a JSON document database
//! (Firebase Realtime Database style REST API): the destination is a
//! database path, `Append` maps to POST and `Replace` to PUT.
//!
//! # Usage
//!
//! Enabled by default through the `transport_http` feature:
//!
//! ```toml
//! [dependencies]
//! sensor-uplink = { version = "0.1", features = ["transport_http"] }
//! ```

mod transport;
pub use transport::create_transport;
