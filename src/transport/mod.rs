//! Transport implementations.
//!
//! This module provides concrete implementations of the domain-level
//! `TransportSession` trait. All network transports are hidden behind
//! feature flags and exposed only through constructor functions.
//!
//! Domain code must not depend on transport-specific types.

mod memory;

#[cfg(feature = "transport_http")]
mod http;

#[cfg(feature = "transport_rumqttc")]
mod rumqttc;

use crate::{
    //
    Result,
    SessionPtr,
    UplinkConfig,
    UplinkError,
};

#[cfg(feature = "transport_http")]
pub use http::create_transport as create_http_transport;

#[cfg(feature = "transport_rumqttc")]
pub use rumqttc::create_transport as create_rumqttc_transport;

pub use memory::create_transport as create_memory_transport;
pub use memory::create_transport_with_hub as create_memory_transport_with_hub;
pub use memory::MemoryHub;

// Null Object stubs: disabled transports fail at creation time so the
// dispatcher below compiles under every feature combination.

#[cfg(not(feature = "transport_http"))]
pub async fn create_http_transport(_config: &UplinkConfig) -> Result<SessionPtr> {
    Err(UplinkError::Transport(
        "http transport not enabled (feature transport_http)".into(),
    ))
}

#[cfg(not(feature = "transport_rumqttc"))]
pub async fn create_rumqttc_transport(_config: &UplinkConfig) -> Result<SessionPtr> {
    Err(UplinkError::Transport(
        "rumqttc transport not enabled (feature transport_rumqttc)".into(),
    ))
}

/// Create the transport session selected by `config`.
///
/// An explicit `transport_type` wins. Otherwise the URI scheme decides:
/// `mqtt://` and `tcp://` select rumqttc, `http://` and `https://` the
/// document-store transport, `memory://` (or no URI at all) the in-memory
/// transport.
///
/// No network activity happens here; sessions are established by
/// [`TransportSession::connect`](crate::TransportSession::connect).
///
/// # Errors
///
/// Returns an error if the transport type or URI scheme is not recognised,
/// the selected transport is not compiled in, or its settings are invalid.
pub async fn create_transport(config: &UplinkConfig) -> Result<SessionPtr> {
    // ---
    match config.transport_type.as_deref() {
        Some("rumqttc") | Some("mqtt") => create_rumqttc_transport(config).await,
        Some("http") => create_http_transport(config).await,
        Some("memory") => create_memory_transport(config).await,
        Some(other) => Err(UplinkError::Transport(format!(
            "unrecognized transport_type: {other}, valid values: memory, rumqttc, http"
        ))),
        None => {
            let Some(uri) = config.transport_uri.as_deref() else {
                return create_memory_transport(config).await;
            };
            match uri.split_once("://").map(|(scheme, _)| scheme) {
                Some("mqtt") | Some("tcp") => create_rumqttc_transport(config).await,
                Some("http") | Some("https") => create_http_transport(config).await,
                Some("memory") => create_memory_transport(config).await,
                _ => Err(UplinkError::Transport(format!(
                    "unrecognized transport URI scheme: {uri}"
                ))),
            }
        }
    }
}
