// src/domain/link.rs

//! Network link abstraction.
//!
//! A `Link` is the radio-level connection (association + address
//! assignment). It is driven by [`LinkManager`](crate::LinkManager), which
//! owns the timeout and polling policy; implementations only start a connect
//! attempt and report status.

use std::net::IpAddr;

/// Observable state of the network link.
///
/// There is no "connecting" state: a connect attempt is a bounded wait from
/// the caller's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Down,
    Up,
}

/// Credentials used to join the network.
#[derive(Clone, Debug, Default)]
pub struct LinkCredentials {
    pub ssid: String,
    pub password: String,
}

/// Driver-level link operations.
pub trait Link: Send {
    /// Current link status. Called at every loop entry.
    fn state(&self) -> LinkState;

    /// Start (or restart) associating with the network.
    ///
    /// Returns immediately; progress is observed through [`Link::state`].
    fn begin(&mut self, credentials: &LinkCredentials);

    /// Address assigned to this device, once the link is up.
    fn local_addr(&self) -> Option<IpAddr>;

    /// Stable per-device hardware address, if the driver exposes one.
    fn hardware_address(&self) -> Option<String> {
        None
    }
}
