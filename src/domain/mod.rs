//! Domain layer public interface.
//!
//! This module defines the collaborator abstractions of the uplink (link,
//! clock, sensor, transport session) independent of any radio stack,
//! protocol library, or driver.
//!
//! All domain consumers must import symbols via this module, not by
//! referencing individual files directly.

mod clock;
mod link;
mod sensor;
mod transport;

// --- Clock domain re-exports ---

pub use clock::{Clock, Timestamp, SYNC_SANITY_EPOCH_SECS};

// --- Link domain re-exports ---

pub use link::{Link, LinkCredentials, LinkState};

// --- Sensor domain re-exports ---

pub use sensor::{Sensor, TemperatureUnit};

// --- Transport domain re-exports ---

pub use transport::{
    //
    Destination,
    Destinations,
    Inbound,
    Record,
    SessionBase,
    SessionPtr,
    SessionShape,
    TransportSession,
    WriteMode,
};
