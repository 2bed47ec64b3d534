use thiserror::Error;

/// Errors that can occur while keeping the uplink connected and publishing.
///
/// None of these end the device loop. The agent logs them and retries on a
/// later iteration; they surface as `Err` only from construction-time APIs.
#[derive(Error, Debug)]
pub enum UplinkError {
    /// A bounded wait (link connect, CONNACK, publish flush) ran out.
    #[error("operation timed out")]
    Timeout,

    /// The network link is not up.
    #[error("network link is down")]
    LinkDown,

    /// The transport session was lost or never established.
    #[error("transport session lost")]
    SessionLost,

    /// Network-layer transport failure (no application status available).
    #[error("transport error: {0}")]
    Transport(String),

    /// Application-layer failure: the endpoint answered with a non-2xx code.
    #[error("endpoint returned status {0}")]
    Status(u16),

    /// JSON serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A required configuration value was not provided.
    #[error("missing configuration: {0}")]
    MissingConfig(String),

    /// Configuration values contradict each other or are out of range.
    #[error("configuration conflict: {0}")]
    ConfigConflict(String),

    /// The sensor produced a reading that cannot be published.
    #[error("invalid sample: {0} is not a number")]
    InvalidSample(&'static str),
}

/// Result type alias for uplink operations.
pub type Result<T> = std::result::Result<T, UplinkError>;
