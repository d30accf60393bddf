//! Error types for the Tegaki client.

use thiserror::Error;

/// Client-specific errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// The relay or the REST API rejected the access token
    #[error("access token was rejected")]
    Unauthorized,

    /// The room slug does not resolve to a room
    #[error("room '{0}' not found")]
    RoomNotFound(String),

    /// REST lookup failed for a reason other than a missing room
    #[error("room lookup failed: {0}")]
    Lookup(String),

    /// Connection error
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// A newer connection with the same identity took over this one
    #[error("replaced by another connection with the same identity")]
    Replaced,

    /// Reconnection attempts are exhausted
    #[error("gave up after {attempts} reconnection attempts")]
    ReconnectExhausted { attempts: u32 },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
