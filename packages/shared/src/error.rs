//! Error types shared by both ends of the wire.

use thiserror::Error;

/// Structural validation failures for inbound payloads.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("room id must not be empty")]
    EmptyRoomId,

    #[error("room id exceeds {max} characters")]
    RoomIdTooLong { max: usize },

    #[error("shape id must not be empty")]
    EmptyShapeId,

    #[error("shape id exceeds {max} characters")]
    ShapeIdTooLong { max: usize },

    #[error("coordinate is not a finite number")]
    NonFiniteCoordinate,
}

/// Failures while decoding an inbound text frame.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Not JSON, or JSON that does not fit the message shape
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),

    /// JSON object without a string `type` field
    #[error("message has no type tag")]
    MissingKind,

    /// A `type` this build does not understand (ignored for forward compatibility)
    #[error("unknown message type '{0}'")]
    UnknownKind(String),

    /// Well-formed JSON that fails structural validation
    #[error("invalid message: {0}")]
    Invalid(#[from] ValidationError),
}
