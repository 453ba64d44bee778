//! Error types for the protocol layer.

/// Errors that can occur while encoding or decoding messages.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a message into a frame).
    #[error("encode failed: {0}")]
    Encode(#[source] serde_json::Error),

    /// Deserialization failed (turning a frame into a message).
    ///
    /// Common causes: malformed JSON, wrong field types, or truncated
    /// frames. The session logs and drops such frames — a bad frame
    /// never tears down the connection.
    #[error("decode failed: {0}")]
    Decode(#[source] serde_json::Error),

    /// The frame is invalid at the protocol level, e.g. a binary frame
    /// that is not valid UTF-8 in text mode.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
