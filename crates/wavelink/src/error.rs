//! Unified error type for the Wavelink client.

use wavelink_protocol::ProtocolError;
use wavelink_transport::TransportError;

/// Top-level error that wraps the layer-specific errors.
///
/// The `#[from]` attributes auto-generate `From` impls, so the `?`
/// operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// A transport-level error (connect, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid message).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The session's engine is gone — every handle was dropped or the
    /// engine task ended.
    #[error("session is closed")]
    SessionClosed,
}
