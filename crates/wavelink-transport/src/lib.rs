//! Transport abstraction layer for Wavelink.
//!
//! Provides the [`Transport`] and [`Connection`] traits that abstract over
//! different message-oriented transports, plus the [`Frame`] unit they
//! exchange. The protocol engine never touches sockets directly — it talks
//! to a `Connection`, which lets tests substitute an in-memory transport.
//!
//! # Feature Flags
//!
//! - `websocket` (default) — WebSocket client transport via
//!   `tokio-tungstenite`

#![allow(async_fn_in_trait)]

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConnection, WebSocketTransport};

use std::fmt;
use std::future::Future;

/// A single message exchanged with the remote peer.
///
/// The protocol's default mode sends JSON as text frames; a configured
/// codec switches the session to binary frames. The transport carries both
/// without interpreting them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A text frame (UTF-8).
    Text(String),
    /// A binary frame.
    Binary(Vec<u8>),
}

impl Frame {
    /// Returns the payload length in bytes.
    pub fn len(&self) -> usize {
        match self {
            Frame::Text(t) => t.len(),
            Frame::Binary(b) => b.len(),
        }
    }

    /// Returns `true` if the frame carries no payload.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Opaque identifier for a connection, unique per process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Establishes outbound connections to a remote endpoint.
pub trait Transport: Send + Sync + 'static {
    /// The connection type produced by this transport.
    type Connection: Connection;

    /// Opens a connection to the given URL.
    fn connect(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<Self::Connection, TransportError>> + Send;
}

/// An established connection that can send and receive frames.
pub trait Connection: Send + Sync + 'static {
    /// Sends a frame to the remote peer.
    fn send(
        &self,
        frame: Frame,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Receives the next frame from the remote peer.
    ///
    /// Returns `Ok(None)` when the connection is cleanly closed.
    fn recv(
        &self,
    ) -> impl Future<Output = Result<Option<Frame>, TransportError>> + Send;

    /// Closes the connection.
    fn close(
        &self,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id_new_and_into_inner() {
        let id = ConnectionId::new(42);
        assert_eq!(id.into_inner(), 42);
    }

    #[test]
    fn test_connection_id_display() {
        let id = ConnectionId::new(7);
        assert_eq!(id.to_string(), "conn-7");
    }

    #[test]
    fn test_connection_id_equality() {
        let a = ConnectionId::new(1);
        let b = ConnectionId::new(1);
        let c = ConnectionId::new(2);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_frame_len_text_and_binary() {
        assert_eq!(Frame::Text("abc".into()).len(), 3);
        assert_eq!(Frame::Binary(vec![1, 2]).len(), 2);
    }

    #[test]
    fn test_frame_is_empty() {
        assert!(Frame::Text(String::new()).is_empty());
        assert!(!Frame::Binary(vec![0]).is_empty());
    }
}
