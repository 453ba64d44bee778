//! # Wavelink
//!
//! Async client for a SocketCluster-style publish/subscribe protocol
//! over WebSocket: handshake authentication, named channels with
//! automatic re-subscription after reconnects, correlated
//! request/response ("ack") calls, and bounded reconnection backoff.
//!
//! The engine runs as a single Tokio task that owns all per-connection
//! state. Cloneable [`Session`] and [`Channel`] handles submit work over
//! a command queue, which keeps outbound writes serialized and the
//! correlation-id counter consistent without locks.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use wavelink::{ReconnectPolicy, Session, WebSocketTransport};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), wavelink::ClientError> {
//!     let session = Session::builder("ws://localhost:8000/socket/")
//!         .auth_token("my-token")
//!         .reconnect(ReconnectPolicy::default())
//!         .connect(WebSocketTransport::new());
//!
//!     let news = session.channel("news")?;
//!     news.on_message(|msg| println!("news: {msg}"))?;
//!     news.subscribe()?;
//!
//!     news.publish(serde_json::json!({ "headline": "hello" }))?;
//!     Ok(())
//! }
//! ```

mod acks;
mod channels;
mod error;
mod listener;
mod reconnect;
mod session;

pub use acks::{AckCallback, AckTable};
pub use channels::{Channel, ChannelRegistry, MessageListener};
pub use error::ClientError;
pub use listener::{
    AckEventHandler, EventHandler, NoopListener, Responder,
    SessionListener,
};
pub use reconnect::{ReconnectPolicy, ReconnectStrategy};
pub use session::{Session, SessionBuilder, SessionState};

// Re-export the protocol and transport layers so most applications only
// depend on this crate.
pub use wavelink_protocol::{
    classify, Codec, Message, MessageKind, MinifiedCodec, Packet,
    PlainCodec, ProtocolError,
};
pub use wavelink_transport::{
    Connection, ConnectionId, Frame, Transport, TransportError,
};
#[cfg(feature = "websocket")]
pub use wavelink_transport::WebSocketTransport;
