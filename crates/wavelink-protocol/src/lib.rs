//! Wire protocol for Wavelink.
//!
//! This crate defines the "language" spoken with a pub/sub server:
//!
//! - **Types** ([`Packet`], [`Message`]) — the structured messages that
//!   travel on the wire, plus the reserved event names.
//! - **Classifier** ([`classify`], [`MessageKind`]) — assigns every
//!   inbound packet to exactly one kind.
//! - **Codecs** ([`Codec`] trait, [`PlainCodec`], [`MinifiedCodec`]) —
//!   how messages are converted to/from transport frames, including the
//!   compact array-keyed wire form.
//! - **Errors** ([`ProtocolError`]) — what can go wrong during
//!   encoding/decoding.
//!
//! # Architecture
//!
//! The protocol layer sits between transport (frames) and the session
//! engine (subscriptions, acks). It doesn't know about connections or
//! channels — it only knows how to represent, classify, and encode
//! messages.
//!
//! ```text
//! Transport (Frame) → Protocol (Message) → Session (dispatch)
//! ```

mod classify;
mod codec;
mod error;
mod types;

pub use classify::{auth_flag, classify, MessageKind};
pub use codec::{Codec, MinifiedCodec, PlainCodec};
pub use error::ProtocolError;
pub use types::{
    Message, Packet, HANDSHAKE_EVENT, PING, PONG, PUBLISH_EVENT,
    REMOVE_AUTH_TOKEN_EVENT, SET_AUTH_TOKEN_EVENT, SUBSCRIBE_EVENT,
    UNSUBSCRIBE_EVENT,
};
