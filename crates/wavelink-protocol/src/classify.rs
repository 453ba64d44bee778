//! Inbound message classification.
//!
//! Every decoded packet is assigned to exactly one [`MessageKind`] by an
//! ordered predicate chain. The order is load-bearing: a payload carrying
//! `isAuthenticated` always classifies as [`MessageKind::AuthStatus`],
//! even if an `event` field were also present — the handshake response
//! arrives as a plain response (`rid` set, no `event`) and must not fall
//! through to [`MessageKind::AckResponse`].

use serde_json::Value;

use crate::types::{
    Packet, PUBLISH_EVENT, REMOVE_AUTH_TOKEN_EVENT, SET_AUTH_TOKEN_EVENT,
};

/// The kind of an inbound packet. Closed set, mutually exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// Handshake/authentication status: `data` contains
    /// `isAuthenticated`.
    AuthStatus,
    /// A channel publish (`event` is `#publish`).
    Publish,
    /// Server instruction to forget the stored auth token.
    RemoveAuthToken,
    /// Server instruction to store a new auth token.
    SetAuthToken,
    /// An application-defined named event.
    Event,
    /// A response to a prior outbound call (no `event` field).
    AckResponse,
}

/// Classifies a packet. Total: every packet maps to exactly one kind.
pub fn classify(packet: &Packet) -> MessageKind {
    if let Some(data) = &packet.data {
        if data.get("isAuthenticated").is_some() {
            return MessageKind::AuthStatus;
        }
    }

    match packet.event.as_deref() {
        Some(PUBLISH_EVENT) => MessageKind::Publish,
        Some(REMOVE_AUTH_TOKEN_EVENT) => MessageKind::RemoveAuthToken,
        Some(SET_AUTH_TOKEN_EVENT) => MessageKind::SetAuthToken,
        Some(_) => MessageKind::Event,
        None => MessageKind::AckResponse,
    }
}

/// Reads the `isAuthenticated` flag out of a payload. Missing or
/// non-boolean values read as `false` (permissive contract).
pub fn auth_flag(data: Option<&Value>) -> bool {
    data.and_then(|d| d.get("isAuthenticated"))
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

// =========================================================================
// Tests
// =========================================================================
