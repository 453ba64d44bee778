//! Core protocol types for Wavelink's wire format.
//!
//! Every message on the wire is either a [`Packet`] — a mapping with a
//! small set of recognized fields — or a bare scalar ([`Message::Raw`]),
//! which is how the `#1`/`#2` heartbeat travels.
//!
//! Field order is irrelevant and every field is optional; unrecognized
//! fields are carried through untouched so the client never destroys
//! server data it doesn't understand.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

// ---------------------------------------------------------------------------
// Reserved protocol tokens
// ---------------------------------------------------------------------------

/// First message after connecting; carries the auth token.
pub const HANDSHAKE_EVENT: &str = "#handshake";
/// Channel publish, in both directions.
pub const PUBLISH_EVENT: &str = "#publish";
/// Channel subscription request.
pub const SUBSCRIBE_EVENT: &str = "#subscribe";
/// Channel unsubscription request.
pub const UNSUBSCRIBE_EVENT: &str = "#unsubscribe";
/// Server instructs the client to store a new auth token.
pub const SET_AUTH_TOKEN_EVENT: &str = "#setAuthToken";
/// Server instructs the client to forget its auth token.
pub const REMOVE_AUTH_TOKEN_EVENT: &str = "#removeAuthToken";
/// Server heartbeat ping, sent as a bare string.
pub const PING: &str = "#1";
/// Client heartbeat pong, sent as a bare string.
pub const PONG: &str = "#2";

// ---------------------------------------------------------------------------
// Packet
// ---------------------------------------------------------------------------

/// A structured protocol message.
///
/// The recognized fields across the protocol:
///
/// - `event` — the event name (`#handshake`, `#publish`, application
///   events, …). Present on calls, absent on responses.
/// - `data` — arbitrary payload. For publishes this is an object with
///   nested `channel` and `data`; for auth-token messages it nests
///   `token`.
/// - `cid` — call id, present on outbound calls that expect a response.
/// - `rid` — response id, echoing the `cid` of the call being answered.
/// - `error` — error payload on responses, absent on success.
///
/// Absent and JSON `null` are equivalent for every field (the permissive
/// contract — a missing field never raises). Anything else the peer sends
/// lands in `rest` and round-trips unchanged.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Packet {
    /// Event name, when this packet is a call or server push.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,

    /// Payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    /// Call id for request/response correlation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cid: Option<u64>,

    /// Response id echoing a prior `cid`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rid: Option<u64>,

    /// Error payload on responses.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,

    /// Unrecognized fields, carried through untouched.
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

impl Packet {
    /// Creates an event packet with an optional payload.
    pub fn event(name: impl Into<String>, data: Option<Value>) -> Self {
        Packet {
            event: Some(name.into()),
            data: normalize(data),
            ..Default::default()
        }
    }

    /// Attaches a call id, marking the packet as expecting a response.
    pub fn with_cid(mut self, cid: u64) -> Self {
        self.cid = Some(cid);
        self
    }

    /// Creates a response to a prior inbound call.
    ///
    /// Responses carry no `cid` of their own — only the `rid` echoing
    /// the call they answer.
    pub fn response(
        rid: u64,
        error: Option<Value>,
        data: Option<Value>,
    ) -> Self {
        Packet {
            rid: Some(rid),
            error: normalize(error),
            data: normalize(data),
            ..Default::default()
        }
    }

    /// Creates the handshake packet.
    ///
    /// The `authToken` key is always present, as an explicit `null` when
    /// no token is held — the server distinguishes "no token" from a
    /// malformed handshake this way.
    pub fn handshake(auth_token: Option<&str>) -> Self {
        let token =
            auth_token.map_or(Value::Null, |t| Value::String(t.to_owned()));
        Packet::event(HANDSHAKE_EVENT, Some(json!({ "authToken": token })))
    }

    /// Creates a `#subscribe` call for the given channel.
    pub fn subscribe(channel: &str) -> Self {
        Packet::event(SUBSCRIBE_EVENT, Some(json!({ "channel": channel })))
    }

    /// Creates an `#unsubscribe` call. The payload is the bare channel
    /// name, not an object.
    pub fn unsubscribe(channel: &str) -> Self {
        Packet::event(
            UNSUBSCRIBE_EVENT,
            Some(Value::String(channel.to_owned())),
        )
    }

    /// Creates a `#publish` call for the given channel and payload.
    pub fn publish(channel: &str, data: Option<Value>) -> Self {
        Packet::event(
            PUBLISH_EVENT,
            Some(json!({
                "channel": channel,
                "data": data.unwrap_or(Value::Null),
            })),
        )
    }
}

/// Collapses an explicit JSON `null` to absent, so `Some(Null)` and
/// `None` never disagree after a round trip.
fn normalize(value: Option<Value>) -> Option<Value> {
    value.filter(|v| !v.is_null())
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// A full wire message: a structured [`Packet`] or a bare scalar.
///
/// Bare scalars exist because the heartbeat is the literal string `#1`
/// (answered with `#2`), not an object.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// A structured protocol packet.
    Packet(Packet),
    /// A bare scalar frame.
    Raw(Value),
}

impl Message {
    /// Returns `true` if this is the server heartbeat ping.
    ///
    /// The comparison is ASCII case-insensitive, matching the lenient
    /// check servers are known to rely on.
    pub fn is_ping(&self) -> bool {
        matches!(
            self,
            Message::Raw(Value::String(s)) if s.eq_ignore_ascii_case(PING)
        )
    }

    /// The heartbeat pong message.
    pub fn pong() -> Self {
        Message::Raw(Value::String(PONG.to_owned()))
    }

    /// Converts this message into its structured-value form.
    pub fn to_value(&self) -> Result<Value, crate::ProtocolError> {
        match self {
            Message::Packet(packet) => serde_json::to_value(packet)
                .map_err(crate::ProtocolError::Encode),
            Message::Raw(value) => Ok(value.clone()),
        }
    }

    /// Builds a message from a structured value: mappings become
    /// packets, everything else is a bare scalar.
    pub fn from_value(value: Value) -> Result<Self, crate::ProtocolError> {
        if value.is_object() {
            serde_json::from_value(value)
                .map(Message::Packet)
                .map_err(crate::ProtocolError::Decode)
        } else {
            Ok(Message::Raw(value))
        }
    }
}

impl From<Packet> for Message {
    fn from(packet: Packet) -> Self {
        Message::Packet(packet)
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! Tests for packet construction and JSON shapes.
    //!
    //! The protocol defines exact wire shapes for the reserved calls.
    //! These tests pin them down, because a mismatch means the server
    //! rejects the handshake or silently drops subscriptions.

    use super::*;

    // =====================================================================
    // Packet constructors
    // =====================================================================

    #[test]
    fn test_handshake_with_token_json_format() {
        let packet = Packet::handshake(Some("abc")).with_cid(1);
        let json = serde_json::to_value(&packet).unwrap();

        assert_eq!(
            json,
            json!({
                "event": "#handshake",
                "data": { "authToken": "abc" },
                "cid": 1,
            })
        );
    }

    #[test]
    fn test_handshake_without_token_sends_explicit_null() {
        let packet = Packet::handshake(None);
        let json = serde_json::to_value(&packet).unwrap();

        assert_eq!(json["data"], json!({ "authToken": null }));
    }

    #[test]
    fn test_subscribe_nests_channel_in_data() {
        let packet = Packet::subscribe("news");
        let json = serde_json::to_value(&packet).unwrap();

        assert_eq!(json["event"], "#subscribe");
        assert_eq!(json["data"], json!({ "channel": "news" }));
    }

    #[test]
    fn test_unsubscribe_data_is_bare_channel_name() {
        let packet = Packet::unsubscribe("news");
        let json = serde_json::to_value(&packet).unwrap();

        assert_eq!(json["event"], "#unsubscribe");
        assert_eq!(json["data"], json!("news"));
    }

    #[test]
    fn test_publish_nests_channel_and_payload() {
        let packet = Packet::publish("room1", Some(json!({ "x": 1 })));
        let json = serde_json::to_value(&packet).unwrap();

        assert_eq!(json["event"], "#publish");
        assert_eq!(
            json["data"],
            json!({ "channel": "room1", "data": { "x": 1 } })
        );
    }

    #[test]
    fn test_publish_without_payload_sends_null_payload() {
        let packet = Packet::publish("room1", None);
        let json = serde_json::to_value(&packet).unwrap();

        assert_eq!(
            json["data"],
            json!({ "channel": "room1", "data": null })
        );
    }

    #[test]
    fn test_response_carries_rid_but_no_cid() {
        let packet = Packet::response(9, None, Some(json!("ok")));
        let json = serde_json::to_value(&packet).unwrap();

        assert_eq!(json, json!({ "rid": 9, "data": "ok" }));
    }

    #[test]
    fn test_event_normalizes_null_data_to_absent() {
        let packet = Packet::event("chat", Some(Value::Null));
        assert_eq!(packet.data, None);
    }

    #[test]
    fn test_packet_skips_absent_fields() {
        let packet = Packet::event("chat", None);
        let json = serde_json::to_string(&packet).unwrap();
        assert_eq!(json, r#"{"event":"chat"}"#);
    }

    // =====================================================================
    // Deserialization
    // =====================================================================

    #[test]
    fn test_packet_round_trip_preserves_unknown_fields() {
        let json = r#"{"event":"chat","data":"hi","ttl":30}"#;
        let packet: Packet = serde_json::from_str(json).unwrap();

        assert_eq!(packet.event.as_deref(), Some("chat"));
        assert_eq!(packet.rest.get("ttl"), Some(&json!(30)));

        let back = serde_json::to_value(&packet).unwrap();
        assert_eq!(back["ttl"], json!(30));
    }

    #[test]
    fn test_packet_null_fields_decode_as_absent() {
        let json = r#"{"event":null,"data":null,"cid":null}"#;
        let packet: Packet = serde_json::from_str(json).unwrap();

        assert_eq!(packet.event, None);
        assert_eq!(packet.data, None);
        assert_eq!(packet.cid, None);
    }

    #[test]
    fn test_packet_decode_wrong_cid_type_returns_error() {
        let json = r#"{"cid":"not-a-number"}"#;
        let result: Result<Packet, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }

    // =====================================================================
    // Message
    // =====================================================================

    #[test]
    fn test_message_is_ping_matches_case_insensitively() {
        assert!(Message::Raw(json!("#1")).is_ping());
        assert!(!Message::Raw(json!("#2")).is_ping());
        assert!(!Message::Raw(json!(1)).is_ping());
        assert!(!Message::Packet(Packet::default()).is_ping());
    }

    #[test]
    fn test_message_from_value_object_becomes_packet() {
        let msg = Message::from_value(json!({ "event": "chat" })).unwrap();
        assert!(matches!(msg, Message::Packet(p) if p.event.as_deref() == Some("chat")));
    }

    #[test]
    fn test_message_from_value_scalar_becomes_raw() {
        let msg = Message::from_value(json!("#1")).unwrap();
        assert_eq!(msg, Message::Raw(json!("#1")));
    }

    #[test]
    fn test_message_pong_is_reserved_string() {
        assert_eq!(Message::pong(), Message::Raw(json!("#2")));
    }
}
