//! Codec trait and implementations for serializing/deserializing messages.
//!
//! A codec converts between [`Message`] and transport [`Frame`]s. The
//! session doesn't care HOW messages are serialized — it holds a
//! `Box<dyn Codec>` and swaps implementations.
//!
//! Two codecs are provided:
//!
//! - [`PlainCodec`] — the default, backward-compatible mode: the direct
//!   textual JSON form of the message, no compaction.
//! - [`MinifiedCodec`] — the compact wire form: verbose field groups are
//!   rewritten into short array-keyed entries (`p` for publishes, `e`
//!   for events, `r` for responses) and sent as binary frames. The
//!   rewriting is lossless; `decode(encode(m))` reconstructs `m`.
//!
//! The wire keys `e`, `p`, and `r` are reserved tokens: application
//! fields with those names would collide with the compact form. This is
//! a documented constraint of the protocol, not enforced here.

use serde_json::{Map, Value};
use wavelink_transport::Frame;

use crate::types::{Message, PUBLISH_EVENT};
use crate::ProtocolError;

/// Converts messages to transport frames and back.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a message into a frame.
    fn encode(&self, message: &Message) -> Result<Frame, ProtocolError>;

    /// Deserializes a frame back into a message.
    fn decode(&self, frame: &Frame) -> Result<Message, ProtocolError>;
}

// ---------------------------------------------------------------------------
// PlainCodec
// ---------------------------------------------------------------------------

/// The default codec: direct textual JSON, no compaction.
///
/// Text that fails to parse as JSON decodes as a bare string value —
/// that is how the raw `#1` heartbeat arrives in this mode.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainCodec;

impl Codec for PlainCodec {
    fn encode(&self, message: &Message) -> Result<Frame, ProtocolError> {
        let value = message.to_value()?;
        let text =
            serde_json::to_string(&value).map_err(ProtocolError::Encode)?;
        Ok(Frame::Text(text))
    }

    fn decode(&self, frame: &Frame) -> Result<Message, ProtocolError> {
        let text = match frame {
            Frame::Text(text) => text.as_str(),
            Frame::Binary(data) => {
                std::str::from_utf8(data).map_err(|_| {
                    ProtocolError::InvalidMessage(
                        "binary frame is not valid UTF-8".into(),
                    )
                })?
            }
        };

        match serde_json::from_str::<Value>(text) {
            Ok(value) => Message::from_value(value),
            // Not JSON at all: treat the whole frame as a bare string,
            // the shape the `#1` heartbeat takes on the wire.
            Err(_) => Ok(Message::Raw(Value::String(text.to_owned()))),
        }
    }
}

// ---------------------------------------------------------------------------
// MinifiedCodec
// ---------------------------------------------------------------------------

/// The compact codec: array-keyed wire form over binary frames.
///
/// Compaction rules, applied in order (they consume disjoint fields, so
/// at most one of `p`/`e` fires and `r` composes with either):
///
/// 1. `event == "#publish"` with a non-null `data` →
///    `p: [channel, payload, cid?]`
/// 2. any other non-null `event` → `e: [event, data, cid?]`
/// 3. non-null `rid` → `r: [rid, error, data]`
///
/// Bare scalars are encoded as-is, and fields not consumed by a rule
/// pass through untouched. Decoding reverses each rule independently.
#[derive(Debug, Clone, Copy, Default)]
pub struct MinifiedCodec;

impl Codec for MinifiedCodec {
    fn encode(&self, message: &Message) -> Result<Frame, ProtocolError> {
        let value = match message.to_value()? {
            Value::Object(map) => Value::Object(compact(map)),
            scalar => scalar,
        };
        let bytes =
            serde_json::to_vec(&value).map_err(ProtocolError::Encode)?;
        Ok(Frame::Binary(bytes))
    }

    fn decode(&self, frame: &Frame) -> Result<Message, ProtocolError> {
        let value: Value = match frame {
            Frame::Binary(data) => {
                serde_json::from_slice(data).map_err(ProtocolError::Decode)?
            }
            // Some servers fall back to text frames mid-session; accept
            // them with the same raw-string fallback as PlainCodec.
            Frame::Text(text) => match serde_json::from_str(text) {
                Ok(value) => value,
                Err(_) => {
                    return Ok(Message::Raw(Value::String(text.clone())));
                }
            },
        };

        match value {
            Value::Object(map) => {
                Message::from_value(Value::Object(expand(map)))
            }
            scalar => Ok(Message::Raw(scalar)),
        }
    }
}

// ---------------------------------------------------------------------------
// Compaction
// ---------------------------------------------------------------------------

fn compact(mut map: Map<String, Value>) -> Map<String, Value> {
    compact_publish(&mut map);
    compact_event(&mut map);
    compact_response(&mut map);
    map
}

/// `{event:"#publish", data:{channel,data}, cid?}` → `p: [channel, data, cid?]`
fn compact_publish(map: &mut Map<String, Value>) {
    let is_publish = map.get("event").and_then(Value::as_str)
        == Some(PUBLISH_EVENT)
        && map.get("data").is_some_and(|d| !d.is_null());
    if !is_publish {
        return;
    }

    map.remove("event");
    let data = map.remove("data").unwrap_or(Value::Null);
    let channel = data.get("channel").cloned().unwrap_or(Value::Null);
    let payload = data.get("data").cloned().unwrap_or(Value::Null);

    let mut entry = vec![channel, payload];
    if let Some(cid) = map.remove("cid") {
        entry.push(cid);
    }
    map.insert("p".to_owned(), Value::Array(entry));
}

/// `{event, data, cid?}` → `e: [event, data, cid?]`
fn compact_event(map: &mut Map<String, Value>) {
    let Some(event) = map.remove("event") else { return };
    if event.is_null() {
        map.insert("event".to_owned(), event);
        return;
    }

    let data = map.remove("data").unwrap_or(Value::Null);
    let mut entry = vec![event, data];
    if let Some(cid) = map.remove("cid") {
        entry.push(cid);
    }
    map.insert("e".to_owned(), Value::Array(entry));
}

/// `{rid, error, data}` → `r: [rid, error, data]`
fn compact_response(map: &mut Map<String, Value>) {
    let Some(rid) = map.remove("rid") else { return };
    if rid.is_null() {
        map.insert("rid".to_owned(), rid);
        return;
    }

    let error = map.remove("error").unwrap_or(Value::Null);
    let data = map.remove("data").unwrap_or(Value::Null);
    map.insert("r".to_owned(), Value::Array(vec![rid, error, data]));
}

// ---------------------------------------------------------------------------
// Expansion
// ---------------------------------------------------------------------------

fn expand(mut map: Map<String, Value>) -> Map<String, Value> {
    expand_event(&mut map);
    expand_publish(&mut map);
    expand_response(&mut map);
    map
}

/// Takes a compact entry out of the map, skipping null entries and
/// restoring anything that isn't the expected array (malformed input is
/// left untouched rather than dropped).
fn take_entry(
    map: &mut Map<String, Value>,
    key: &str,
) -> Option<Vec<Value>> {
    let entry = map.remove(key)?;
    if entry.is_null() {
        map.insert(key.to_owned(), entry);
        return None;
    }
    match entry {
        Value::Array(items) => Some(items),
        other => {
            map.insert(key.to_owned(), other);
            None
        }
    }
}

fn expand_event(map: &mut Map<String, Value>) {
    let Some(items) = take_entry(map, "e") else { return };
    let mut items = items.into_iter();
    if let Some(event) = items.next() {
        map.insert("event".to_owned(), event);
    }
    if let Some(data) = items.next() {
        map.insert("data".to_owned(), data);
    }
    if let Some(cid) = items.next() {
        map.insert("cid".to_owned(), cid);
    }
}

fn expand_publish(map: &mut Map<String, Value>) {
    let Some(items) = take_entry(map, "p") else { return };
    let mut items = items.into_iter();
    let channel = items.next().unwrap_or(Value::Null);
    let payload = items.next().unwrap_or(Value::Null);

    let mut data = Map::new();
    data.insert("channel".to_owned(), channel);
    data.insert("data".to_owned(), payload);

    map.insert("event".to_owned(), Value::String(PUBLISH_EVENT.to_owned()));
    map.insert("data".to_owned(), Value::Object(data));
    if let Some(cid) = items.next() {
        map.insert("cid".to_owned(), cid);
    }
}

fn expand_response(map: &mut Map<String, Value>) {
    let Some(items) = take_entry(map, "r") else { return };
    let mut items = items.into_iter();
    if let Some(rid) = items.next() {
        map.insert("rid".to_owned(), rid);
    }
    map.insert(
        "error".to_owned(),
        items.next().unwrap_or(Value::Null),
    );
    map.insert("data".to_owned(), items.next().unwrap_or(Value::Null));
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! Round-trip and exact-wire-shape tests for both codecs.
    //!
    //! The compact form is bit-exact protocol surface: a wrong array
    //! order or a missing null slot breaks interop with every other
    //! client and server implementation.

    use serde_json::json;

    use super::*;
    use crate::types::Packet;

    fn packet(json: Value) -> Packet {
        serde_json::from_value(json).expect("test packet should parse")
    }

    /// Decodes a binary frame's JSON for wire-shape assertions.
    fn wire_json(frame: &Frame) -> Value {
        match frame {
            Frame::Binary(bytes) => {
                serde_json::from_slice(bytes).expect("wire should be JSON")
            }
            Frame::Text(text) => {
                serde_json::from_str(text).expect("wire should be JSON")
            }
        }
    }

    // =====================================================================
    // PlainCodec
    // =====================================================================

    #[test]
    fn test_plain_encode_produces_text_frame() {
        let msg = Message::Packet(packet(json!({ "event": "chat" })));
        let frame = PlainCodec.encode(&msg).unwrap();
        assert!(matches!(frame, Frame::Text(_)));
        assert_eq!(wire_json(&frame), json!({ "event": "chat" }));
    }

    #[test]
    fn test_plain_round_trip_event_packet() {
        let msg = Message::Packet(packet(json!({
            "event": "chat",
            "data": { "text": "hi" },
            "cid": 3,
        })));
        let frame = PlainCodec.encode(&msg).unwrap();
        assert_eq!(PlainCodec.decode(&frame).unwrap(), msg);
    }

    #[test]
    fn test_plain_round_trip_response_packet() {
        let msg = Message::Packet(packet(json!({
            "rid": 7,
            "error": { "message": "nope" },
            "data": null,
        })));
        let frame = PlainCodec.encode(&msg).unwrap();
        assert_eq!(PlainCodec.decode(&frame).unwrap(), msg);
    }

    #[test]
    fn test_plain_decode_raw_text_falls_back_to_string() {
        // The heartbeat arrives as the unquoted text `#1`, which is not
        // valid JSON — it must decode as a bare string, not an error.
        let frame = Frame::Text("#1".into());
        let msg = PlainCodec.decode(&frame).unwrap();
        assert!(msg.is_ping());
    }

    #[test]
    fn test_plain_decode_quoted_string_is_raw() {
        let frame = Frame::Text("\"#1\"".into());
        let msg = PlainCodec.decode(&frame).unwrap();
        assert!(msg.is_ping());
    }

    #[test]
    fn test_plain_encode_pong_is_quoted_string() {
        let frame = PlainCodec.encode(&Message::pong()).unwrap();
        assert_eq!(frame, Frame::Text("\"#2\"".into()));
    }

    #[test]
    fn test_plain_decode_invalid_utf8_binary_returns_error() {
        let frame = Frame::Binary(vec![0xff, 0xfe]);
        let result = PlainCodec.decode(&frame);
        assert!(matches!(
            result,
            Err(ProtocolError::InvalidMessage(_))
        ));
    }

    // =====================================================================
    // MinifiedCodec — publish compaction
    // =====================================================================

    #[test]
    fn test_minified_publish_compacts_to_p_entry() {
        // The canonical wire-shape scenario: the only remaining field
        // is `p` with the ordered [channel, payload, cid] triple.
        let msg = Message::Packet(packet(json!({
            "event": "#publish",
            "data": { "channel": "news", "data": "hi" },
            "cid": 7,
        })));

        let frame = MinifiedCodec.encode(&msg).unwrap();
        assert!(matches!(frame, Frame::Binary(_)));
        assert_eq!(wire_json(&frame), json!({ "p": ["news", "hi", 7] }));

        assert_eq!(MinifiedCodec.decode(&frame).unwrap(), msg);
    }

    #[test]
    fn test_minified_publish_without_cid_is_a_pair() {
        let msg = Message::Packet(packet(json!({
            "event": "#publish",
            "data": { "channel": "news", "data": { "x": 1 } },
        })));

        let frame = MinifiedCodec.encode(&msg).unwrap();
        assert_eq!(
            wire_json(&frame),
            json!({ "p": ["news", { "x": 1 }] })
        );
        assert_eq!(MinifiedCodec.decode(&frame).unwrap(), msg);
    }

    #[test]
    fn test_minified_publish_without_data_falls_through_to_event() {
        // `#publish` with no data doesn't match the publish rule; the
        // generic event rule picks it up instead.
        let msg = Message::Packet(packet(json!({ "event": "#publish" })));
        let frame = MinifiedCodec.encode(&msg).unwrap();
        assert_eq!(wire_json(&frame), json!({ "e": ["#publish", null] }));
    }

    // =====================================================================
    // MinifiedCodec — event compaction
    // =====================================================================

    #[test]
    fn test_minified_event_compacts_to_e_entry() {
        let msg = Message::Packet(packet(json!({
            "event": "chat",
            "data": "hello",
            "cid": 4,
        })));

        let frame = MinifiedCodec.encode(&msg).unwrap();
        assert_eq!(wire_json(&frame), json!({ "e": ["chat", "hello", 4] }));
        assert_eq!(MinifiedCodec.decode(&frame).unwrap(), msg);
    }

    #[test]
    fn test_minified_event_without_data_encodes_null_slot() {
        let msg = Message::Packet(packet(json!({ "event": "chat" })));
        let frame = MinifiedCodec.encode(&msg).unwrap();
        assert_eq!(wire_json(&frame), json!({ "e": ["chat", null] }));
        assert_eq!(MinifiedCodec.decode(&frame).unwrap(), msg);
    }

    #[test]
    fn test_minified_subscribe_round_trip() {
        let msg =
            Message::Packet(Packet::subscribe("room1").with_cid(2));
        let frame = MinifiedCodec.encode(&msg).unwrap();
        assert_eq!(
            wire_json(&frame),
            json!({ "e": ["#subscribe", { "channel": "room1" }, 2] })
        );
        assert_eq!(MinifiedCodec.decode(&frame).unwrap(), msg);
    }

    // =====================================================================
    // MinifiedCodec — response compaction
    // =====================================================================

    #[test]
    fn test_minified_response_compacts_to_r_triple() {
        let msg = Message::Packet(packet(json!({
            "rid": 9,
            "error": null,
            "data": "ok",
        })));

        let frame = MinifiedCodec.encode(&msg).unwrap();
        // The triple always carries three slots; absent error becomes
        // an explicit null so positions stay fixed.
        assert_eq!(wire_json(&frame), json!({ "r": [9, null, "ok"] }));
        assert_eq!(MinifiedCodec.decode(&frame).unwrap(), msg);
    }

    #[test]
    fn test_minified_response_keeps_unrelated_fields() {
        let msg = Message::Packet(packet(json!({
            "rid": 2,
            "data": "ok",
            "ttl": 30,
        })));

        let frame = MinifiedCodec.encode(&msg).unwrap();
        assert_eq!(
            wire_json(&frame),
            json!({ "r": [2, null, "ok"], "ttl": 30 })
        );
        assert_eq!(MinifiedCodec.decode(&frame).unwrap(), msg);
    }

    // =====================================================================
    // MinifiedCodec — passthrough
    // =====================================================================

    #[test]
    fn test_minified_bare_scalar_encodes_as_is() {
        let frame = MinifiedCodec.encode(&Message::pong()).unwrap();
        assert_eq!(wire_json(&frame), json!("#2"));
    }

    #[test]
    fn test_minified_decode_bare_scalar_is_raw() {
        let frame = Frame::Binary(b"\"#1\"".to_vec());
        let msg = MinifiedCodec.decode(&frame).unwrap();
        assert!(msg.is_ping());
    }

    #[test]
    fn test_minified_decode_raw_text_falls_back_to_string() {
        let frame = Frame::Text("#1".into());
        let msg = MinifiedCodec.decode(&frame).unwrap();
        assert!(msg.is_ping());
    }

    #[test]
    fn test_minified_uncompacted_object_decodes_unchanged() {
        // No e/p/r keys present: the object passes through untouched.
        let frame =
            Frame::Binary(br#"{"rid":1,"data":{"ok":true}}"#.to_vec());
        let msg = MinifiedCodec.decode(&frame).unwrap();
        assert_eq!(
            msg,
            Message::Packet(packet(json!({
                "rid": 1,
                "data": { "ok": true },
            })))
        );
    }

    #[test]
    fn test_minified_decode_garbage_returns_error() {
        let frame = Frame::Binary(b"not json at all".to_vec());
        let result = MinifiedCodec.decode(&frame);
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn test_minified_null_compact_entries_are_left_alone() {
        // A null `e` entry doesn't match the compact form; it survives
        // as an unrecognized field instead of being misexpanded.
        let frame = Frame::Binary(br#"{"e":null,"rid":1}"#.to_vec());
        let msg = MinifiedCodec.decode(&frame).unwrap();
        let Message::Packet(p) = msg else {
            panic!("expected packet");
        };
        assert_eq!(p.rid, Some(1));
        assert_eq!(p.rest.get("e"), Some(&Value::Null));
    }

    #[test]
    fn test_minified_handshake_round_trip() {
        let msg =
            Message::Packet(Packet::handshake(Some("abc")).with_cid(1));
        let frame = MinifiedCodec.encode(&msg).unwrap();
        assert_eq!(
            wire_json(&frame),
            json!({ "e": ["#handshake", { "authToken": "abc" }, 1] })
        );
        assert_eq!(MinifiedCodec.decode(&frame).unwrap(), msg);
    }
}
