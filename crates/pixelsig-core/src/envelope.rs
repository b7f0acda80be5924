//! Signalling envelope codec
//!
//! A signalling message is a single UTF-8 JSON object with a mandatory `type`
//! tag, an optional routing `id`, and an open bag of further members. The
//! broker parses the tag and id, carries the bag verbatim, and re-serializes
//! with `type` first. SDP and ICE payloads are opaque strings inside the bag.

use serde_json::{Map, Value};

use crate::error::{ProtocolError, Result};
use crate::types::msg;

/// A parsed signalling message.
///
/// Equality compares the tag, the routing id, and the retained field bag;
/// two envelopes that serialize identically compare equal.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    msg_type: String,
    id: Option<String>,
    fields: Map<String, Value>,
}

impl Envelope {
    /// Create an empty envelope with the given type tag.
    pub fn new(msg_type: impl Into<String>) -> Self {
        Self {
            msg_type: msg_type.into(),
            id: None,
            fields: Map::new(),
        }
    }

    /// Parse a single text frame.
    ///
    /// Fails with [`ProtocolError::MalformedFrame`] when the frame is not a
    /// JSON object or the `type` member is absent or not a string. A numeric
    /// `id` is stringified; an `id` of any other shape stays in the field bag
    /// untouched so it survives forwarding.
    pub fn parse(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)?;
        let Value::Object(mut members) = value else {
            return Err(ProtocolError::MalformedFrame(
                "frame is not a JSON object".into(),
            ));
        };

        let msg_type = match members.remove("type") {
            Some(Value::String(t)) => t,
            Some(_) => {
                return Err(ProtocolError::MalformedFrame(
                    "'type' is not a string".into(),
                ))
            }
            None => {
                return Err(ProtocolError::MalformedFrame(
                    "missing 'type' member".into(),
                ))
            }
        };

        let id = match members.remove("id") {
            Some(Value::String(s)) => Some(s),
            Some(Value::Number(n)) => Some(n.to_string()),
            // Anything else is not a routing id; keep it in the bag. The bag
            // is order-insensitive, so reinsertion position does not matter.
            Some(other) => {
                members.insert("id".into(), other);
                None
            }
            None => None,
        };

        Ok(Self {
            msg_type,
            id,
            fields: members,
        })
    }

    /// Serialize to compact JSON with `type` first and no null-valued keys.
    pub fn serialize(&self) -> String {
        let mut out = Map::with_capacity(self.fields.len() + 2);
        out.insert("type".into(), Value::String(self.msg_type.clone()));
        if let Some(id) = &self.id {
            out.insert("id".into(), Value::String(id.clone()));
        }
        for (key, value) in &self.fields {
            if !value.is_null() {
                out.insert(key.clone(), value.clone());
            }
        }
        // A map of non-null JSON values cannot fail to serialize.
        serde_json::to_string(&Value::Object(out)).unwrap_or_else(|_| String::from("{}"))
    }

    pub fn msg_type(&self) -> &str {
        &self.msg_type
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = Some(id.into());
    }

    /// Stamp the routing id only if the sender did not supply one.
    pub fn ensure_id(&mut self, id: &str) {
        if self.id.is_none() {
            self.id = Some(id.to_string());
        }
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn field_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    pub fn set_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    /// Whether this message must survive outbound backpressure.
    pub fn is_critical(&self) -> bool {
        msg::is_critical(&self.msg_type)
    }

    // ========================================================================
    // Canonical message constructors
    // ========================================================================

    /// `{type:"config", peerConnectionOptions:{...}}`
    pub fn config(peer_connection_options: Option<Value>) -> Self {
        Self::new(msg::CONFIG).set_field(
            "peerConnectionOptions",
            peer_connection_options.unwrap_or_else(|| Value::Object(Map::new())),
        )
    }

    pub fn ping() -> Self {
        Self::new(msg::PING)
    }

    pub fn pong() -> Self {
        Self::new(msg::PONG)
    }

    /// `{type:"playerCount", count:N}`
    pub fn player_count(count: usize) -> Self {
        Self::new(msg::PLAYER_COUNT).set_field("count", Value::from(count))
    }

    /// `{type:"error", message:"..."}`
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(msg::ERROR).set_field("message", Value::String(message.into()))
    }

    /// `{type:"streamerList", ids:[...]}`
    pub fn streamer_list(ids: Vec<String>) -> Self {
        Self::new(msg::STREAMER_LIST)
            .set_field("ids", Value::Array(ids.into_iter().map(Value::String).collect()))
    }

    /// `{type:"playerConnected", playerId, dataChannel, sfu, sendOffer}`
    pub fn player_connected(player_id: &str, data_channel: bool, sfu: bool, send_offer: bool) -> Self {
        Self::new(msg::PLAYER_CONNECTED)
            .set_field("playerId", Value::String(player_id.into()))
            .set_field("dataChannel", Value::Bool(data_channel))
            .set_field("sfu", Value::Bool(sfu))
            .set_field("sendOffer", Value::Bool(send_offer))
    }

    /// `{type:"playerDisconnected", playerId}`
    pub fn player_disconnected(player_id: &str) -> Self {
        Self::new(msg::PLAYER_DISCONNECTED).set_field("playerId", Value::String(player_id.into()))
    }

    /// `{type:"offer", sdp:"..."}`
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self::new(msg::OFFER).set_field("sdp", Value::String(sdp.into()))
    }

    /// `{type:"answer", sdp:"..."}`
    pub fn answer(sdp: impl Into<String>) -> Self {
        Self::new(msg::ANSWER).set_field("sdp", Value::String(sdp.into()))
    }

    /// `{type:"iceCandidate", candidate:{...}}`
    pub fn ice_candidate(candidate: Value) -> Self {
        Self::new(msg::ICE_CANDIDATE).set_field("candidate", candidate)
    }

    /// `{type:"streamerIdChanged", newID:"..."}`
    pub fn streamer_id_changed(new_id: &str) -> Self {
        Self::new(msg::STREAMER_ID_CHANGED).set_field("newID", Value::String(new_id.into()))
    }

    /// `{type:"streamerDisconnected"}`
    pub fn streamer_disconnected() -> Self {
        Self::new(msg::STREAMER_DISCONNECTED)
    }

    /// `{type:"disconnect", reason?}`
    pub fn disconnect(reason: Option<&str>) -> Self {
        let env = Self::new(msg::DISCONNECT);
        match reason {
            Some(r) => env.set_field("reason", Value::String(r.into())),
            None => env,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_requires_type() {
        assert!(Envelope::parse("{}").is_err());
        assert!(Envelope::parse(r#"{"type":42}"#).is_err());
        assert!(Envelope::parse("not json").is_err());
        assert!(Envelope::parse(r#"[1,2,3]"#).is_err());
        assert!(Envelope::parse(r#"{"type":"ping"}"#).is_ok());
    }

    #[test]
    fn numeric_id_is_stringified() {
        let env = Envelope::parse(r#"{"type":"offer","id":1234,"sdp":"v=0"}"#).unwrap();
        assert_eq!(env.id(), Some("1234"));
        assert_eq!(env.field_str("sdp"), Some("v=0"));
    }

    #[test]
    fn non_scalar_id_stays_in_bag() {
        let env = Envelope::parse(r#"{"type":"offer","id":{"odd":true}}"#).unwrap();
        assert_eq!(env.id(), None);
        assert_eq!(env.field("id"), Some(&json!({"odd": true})));
    }

    #[test]
    fn serialize_puts_type_first_and_skips_nulls() {
        let env = Envelope::parse(r#"{"sdp":"v=0","type":"offer","junk":null}"#).unwrap();
        let out = env.serialize();
        assert!(out.starts_with(r#"{"type":"offer""#), "got {out}");
        assert!(!out.contains("junk"));
    }

    #[test]
    fn unknown_fields_round_trip_verbatim() {
        let input = r#"{"type":"offer","sdp":"v=0...","minBitrateBps":100000,"nested":{"a":[1,2]}}"#;
        let env = Envelope::parse(input).unwrap();
        let reparsed = Envelope::parse(&env.serialize()).unwrap();
        assert_eq!(env, reparsed);
        assert_eq!(reparsed.field("minBitrateBps"), Some(&json!(100000)));
        assert_eq!(reparsed.field("nested"), Some(&json!({"a": [1, 2]})));
    }

    #[test]
    fn ensure_id_does_not_overwrite() {
        let mut env = Envelope::offer("v=0");
        env.ensure_id("abc");
        assert_eq!(env.id(), Some("abc"));
        env.ensure_id("def");
        assert_eq!(env.id(), Some("abc"));
    }

    #[test]
    fn constructor_shapes() {
        let cases: Vec<(Envelope, &str)> = vec![
            (Envelope::config(None), r#"{"type":"config","peerConnectionOptions":{}}"#),
            (Envelope::ping(), r#"{"type":"ping"}"#),
            (Envelope::pong(), r#"{"type":"pong"}"#),
            (Envelope::player_count(3), r#"{"type":"playerCount","count":3}"#),
            (Envelope::error("boom"), r#"{"type":"error","message":"boom"}"#),
            (
                Envelope::streamer_list(vec!["S1".into(), "S2".into()]),
                r#"{"type":"streamerList","ids":["S1","S2"]}"#,
            ),
            (
                Envelope::player_connected("p1", true, false, true),
                r#"{"type":"playerConnected","playerId":"p1","dataChannel":true,"sfu":false,"sendOffer":true}"#,
            ),
            (Envelope::offer("v=0"), r#"{"type":"offer","sdp":"v=0"}"#),
            (Envelope::answer("v=0r"), r#"{"type":"answer","sdp":"v=0r"}"#),
            (
                Envelope::ice_candidate(json!({"candidate":"c","sdpMid":"0"})),
                r#"{"type":"iceCandidate","candidate":{"candidate":"c","sdpMid":"0"}}"#,
            ),
            (
                Envelope::streamer_id_changed("S2"),
                r#"{"type":"streamerIdChanged","newID":"S2"}"#,
            ),
            (Envelope::disconnect(None), r#"{"type":"disconnect"}"#),
            (
                Envelope::disconnect(Some("bye")),
                r#"{"type":"disconnect","reason":"bye"}"#,
            ),
        ];
        for (env, expected) in cases {
            assert_eq!(env.serialize(), expected);
        }
    }

    #[test]
    fn constructor_round_trips() {
        let all = vec![
            Envelope::config(None),
            Envelope::ping(),
            Envelope::pong(),
            Envelope::player_count(42),
            Envelope::error("streamer at capacity"),
            Envelope::streamer_list(vec!["a".into()]),
            Envelope::player_connected("p", true, true, false),
            Envelope::offer("v=0..."),
            Envelope::answer("v=0r..."),
            Envelope::ice_candidate(json!({"candidate": "x"})),
            Envelope::streamer_id_changed("new"),
            Envelope::streamer_disconnected(),
            Envelope::player_disconnected("p"),
            Envelope::disconnect(Some("going away")),
        ];
        for env in all {
            assert_eq!(Envelope::parse(&env.serialize()).unwrap(), env);
        }
    }
}
