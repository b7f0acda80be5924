//! Envelope contract tests
//!
//! The broker is a field-preserving proxy: these tests pin down the parts of
//! the codec the routing layer relies on when it stamps ids and re-serializes
//! frames it does not understand.

use pixelsig_core::{msg, Envelope};
use serde_json::json;

#[test]
fn forward_path_preserves_unknown_message_types() {
    // The broker never rejects unknown tags; they parse and re-serialize.
    let input = r#"{"type":"someFutureThing","payload":{"x":1},"flag":true}"#;
    let env = Envelope::parse(input).unwrap();
    assert_eq!(env.msg_type(), "someFutureThing");
    let out = Envelope::parse(&env.serialize()).unwrap();
    assert_eq!(env, out);
}

#[test]
fn stamping_id_preserves_every_other_field() {
    let input = r#"{"type":"iceCandidate","candidate":{"candidate":"candidate:1 1 UDP 2122252543 192.168.1.2 49152 typ host","sdpMLineIndex":0,"sdpMid":"0"}}"#;
    let mut env = Envelope::parse(input).unwrap();
    env.ensure_id("11112222-3333-4444-5555-666677778888");

    let out = Envelope::parse(&env.serialize()).unwrap();
    assert_eq!(out.id(), Some("11112222-3333-4444-5555-666677778888"));
    assert_eq!(
        out.field("candidate"),
        Envelope::parse(input).unwrap().field("candidate")
    );
}

#[test]
fn sender_supplied_id_wins_over_stamp() {
    let mut env = Envelope::parse(r#"{"type":"answer","sdp":"v=0r...","id":"peer-7"}"#).unwrap();
    env.ensure_id("internal-id");
    assert_eq!(env.id(), Some("peer-7"));
}

#[test]
fn sdp_payload_is_opaque() {
    // SDP with embedded quotes-adjacent characters and CRLF escapes must
    // survive untouched; the broker never inspects it.
    let sdp = "v=0\r\no=- 0 0 IN IP4 0.0.0.0\r\na=fingerprint:sha-256 AA:BB\r\n";
    let env = Envelope::offer(sdp);
    let out = Envelope::parse(&env.serialize()).unwrap();
    assert_eq!(out.field_str("sdp"), Some(sdp));
}

#[test]
fn identify_variants_parse() {
    for (frame, key, expected) in [
        (r#"{"type":"identify","streamerId":"S1"}"#, "streamerId", "S1"),
        (r#"{"type":"identify","playerId":"P1"}"#, "playerId", "P1"),
        (r#"{"type":"identify","sfuId":"F1"}"#, "sfuId", "F1"),
    ] {
        let env = Envelope::parse(frame).unwrap();
        assert_eq!(env.msg_type(), msg::IDENTIFY);
        assert_eq!(env.field_str(key), Some(expected));
    }
    // Bare identify is legal; ids are optional.
    let env = Envelope::parse(r#"{"type":"identify"}"#).unwrap();
    assert_eq!(env.field_str("streamerId"), None);
}

#[test]
fn empty_and_oversized_bags() {
    let env = Envelope::parse(r#"{"type":"ping"}"#).unwrap();
    assert_eq!(env.serialize(), r#"{"type":"ping"}"#);

    let mut big = serde_json::Map::new();
    for i in 0..200 {
        big.insert(format!("k{i}"), json!(i));
    }
    let frame = serde_json::to_string(&json!({"type": "offer", "extra": big})).unwrap();
    let env = Envelope::parse(&frame).unwrap();
    let out = Envelope::parse(&env.serialize()).unwrap();
    assert_eq!(env, out);
}
