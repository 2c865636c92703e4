// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn request_envelope_shape() {
    let env = request_envelope(7, "ping", None);
    assert_eq!(env["type"], "carf:request");
    assert_eq!(env["payload"]["id"], 7);
    assert_eq!(env["payload"]["method"], "ping");
    assert_eq!(env["payload"]["params"], Value::Null);
}

#[test]
fn request_round_trip() {
    let env = request_envelope(3, "read_memory", Some(json!({"address": "0x1000", "size": 16})));
    let parsed = parse_request(&env);
    let Some(req) = parsed else {
        unreachable!("well-formed request must parse");
    };
    assert_eq!(req.id, 3);
    assert_eq!(req.method, "read_memory");
    assert_eq!(req.params, Some(json!({"address": "0x1000", "size": 16})));
}

#[test]
fn parse_request_rejects_other_shapes() {
    assert!(parse_request(&json!({"type": "send", "payload": {}})).is_none());
    assert!(parse_request(&json!("hello")).is_none());
    assert!(parse_request(&json!({"type": "carf:request"})).is_none());
    // Payload missing the id is not a request.
    assert!(parse_request(&json!({"type": "carf:request", "payload": {"method": "ping"}})).is_none());
}

#[test]
fn response_ok_shape() {
    let env = response_ok(1, json!("pong"));
    assert_eq!(env["type"], "send");
    assert_eq!(env["payload"]["type"], "carf:response");
    assert_eq!(env["payload"]["id"], 1);
    assert_eq!(env["payload"]["result"], "ok");
    assert_eq!(env["payload"]["returns"], "pong");
}

#[test]
fn response_error_carries_fault() {
    let env = response_error(9, &AgentFault::with_stack("boom", "at scan()"));
    assert_eq!(env["payload"]["result"], "error");
    assert_eq!(env["payload"]["returns"]["message"], "boom");
    assert_eq!(env["payload"]["returns"]["stack"], "at scan()");
}

#[test]
fn event_envelope_flattens_fields() {
    let mut fields = serde_json::Map::new();
    fields.insert("scanId".to_owned(), json!("abc"));
    fields.insert("progress".to_owned(), json!(40));
    let env = event_envelope("memory_scan_progress", fields);
    assert_eq!(env["type"], "send");
    assert_eq!(env["payload"]["type"], "carf:event");
    assert_eq!(env["payload"]["event"], "memory_scan_progress");
    assert_eq!(env["payload"]["scanId"], "abc");
    assert_eq!(env["payload"]["progress"], 40);
}

#[test]
fn response_payload_deserializes_from_wire() {
    let raw = json!({"id": 42, "result": "error", "returns": {"message": "no"}});
    let parsed: Result<ResponsePayload, _> = serde_json::from_value(raw);
    let Ok(payload) = parsed else {
        unreachable!("wire response must deserialize");
    };
    assert_eq!(payload.id, 42);
    assert_eq!(payload.result, ResponseResult::Error);
}

#[test]
fn address_formats_as_hex() {
    assert_eq!(format_address(0x1400012a0), "0x1400012a0");
    assert_eq!(format_address(0), "0x0");
}

#[test]
fn address_parses_hex_decimal_and_number() {
    assert_eq!(parse_address(&json!("0x10")).ok(), Some(16));
    assert_eq!(parse_address(&json!("0X10")).ok(), Some(16));
    assert_eq!(parse_address(&json!("42")).ok(), Some(42));
    assert_eq!(parse_address(&json!(42)).ok(), Some(42));
    assert!(parse_address(&json!("zz")).is_err());
    assert!(parse_address(&json!(-1)).is_err());
    assert!(parse_address(&json!(null)).is_err());
}
