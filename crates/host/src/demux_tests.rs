// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde_json::json;

use super::*;
use carf_agent::protocol::{response_ok, ResponseResult};

#[test]
fn well_formed_response_classifies() {
    let msg = response_ok(12, json!({"arch": "x64"}));
    let Classified::Response(r) = classify(&msg) else {
        unreachable!("must classify as response");
    };
    assert_eq!(r.id, 12);
    assert_eq!(r.result, ResponseResult::Ok);
    assert_eq!(r.returns["arch"], "x64");
}

#[test]
fn well_formed_event_classifies_with_flattened_fields() {
    let msg = json!({
        "type": "send",
        "payload": {
            "type": "carf:event",
            "event": "memory_scan_progress",
            "scanId": "s1",
            "progress": 55,
        },
    });
    let Classified::Event { name, fields } = classify(&msg) else {
        unreachable!("must classify as event");
    };
    assert_eq!(name, "memory_scan_progress");
    assert_eq!(fields.get("scanId"), Some(&json!("s1")));
    assert_eq!(fields.get("progress"), Some(&json!(55)));
    assert!(!fields.contains_key("type"));
    assert!(!fields.contains_key("event"));
}

#[test]
fn almost_right_responses_fall_back_to_raw() {
    // Missing id.
    let msg = json!({"type": "send", "payload": {"type": "carf:response", "result": "ok"}});
    assert!(matches!(classify(&msg), Classified::Raw { .. }));

    // Non-integer id.
    let msg = json!({"type": "send", "payload": {"type": "carf:response", "id": "7", "result": "ok"}});
    assert!(matches!(classify(&msg), Classified::Raw { .. }));

    // Result outside ok/error.
    let msg = json!({"type": "send", "payload": {"type": "carf:response", "id": 7, "result": "maybe"}});
    assert!(matches!(classify(&msg), Classified::Raw { .. }));

    // Event without a name.
    let msg = json!({"type": "send", "payload": {"type": "carf:event", "scanId": "x"}});
    assert!(matches!(classify(&msg), Classified::Raw { .. }));
}

#[test]
fn plain_sends_and_foreign_messages_are_raw() {
    let log = json!({"type": "send", "payload": "scan started"});
    assert!(matches!(classify(&log), Classified::Raw { .. }));

    let console = json!({"type": "log", "payload": "hello from agent"});
    assert!(matches!(classify(&console), Classified::Raw { .. }));

    let junk = json!(3.5);
    assert!(matches!(classify(&junk), Classified::Raw { .. }));
}
