// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Script-message demultiplexer.
//!
//! Pure classifier from a raw message payload into response / event / raw
//! log.  A `carf:response` needs the full shape (outer `type: send`, payload
//! tagged `carf:response` with an integer id and an ok/error result); a
//! `carf:event` needs a string event name.  Everything else — including
//! almost-right shapes — is a raw log entry, never an error.

use serde_json::Value;

use carf_agent::protocol::{ResponsePayload, EVENT_TYPE, RESPONSE_TYPE, SEND_TYPE};

/// Classification of one inbound script message.
#[derive(Debug, Clone)]
pub enum Classified {
    /// A well-formed `carf:response`.
    Response(ResponsePayload),
    /// A well-formed `carf:event` with its flattened payload fields.
    Event { name: String, fields: serde_json::Map<String, Value> },
    /// Anything else, forwarded verbatim.
    Raw { message: Value },
}

/// Classify one raw script message.
pub fn classify(message: &Value) -> Classified {
    let raw = || Classified::Raw { message: message.clone() };

    if message.get("type").and_then(Value::as_str) != Some(SEND_TYPE) {
        return raw();
    }
    let Some(payload) = message.get("payload") else {
        return raw();
    };

    match payload.get("type").and_then(Value::as_str) {
        Some(RESPONSE_TYPE) => {
            if payload.get("id").map(Value::is_u64) != Some(true) {
                return raw();
            }
            match serde_json::from_value::<ResponsePayload>(payload.clone()) {
                Ok(response) => Classified::Response(response),
                Err(_) => raw(),
            }
        }
        Some(EVENT_TYPE) => {
            let Some(name) = payload.get("event").and_then(Value::as_str) else {
                return raw();
            };
            let mut fields = payload.as_object().cloned().unwrap_or_default();
            fields.remove("type");
            fields.remove("event");
            Classified::Event { name: name.to_owned(), fields }
        }
        _ => raw(),
    }
}

#[cfg(test)]
#[path = "demux_tests.rs"]
mod tests;
