// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Canonical wire types for the host ↔ agent request/response protocol.
//!
//! This module is the single source of the message shapes used on both sides
//! of the script-message transport.  The host broker serializes
//! `carf:request` envelopes and classifies inbound `send` payloads; the agent
//! runtime parses requests and emits `carf:response` / `carf:event`
//! envelopes.  Both sides agree on these shapes so neither ever probes raw
//! JSON outside its own boundary module.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// `type` tag of a host → agent request envelope.
pub const REQUEST_TYPE: &str = "carf:request";
/// `payload.type` tag of an agent → host response.
pub const RESPONSE_TYPE: &str = "carf:response";
/// `payload.type` tag of an agent → host unsolicited event.
pub const EVENT_TYPE: &str = "carf:event";
/// Outer `type` tag on every agent → host message.
pub const SEND_TYPE: &str = "send";

// -- Script messages ----------------------------------------------------------

/// A script message as carried on the backend's single event stream.
///
/// The backend wraps every agent emission with the owning session and script
/// identifiers; the agent itself never sees them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptMessage {
    pub session_id: u32,
    pub script_id: u32,
    pub message: Value,
    /// Optional out-of-band byte payload, transmitted as a numeric array.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<u8>>,
}

// -- Request / response payloads ----------------------------------------------

/// Payload of a `carf:request` envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestPayload {
    pub id: u64,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

/// Outcome marker carried on every `carf:response`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseResult {
    Ok,
    Error,
}

/// Payload of a `carf:response` envelope, without the `type` tag.
///
/// On `result: ok` the `returns` field holds the handler's value; on
/// `result: error` it holds an [`AgentFault`] shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponsePayload {
    pub id: u64,
    pub result: ResponseResult,
    #[serde(default)]
    pub returns: Value,
}

/// Error shape carried in the `returns` field of an error response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentFault {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl AgentFault {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into(), stack: None }
    }

    pub fn with_stack(message: impl Into<String>, stack: impl Into<String>) -> Self {
        Self { message: message.into(), stack: Some(stack.into()) }
    }
}

impl fmt::Display for AgentFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for AgentFault {}

// -- Envelope builders --------------------------------------------------------

/// Build a `carf:request` envelope for posting into the script.
pub fn request_envelope(id: u64, method: &str, params: Option<Value>) -> Value {
    json!({
        "type": REQUEST_TYPE,
        "payload": {
            "id": id,
            "method": method,
            "params": params,
        },
    })
}

/// Build an ok `carf:response` send envelope.
pub fn response_ok(id: u64, returns: Value) -> Value {
    json!({
        "type": SEND_TYPE,
        "payload": {
            "type": RESPONSE_TYPE,
            "id": id,
            "result": "ok",
            "returns": returns,
        },
    })
}

/// Build an error `carf:response` send envelope.
pub fn response_error(id: u64, fault: &AgentFault) -> Value {
    json!({
        "type": SEND_TYPE,
        "payload": {
            "type": RESPONSE_TYPE,
            "id": id,
            "result": "error",
            "returns": fault,
        },
    })
}

/// Build a `carf:event` send envelope.  Event fields are flattened beside the
/// `type` and `event` tags.
pub fn event_envelope(event: &str, fields: serde_json::Map<String, Value>) -> Value {
    let mut payload = serde_json::Map::new();
    payload.insert("type".to_owned(), Value::String(EVENT_TYPE.to_owned()));
    payload.insert("event".to_owned(), Value::String(event.to_owned()));
    for (k, v) in fields {
        payload.insert(k, v);
    }
    json!({
        "type": SEND_TYPE,
        "payload": Value::Object(payload),
    })
}

/// Parse a raw message posted into the script as a `carf:request`.
///
/// Returns `None` for anything that is not a well-formed request envelope;
/// the runtime drops those with a debug trace.
pub fn parse_request(message: &Value) -> Option<RequestPayload> {
    if message.get("type").and_then(Value::as_str) != Some(REQUEST_TYPE) {
        return None;
    }
    let payload = message.get("payload")?;
    serde_json::from_value(payload.clone()).ok()
}

// -- Address formatting -------------------------------------------------------

/// Render an address the way it travels on the wire (`"0x1400012a0"`).
pub fn format_address(address: u64) -> String {
    format!("{address:#x}")
}

/// Parse a wire address: either a JSON integer or a `"0x…"` / decimal string.
pub fn parse_address(value: &Value) -> Result<u64, AgentFault> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| AgentFault::new(format!("invalid address: {n}"))),
        Value::String(s) => {
            let trimmed = s.trim();
            let parsed = match trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
                Some(hex) => u64::from_str_radix(hex, 16),
                None => trimmed.parse::<u64>(),
            };
            parsed.map_err(|_| AgentFault::new(format!("invalid address: {s:?}")))
        }
        other => Err(AgentFault::new(format!("invalid address: {other}"))),
    }
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
