// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Progressive value-scan sessions (First/Next semantics).
//!
//! `memory_value_scan_start` finds every address currently holding the target
//! value; each `memory_value_scan_next` re-reads the retained addresses and
//! keeps the ones satisfying the condition, preserving insertion order.
//! Sessions live until `memory_value_scan_clear`.

use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use crate::dispatch::parse_params;
use crate::memory::{Protection, TargetMemory};
use crate::pattern::BytePattern;
use crate::protocol::{format_address, AgentFault};
use crate::value::{ScanValue, ValueType};

/// Address cap when the request does not supply one.
pub const DEFAULT_LIMIT: usize = 100_000;
/// Addresses echoed back in `start` / `next` replies.
pub const REPLY_PAGE: usize = 128;
/// Bytes read from a range per step while seeding a session.
const READ_CHUNK: usize = 64 * 1024;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartParams {
    value_type: ValueType,
    value: Value,
    protection: Option<String>,
    limit: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Condition {
    Eq,
    Changed,
    Unchanged,
    Increased,
    Decreased,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NextParams {
    scan_id: String,
    condition: Condition,
    value: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GetParams {
    scan_id: String,
    #[serde(default)]
    offset: usize,
    limit: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClearParams {
    scan_id: String,
}

/// One progressive scan: retained addresses with the value last seen there,
/// in discovery order.
struct ScanSession {
    value_type: ValueType,
    width: usize,
    entries: IndexMap<u64, ScanValue>,
}

/// All live scan sessions for a script.
pub struct ValueScanTable {
    sessions: Mutex<IndexMap<String, ScanSession>>,
}

impl ValueScanTable {
    pub fn new() -> Self {
        Self { sessions: Mutex::new(IndexMap::new()) }
    }

    /// Seed a session with every address currently holding `value`.
    pub async fn start(
        &self,
        memory: &Arc<dyn TargetMemory>,
        params: Option<Value>,
    ) -> Result<Value, AgentFault> {
        let params: StartParams = parse_params(params)?;
        let target = params.value_type.parse_value(&params.value)?;
        let needle = params.value_type.encode(&target);
        let width = needle.len();
        let pattern = BytePattern::from_bytes(&needle);
        let filter = Protection::parse(params.protection.as_deref().unwrap_or("rw-"));
        let limit = params.limit.unwrap_or(DEFAULT_LIMIT).max(1);

        let mut entries = IndexMap::new();
        'ranges: for range in memory.ranges(filter) {
            if width as u64 > range.size {
                continue;
            }
            let overlap = width.saturating_sub(1);
            let step = READ_CHUNK.max(width);
            let mut offset = 0u64;
            while offset < range.size {
                let want = step.min((range.size - offset) as usize);
                let Ok(chunk) = memory.read(range.base + offset, want) else {
                    break;
                };
                for at in pattern.find_all(&chunk, limit - entries.len()) {
                    entries.insert(range.base + offset + at as u64, target.clone());
                    if entries.len() >= limit {
                        break 'ranges;
                    }
                }
                if offset + want as u64 >= range.size {
                    break;
                }
                offset += (want - overlap) as u64;
            }
            tokio::task::yield_now().await;
        }

        let scan_id = Uuid::new_v4().to_string();
        let reply = session_reply(&scan_id, &entries);
        debug!(scan_id = %scan_id, matches = entries.len(), value_type = params.value_type.as_str(), "value scan started");
        self.sessions.lock().insert(
            scan_id,
            ScanSession { value_type: params.value_type, width, entries },
        );
        Ok(reply)
    }

    /// Refine a session in place.  Addresses that fail to read are dropped.
    pub async fn next(
        &self,
        memory: &Arc<dyn TargetMemory>,
        params: Option<Value>,
    ) -> Result<Value, AgentFault> {
        let params: NextParams = parse_params(params)?;
        // Take the session out while refining; dispatch is sequential per
        // script so nothing else can observe the gap.
        let Some(mut session) = self.sessions.lock().shift_remove(&params.scan_id) else {
            return Err(unknown_scan(&params.scan_id));
        };

        if session.value_type == ValueType::Utf8
            && matches!(params.condition, Condition::Increased | Condition::Decreased)
        {
            self.sessions.lock().insert(params.scan_id.clone(), session);
            return Err(AgentFault::new("ordered conditions are not supported for utf8"));
        }

        let target = match params.condition {
            Condition::Eq => {
                let Some(ref raw) = params.value else {
                    self.sessions.lock().insert(params.scan_id.clone(), session);
                    return Err(AgentFault::new("condition \"eq\" requires a value"));
                };
                match session.value_type.parse_value(raw) {
                    Ok(v) => Some(v),
                    Err(fault) => {
                        self.sessions.lock().insert(params.scan_id.clone(), session);
                        return Err(fault);
                    }
                }
            }
            _ => None,
        };

        let mut retained: IndexMap<u64, ScanValue> = IndexMap::new();
        let mut processed = 0usize;
        for (address, last) in &session.entries {
            let current = memory
                .read(*address, session.width)
                .ok()
                .and_then(|bytes| session.value_type.decode(&bytes));
            if let Some(current) = current {
                let keep = match params.condition {
                    Condition::Eq => target.as_ref() == Some(&current),
                    Condition::Changed => current != *last,
                    Condition::Unchanged => current == *last,
                    Condition::Increased => {
                        current.compare(last) == Some(std::cmp::Ordering::Greater)
                    }
                    Condition::Decreased => {
                        current.compare(last) == Some(std::cmp::Ordering::Less)
                    }
                };
                if keep {
                    retained.insert(*address, current);
                }
            }
            processed += 1;
            if processed % 1024 == 0 {
                tokio::task::yield_now().await;
            }
        }

        session.entries = retained;
        let reply = session_reply(&params.scan_id, &session.entries);
        self.sessions.lock().insert(params.scan_id, session);
        Ok(reply)
    }

    /// A contiguous window of a session, freshly read where possible.
    pub fn get(
        &self,
        memory: &Arc<dyn TargetMemory>,
        params: Option<Value>,
    ) -> Result<Value, AgentFault> {
        let params: GetParams = parse_params(params)?;
        let sessions = self.sessions.lock();
        let Some(session) = sessions.get(&params.scan_id) else {
            return Err(unknown_scan(&params.scan_id));
        };
        let total = session.entries.len();
        let start = params.offset.min(total);
        let end = start.saturating_add(params.limit).min(total);
        let mut values = Vec::with_capacity(end - start);
        for index in start..end {
            let Some((address, last)) = session.entries.get_index(index) else {
                break;
            };
            let current = memory
                .read(*address, session.width)
                .ok()
                .and_then(|bytes| session.value_type.decode(&bytes))
                .unwrap_or_else(|| last.clone());
            values.push(json!({
                "address": format_address(*address),
                "value": current.to_json(),
            }));
        }
        Ok(json!({
            "scanId": params.scan_id,
            "totalMatches": total,
            "offset": start,
            "values": values,
        }))
    }

    /// Free a session.  The only way sessions are released.
    pub fn clear(&self, params: Option<Value>) -> Result<Value, AgentFault> {
        let params: ClearParams = parse_params(params)?;
        if self.sessions.lock().shift_remove(&params.scan_id).is_none() {
            return Err(unknown_scan(&params.scan_id));
        }
        Ok(json!({ "cleared": true }))
    }

    pub fn session_count(&self) -> usize {
        self.sessions.lock().len()
    }
}

impl Default for ValueScanTable {
    fn default() -> Self {
        Self::new()
    }
}

fn unknown_scan(scan_id: &str) -> AgentFault {
    AgentFault::new(format!("Unknown scan id: {scan_id}"))
}

fn session_reply(scan_id: &str, entries: &IndexMap<u64, ScanValue>) -> Value {
    let addresses: Vec<String> =
        entries.keys().take(REPLY_PAGE).map(|a| format_address(*a)).collect();
    json!({
        "scanId": scan_id,
        "totalMatches": entries.len(),
        "addresses": addresses,
    })
}

#[cfg(test)]
#[path = "value_scan_tests.rs"]
mod tests;
