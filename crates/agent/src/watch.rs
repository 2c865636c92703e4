// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Polling watch subsystem.
//!
//! Each watch is a periodic task: read the value, compare with the last
//! reading, emit a `memory_watch_update` event, remember the new value.  The
//! first update after add carries the initial reading with `changed: false`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::dispatch::parse_params;
use crate::memory::TargetMemory;
use crate::protocol::{format_address, parse_address, AgentFault};
use crate::runtime::EventSink;
use crate::value::{ScanValue, ValueType};

/// Read width used for `utf8` watches, which have no intrinsic size.
pub const UTF8_WATCH_WIDTH: usize = 32;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddParams {
    address: Value,
    value_type: ValueType,
    interval_ms: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoveParams {
    watch_id: u32,
}

struct WatchEntry {
    address: u64,
    value_type: ValueType,
    interval_ms: u64,
    last: Arc<Mutex<ScanValue>>,
    cancel: CancellationToken,
}

/// All live watches for a script.
pub struct WatchTable {
    watches: Mutex<HashMap<u32, WatchEntry>>,
    next_id: AtomicU32,
}

impl WatchTable {
    pub fn new() -> Self {
        Self { watches: Mutex::new(HashMap::new()), next_id: AtomicU32::new(1) }
    }

    /// Install a watch and start its periodic task.
    pub fn add(
        &self,
        memory: Arc<dyn TargetMemory>,
        events: EventSink,
        shutdown: &CancellationToken,
        params: Option<Value>,
    ) -> Result<Value, AgentFault> {
        let params: AddParams = parse_params(params)?;
        let address = parse_address(&params.address)?;
        let interval_ms = params.interval_ms.max(1);
        let width = params.value_type.width().unwrap_or(UTF8_WATCH_WIDTH);

        let initial = memory
            .read(address, width)
            .ok()
            .and_then(|bytes| params.value_type.decode(&bytes))
            .ok_or_else(|| {
                AgentFault::new(format!("cannot read {} at {}", params.value_type.as_str(), format_address(address)))
            })?;

        let watch_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let last = Arc::new(Mutex::new(initial.clone()));
        let cancel = shutdown.child_token();
        self.watches.lock().insert(
            watch_id,
            WatchEntry {
                address,
                value_type: params.value_type,
                interval_ms,
                last: Arc::clone(&last),
                cancel: cancel.clone(),
            },
        );

        tokio::spawn(run_watch(
            memory,
            events,
            cancel,
            WatchSpec { watch_id, address, value_type: params.value_type, interval_ms, width },
            last,
            initial.clone(),
        ));

        Ok(json!({
            "watchId": watch_id,
            "address": format_address(address),
            "valueType": params.value_type.as_str(),
            "intervalMs": interval_ms,
            "lastValue": initial.to_json(),
        }))
    }

    /// Snapshot of all live watches with their most recent readings.
    pub fn list(&self) -> Result<Value, AgentFault> {
        let watches = self.watches.lock();
        let mut out: Vec<Value> = watches
            .iter()
            .map(|(id, w)| {
                json!({
                    "watchId": id,
                    "address": format_address(w.address),
                    "valueType": w.value_type.as_str(),
                    "intervalMs": w.interval_ms,
                    "lastValue": w.last.lock().to_json(),
                })
            })
            .collect();
        out.sort_by_key(|w| w["watchId"].as_u64());
        Ok(json!({ "watches": out }))
    }

    /// Cancel a watch task and forget its state.
    pub fn remove(&self, params: Option<Value>) -> Result<Value, AgentFault> {
        let params: RemoveParams = parse_params(params)?;
        let Some(entry) = self.watches.lock().remove(&params.watch_id) else {
            return Err(AgentFault::new(format!("Unknown watch id: {}", params.watch_id)));
        };
        entry.cancel.cancel();
        Ok(json!({ "removed": true }))
    }

    /// Cancel every watch; used on transport teardown.
    pub fn cancel_all(&self) {
        let mut watches = self.watches.lock();
        for (_, entry) in watches.drain() {
            entry.cancel.cancel();
        }
    }

    pub fn len(&self) -> usize {
        self.watches.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.watches.lock().is_empty()
    }
}

impl Default for WatchTable {
    fn default() -> Self {
        Self::new()
    }
}

struct WatchSpec {
    watch_id: u32,
    address: u64,
    value_type: ValueType,
    interval_ms: u64,
    width: usize,
}

async fn run_watch(
    memory: Arc<dyn TargetMemory>,
    events: EventSink,
    cancel: CancellationToken,
    spec: WatchSpec,
    last: Arc<Mutex<ScanValue>>,
    initial: ScanValue,
) {
    // First update: the initial reading, never flagged as changed.
    emit_update(&events, &spec, &initial, false).await;

    let period = Duration::from_millis(spec.interval_ms);
    loop {
        tokio::select! {
            _ = tokio::time::sleep(period) => {}
            _ = cancel.cancelled() => break,
        }

        let current = memory
            .read(spec.address, spec.width)
            .ok()
            .and_then(|bytes| spec.value_type.decode(&bytes));
        let Some(current) = current else {
            // Unreadable this period; keep the previous value and retry.
            debug!(watch_id = spec.watch_id, "watch read failed, skipping tick");
            continue;
        };

        let changed = {
            let mut guard = last.lock();
            let changed = current != *guard;
            *guard = current.clone();
            changed
        };
        emit_update(&events, &spec, &current, changed).await;
    }
}

async fn emit_update(events: &EventSink, spec: &WatchSpec, value: &ScanValue, changed: bool) {
    let mut fields = serde_json::Map::new();
    fields.insert("watchId".to_owned(), json!(spec.watch_id));
    fields.insert("address".to_owned(), json!(format_address(spec.address)));
    fields.insert("valueType".to_owned(), json!(spec.value_type.as_str()));
    fields.insert("intervalMs".to_owned(), json!(spec.interval_ms));
    fields.insert("value".to_owned(), value.to_json());
    fields.insert("changed".to_owned(), json!(changed));
    events.emit("memory_watch_update", fields).await;
}

#[cfg(test)]
#[path = "watch_tests.rs"]
mod tests;
