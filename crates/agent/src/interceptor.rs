// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Interceptor registry: bookkeeping for installed function hooks.
//!
//! The trampoline itself belongs to the instrumentation library; this table
//! tracks what is attached where, counts calls, and emits `interceptor_call`
//! events that feed the host's hook-call log.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::dispatch::parse_params;
use crate::memory::TargetMemory;
use crate::protocol::{format_address, parse_address, AgentFault};
use crate::runtime::EventSink;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AttachParams {
    address: Value,
    name: Option<String>,
    module: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DetachParams {
    hook_id: u32,
}

/// One installed hook.
#[derive(Debug, Clone)]
pub struct HookRecord {
    pub hook_id: u32,
    pub address: u64,
    pub name: Option<String>,
    pub module: Option<String>,
    pub call_count: u64,
    pub attached_at_ms: u64,
}

/// All installed hooks for a script, in attach order.
pub struct InterceptorTable {
    hooks: Mutex<IndexMap<u32, HookRecord>>,
    next_id: AtomicU32,
}

impl InterceptorTable {
    pub fn new() -> Self {
        Self { hooks: Mutex::new(IndexMap::new()), next_id: AtomicU32::new(1) }
    }

    /// Install a hook at a resolvable address.
    pub fn attach(
        &self,
        memory: &dyn TargetMemory,
        params: Option<Value>,
    ) -> Result<Value, AgentFault> {
        let params: AttachParams = parse_params(params)?;
        let address = parse_address(&params.address)?;
        if memory.read(address, 1).is_err() {
            return Err(AgentFault::new(format!(
                "cannot attach at unmapped address {}",
                format_address(address)
            )));
        }

        let mut hooks = self.hooks.lock();
        if let Some(existing) = hooks.values().find(|h| h.address == address) {
            return Err(AgentFault::new(format!(
                "interceptor already attached at {} (hook {})",
                format_address(address),
                existing.hook_id
            )));
        }

        let hook_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        hooks.insert(
            hook_id,
            HookRecord {
                hook_id,
                address,
                name: params.name.clone(),
                module: params.module,
                call_count: 0,
                attached_at_ms: now_ms(),
            },
        );
        Ok(json!({
            "hookId": hook_id,
            "address": format_address(address),
            "name": params.name,
        }))
    }

    /// Remove one hook.
    pub fn detach(&self, params: Option<Value>) -> Result<Value, AgentFault> {
        let params: DetachParams = parse_params(params)?;
        if self.hooks.lock().shift_remove(&params.hook_id).is_none() {
            return Err(AgentFault::new(format!("Unknown hook id: {}", params.hook_id)));
        }
        Ok(json!({ "detached": true }))
    }

    /// Remove every hook, reporting how many were installed.
    pub fn detach_all(&self) -> Result<Value, AgentFault> {
        let mut hooks = self.hooks.lock();
        let count = hooks.len();
        hooks.clear();
        Ok(json!({ "detached": count }))
    }

    /// Snapshot of installed hooks, in attach order.
    pub fn list(&self) -> Result<Value, AgentFault> {
        let hooks = self.hooks.lock();
        let out: Vec<Value> = hooks
            .values()
            .map(|h| {
                json!({
                    "hookId": h.hook_id,
                    "address": format_address(h.address),
                    "name": h.name,
                    "module": h.module,
                    "callCount": h.call_count,
                    "attachedAt": h.attached_at_ms,
                })
            })
            .collect();
        Ok(json!({ "hooks": out }))
    }

    /// Record an observed call: bump the counter and emit the event the
    /// host's hook-call log consumes.  The loopback device and tests drive
    /// this directly; production wiring comes from the trampoline.
    pub async fn record_call(
        &self,
        events: &EventSink,
        hook_id: u32,
        args: Vec<u64>,
    ) -> Result<(), AgentFault> {
        let record = {
            let mut hooks = self.hooks.lock();
            let Some(record) = hooks.get_mut(&hook_id) else {
                return Err(AgentFault::new(format!("Unknown hook id: {hook_id}")));
            };
            record.call_count += 1;
            record.clone()
        };

        let mut fields = serde_json::Map::new();
        fields.insert("hookId".to_owned(), json!(record.hook_id));
        fields.insert("address".to_owned(), json!(format_address(record.address)));
        fields.insert("name".to_owned(), json!(record.name));
        fields.insert("callCount".to_owned(), json!(record.call_count));
        fields.insert(
            "args".to_owned(),
            json!(args.iter().map(|a| format_address(*a)).collect::<Vec<_>>()),
        );
        events.emit("interceptor_call", fields).await;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.hooks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.lock().is_empty()
    }
}

impl Default for InterceptorTable {
    fn default() -> Self {
        Self::new()
    }
}

fn now_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
}

#[cfg(test)]
#[path = "interceptor_tests.rs"]
mod tests;
