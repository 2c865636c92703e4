// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The built-in method catalogue.
//!
//! Thin handlers over the engines and the [`TargetMemory`] seam; each one
//! parses its params, delegates, and shapes the reply.  The catalogue is
//! open-ended — embedders can register more handlers on the registry.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};

use crate::dispatch::{handler, parse_params, MethodRegistry};
use crate::memory::{Protection, TargetMemory};
use crate::pattern::BytePattern;
use crate::protocol::{format_address, parse_address, AgentFault};
use crate::runtime::AgentContext;

/// Match cap for the synchronous `search_memory`.
const SEARCH_LIMIT: usize = 1_000;

/// Build the registry with every built-in method installed.
pub fn builtin_registry() -> MethodRegistry {
    let mut registry = MethodRegistry::new();

    registry.register("ping", handler(|_ctx, _params| async { Ok(json!("pong")) }));
    registry.register("get_arch", handler(get_arch));
    registry.register("get_process_info", handler(get_process_info));
    registry.register("enumerate_modules", handler(enumerate_modules));
    registry.register("enumerate_exports", handler(enumerate_exports));
    registry.register("enumerate_imports", handler(enumerate_imports));
    registry.register("enumerate_threads", handler(enumerate_threads));
    registry.register("enumerate_ranges", handler(enumerate_ranges));
    registry.register("get_backtrace", handler(get_backtrace));
    registry.register("read_memory", handler(read_memory));
    registry.register("write_memory", handler(write_memory));
    registry.register("search_memory", handler(search_memory));

    registry.register(
        "memory_scan_async",
        handler(|ctx: Arc<AgentContext>, params| async move {
            ctx.scans.start(
                Arc::clone(&ctx.memory),
                ctx.events.clone(),
                ctx.shutdown.clone(),
                params,
            )
        }),
    );
    registry.register(
        "memory_scan_abort",
        handler(|ctx: Arc<AgentContext>, _params| async move { ctx.scans.abort() }),
    );

    registry.register(
        "memory_value_scan_start",
        handler(|ctx: Arc<AgentContext>, params| async move {
            ctx.value_scans.start(&ctx.memory, params).await
        }),
    );
    registry.register(
        "memory_value_scan_next",
        handler(|ctx: Arc<AgentContext>, params| async move {
            ctx.value_scans.next(&ctx.memory, params).await
        }),
    );
    registry.register(
        "memory_value_scan_get",
        handler(|ctx: Arc<AgentContext>, params| async move {
            ctx.value_scans.get(&ctx.memory, params)
        }),
    );
    registry.register(
        "memory_value_scan_clear",
        handler(|ctx: Arc<AgentContext>, params| async move { ctx.value_scans.clear(params) }),
    );

    registry.register(
        "memory_watch_add",
        handler(|ctx: Arc<AgentContext>, params| async move {
            ctx.watches.add(
                Arc::clone(&ctx.memory),
                ctx.events.clone(),
                &ctx.shutdown,
                params,
            )
        }),
    );
    registry.register(
        "memory_watch_list",
        handler(|ctx: Arc<AgentContext>, _params| async move { ctx.watches.list() }),
    );
    registry.register(
        "memory_watch_remove",
        handler(|ctx: Arc<AgentContext>, params| async move { ctx.watches.remove(params) }),
    );

    registry.register(
        "interceptor_attach",
        handler(|ctx: Arc<AgentContext>, params| async move {
            ctx.interceptors.attach(ctx.memory.as_ref(), params)
        }),
    );
    registry.register(
        "interceptor_detach",
        handler(|ctx: Arc<AgentContext>, params| async move { ctx.interceptors.detach(params) }),
    );
    registry.register(
        "interceptor_detach_all",
        handler(|ctx: Arc<AgentContext>, _params| async move { ctx.interceptors.detach_all() }),
    );
    registry.register(
        "interceptor_list",
        handler(|ctx: Arc<AgentContext>, _params| async move { ctx.interceptors.list() }),
    );

    registry
}

// -- Introspection ------------------------------------------------------------

async fn get_arch(ctx: Arc<AgentContext>, _params: Option<Value>) -> Result<Value, AgentFault> {
    let info = ctx.memory.info();
    Ok(json!({ "arch": info.arch, "platform": info.platform }))
}

async fn get_process_info(
    ctx: Arc<AgentContext>,
    _params: Option<Value>,
) -> Result<Value, AgentFault> {
    let info = ctx.memory.info();
    Ok(json!({
        "pid": info.pid,
        "name": info.name,
        "arch": info.arch,
        "platform": info.platform,
        "pageSize": info.page_size,
    }))
}

async fn enumerate_modules(
    ctx: Arc<AgentContext>,
    _params: Option<Value>,
) -> Result<Value, AgentFault> {
    let modules: Vec<Value> = ctx
        .memory
        .modules()
        .into_iter()
        .map(|m| {
            json!({
                "name": m.name,
                "base": format_address(m.base),
                "size": m.size,
                "path": m.path,
            })
        })
        .collect();
    Ok(json!(modules))
}

#[derive(Debug, Deserialize)]
struct ModuleParams {
    module: String,
}

async fn enumerate_exports(
    ctx: Arc<AgentContext>,
    params: Option<Value>,
) -> Result<Value, AgentFault> {
    let params: ModuleParams = parse_params(params)?;
    let exports: Vec<Value> = ctx
        .memory
        .exports(&params.module)
        .into_iter()
        .map(|e| {
            json!({
                "name": e.name,
                "address": format_address(e.address),
                "type": e.kind,
            })
        })
        .collect();
    Ok(json!(exports))
}

async fn enumerate_imports(
    ctx: Arc<AgentContext>,
    params: Option<Value>,
) -> Result<Value, AgentFault> {
    let params: ModuleParams = parse_params(params)?;
    let imports: Vec<Value> = ctx
        .memory
        .imports(&params.module)
        .into_iter()
        .map(|i| {
            json!({
                "name": i.name,
                "module": i.module,
                "address": i.address.map(format_address),
            })
        })
        .collect();
    Ok(json!(imports))
}

async fn enumerate_threads(
    ctx: Arc<AgentContext>,
    _params: Option<Value>,
) -> Result<Value, AgentFault> {
    let threads: Vec<Value> = ctx
        .memory
        .threads()
        .into_iter()
        .map(|t| json!({ "id": t.id, "state": t.state }))
        .collect();
    Ok(json!(threads))
}

#[derive(Debug, Deserialize)]
struct RangesParams {
    protection: Option<String>,
}

async fn enumerate_ranges(
    ctx: Arc<AgentContext>,
    params: Option<Value>,
) -> Result<Value, AgentFault> {
    let params: RangesParams = parse_params(params)?;
    let filter = Protection::parse(params.protection.as_deref().unwrap_or(""));
    let ranges: Vec<Value> = ctx
        .memory
        .ranges(filter)
        .into_iter()
        .map(|r| {
            json!({
                "base": format_address(r.base),
                "size": r.size,
                "protection": r.protection.to_string(),
            })
        })
        .collect();
    Ok(json!(ranges))
}

async fn get_backtrace(
    ctx: Arc<AgentContext>,
    _params: Option<Value>,
) -> Result<Value, AgentFault> {
    let frames: Vec<Value> = ctx
        .memory
        .backtrace()
        .into_iter()
        .map(|f| {
            json!({
                "address": format_address(f.address),
                "module": f.module,
                "symbol": f.symbol,
            })
        })
        .collect();
    Ok(json!(frames))
}

// -- Raw memory ---------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ReadParams {
    address: Value,
    size: usize,
}

async fn read_memory(ctx: Arc<AgentContext>, params: Option<Value>) -> Result<Value, AgentFault> {
    let params: ReadParams = parse_params(params)?;
    let address = parse_address(&params.address)?;
    let bytes = ctx
        .memory
        .read(address, params.size)
        .map_err(|e| AgentFault::new(e.to_string()))?;
    Ok(json!({
        "address": format_address(address),
        "size": bytes.len(),
        "data": bytes.to_vec(),
    }))
}

#[derive(Debug, Deserialize)]
struct WriteParams {
    address: Value,
    data: Vec<u8>,
}

async fn write_memory(ctx: Arc<AgentContext>, params: Option<Value>) -> Result<Value, AgentFault> {
    let params: WriteParams = parse_params(params)?;
    let address = parse_address(&params.address)?;
    ctx.memory
        .write(address, &params.data)
        .map_err(|e| AgentFault::new(e.to_string()))?;
    Ok(json!({ "written": params.data.len() }))
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    pattern: String,
    protection: Option<String>,
    limit: Option<usize>,
}

/// Bounded synchronous pattern search; the streaming variant is
/// `memory_scan_async`.
async fn search_memory(ctx: Arc<AgentContext>, params: Option<Value>) -> Result<Value, AgentFault> {
    let params: SearchParams = parse_params(params)?;
    let pattern =
        BytePattern::parse(&params.pattern).map_err(|e| AgentFault::new(e.to_string()))?;
    let filter = Protection::parse(params.protection.as_deref().unwrap_or("r--"));
    let limit = params.limit.unwrap_or(SEARCH_LIMIT).max(1);

    let mut matches = Vec::new();
    'ranges: for range in ctx.memory.ranges(filter) {
        let Ok(bytes) = ctx.memory.read(range.base, range.size as usize) else {
            continue;
        };
        for at in pattern.find_all(&bytes, limit - matches.len()) {
            matches.push(format_address(range.base + at as u64));
            if matches.len() >= limit {
                break 'ranges;
            }
        }
        tokio::task::yield_now().await;
    }
    Ok(json!({ "matches": matches, "count": matches.len() }))
}

#[cfg(test)]
#[path = "methods_tests.rs"]
mod tests;
