// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent event loop: receives raw messages posted into the script, dispatches
//! `carf:request`s sequentially, and emits responses and events on the
//! outbound channel.  Long-running engines run on their own tasks and only
//! share state through the tables on [`AgentContext`].

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::dispatch::MethodRegistry;
use crate::interceptor::InterceptorTable;
use crate::memory::TargetMemory;
use crate::methods::builtin_registry;
use crate::protocol::{event_envelope, parse_request};
use crate::scan::ScanEngine;
use crate::value_scan::ValueScanTable;
use crate::watch::WatchTable;

// -- Event sink ---------------------------------------------------------------

/// Outbound handle the engines use to emit `carf:event` envelopes.
#[derive(Clone)]
pub struct EventSink {
    tx: mpsc::Sender<Value>,
}

impl EventSink {
    pub fn new(tx: mpsc::Sender<Value>) -> Self {
        Self { tx }
    }

    /// Emit an event.  A closed transport only logs; emitting engines keep
    /// running until their own cancellation fires.
    pub async fn emit(&self, event: &str, fields: serde_json::Map<String, Value>) {
        if self.tx.send(event_envelope(event, fields)).await.is_err() {
            debug!(event, "event dropped: outbound channel closed");
        }
    }
}

// -- Shared handler state -----------------------------------------------------

/// Everything a method handler may touch.  One per loaded script.
pub struct AgentContext {
    pub memory: Arc<dyn TargetMemory>,
    pub events: EventSink,
    pub scans: Arc<ScanEngine>,
    pub value_scans: ValueScanTable,
    pub watches: Arc<WatchTable>,
    pub interceptors: InterceptorTable,
    pub shutdown: CancellationToken,
}

// -- Runtime ------------------------------------------------------------------

/// The in-agent runtime: one per loaded script.
pub struct AgentRuntime {
    ctx: Arc<AgentContext>,
    registry: MethodRegistry,
    inbound_rx: mpsc::Receiver<Value>,
    outbound_tx: mpsc::Sender<Value>,
}

impl AgentRuntime {
    pub fn new(
        memory: Arc<dyn TargetMemory>,
        inbound_rx: mpsc::Receiver<Value>,
        outbound_tx: mpsc::Sender<Value>,
        shutdown: CancellationToken,
    ) -> Self {
        let ctx = Arc::new(AgentContext {
            memory,
            events: EventSink::new(outbound_tx.clone()),
            scans: Arc::new(ScanEngine::new()),
            value_scans: ValueScanTable::new(),
            watches: Arc::new(WatchTable::new()),
            interceptors: InterceptorTable::new(),
            shutdown,
        });
        Self { ctx, registry: builtin_registry(), inbound_rx, outbound_tx }
    }

    /// Shared handler state, exposed so embedders (the loopback device,
    /// fixtures) can reach the tables.
    pub fn context(&self) -> Arc<AgentContext> {
        Arc::clone(&self.ctx)
    }

    /// Run until the inbound channel closes or shutdown is cancelled.
    ///
    /// Requests are dispatched sequentially; handlers that stream do their
    /// work on spawned tasks so an abort posted mid-scan is still seen.
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                msg = self.inbound_rx.recv() => {
                    match msg {
                        Some(raw) => self.handle(raw).await,
                        None => break,
                    }
                }
                _ = self.ctx.shutdown.cancelled() => break,
            }
        }

        // Transport teardown aborts in-flight engine work.
        self.ctx.scans.abort_active();
        self.ctx.watches.cancel_all();
        debug!("agent runtime stopped");
    }

    async fn handle(&self, raw: Value) {
        let Some(request) = parse_request(&raw) else {
            debug!("dropping non-request message posted into script");
            return;
        };
        let response = self.registry.dispatch(Arc::clone(&self.ctx), request).await;
        if self.outbound_tx.send(response).await.is_err() {
            debug!("response dropped: outbound channel closed");
        }
    }
}

#[cfg(test)]
#[path = "runtime_tests.rs"]
mod tests;
