// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent-RPC broker: correlates `carf:request`s with `carf:response`s by id,
//! enforces timeouts, and fans out `carf:event`s to registered listeners.
//!
//! The broker is the only subscriber of the backend's script-message stream.
//! Pending state is owned here exclusively; every pending request completes
//! exactly once — response, timeout, transport error, or cancellation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{broadcast, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use carf_agent::protocol::{request_envelope, AgentFault, ResponseResult, ScriptMessage};

use crate::backend::Backend;
use crate::demux::{classify, Classified};
use crate::error::RpcError;

/// Default per-request deadline.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// What event listeners receive.
#[derive(Debug, Clone)]
pub enum BrokerEvent {
    /// A `carf:event`, with its flattened payload fields.
    Event { name: String, fields: serde_json::Map<String, Value> },
    /// A script message that was neither response nor event.
    Raw { message: Value },
}

type EventHandler = Arc<dyn Fn(&BrokerEvent) -> anyhow::Result<()> + Send + Sync>;

struct HandlerEntry {
    id: u64,
    handler: EventHandler,
}

struct PendingEntry {
    method: String,
    tx: oneshot::Sender<Result<Value, RpcError>>,
}

struct Pump {
    cancel: CancellationToken,
}

/// The id-correlated request/response broker.
pub struct RpcBroker {
    backend: Arc<dyn Backend>,
    pending: Arc<Mutex<HashMap<u64, PendingEntry>>>,
    handlers: Arc<Mutex<Vec<HandlerEntry>>>,
    next_request_id: AtomicU64,
    next_handler_id: AtomicU64,
    default_timeout: Duration,
    pump: Mutex<Option<Pump>>,
}

impl RpcBroker {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            pending: Arc::new(Mutex::new(HashMap::new())),
            handlers: Arc::new(Mutex::new(Vec::new())),
            next_request_id: AtomicU64::new(1),
            next_handler_id: AtomicU64::new(1),
            default_timeout: DEFAULT_TIMEOUT,
            pump: Mutex::new(None),
        }
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Subscribe to the script-message stream and start classifying.
    /// Idempotent; must run before the first `request`.
    pub fn start(&self) {
        let mut pump = self.pump.lock();
        if pump.is_some() {
            return;
        }
        let cancel = CancellationToken::new();
        let rx = self.backend.script_messages();
        tokio::spawn(run_pump(
            rx,
            Arc::clone(&self.pending),
            Arc::clone(&self.handlers),
            cancel.clone(),
        ));
        *pump = Some(Pump { cancel });
        debug!("broker started");
    }

    pub fn is_started(&self) -> bool {
        self.pump.lock().is_some()
    }

    /// Tear down the subscription and reject everything pending.
    pub fn stop(&self) {
        let Some(pump) = self.pump.lock().take() else {
            return;
        };
        pump.cancel.cancel();
        self.reject_all("broker stopped");
        debug!("broker stopped");
    }

    /// Reject pending requests without tearing down the subscription; used on
    /// session detach so the next attach reuses the transport.
    pub fn clear_pending(&self, reason: &str) {
        self.reject_all(reason);
    }

    fn reject_all(&self, reason: &str) {
        let drained: Vec<PendingEntry> = {
            let mut pending = self.pending.lock();
            pending.drain().map(|(_, entry)| entry).collect()
        };
        for entry in drained {
            debug!(method = %entry.method, reason, "rejecting pending request");
            let _ = entry
                .tx
                .send(Err(RpcError::Cancelled { reason: reason.to_owned() }));
        }
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Issue a request with the broker-wide default timeout.
    pub async fn request(
        &self,
        script_id: u32,
        method: &str,
        params: Option<Value>,
    ) -> Result<Value, RpcError> {
        self.request_with_timeout(script_id, method, params, self.default_timeout).await
    }

    /// Issue a request with a per-call deadline.
    pub async fn request_with_timeout(
        &self,
        script_id: u32,
        method: &str,
        params: Option<Value>,
        timeout: Duration,
    ) -> Result<Value, RpcError> {
        if !self.is_started() {
            return Err(RpcError::NotStarted);
        }

        let id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending
            .lock()
            .insert(id, PendingEntry { method: method.to_owned(), tx });

        let envelope = request_envelope(id, method, params);
        if let Err(e) = self.backend.script_post(script_id, envelope, None).await {
            // Roll back before the caller sees the failure.
            self.pending.lock().remove(&id);
            return Err(RpcError::Transport(e.to_string()));
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => {
                // Sender dropped without a verdict; treat as transport loss.
                Err(RpcError::Transport("pending entry dropped".to_owned()))
            }
            Err(_) => {
                // Remove the entry first so a late response is dropped
                // silently instead of resolving a dead future.
                self.pending.lock().remove(&id);
                warn!(method, after = ?timeout, "request timed out");
                Err(RpcError::Timeout { method: method.to_owned(), after: timeout })
            }
        }
    }

    /// Register an event listener.  Handlers run in registration order on the
    /// pump task; a failing handler is logged and does not affect the rest.
    /// The returned guard unregisters on drop.
    pub fn on_event(
        &self,
        handler: impl Fn(&BrokerEvent) -> anyhow::Result<()> + Send + Sync + 'static,
    ) -> EventSubscription {
        let id = self.next_handler_id.fetch_add(1, Ordering::Relaxed);
        self.handlers
            .lock()
            .push(HandlerEntry { id, handler: Arc::new(handler) });
        EventSubscription { id, handlers: Arc::downgrade(&self.handlers) }
    }
}

/// RAII handle for an event subscription; dropping it unregisters the
/// handler.
pub struct EventSubscription {
    id: u64,
    handlers: std::sync::Weak<Mutex<Vec<HandlerEntry>>>,
}

impl EventSubscription {
    /// Explicit cancellation, for symmetry with drop.
    pub fn cancel(self) {}
}

impl Drop for EventSubscription {
    fn drop(&mut self) {
        if let Some(handlers) = self.handlers.upgrade() {
            handlers.lock().retain(|entry| entry.id != self.id);
        }
    }
}

async fn run_pump(
    mut rx: broadcast::Receiver<ScriptMessage>,
    pending: Arc<Mutex<HashMap<u64, PendingEntry>>>,
    handlers: Arc<Mutex<Vec<HandlerEntry>>>,
    cancel: CancellationToken,
) {
    loop {
        let message = tokio::select! {
            _ = cancel.cancelled() => break,
            received = rx.recv() => match received {
                Ok(message) => message,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(skipped = n, "script-message stream lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        };

        match classify(&message.message) {
            Classified::Response(response) => {
                let entry = pending.lock().remove(&response.id);
                let Some(entry) = entry else {
                    debug!(id = response.id, "response for unknown id dropped");
                    continue;
                };
                let result = match response.result {
                    ResponseResult::Ok => Ok(response.returns),
                    ResponseResult::Error => {
                        let fault: AgentFault = serde_json::from_value(response.returns.clone())
                            .unwrap_or_else(|_| AgentFault::new(response.returns.to_string()));
                        Err(RpcError::Agent { message: fault.message, stack: fault.stack })
                    }
                };
                let _ = entry.tx.send(result);
            }
            Classified::Event { name, fields } => {
                fan_out(&handlers, &BrokerEvent::Event { name, fields });
            }
            Classified::Raw { message } => {
                fan_out(&handlers, &BrokerEvent::Raw { message });
            }
        }
    }
}

/// Invoke handlers in registration order.  The list is snapshotted first so
/// re-entrant registration from inside a handler cannot deadlock.
fn fan_out(handlers: &Arc<Mutex<Vec<HandlerEntry>>>, event: &BrokerEvent) {
    let snapshot: Vec<EventHandler> =
        handlers.lock().iter().map(|entry| Arc::clone(&entry.handler)).collect();
    for handler in snapshot {
        if let Err(e) = handler(event) {
            warn!(error = %e, "event handler failed");
        }
    }
}

#[cfg(test)]
#[path = "broker_tests.rs"]
mod tests;
