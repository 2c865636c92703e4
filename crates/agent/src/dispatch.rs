// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent-side method router.
//!
//! A flat `name → handler` map populated once at registry construction.
//! Every request gets exactly one response envelope: handler values wrap as
//! `ok`, faults as `error`, and a missing handler produces the uniform
//! `Unknown method` fault.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::protocol::{response_error, response_ok, AgentFault, RequestPayload};
use crate::runtime::AgentContext;

/// Boxed future returned by every handler.
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<Value, AgentFault>> + Send>>;

/// A registered method handler.
pub type Handler = Box<dyn Fn(Arc<AgentContext>, Option<Value>) -> HandlerFuture + Send + Sync>;

/// Adapt an async fn into a boxed [`Handler`].
pub fn handler<F, Fut>(f: F) -> Handler
where
    F: Fn(Arc<AgentContext>, Option<Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, AgentFault>> + Send + 'static,
{
    Box::new(move |ctx, params| Box::pin(f(ctx, params)))
}

/// Deserialize request params, mapping malformed shapes to a fault.
///
/// Absent params deserialize as an empty object so methods whose params are
/// all optional accept a bare request.
pub fn parse_params<T: DeserializeOwned>(params: Option<Value>) -> Result<T, AgentFault> {
    let raw = match params {
        None | Some(Value::Null) => Value::Object(serde_json::Map::new()),
        Some(v) => v,
    };
    serde_json::from_value(raw).map_err(|e| AgentFault::new(format!("invalid params: {e}")))
}

/// The flat method registry.
pub struct MethodRegistry {
    handlers: HashMap<&'static str, Handler>,
}

impl MethodRegistry {
    pub fn new() -> Self {
        Self { handlers: HashMap::new() }
    }

    pub fn register(&mut self, name: &'static str, handler: Handler) {
        self.handlers.insert(name, handler);
    }

    /// Registered method names, sorted.
    pub fn method_names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.handlers.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Dispatch one request to its handler and build the response envelope.
    pub async fn dispatch(&self, ctx: Arc<AgentContext>, request: RequestPayload) -> Value {
        let Some(handler) = self.handlers.get(request.method.as_str()) else {
            debug!(method = %request.method, id = request.id, "unknown method");
            return response_error(
                request.id,
                &AgentFault::new(format!("Unknown method: {}", request.method)),
            );
        };
        match handler(ctx, request.params).await {
            Ok(returns) => response_ok(request.id, returns),
            Err(fault) => {
                debug!(method = %request.method, id = request.id, error = %fault, "method failed");
                response_error(request.id, &fault)
            }
        }
    }
}

impl Default for MethodRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;
