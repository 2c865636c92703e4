// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session/script lifecycle.
//!
//! A small state machine coordinating attach → script load → active →
//! detach, with reconciliation hooks for everything that must unwind when a
//! session goes away: pending RPCs, per-session caches, and the active tab.
//!
//! Single-attach invariant: at most one session exists; attach outside
//! `Idle` is a precondition error and never reaches the backend.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::backend::{Backend, SessionEvent, SessionHandle};
use crate::broker::RpcBroker;
use crate::error::ControlError;

/// Lifecycle phases.  `Detaching` is transient and only observable from
/// another task mid-teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Attaching,
    Attached,
    ScriptLoading,
    ScriptLoaded,
    Detaching,
}

struct LifecycleState {
    phase: Phase,
    session: Option<SessionHandle>,
    script_id: Option<u32>,
}

type TeardownHook = Box<dyn Fn(&str) + Send + Sync>;

/// Owner of session and script state.
pub struct SessionLifecycle {
    backend: Arc<dyn Backend>,
    broker: Arc<RpcBroker>,
    state: Mutex<LifecycleState>,
    teardown_hooks: Mutex<Vec<TeardownHook>>,
}

impl SessionLifecycle {
    pub fn new(backend: Arc<dyn Backend>, broker: Arc<RpcBroker>) -> Self {
        Self {
            backend,
            broker,
            state: Mutex::new(LifecycleState { phase: Phase::Idle, session: None, script_id: None }),
            teardown_hooks: Mutex::new(Vec::new()),
        }
    }

    pub fn phase(&self) -> Phase {
        self.state.lock().phase
    }

    pub fn session(&self) -> Option<SessionHandle> {
        self.state.lock().session.clone()
    }

    /// The loaded script, or the precondition error an RPC would get.
    pub fn script_id(&self) -> Result<u32, ControlError> {
        let state = self.state.lock();
        match state.phase {
            Phase::ScriptLoaded => state.script_id.ok_or(ControlError::NoScript),
            Phase::Idle | Phase::Detaching => Err(ControlError::NoSession),
            _ => Err(ControlError::NoScript),
        }
    }

    /// Register a hook run on every teardown (detach, fault, death signal).
    /// Hooks clear per-session caches and reconcile the UI.
    pub fn on_teardown(&self, hook: impl Fn(&str) + Send + Sync + 'static) {
        self.teardown_hooks.lock().push(Box::new(hook));
    }

    /// Attach to a process and load the default script.
    ///
    /// On success the lifecycle is in `ScriptLoaded` and RPCs may be issued.
    /// A failed script load releases the backend session again.
    pub async fn attach(&self, device_id: &str, pid: u32) -> Result<SessionHandle, ControlError> {
        if !self.backend.is_hosted() {
            return Err(ControlError::BackendUnavailable);
        }
        {
            let mut state = self.state.lock();
            if state.phase != Phase::Idle {
                return Err(ControlError::AlreadyAttached);
            }
            state.phase = Phase::Attaching;
        }

        let session = match self.backend.attach(device_id, pid).await {
            Ok(session) => session,
            Err(e) => {
                self.state.lock().phase = Phase::Idle;
                return Err(ControlError::Attach(e.to_string()));
            }
        };
        info!(session_id = session.session_id, pid, "attached");
        {
            let mut state = self.state.lock();
            state.phase = Phase::Attached;
            state.session = Some(session.clone());
        }

        // The default script loads automatically once attached.
        self.state.lock().phase = Phase::ScriptLoading;

        match self.backend.load_default_script(session.session_id).await {
            Ok(script_id) => {
                let mut state = self.state.lock();
                state.phase = Phase::ScriptLoaded;
                state.script_id = Some(script_id);
                debug!(script_id, "default script loaded");
                Ok(session)
            }
            Err(e) => {
                warn!(error = %e, "script load failed, releasing session");
                if let Err(detach_err) = self.backend.detach(session.session_id).await {
                    debug!(error = %detach_err, "release after failed load also failed");
                }
                let mut state = self.state.lock();
                state.phase = Phase::Idle;
                state.session = None;
                state.script_id = None;
                Err(ControlError::ScriptLoad(e.to_string()))
            }
        }
    }

    /// Detach the current session.  A detach in `Idle` is a no-op.
    pub async fn detach(&self) -> Result<(), ControlError> {
        let (session, script_id) = {
            let mut state = self.state.lock();
            if state.phase == Phase::Idle {
                return Ok(());
            }
            state.phase = Phase::Detaching;
            (state.session.take(), state.script_id.take())
        };

        if let Some(script_id) = script_id {
            if let Err(e) = self.backend.unload_script(script_id).await {
                debug!(error = %e, "script unload failed during detach");
            }
        }
        if let Some(session) = session {
            if let Err(e) = self.backend.detach(session.session_id).await {
                warn!(error = %e, "backend detach failed");
            }
        }
        self.finish_teardown("session detached");
        Ok(())
    }

    /// Issue an RPC through the loaded script.
    pub async fn request(&self, method: &str, params: Option<Value>) -> Result<Value, ControlError> {
        let script_id = self.script_id()?;
        Ok(self.broker.request(script_id, method, params).await?)
    }

    /// Spawn the monitor translating backend death signals into teardown.
    pub fn spawn_monitor(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let lifecycle = Arc::clone(self);
        let mut events = self.backend.session_events();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(SessionEvent::Dead { session_id, reason }) => {
                        lifecycle.handle_session_dead(session_id, &reason);
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "session-event stream lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    /// Backend-signalled death: unwind host state without calling back into
    /// the backend (the session is already gone).
    pub fn handle_session_dead(&self, session_id: u32, reason: &str) {
        {
            let mut state = self.state.lock();
            let current = state.session.as_ref().map(|s| s.session_id);
            if current != Some(session_id) {
                debug!(session_id, "death signal for a session we do not own");
                return;
            }
            state.phase = Phase::Detaching;
            state.session = None;
            state.script_id = None;
        }
        warn!(session_id, reason, "session died");
        self.finish_teardown("session detached");
    }

    fn finish_teardown(&self, reason: &str) {
        self.broker.clear_pending(reason);
        for hook in self.teardown_hooks.lock().iter() {
            hook(reason);
        }
        self.state.lock().phase = Phase::Idle;
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
