// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process backend: hosts a [`carf_agent`] runtime per loaded script and
//! forwards its emissions onto the script-message stream.
//!
//! This is the "local device" in development and the transport under every
//! test; the production instrumentation backend implements the same trait
//! behind the host boundary.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use anyhow::bail;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use carf_agent::memory::TargetMemory;
use carf_agent::protocol::ScriptMessage;
use carf_agent::runtime::AgentRuntime;
use carf_agent::test_support::FixtureMemory;

use super::{
    Backend, BoxFuture, DeviceInfo, DeviceType, ProcessEntry, SessionEvent, SessionHandle,
};

pub const LOCAL_DEVICE_ID: &str = "local";

struct LoopbackSession {
    device_id: String,
    pid: u32,
    scripts: Vec<u32>,
}

struct LoopbackScript {
    session_id: u32,
    inbound_tx: mpsc::Sender<Value>,
    cancel: CancellationToken,
}

struct LoopbackState {
    processes: Vec<ProcessEntry>,
    sessions: HashMap<u32, LoopbackSession>,
    scripts: HashMap<u32, LoopbackScript>,
}

/// Backend that runs agent runtimes on the host's own executor.
pub struct LoopbackBackend {
    state: Mutex<LoopbackState>,
    memory: Arc<dyn TargetMemory>,
    script_tx: broadcast::Sender<ScriptMessage>,
    session_tx: broadcast::Sender<SessionEvent>,
    next_session: AtomicU32,
    next_script: AtomicU32,
    next_pid: AtomicU32,
}

impl LoopbackBackend {
    /// Loopback over the stock fixture target.
    pub fn new() -> Self {
        Self::with_memory(FixtureMemory::sample())
    }

    /// Loopback over a caller-supplied target, so tests control the bytes.
    pub fn with_memory(memory: Arc<dyn TargetMemory>) -> Self {
        let pid = memory.info().pid;
        let name = memory.info().name;
        let (script_tx, _) = broadcast::channel(256);
        let (session_tx, _) = broadcast::channel(16);
        Self {
            state: Mutex::new(LoopbackState {
                processes: vec![ProcessEntry { pid, name }],
                sessions: HashMap::new(),
                scripts: HashMap::new(),
            }),
            memory,
            script_tx,
            session_tx,
            next_session: AtomicU32::new(1),
            next_script: AtomicU32::new(1),
            next_pid: AtomicU32::new(60_000),
        }
    }

    /// Simulate the backend noticing a dead session: tear down its scripts
    /// and broadcast the death signal.
    pub fn fail_session(&self, session_id: u32, reason: &str) {
        let removed = {
            let mut state = self.state.lock();
            let Some(session) = state.sessions.remove(&session_id) else {
                return;
            };
            session
                .scripts
                .iter()
                .filter_map(|id| state.scripts.remove(id))
                .collect::<Vec<_>>()
        };
        for script in removed {
            script.cancel.cancel();
        }
        debug!(session_id, reason, "loopback session failed");
        let _ = self
            .session_tx
            .send(SessionEvent::Dead { session_id, reason: reason.to_owned() });
    }

    fn remove_script(&self, script_id: u32) -> Option<LoopbackScript> {
        let mut state = self.state.lock();
        let script = state.scripts.remove(&script_id)?;
        if let Some(session) = state.sessions.get_mut(&script.session_id) {
            session.scripts.retain(|id| *id != script_id);
        }
        Some(script)
    }
}

impl Default for LoopbackBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for LoopbackBackend {
    fn is_hosted(&self) -> bool {
        true
    }

    fn version(&self) -> BoxFuture<'_, anyhow::Result<String>> {
        Box::pin(async { Ok(format!("loopback {}", env!("CARGO_PKG_VERSION"))) })
    }

    fn list_devices(&self) -> BoxFuture<'_, anyhow::Result<Vec<DeviceInfo>>> {
        Box::pin(async {
            Ok(vec![DeviceInfo {
                id: LOCAL_DEVICE_ID.to_owned(),
                name: "Local System".to_owned(),
                device_type: DeviceType::Local,
            }])
        })
    }

    fn list_processes(&self, device_id: &str) -> BoxFuture<'_, anyhow::Result<Vec<ProcessEntry>>> {
        let device_id = device_id.to_owned();
        Box::pin(async move {
            if device_id != LOCAL_DEVICE_ID {
                bail!("unknown device: {device_id}");
            }
            Ok(self.state.lock().processes.clone())
        })
    }

    fn attach(&self, device_id: &str, pid: u32) -> BoxFuture<'_, anyhow::Result<SessionHandle>> {
        let device_id = device_id.to_owned();
        Box::pin(async move {
            if device_id != LOCAL_DEVICE_ID {
                bail!("unknown device: {device_id}");
            }
            let mut state = self.state.lock();
            if !state.processes.iter().any(|p| p.pid == pid) {
                bail!("no such process: {pid}");
            }
            let session_id = self.next_session.fetch_add(1, Ordering::Relaxed);
            state.sessions.insert(
                session_id,
                LoopbackSession { device_id: device_id.clone(), pid, scripts: Vec::new() },
            );
            Ok(SessionHandle { session_id, device_id, pid })
        })
    }

    fn detach(&self, session_id: u32) -> BoxFuture<'_, anyhow::Result<()>> {
        Box::pin(async move {
            let removed = {
                let mut state = self.state.lock();
                let Some(session) = state.sessions.remove(&session_id) else {
                    bail!("no such session: {session_id}");
                };
                session
                    .scripts
                    .iter()
                    .filter_map(|id| state.scripts.remove(id))
                    .collect::<Vec<_>>()
            };
            for script in removed {
                script.cancel.cancel();
            }
            Ok(())
        })
    }

    fn spawn(
        &self,
        device_id: &str,
        program: &str,
        _argv: Vec<String>,
    ) -> BoxFuture<'_, anyhow::Result<u32>> {
        let device_id = device_id.to_owned();
        let program = program.to_owned();
        Box::pin(async move {
            if device_id != LOCAL_DEVICE_ID {
                bail!("unknown device: {device_id}");
            }
            let pid = self.next_pid.fetch_add(1, Ordering::Relaxed);
            let name = program.rsplit('/').next().unwrap_or(&program).to_owned();
            self.state.lock().processes.push(ProcessEntry { pid, name });
            Ok(pid)
        })
    }

    fn resume(&self, _device_id: &str, _pid: u32) -> BoxFuture<'_, anyhow::Result<()>> {
        Box::pin(async { Ok(()) })
    }

    fn kill(&self, _device_id: &str, pid: u32) -> BoxFuture<'_, anyhow::Result<()>> {
        Box::pin(async move {
            let dead: Vec<u32> = {
                let mut state = self.state.lock();
                state.processes.retain(|p| p.pid != pid);
                state
                    .sessions
                    .iter()
                    .filter(|(_, s)| s.pid == pid)
                    .map(|(id, _)| *id)
                    .collect()
            };
            for session_id in dead {
                self.fail_session(session_id, "process killed");
            }
            Ok(())
        })
    }

    fn load_default_script(&self, session_id: u32) -> BoxFuture<'_, anyhow::Result<u32>> {
        Box::pin(async move {
            let script_id = {
                let mut state = self.state.lock();
                let Some(session) = state.sessions.get_mut(&session_id) else {
                    bail!("no such session: {session_id}");
                };
                let script_id = self.next_script.fetch_add(1, Ordering::Relaxed);
                session.scripts.push(script_id);
                script_id
            };

            let (inbound_tx, inbound_rx) = mpsc::channel(256);
            let (outbound_tx, mut outbound_rx) = mpsc::channel::<Value>(256);
            let cancel = CancellationToken::new();
            let runtime = AgentRuntime::new(
                Arc::clone(&self.memory),
                inbound_rx,
                outbound_tx,
                cancel.clone(),
            );
            tokio::spawn(runtime.run());

            // Wrap agent emissions with the owning ids and fan them out.
            let script_tx = self.script_tx.clone();
            tokio::spawn(async move {
                while let Some(message) = outbound_rx.recv().await {
                    let _ = script_tx.send(ScriptMessage {
                        session_id,
                        script_id,
                        message,
                        data: None,
                    });
                }
            });

            self.state
                .lock()
                .scripts
                .insert(script_id, LoopbackScript { session_id, inbound_tx, cancel });
            Ok(script_id)
        })
    }

    fn unload_script(&self, script_id: u32) -> BoxFuture<'_, anyhow::Result<()>> {
        Box::pin(async move {
            let Some(script) = self.remove_script(script_id) else {
                bail!("no such script: {script_id}");
            };
            script.cancel.cancel();
            Ok(())
        })
    }

    fn script_post(
        &self,
        script_id: u32,
        message: Value,
        _data: Option<Vec<u8>>,
    ) -> BoxFuture<'_, anyhow::Result<()>> {
        Box::pin(async move {
            let inbound_tx = {
                let state = self.state.lock();
                let Some(script) = state.scripts.get(&script_id) else {
                    bail!("no such script: {script_id}");
                };
                script.inbound_tx.clone()
            };
            if inbound_tx.send(message).await.is_err() {
                warn!(script_id, "script runtime is gone");
                bail!("script {script_id} is not running");
            }
            Ok(())
        })
    }

    fn script_messages(&self) -> broadcast::Receiver<ScriptMessage> {
        self.script_tx.subscribe()
    }

    fn session_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.session_tx.subscribe()
    }
}

#[cfg(test)]
#[path = "loopback_tests.rs"]
mod tests;
