// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Browser-only backend: every command answers with a typed neutral default
//! so the UI stays functional without instrumentation.  Nothing ever arrives
//! on the event streams.

use serde_json::Value;
use tokio::sync::broadcast;

use carf_agent::protocol::ScriptMessage;

use super::{Backend, BoxFuture, DeviceInfo, ProcessEntry, SessionEvent, SessionHandle};

pub struct DetachedBackend {
    // Held so subscribers wait instead of observing a closed channel.
    script_tx: broadcast::Sender<ScriptMessage>,
    session_tx: broadcast::Sender<SessionEvent>,
}

impl DetachedBackend {
    pub fn new() -> Self {
        let (script_tx, _) = broadcast::channel(1);
        let (session_tx, _) = broadcast::channel(1);
        Self { script_tx, session_tx }
    }
}

impl Default for DetachedBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for DetachedBackend {
    fn is_hosted(&self) -> bool {
        false
    }

    fn version(&self) -> BoxFuture<'_, anyhow::Result<String>> {
        Box::pin(async { Ok("N/A".to_owned()) })
    }

    fn list_devices(&self) -> BoxFuture<'_, anyhow::Result<Vec<DeviceInfo>>> {
        Box::pin(async { Ok(Vec::new()) })
    }

    fn list_processes(&self, _device_id: &str) -> BoxFuture<'_, anyhow::Result<Vec<ProcessEntry>>> {
        Box::pin(async { Ok(Vec::new()) })
    }

    fn attach(&self, device_id: &str, pid: u32) -> BoxFuture<'_, anyhow::Result<SessionHandle>> {
        let device_id = device_id.to_owned();
        Box::pin(async move { Ok(SessionHandle { session_id: 0, device_id, pid }) })
    }

    fn detach(&self, _session_id: u32) -> BoxFuture<'_, anyhow::Result<()>> {
        Box::pin(async { Ok(()) })
    }

    fn spawn(
        &self,
        _device_id: &str,
        _program: &str,
        _argv: Vec<String>,
    ) -> BoxFuture<'_, anyhow::Result<u32>> {
        Box::pin(async { Ok(0) })
    }

    fn resume(&self, _device_id: &str, _pid: u32) -> BoxFuture<'_, anyhow::Result<()>> {
        Box::pin(async { Ok(()) })
    }

    fn kill(&self, _device_id: &str, _pid: u32) -> BoxFuture<'_, anyhow::Result<()>> {
        Box::pin(async { Ok(()) })
    }

    fn load_default_script(&self, _session_id: u32) -> BoxFuture<'_, anyhow::Result<u32>> {
        Box::pin(async { Ok(0) })
    }

    fn unload_script(&self, _script_id: u32) -> BoxFuture<'_, anyhow::Result<()>> {
        Box::pin(async { Ok(()) })
    }

    fn script_post(
        &self,
        _script_id: u32,
        _message: Value,
        _data: Option<Vec<u8>>,
    ) -> BoxFuture<'_, anyhow::Result<()>> {
        Box::pin(async { Ok(()) })
    }

    fn script_messages(&self) -> broadcast::Receiver<ScriptMessage> {
        self.script_tx.subscribe()
    }

    fn session_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.session_tx.subscribe()
    }
}

#[cfg(test)]
#[path = "detached_tests.rs"]
mod tests;
