// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test infrastructure: a hand-driven backend for broker and
//! lifecycle tests, plus small capture helpers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::bail;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::broadcast;

use carf_agent::protocol::ScriptMessage;

use crate::backend::{
    Backend, BoxFuture, DeviceInfo, DeviceType, ProcessEntry, SessionEvent, SessionHandle,
};

/// Session and script ids the manual backend hands out.
pub const MANUAL_SESSION: u32 = 1;
pub const MANUAL_SCRIPT: u32 = 7;

/// A backend the test drives by hand: it records every posted message and
/// lets the test inject arbitrary script messages and session signals.
pub struct ManualBackend {
    posted: Mutex<Vec<(u32, Value)>>,
    script_tx: broadcast::Sender<ScriptMessage>,
    session_tx: broadcast::Sender<SessionEvent>,
    fail_posts: AtomicBool,
    fail_attach: AtomicBool,
    fail_script_load: AtomicBool,
}

impl ManualBackend {
    pub fn new() -> Self {
        let (script_tx, _) = broadcast::channel(64);
        let (session_tx, _) = broadcast::channel(16);
        Self {
            posted: Mutex::new(Vec::new()),
            script_tx,
            session_tx,
            fail_posts: AtomicBool::new(false),
            fail_attach: AtomicBool::new(false),
            fail_script_load: AtomicBool::new(false),
        }
    }

    /// Deliver a message on the script stream, wrapped with the manual ids.
    pub fn inject(&self, message: Value) {
        let _ = self.script_tx.send(ScriptMessage {
            session_id: MANUAL_SESSION,
            script_id: MANUAL_SCRIPT,
            message,
            data: None,
        });
    }

    /// Deliver a session-death signal.
    pub fn inject_dead(&self, session_id: u32, reason: &str) {
        let _ = self
            .session_tx
            .send(SessionEvent::Dead { session_id, reason: reason.to_owned() });
    }

    pub fn posted(&self) -> Vec<(u32, Value)> {
        self.posted.lock().clone()
    }

    /// Wait until at least `count` messages were posted, returning them.
    pub async fn wait_for_posts(&self, count: usize) -> anyhow::Result<Vec<(u32, Value)>> {
        for _ in 0..400 {
            {
                let posted = self.posted.lock();
                if posted.len() >= count {
                    return Ok(posted.clone());
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        bail!("backend never saw {count} posts");
    }

    pub fn set_fail_posts(&self, fail: bool) {
        self.fail_posts.store(fail, Ordering::Relaxed);
    }

    pub fn set_fail_attach(&self, fail: bool) {
        self.fail_attach.store(fail, Ordering::Relaxed);
    }

    pub fn set_fail_script_load(&self, fail: bool) {
        self.fail_script_load.store(fail, Ordering::Relaxed);
    }
}

impl Default for ManualBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for ManualBackend {
    fn is_hosted(&self) -> bool {
        true
    }

    fn version(&self) -> BoxFuture<'_, anyhow::Result<String>> {
        Box::pin(async { Ok("manual".to_owned()) })
    }

    fn list_devices(&self) -> BoxFuture<'_, anyhow::Result<Vec<DeviceInfo>>> {
        Box::pin(async {
            Ok(vec![DeviceInfo {
                id: "manual".to_owned(),
                name: "Manual".to_owned(),
                device_type: DeviceType::Local,
            }])
        })
    }

    fn list_processes(&self, _device_id: &str) -> BoxFuture<'_, anyhow::Result<Vec<ProcessEntry>>> {
        Box::pin(async { Ok(vec![ProcessEntry { pid: 4242, name: "target-app".to_owned() }]) })
    }

    fn attach(&self, device_id: &str, pid: u32) -> BoxFuture<'_, anyhow::Result<SessionHandle>> {
        let device_id = device_id.to_owned();
        Box::pin(async move {
            if self.fail_attach.load(Ordering::Relaxed) {
                bail!("attach refused");
            }
            Ok(SessionHandle { session_id: MANUAL_SESSION, device_id, pid })
        })
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
        Box::pin(async { Ok(4243) })
    }

    fn resume(&self, _device_id: &str, _pid: u32) -> BoxFuture<'_, anyhow::Result<()>> {
        Box::pin(async { Ok(()) })
    }

    fn kill(&self, _device_id: &str, _pid: u32) -> BoxFuture<'_, anyhow::Result<()>> {
        Box::pin(async { Ok(()) })
    }

    fn load_default_script(&self, _session_id: u32) -> BoxFuture<'_, anyhow::Result<u32>> {
        Box::pin(async {
            if self.fail_script_load.load(Ordering::Relaxed) {
                bail!("script load refused");
            }
            Ok(MANUAL_SCRIPT)
        })
    }

    fn unload_script(&self, _script_id: u32) -> BoxFuture<'_, anyhow::Result<()>> {
        Box::pin(async { Ok(()) })
    }

    fn script_post(
        &self,
        script_id: u32,
        message: Value,
        _data: Option<Vec<u8>>,
    ) -> BoxFuture<'_, anyhow::Result<()>> {
        Box::pin(async move {
            if self.fail_posts.load(Ordering::Relaxed) {
                bail!("post refused");
            }
            self.posted.lock().push((script_id, message));
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

/// Capture sink for tab-switch callbacks.
#[derive(Clone, Default)]
pub struct TabCapture {
    switches: Arc<Mutex<Vec<crate::action::Tab>>>,
}

impl TabCapture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn callback(&self) -> impl Fn(crate::action::Tab) + Send + Sync + 'static {
        let switches = Arc::clone(&self.switches);
        move |tab| switches.lock().push(tab)
    }

    pub fn switches(&self) -> Vec<crate::action::Tab> {
        self.switches.lock().clone()
    }
}
