// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Backend command facade.
//!
//! A thin typed surface over the native instrumentation layer; no logic
//! beyond marshalling.  Two implementations ship: [`LoopbackBackend`] hosts
//! agent runtimes in-process (local device, development, every test) and
//! [`DetachedBackend`] is the browser-only mode where each call answers with
//! a typed neutral default instead of failing.

pub mod detached;
pub mod loopback;

use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;

use carf_agent::protocol::ScriptMessage;

pub use detached::DetachedBackend;
pub use loopback::LoopbackBackend;

/// Boxed future used by the object-safe [`Backend`] methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A device the backend can reach.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub id: String,
    pub name: String,
    pub device_type: DeviceType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    Local,
    Usb,
    Remote,
}

/// A process on a device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessEntry {
    pub pid: u32,
    pub name: String,
}

/// Handle returned by a successful attach.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionHandle {
    pub session_id: u32,
    pub device_id: String,
    pub pid: u32,
}

/// Out-of-band session lifecycle signals from the backend.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// The session died underneath us (process exit, transport fault).
    Dead { session_id: u32, reason: String },
}

/// Typed command surface over the instrumentation layer.
///
/// Calls return a value or fail with a transport-or-backend error; they
/// never interpret results.  The script-message stream is a single global
/// broadcast; only the broker attaches to it.
pub trait Backend: Send + Sync + 'static {
    /// Environment probe: hosted (instrumentation available) or browser-only.
    fn is_hosted(&self) -> bool;

    fn version(&self) -> BoxFuture<'_, anyhow::Result<String>>;
    fn list_devices(&self) -> BoxFuture<'_, anyhow::Result<Vec<DeviceInfo>>>;
    fn list_processes(&self, device_id: &str) -> BoxFuture<'_, anyhow::Result<Vec<ProcessEntry>>>;

    fn attach(&self, device_id: &str, pid: u32) -> BoxFuture<'_, anyhow::Result<SessionHandle>>;
    fn detach(&self, session_id: u32) -> BoxFuture<'_, anyhow::Result<()>>;

    fn spawn(
        &self,
        device_id: &str,
        program: &str,
        argv: Vec<String>,
    ) -> BoxFuture<'_, anyhow::Result<u32>>;
    fn resume(&self, device_id: &str, pid: u32) -> BoxFuture<'_, anyhow::Result<()>>;
    fn kill(&self, device_id: &str, pid: u32) -> BoxFuture<'_, anyhow::Result<()>>;

    fn load_default_script(&self, session_id: u32) -> BoxFuture<'_, anyhow::Result<u32>>;
    fn unload_script(&self, script_id: u32) -> BoxFuture<'_, anyhow::Result<()>>;
    fn script_post(
        &self,
        script_id: u32,
        message: Value,
        data: Option<Vec<u8>>,
    ) -> BoxFuture<'_, anyhow::Result<()>>;

    /// Subscribe to the script-message stream.
    fn script_messages(&self) -> broadcast::Receiver<ScriptMessage>;
    /// Subscribe to session lifecycle signals.
    fn session_events(&self) -> broadcast::Receiver<SessionEvent>;
}
