// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error taxonomy shared by the broker and the session lifecycle.
//!
//! Callers branch on these variants: transport faults surface as alerts,
//! timeouts log at warn, agent faults propagate verbatim, and precondition
//! failures are rejected locally before anything reaches the wire.

use std::fmt;
use std::time::Duration;

/// Failures a `request` caller can observe.
#[derive(Debug, Clone, PartialEq)]
pub enum RpcError {
    /// `request` was called before `start`.
    NotStarted,
    /// The backend post failed or the transport is gone.
    Transport(String),
    /// No response arrived within the deadline.
    Timeout { method: String, after: Duration },
    /// The agent handler failed; message and stack travel verbatim.
    Agent { message: String, stack: Option<String> },
    /// The pending request was rejected by `stop` or `clear_pending`.
    Cancelled { reason: String },
}

impl fmt::Display for RpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted => f.write_str("broker not started"),
            Self::Transport(msg) => write!(f, "transport error: {msg}"),
            Self::Timeout { method, after } => {
                write!(f, "request {method:?} timed out after {after:?}")
            }
            Self::Agent { message, .. } => f.write_str(message),
            Self::Cancelled { reason } => f.write_str(reason),
        }
    }
}

impl std::error::Error for RpcError {}

/// Failures of the session/script lifecycle, including preconditions that
/// never reach the broker.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlError {
    /// No session is attached.
    NoSession,
    /// A session is attached but no script is loaded.
    NoScript,
    /// Attach was attempted while not idle.
    AlreadyAttached,
    /// The backend is not available (browser-only environment).
    BackendUnavailable,
    /// The backend attach call failed.
    Attach(String),
    /// The default script failed to load; the session was released.
    ScriptLoad(String),
    /// An RPC issued through the lifecycle failed.
    Rpc(RpcError),
}

impl fmt::Display for ControlError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoSession => f.write_str("no session attached"),
            Self::NoScript => f.write_str("no script loaded"),
            Self::AlreadyAttached => f.write_str("a session is already attached"),
            Self::BackendUnavailable => f.write_str("backend unavailable"),
            Self::Attach(msg) => write!(f, "attach failed: {msg}"),
            Self::ScriptLoad(msg) => write!(f, "script load failed: {msg}"),
            Self::Rpc(e) => e.fmt(f),
        }
    }
}

impl std::error::Error for ControlError {}

impl From<RpcError> for ControlError {
    fn from(e: RpcError) -> Self {
        Self::Rpc(e)
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
