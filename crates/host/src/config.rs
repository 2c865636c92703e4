// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

/// Instrumentation controller: attach, inspect, scan, and watch a target
/// process through an injected agent.
#[derive(Debug, Parser)]
#[command(name = "carf", version, about)]
pub struct Config {
    /// Directory for persisted state (library, layout).
    #[arg(long, env = "CARF_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Per-request timeout in seconds.
    #[arg(long, env = "CARF_REQUEST_TIMEOUT", default_value = "10")]
    pub request_timeout: u64,

    /// Console ring capacity.
    #[arg(long, env = "CARF_CONSOLE_CAPACITY", default_value = "1000")]
    pub console_capacity: usize,

    /// Run without instrumentation (browser-only development mode).
    #[arg(long, env = "CARF_DETACHED")]
    pub detached: bool,

    /// Device to attach to.
    #[arg(long, env = "CARF_DEVICE", default_value = "local")]
    pub device: String,

    /// Process id to attach to on startup.
    #[arg(long, env = "CARF_ATTACH_PID")]
    pub pid: Option<u32>,

    /// Log format (json or text).
    #[arg(long, env = "CARF_LOG_FORMAT", default_value = "text")]
    pub log_format: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "CARF_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Config {
    /// Validate the configuration after parsing.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.console_capacity == 0 {
            anyhow::bail!("--console-capacity must be at least 1");
        }
        match self.log_format.as_str() {
            "json" | "text" => {}
            other => anyhow::bail!("invalid log format: {other}"),
        }
        if self.detached && self.pid.is_some() {
            anyhow::bail!("--pid cannot be combined with --detached");
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    /// Library document path, when persistence is on.
    pub fn library_path(&self) -> Option<PathBuf> {
        self.data_dir.as_ref().map(|dir| dir.join("library.json"))
    }

    /// Layout document path, when persistence is on.
    pub fn layout_path(&self) -> Option<PathBuf> {
        self.data_dir.as_ref().map(|dir| dir.join(crate::layout::LAYOUT_FILE))
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
