// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Target-process access seam.
//!
//! Every instrumentation primitive the engines need goes through the
//! [`TargetMemory`] trait, so the scanners, watchers, and method handlers
//! never talk to the instrumentation library directly.  Production wires a
//! real implementation behind the backend; tests and the loopback device use
//! [`crate::test_support::FixtureMemory`].

use std::fmt;

use bytes::Bytes;

// -- Protection ---------------------------------------------------------------

/// Page protection flags, parsed from the `"rwx"` wire form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Protection {
    pub read: bool,
    pub write: bool,
    pub execute: bool,
}

impl Protection {
    /// Parse a protection query such as `"r--"`, `"rw-"`, or `"rx"`.
    ///
    /// Unknown characters and dashes are ignored, so both the padded and the
    /// compact spellings are accepted.
    pub fn parse(spec: &str) -> Self {
        let mut p = Self::default();
        for ch in spec.chars() {
            match ch {
                'r' => p.read = true,
                'w' => p.write = true,
                'x' => p.execute = true,
                _ => {}
            }
        }
        p
    }

    /// Whether this protection grants everything `want` asks for.
    pub fn satisfies(&self, want: Protection) -> bool {
        (!want.read || self.read) && (!want.write || self.write) && (!want.execute || self.execute)
    }
}

impl fmt::Display for Protection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}",
            if self.read { 'r' } else { '-' },
            if self.write { 'w' } else { '-' },
            if self.execute { 'x' } else { '-' },
        )
    }
}

// -- Descriptors --------------------------------------------------------------

/// A mapped memory range in the target.
#[derive(Debug, Clone, Copy)]
pub struct MemoryRange {
    pub base: u64,
    pub size: u64,
    pub protection: Protection,
}

/// A loaded module.
#[derive(Debug, Clone)]
pub struct ModuleInfo {
    pub name: String,
    pub base: u64,
    pub size: u64,
    pub path: String,
}

/// An exported symbol of a module.
#[derive(Debug, Clone)]
pub struct ExportInfo {
    pub name: String,
    pub address: u64,
    /// `"function"` or `"variable"`.
    pub kind: String,
}

/// An imported symbol of a module.
#[derive(Debug, Clone)]
pub struct ImportInfo {
    pub name: String,
    pub module: String,
    pub address: Option<u64>,
}

/// A thread in the target process.
#[derive(Debug, Clone)]
pub struct ThreadInfo {
    pub id: u32,
    pub state: String,
}

/// Static facts about the attached process.
#[derive(Debug, Clone)]
pub struct TargetInfo {
    pub pid: u32,
    pub name: String,
    pub arch: String,
    pub platform: String,
    pub page_size: u64,
}

/// One frame of a captured backtrace.
#[derive(Debug, Clone)]
pub struct FrameInfo {
    pub address: u64,
    pub module: Option<String>,
    pub symbol: Option<String>,
}

// -- The seam -----------------------------------------------------------------

/// Access to the attached target process.
///
/// Object-safe so engines can hold `Arc<dyn TargetMemory>`.  Reads and writes
/// fail with an error when the address is unmapped; enumerations are
/// infallible snapshots.
pub trait TargetMemory: Send + Sync + 'static {
    fn info(&self) -> TargetInfo;
    fn modules(&self) -> Vec<ModuleInfo>;
    fn exports(&self, module: &str) -> Vec<ExportInfo>;
    fn imports(&self, module: &str) -> Vec<ImportInfo>;
    fn threads(&self) -> Vec<ThreadInfo>;
    fn backtrace(&self) -> Vec<FrameInfo>;
    /// Mapped ranges whose protection satisfies `filter`.
    fn ranges(&self, filter: Protection) -> Vec<MemoryRange>;
    fn read(&self, address: u64, len: usize) -> anyhow::Result<Bytes>;
    fn write(&self, address: u64, data: &[u8]) -> anyhow::Result<()>;
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
