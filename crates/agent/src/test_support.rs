// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures: an in-memory [`TargetMemory`] implementation used by the
//! unit suites, the end-to-end specs, and the host's loopback device.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::bail;
use bytes::Bytes;
use parking_lot::RwLock;

use crate::memory::{
    ExportInfo, FrameInfo, ImportInfo, MemoryRange, ModuleInfo, Protection, TargetMemory,
    TargetInfo, ThreadInfo,
};

struct FixtureRegion {
    base: u64,
    protection: Protection,
    data: RwLock<Vec<u8>>,
}

/// A scriptable fake target: a handful of byte-backed regions plus canned
/// module/thread metadata.  Regions stay mutable behind the [`Arc`] so tests
/// can change target state between scan steps.
pub struct FixtureMemory {
    info: TargetInfo,
    modules: Vec<ModuleInfo>,
    exports: HashMap<String, Vec<ExportInfo>>,
    imports: HashMap<String, Vec<ImportInfo>>,
    threads: Vec<ThreadInfo>,
    frames: Vec<FrameInfo>,
    regions: Vec<FixtureRegion>,
}

impl FixtureMemory {
    pub fn new() -> Self {
        Self {
            info: TargetInfo {
                pid: 4242,
                name: "target-app".to_owned(),
                arch: "x64".to_owned(),
                platform: "linux".to_owned(),
                page_size: 4096,
            },
            modules: Vec::new(),
            exports: HashMap::new(),
            imports: HashMap::new(),
            threads: Vec::new(),
            frames: Vec::new(),
            regions: Vec::new(),
        }
    }

    /// Add a zero-filled region.
    pub fn with_region(mut self, base: u64, size: usize, protection: &str) -> Self {
        self.regions.push(FixtureRegion {
            base,
            protection: Protection::parse(protection),
            data: RwLock::new(vec![0u8; size]),
        });
        self
    }

    /// Add a region seeded with the given bytes.
    pub fn with_region_bytes(mut self, base: u64, protection: &str, bytes: Vec<u8>) -> Self {
        self.regions.push(FixtureRegion {
            base,
            protection: Protection::parse(protection),
            data: RwLock::new(bytes),
        });
        self
    }

    pub fn with_module(mut self, name: &str, base: u64, size: u64) -> Self {
        self.modules.push(ModuleInfo {
            name: name.to_owned(),
            base,
            size,
            path: format!("/opt/target/{name}"),
        });
        self
    }

    pub fn with_export(mut self, module: &str, name: &str, address: u64) -> Self {
        self.exports.entry(module.to_owned()).or_default().push(ExportInfo {
            name: name.to_owned(),
            address,
            kind: "function".to_owned(),
        });
        self
    }

    pub fn with_import(mut self, module: &str, name: &str, from: &str, address: u64) -> Self {
        self.imports.entry(module.to_owned()).or_default().push(ImportInfo {
            name: name.to_owned(),
            module: from.to_owned(),
            address: Some(address),
        });
        self
    }

    pub fn with_thread(mut self, id: u32, state: &str) -> Self {
        self.threads.push(ThreadInfo { id, state: state.to_owned() });
        self
    }

    /// Overwrite bytes at an absolute address.  Fails on unmapped addresses,
    /// same as a real write would.
    pub fn poke(&self, address: u64, bytes: &[u8]) -> anyhow::Result<()> {
        self.write(address, bytes)
    }

    /// Read bytes back out, for assertions.
    pub fn peek(&self, address: u64, len: usize) -> anyhow::Result<Vec<u8>> {
        Ok(self.read(address, len)?.to_vec())
    }

    /// The stock fixture used by the loopback device: one writable data
    /// region, one executable text region, and matching module metadata.
    pub fn sample() -> Arc<Self> {
        let text: Vec<u8> = (0..0x200u32).map(|i| (i % 251) as u8).collect();
        Arc::new(
            Self::new()
                .with_region(0x1000, 0x400, "rw-")
                .with_region_bytes(0x40_0000, "r-x", text)
                .with_module("target-app", 0x40_0000, 0x200)
                .with_module("libsupport.so", 0x50_0000, 0x1000)
                .with_export("target-app", "main", 0x40_0010)
                .with_export("libsupport.so", "sup_init", 0x50_0020)
                .with_import("target-app", "sup_init", "libsupport.so", 0x50_0020)
                .with_thread(1, "running")
                .with_thread(2, "waiting"),
        )
    }

    fn region_for(&self, address: u64, len: usize) -> Option<&FixtureRegion> {
        self.regions.iter().find(|r| {
            let size = r.data.read().len() as u64;
            address >= r.base && address + len as u64 <= r.base + size
        })
    }
}

impl Default for FixtureMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl TargetMemory for FixtureMemory {
    fn info(&self) -> TargetInfo {
        self.info.clone()
    }

    fn modules(&self) -> Vec<ModuleInfo> {
        self.modules.clone()
    }

    fn exports(&self, module: &str) -> Vec<ExportInfo> {
        self.exports.get(module).cloned().unwrap_or_default()
    }

    fn imports(&self, module: &str) -> Vec<ImportInfo> {
        self.imports.get(module).cloned().unwrap_or_default()
    }

    fn threads(&self) -> Vec<ThreadInfo> {
        self.threads.clone()
    }

    fn backtrace(&self) -> Vec<FrameInfo> {
        self.frames.clone()
    }

    fn ranges(&self, filter: Protection) -> Vec<MemoryRange> {
        self.regions
            .iter()
            .filter(|r| r.protection.satisfies(filter))
            .map(|r| MemoryRange {
                base: r.base,
                size: r.data.read().len() as u64,
                protection: r.protection,
            })
            .collect()
    }

    fn read(&self, address: u64, len: usize) -> anyhow::Result<Bytes> {
        let Some(region) = self.region_for(address, len) else {
            bail!("unmapped read at {address:#x}");
        };
        let data = region.data.read();
        let start = (address - region.base) as usize;
        Ok(Bytes::copy_from_slice(&data[start..start + len]))
    }

    fn write(&self, address: u64, bytes: &[u8]) -> anyhow::Result<()> {
        let Some(region) = self.region_for(address, bytes.len()) else {
            bail!("unmapped write at {address:#x}");
        };
        let mut data = region.data.write();
        let start = (address - region.base) as usize;
        data[start..start + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }
}
