// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test harness for the end-to-end scenarios.
//!
//! Builds the full controller over an in-process loopback backend so the
//! whole host ↔ agent loop runs for real: broker, demultiplexer, lifecycle,
//! agent dispatcher, and the engines.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;

use carf::backend::{Backend, LoopbackBackend};
use carf::broker::{BrokerEvent, EventSubscription, RpcBroker};
use carf::config::Config;
use carf::run::Controller;
use carf_agent::memory::TargetMemory;
use carf_agent::test_support::FixtureMemory;
use carf_agent::value::{ScanValue, ValueType};

/// Default config as the binary would parse it, with persistence off.
pub fn spec_config() -> Config {
    match <Config as clap::Parser>::try_parse_from(["carf"]) {
        Ok(config) => config,
        Err(e) => unreachable!("default config must parse: {e}"),
    }
}

/// A fully wired controller plus handles the scenarios poke at.
pub struct Harness {
    pub fixture: Arc<FixtureMemory>,
    pub backend: Arc<LoopbackBackend>,
    pub controller: Arc<Controller>,
}

/// Build a controller over a loopback backend serving `fixture`.
pub fn harness_with(fixture: Arc<FixtureMemory>) -> Harness {
    let backend = Arc::new(LoopbackBackend::with_memory(
        Arc::clone(&fixture) as Arc<dyn TargetMemory>
    ));
    let controller =
        Controller::new(&spec_config(), Arc::clone(&backend) as Arc<dyn Backend>);
    Harness { fixture, backend, controller }
}

/// Build and attach to the fixture's process.
pub async fn attached_harness(fixture: Arc<FixtureMemory>) -> anyhow::Result<Harness> {
    let harness = harness_with(fixture);
    let pid = harness.fixture.info().pid;
    harness.controller.lifecycle.attach("local", pid).await?;
    Ok(harness)
}

/// A fixture holding three s32 cells, the classic progressive-scan target.
pub const CELL_A: u64 = 0x1000;
pub const CELL_B: u64 = 0x1010;
pub const CELL_C: u64 = 0x1020;

pub fn three_cell_fixture() -> Arc<FixtureMemory> {
    let fixture = Arc::new(FixtureMemory::new().with_region(0x1000, 0x40, "rw-"));
    write_s32(&fixture, CELL_A, 100);
    write_s32(&fixture, CELL_B, 100);
    write_s32(&fixture, CELL_C, 50);
    fixture
}

pub fn write_s32(fixture: &FixtureMemory, address: u64, value: i32) {
    let bytes = ValueType::S32.encode(&ScanValue::Signed(value as i64));
    let _ = fixture.poke(address, &bytes);
}

/// Collects `carf:event`s from the broker for assertions.
pub struct EventCollector {
    events: Arc<Mutex<Vec<(String, serde_json::Map<String, Value>)>>>,
    _subscription: EventSubscription,
}

impl EventCollector {
    pub fn attach(broker: &RpcBroker) -> Self {
        let events: Arc<Mutex<Vec<(String, serde_json::Map<String, Value>)>>> =
            Arc::new(Mutex::new(Vec::new()));
        let subscription = {
            let events = Arc::clone(&events);
            broker.on_event(move |event| {
                if let BrokerEvent::Event { name, fields } = event {
                    events.lock().push((name.clone(), fields.clone()));
                }
                Ok(())
            })
        };
        Self { events, _subscription: subscription }
    }

    pub fn snapshot(&self) -> Vec<(String, serde_json::Map<String, Value>)> {
        self.events.lock().clone()
    }

    pub fn count(&self, name: &str) -> usize {
        self.events.lock().iter().filter(|(n, _)| n == name).count()
    }

    /// Wait until at least `count` events named `name` have arrived.
    pub async fn wait_for(
        &self,
        name: &str,
        count: usize,
        timeout: Duration,
    ) -> anyhow::Result<()> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.count(name) >= count {
                return Ok(());
            }
            if tokio::time::Instant::now() > deadline {
                anyhow::bail!(
                    "saw {} of {count} {name:?} events within {timeout:?}",
                    self.count(name)
                );
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

/// A [`TargetMemory`] decorator that slows every read, so scans stay
/// observable long enough for a mid-flight abort.
pub struct SlowMemory {
    inner: Arc<FixtureMemory>,
    delay: Duration,
}

impl SlowMemory {
    pub fn new(inner: Arc<FixtureMemory>, delay: Duration) -> Self {
        Self { inner, delay }
    }
}

impl TargetMemory for SlowMemory {
    fn info(&self) -> carf_agent::memory::TargetInfo {
        self.inner.info()
    }

    fn modules(&self) -> Vec<carf_agent::memory::ModuleInfo> {
        self.inner.modules()
    }

    fn exports(&self, module: &str) -> Vec<carf_agent::memory::ExportInfo> {
        self.inner.exports(module)
    }

    fn imports(&self, module: &str) -> Vec<carf_agent::memory::ImportInfo> {
        self.inner.imports(module)
    }

    fn threads(&self) -> Vec<carf_agent::memory::ThreadInfo> {
        self.inner.threads()
    }

    fn backtrace(&self) -> Vec<carf_agent::memory::FrameInfo> {
        self.inner.backtrace()
    }

    fn ranges(&self, filter: carf_agent::memory::Protection) -> Vec<carf_agent::memory::MemoryRange> {
        self.inner.ranges(filter)
    }

    fn read(&self, address: u64, len: usize) -> anyhow::Result<bytes::Bytes> {
        std::thread::sleep(self.delay);
        self.inner.read(address, len)
    }

    fn write(&self, address: u64, data: &[u8]) -> anyhow::Result<()> {
        self.inner.write(address, data)
    }
}
