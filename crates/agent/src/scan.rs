// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Asynchronous pattern scanner.
//!
//! `memory_scan_async` acknowledges immediately and streams results as
//! events: one `memory_scan_match` per hit, a `memory_scan_progress` every
//! [`PROGRESS_INTERVAL`] ranges, and exactly one `memory_scan_complete` at
//! the end.  At most one scan runs at a time; `memory_scan_abort` flips a
//! cooperative flag checked at range boundaries.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use crate::memory::{Protection, TargetMemory};
use crate::pattern::BytePattern;
use crate::protocol::{format_address, AgentFault};
use crate::runtime::EventSink;

/// Ranges between progress events.
pub const PROGRESS_INTERVAL: usize = 10;
/// Match cap when the request does not supply one.
pub const DEFAULT_MATCH_LIMIT: usize = 10_000;
/// Bytes read from a range per step.
const READ_CHUNK: usize = 64 * 1024;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScanParams {
    pattern: String,
    protection: Option<String>,
    limit: Option<usize>,
}

struct ActiveScan {
    scan_id: String,
    abort: Arc<AtomicBool>,
}

/// Owner of the single-scan guard.
pub struct ScanEngine {
    active: Arc<Mutex<Option<ActiveScan>>>,
}

impl ScanEngine {
    pub fn new() -> Self {
        Self { active: Arc::new(Mutex::new(None)) }
    }

    /// Start a scan.  Fails while another scan is running.
    pub fn start(
        &self,
        memory: Arc<dyn TargetMemory>,
        events: EventSink,
        shutdown: CancellationToken,
        params: Option<Value>,
    ) -> Result<Value, AgentFault> {
        let params: ScanParams = crate::dispatch::parse_params(params)?;
        let pattern = BytePattern::parse(&params.pattern)
            .map_err(|e| AgentFault::new(e.to_string()))?;
        let filter = Protection::parse(params.protection.as_deref().unwrap_or("r--"));
        let limit = params.limit.unwrap_or(DEFAULT_MATCH_LIMIT).max(1);

        let scan_id = Uuid::new_v4().to_string();
        let abort = Arc::new(AtomicBool::new(false));
        {
            let mut active = self.active.lock();
            if let Some(ref current) = *active {
                return Err(AgentFault::new(format!(
                    "scan already in progress: {}",
                    current.scan_id
                )));
            }
            *active = Some(ActiveScan { scan_id: scan_id.clone(), abort: Arc::clone(&abort) });
        }

        let ranges = memory.ranges(filter);
        let total_ranges = ranges.len();
        let guard = Arc::clone(&self.active);
        let task_id = scan_id.clone();
        tokio::spawn(async move {
            run_scan(memory, events, shutdown, pattern, ranges, limit, task_id.clone(), abort)
                .await;
            let mut active = guard.lock();
            if active.as_ref().is_some_and(|s| s.scan_id == task_id) {
                *active = None;
            }
        });

        Ok(json!({ "scanId": scan_id, "totalRanges": total_ranges }))
    }

    /// Request cancellation of the running scan, if any.
    pub fn abort(&self) -> Result<Value, AgentFault> {
        let active = self.active.lock();
        match *active {
            Some(ref scan) => {
                scan.abort.store(true, Ordering::Release);
                Ok(json!({ "scanId": scan.scan_id, "aborting": true }))
            }
            None => Ok(json!({ "aborting": false })),
        }
    }

    /// Flip the abort flag without a request; used on transport teardown.
    pub fn abort_active(&self) {
        if let Some(ref scan) = *self.active.lock() {
            scan.abort.store(true, Ordering::Release);
        }
    }
}

impl Default for ScanEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_scan(
    memory: Arc<dyn TargetMemory>,
    events: EventSink,
    shutdown: CancellationToken,
    pattern: BytePattern,
    ranges: Vec<crate::memory::MemoryRange>,
    limit: usize,
    scan_id: String,
    abort: Arc<AtomicBool>,
) {
    let total_ranges = ranges.len();
    let mut scanned = 0usize;
    let mut matches = 0usize;

    'ranges: for range in &ranges {
        if abort.load(Ordering::Acquire) || shutdown.is_cancelled() {
            break;
        }

        // Ranges that fail to read (unmapped mid-flight) are skipped.
        let hits = scan_range(memory.as_ref(), &pattern, range, limit - matches);
        for address in hits {
            let mut fields = serde_json::Map::new();
            fields.insert("scanId".to_owned(), json!(scan_id));
            fields.insert("address".to_owned(), json!(format_address(address)));
            fields.insert("size".to_owned(), json!(pattern.len()));
            fields.insert("matchIndex".to_owned(), json!(matches));
            events.emit("memory_scan_match", fields).await;
            matches += 1;
            if matches >= limit {
                scanned += 1;
                break 'ranges;
            }
        }

        scanned += 1;
        if scanned % PROGRESS_INTERVAL == 0 && scanned < total_ranges {
            let mut fields = serde_json::Map::new();
            fields.insert("scanId".to_owned(), json!(scan_id));
            fields.insert("scannedRanges".to_owned(), json!(scanned));
            fields.insert("totalRanges".to_owned(), json!(total_ranges));
            fields.insert("matchCount".to_owned(), json!(matches));
            fields.insert("progress".to_owned(), json!(scanned * 100 / total_ranges.max(1)));
            events.emit("memory_scan_progress", fields).await;
        }

        tokio::task::yield_now().await;
    }

    let aborted = abort.load(Ordering::Acquire);
    debug!(scan_id = %scan_id, matches, scanned, aborted, "pattern scan finished");
    let mut fields = serde_json::Map::new();
    fields.insert("scanId".to_owned(), json!(scan_id));
    fields.insert("totalMatches".to_owned(), json!(matches));
    fields.insert("scannedRanges".to_owned(), json!(scanned));
    fields.insert("aborted".to_owned(), json!(aborted));
    events.emit("memory_scan_complete", fields).await;
}

/// Scan one range in chunks, stepping so matches crossing a chunk boundary
/// are found exactly once.
fn scan_range(
    memory: &dyn TargetMemory,
    pattern: &BytePattern,
    range: &crate::memory::MemoryRange,
    limit: usize,
) -> Vec<u64> {
    let mut out = Vec::new();
    if limit == 0 || pattern.len() as u64 > range.size {
        return out;
    }
    // Chunks overlap by pattern.len() - 1 bytes so a match straddling a
    // boundary is fully contained in the next read.
    let overlap = pattern.len() - 1;
    let step = READ_CHUNK.max(pattern.len());
    let mut offset = 0u64;
    while offset < range.size {
        let want = step.min((range.size - offset) as usize);
        let Ok(chunk) = memory.read(range.base + offset, want) else {
            return out;
        };
        for at in pattern.find_all(&chunk, limit - out.len()) {
            out.push(range.base + offset + at as u64);
            if out.len() >= limit {
                return out;
            }
        }
        if offset + want as u64 >= range.size {
            break;
        }
        offset += (want - overlap) as u64;
    }
    out
}

#[cfg(test)]
#[path = "scan_tests.rs"]
mod tests;
