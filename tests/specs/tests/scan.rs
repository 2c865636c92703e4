// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Progressive value scans and the streaming pattern scanner, end to end.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use carf::error::{ControlError, RpcError};
use carf_agent::test_support::FixtureMemory;
use carf_specs::{
    attached_harness, harness_with, three_cell_fixture, write_s32, EventCollector, SlowMemory,
    CELL_A,
};

#[tokio::test]
async fn progressive_value_scan_refines_and_clears() -> anyhow::Result<()> {
    let harness = attached_harness(three_cell_fixture()).await?;
    let lifecycle = &harness.controller.lifecycle;

    let started = lifecycle
        .request(
            "memory_value_scan_start",
            Some(json!({"valueType": "s32", "value": "100"})),
        )
        .await?;
    assert_eq!(started["totalMatches"], 2);
    assert_eq!(started["addresses"], json!(["0x1000", "0x1010"]));
    let scan_id = started["scanId"].as_str().unwrap_or_default().to_owned();

    // Target state moves on: A changes, B stays.
    write_s32(&harness.fixture, CELL_A, 101);

    let refined = lifecycle
        .request(
            "memory_value_scan_next",
            Some(json!({"scanId": scan_id, "condition": "unchanged"})),
        )
        .await?;
    assert_eq!(refined["totalMatches"], 1);
    assert_eq!(refined["addresses"], json!(["0x1010"]));

    let page = lifecycle
        .request(
            "memory_value_scan_get",
            Some(json!({"scanId": scan_id, "offset": 0, "limit": 10})),
        )
        .await?;
    assert_eq!(page["values"][0]["address"], "0x1010");
    assert_eq!(page["values"][0]["value"], 100);

    lifecycle
        .request("memory_value_scan_clear", Some(json!({"scanId": scan_id})))
        .await?;

    let gone = lifecycle
        .request(
            "memory_value_scan_get",
            Some(json!({"scanId": scan_id, "offset": 0, "limit": 10})),
        )
        .await;
    let Err(ControlError::Rpc(RpcError::Agent { message, .. })) = gone else {
        anyhow::bail!("get after clear must fail, got {gone:?}");
    };
    assert!(message.contains("Unknown scan id"));
    Ok(())
}

#[tokio::test]
async fn async_scan_streams_and_aborts_with_one_complete() -> anyhow::Result<()> {
    // A thousand small ranges behind a slowed read, so the abort lands while
    // the scan is demonstrably mid-flight.
    let mut fixture = FixtureMemory::new();
    for i in 0..1000u64 {
        fixture = fixture.with_region(0x10_0000 + i * 0x100, 16, "r--");
    }
    let slow = Arc::new(SlowMemory::new(Arc::new(fixture), Duration::from_micros(500)));

    let backend = Arc::new(carf::backend::LoopbackBackend::with_memory(slow));
    let controller = carf::run::Controller::new(
        &carf_specs::spec_config(),
        Arc::clone(&backend) as Arc<dyn carf::backend::Backend>,
    );
    controller.lifecycle.attach("local", 4242).await?;
    let collector = EventCollector::attach(&controller.broker);

    let ack = controller
        .lifecycle
        .request("memory_scan_async", Some(json!({"pattern": "ab cd"})))
        .await?;
    assert_eq!(ack["totalRanges"], 1000);

    collector.wait_for("memory_scan_progress", 5, Duration::from_secs(10)).await?;
    controller.lifecycle.request("memory_scan_abort", None).await?;

    collector.wait_for("memory_scan_complete", 1, Duration::from_secs(10)).await?;
    // Drain any stragglers, then check the stream shape.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(collector.count("memory_scan_complete"), 1);

    let events = collector.snapshot();
    let Some((_, complete)) =
        events.iter().find(|(name, _)| name == "memory_scan_complete")
    else {
        anyhow::bail!("complete event must exist");
    };
    assert_eq!(complete.get("aborted"), Some(&json!(true)));
    let scanned = complete
        .get("scannedRanges")
        .and_then(|v| v.as_u64())
        .unwrap_or_default();
    assert!(scanned < 1000, "abort must stop the walk early, scanned {scanned}");

    // Progress for a scan id arrives in emission order.
    let progress: Vec<u64> = events
        .iter()
        .filter(|(name, _)| name == "memory_scan_progress")
        .filter_map(|(_, fields)| fields.get("scannedRanges").and_then(|v| v.as_u64()))
        .collect();
    assert!(progress.windows(2).all(|w| w[0] < w[1]), "progress out of order: {progress:?}");
    Ok(())
}

#[tokio::test]
async fn scan_matches_carry_addresses() -> anyhow::Result<()> {
    let fixture = Arc::new(
        FixtureMemory::new().with_region_bytes(0x1000, "r--", vec![0, 0xab, 0xcd, 0xab, 0xcd, 0]),
    );
    let harness = harness_with(fixture);
    harness.controller.lifecycle.attach("local", 4242).await?;
    let collector = EventCollector::attach(&harness.controller.broker);

    harness
        .controller
        .lifecycle
        .request("memory_scan_async", Some(json!({"pattern": "ab cd"})))
        .await?;
    collector.wait_for("memory_scan_complete", 1, Duration::from_secs(5)).await?;

    let events = collector.snapshot();
    let matches: Vec<&serde_json::Map<String, serde_json::Value>> = events
        .iter()
        .filter(|(name, _)| name == "memory_scan_match")
        .map(|(_, fields)| fields)
        .collect();
    assert_eq!(matches.len(), 2);
    assert_eq!(matches[0].get("address"), Some(&json!("0x1001")));
    assert_eq!(matches[1].get("address"), Some(&json!("0x1003")));
    Ok(())
}
