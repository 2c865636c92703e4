// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Watch updates and console bridging across the full loop.

use std::time::Duration;

use serde_json::json;

use carf::console::LogLevel;
use carf_specs::{attached_harness, three_cell_fixture, write_s32, EventCollector, CELL_A};

#[tokio::test]
async fn watch_updates_stream_and_reach_the_console() -> anyhow::Result<()> {
    let harness = attached_harness(three_cell_fixture()).await?;
    let collector = EventCollector::attach(&harness.controller.broker);

    let ack = harness
        .controller
        .lifecycle
        .request(
            "memory_watch_add",
            Some(json!({"address": "0x1000", "valueType": "s32", "intervalMs": 10})),
        )
        .await?;
    assert_eq!(ack["lastValue"], 100);
    let watch_id = ack["watchId"].clone();

    // First update carries the initial reading, unflagged.
    collector.wait_for("memory_watch_update", 1, Duration::from_secs(2)).await?;
    let events = collector.snapshot();
    let Some((_, first)) = events.iter().find(|(name, _)| name == "memory_watch_update")
    else {
        anyhow::bail!("watch update must arrive");
    };
    assert_eq!(first.get("changed"), Some(&json!(false)));
    assert_eq!(first.get("value"), Some(&json!(100)));

    // A mutation is flagged on some later tick.
    write_s32(&harness.fixture, CELL_A, 250);
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        if collector.snapshot().iter().any(|(name, fields)| {
            name == "memory_watch_update" && fields.get("changed") == Some(&json!(true))
        }) {
            break;
        }
        anyhow::ensure!(tokio::time::Instant::now() < deadline, "change never observed");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    harness
        .controller
        .lifecycle
        .request("memory_watch_remove", Some(json!({"watchId": watch_id})))
        .await?;

    // The console's event listener mirrored the stream at level `event`.
    let console = harness.controller.console.filtered();
    assert!(console
        .iter()
        .any(|entry| entry.level == LogLevel::Event && entry.message == "memory_watch_update"));
    Ok(())
}

#[tokio::test]
async fn interceptor_surface_is_reachable() -> anyhow::Result<()> {
    let harness = attached_harness(three_cell_fixture()).await?;
    let lifecycle = &harness.controller.lifecycle;

    let attach = lifecycle
        .request(
            "interceptor_attach",
            Some(json!({"address": "0x1000", "name": "read_hp"})),
        )
        .await?;
    assert_eq!(attach["hookId"], 1);

    let listed = lifecycle.request("interceptor_list", None).await?;
    assert_eq!(listed["hooks"][0]["name"], "read_hp");
    assert_eq!(listed["hooks"][0]["callCount"], 0);

    let detached = lifecycle.request("interceptor_detach_all", None).await?;
    assert_eq!(detached["detached"], 1);
    Ok(())
}
