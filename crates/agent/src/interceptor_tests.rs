// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde_json::{json, Value};
use tokio::sync::mpsc;

use super::*;
use crate::runtime::EventSink;
use crate::test_support::FixtureMemory;

fn fixture() -> FixtureMemory {
    FixtureMemory::new().with_region(0x40_0000, 0x100, "r-x")
}

#[test]
fn attach_then_list_in_attach_order() -> anyhow::Result<()> {
    let memory = fixture();
    let table = InterceptorTable::new();

    let first = table.attach(
        &memory,
        Some(json!({"address": "0x400010", "name": "open"})),
    )?;
    assert_eq!(first["hookId"], 1);
    assert_eq!(first["address"], "0x400010");

    table.attach(&memory, Some(json!({"address": "0x400020", "name": "close"})))?;

    let listed = table.list()?;
    let hooks = listed["hooks"].as_array().cloned().unwrap_or_default();
    assert_eq!(hooks.len(), 2);
    assert_eq!(hooks[0]["name"], "open");
    assert_eq!(hooks[1]["name"], "close");
    assert_eq!(hooks[0]["callCount"], 0);
    Ok(())
}

#[test]
fn duplicate_and_unmapped_attach_are_rejected() -> anyhow::Result<()> {
    let memory = fixture();
    let table = InterceptorTable::new();

    table.attach(&memory, Some(json!({"address": "0x400010"})))?;
    let dup = table.attach(&memory, Some(json!({"address": "0x400010"})));
    assert!(dup.is_err());

    let unmapped = table.attach(&memory, Some(json!({"address": "0x1"})));
    assert!(unmapped.is_err());
    assert_eq!(table.len(), 1);
    Ok(())
}

#[test]
fn detach_and_detach_all() -> anyhow::Result<()> {
    let memory = fixture();
    let table = InterceptorTable::new();

    table.attach(&memory, Some(json!({"address": "0x400010"})))?;
    table.attach(&memory, Some(json!({"address": "0x400020"})))?;

    table.detach(Some(json!({"hookId": 1})))?;
    assert_eq!(table.len(), 1);
    assert!(table.detach(Some(json!({"hookId": 1}))).is_err());

    let all = table.detach_all()?;
    assert_eq!(all["detached"], 1);
    assert!(table.is_empty());
    Ok(())
}

#[tokio::test]
async fn record_call_bumps_count_and_emits_event() -> anyhow::Result<()> {
    let memory = fixture();
    let table = InterceptorTable::new();
    let (tx, mut rx) = mpsc::channel::<Value>(8);
    let events = EventSink::new(tx);

    let ack = table.attach(
        &memory,
        Some(json!({"address": "0x400010", "name": "open"})),
    )?;
    let hook_id = ack["hookId"].as_u64().unwrap_or_default() as u32;

    table.record_call(&events, hook_id, vec![0x7fff_0000, 0x2]).await?;
    table.record_call(&events, hook_id, vec![]).await?;

    let Some(first) = rx.recv().await else {
        anyhow::bail!("expected an interceptor_call event");
    };
    assert_eq!(first["payload"]["event"], "interceptor_call");
    assert_eq!(first["payload"]["name"], "open");
    assert_eq!(first["payload"]["callCount"], 1);
    assert_eq!(first["payload"]["args"][0], "0x7fff0000");

    let listed = table.list()?;
    assert_eq!(listed["hooks"][0]["callCount"], 2);

    let unknown = table.record_call(&events, 99, vec![]).await;
    assert!(unknown.is_err());
    Ok(())
}
