// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request/response round trips through the full host ↔ agent loop.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use carf::backend::Backend;
use carf::error::RpcError;
use carf::run::Controller;
use carf::test_support::{ManualBackend, MANUAL_SCRIPT};
use carf_specs::{attached_harness, spec_config, three_cell_fixture};

#[tokio::test]
async fn ping_round_trip() -> anyhow::Result<()> {
    let harness = attached_harness(three_cell_fixture()).await?;
    let reply = harness.controller.lifecycle.request("ping", None).await?;
    assert_eq!(reply, json!("pong"));
    Ok(())
}

#[tokio::test]
async fn agent_faults_travel_verbatim() -> anyhow::Result<()> {
    let harness = attached_harness(three_cell_fixture()).await?;
    let result = harness.controller.lifecycle.request("no_such_method", None).await;
    let Err(carf::error::ControlError::Rpc(RpcError::Agent { message, .. })) = result else {
        anyhow::bail!("expected an agent fault, got {result:?}");
    };
    assert_eq!(message, "Unknown method: no_such_method");
    Ok(())
}

#[tokio::test]
async fn introspection_flows_end_to_end() -> anyhow::Result<()> {
    let harness = attached_harness(three_cell_fixture()).await?;
    let info = harness.controller.lifecycle.request("get_process_info", None).await?;
    assert_eq!(info["pid"], 4242);

    let read = harness
        .controller
        .lifecycle
        .request("read_memory", Some(json!({"address": "0x1000", "size": 4})))
        .await?;
    assert_eq!(read["data"], json!([100, 0, 0, 0]));
    Ok(())
}

#[tokio::test]
async fn timeout_rejects_and_late_response_is_dropped() -> anyhow::Result<()> {
    let backend = Arc::new(ManualBackend::new());
    let controller = Controller::new(&spec_config(), Arc::clone(&backend) as Arc<dyn Backend>);
    controller.lifecycle.attach("manual", 4242).await?;

    let result = controller
        .broker
        .request_with_timeout(MANUAL_SCRIPT, "slow", None, Duration::from_millis(10))
        .await;
    assert!(matches!(result, Err(RpcError::Timeout { .. })), "got {result:?}");
    assert_eq!(controller.broker.pending_count(), 0);

    // Inject the response after the fact; nothing must change.
    let posted = backend.posted();
    let id = posted[0].1["payload"]["id"].as_u64().unwrap_or_default();
    backend.inject(carf_agent::protocol::response_ok(id, json!("late")));
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(controller.broker.pending_count(), 0);

    // The broker is still healthy for the next call.
    let responder = {
        let backend = Arc::clone(&backend);
        tokio::spawn(async move {
            let posted = backend.wait_for_posts(2).await?;
            let id = posted[1].1["payload"]["id"].as_u64().unwrap_or_default();
            backend.inject(carf_agent::protocol::response_ok(id, json!("pong")));
            anyhow::Ok(())
        })
    };
    let reply = controller.broker.request(MANUAL_SCRIPT, "ping", None).await;
    assert_eq!(reply, Ok(json!("pong")));
    responder.await??;
    Ok(())
}
