// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session loss: pending work rejects, state unwinds, the UI reconciles.

use std::sync::Arc;
use std::time::Duration;

use carf::action::Tab;
use carf::backend::Backend;
use carf::error::{ControlError, RpcError};
use carf::lifecycle::Phase;
use carf::run::Controller;
use carf::test_support::{ManualBackend, TabCapture, MANUAL_SCRIPT, MANUAL_SESSION};
use carf_specs::spec_config;

#[tokio::test]
async fn session_death_rejects_pending_and_returns_to_idle() -> anyhow::Result<()> {
    let backend = Arc::new(ManualBackend::new());
    let controller = Controller::new(&spec_config(), Arc::clone(&backend) as Arc<dyn Backend>);
    let capture = TabCapture::new();
    controller.actions.set_tab_switch(capture.callback());
    controller.actions.note_current_tab(Tab::Memory);

    controller.lifecycle.attach("manual", 4242).await?;
    assert_eq!(controller.lifecycle.phase(), Phase::ScriptLoaded);

    let mut waiters = Vec::new();
    for _ in 0..3 {
        let broker = Arc::clone(&controller.broker);
        waiters.push(tokio::spawn(async move {
            broker.request(MANUAL_SCRIPT, "hang", None).await
        }));
    }
    backend.wait_for_posts(3).await?;
    assert_eq!(controller.broker.pending_count(), 3);

    backend.inject_dead(MANUAL_SESSION, "target exited");

    for waiter in waiters {
        let result = waiter.await?;
        assert_eq!(
            result,
            Err(RpcError::Cancelled { reason: "session detached".to_owned() })
        );
    }

    for _ in 0..200 {
        if controller.lifecycle.phase() == Phase::Idle {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(controller.lifecycle.phase(), Phase::Idle);

    // Subsequent requests fail synchronously with a precondition error.
    let result = controller.lifecycle.request("ping", None).await;
    assert_eq!(result, Err(ControlError::NoSession));

    // The UI got routed back to the attach tab and the console heard why.
    assert_eq!(controller.actions.current_tab(), Tab::Attach);
    assert!(capture.switches().contains(&Tab::Attach));
    let console = controller.console.filtered();
    assert!(console.iter().any(|entry| entry.message.contains("session ended")));
    Ok(())
}

#[tokio::test]
async fn console_view_survives_session_death() -> anyhow::Result<()> {
    let backend = Arc::new(ManualBackend::new());
    let controller = Controller::new(&spec_config(), Arc::clone(&backend) as Arc<dyn Backend>);
    let capture = TabCapture::new();
    controller.actions.set_tab_switch(capture.callback());
    controller.actions.note_current_tab(Tab::Console);

    controller.lifecycle.attach("manual", 4242).await?;
    backend.inject_dead(MANUAL_SESSION, "target exited");

    for _ in 0..200 {
        if controller.lifecycle.phase() == Phase::Idle {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(controller.actions.current_tab(), Tab::Console);
    assert!(capture.switches().is_empty());
    Ok(())
}

#[tokio::test]
async fn reattach_after_death_works() -> anyhow::Result<()> {
    let backend = Arc::new(ManualBackend::new());
    let controller = Controller::new(&spec_config(), Arc::clone(&backend) as Arc<dyn Backend>);

    controller.lifecycle.attach("manual", 4242).await?;
    backend.inject_dead(MANUAL_SESSION, "first death");
    for _ in 0..200 {
        if controller.lifecycle.phase() == Phase::Idle {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    // The broker subscription survived; a new attach is immediately usable.
    controller.lifecycle.attach("manual", 4242).await?;
    assert_eq!(controller.lifecycle.phase(), Phase::ScriptLoaded);
    assert!(controller.broker.is_started());
    Ok(())
}
