// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Composition root — shared by `main` and the end-to-end specs.
//!
//! Builds the store graph around a backend, wires the teardown
//! reconciliation hooks, and (for the binary) drives an attach from the CLI
//! arguments until ctrl-c.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::action::ActionRouter;
use crate::backend::{Backend, DetachedBackend, LoopbackBackend};
use crate::broker::{EventSubscription, RpcBroker};
use crate::config::Config;
use crate::console::ConsoleStore;
use crate::layout::LayoutStore;
use crate::library::LibraryStore;
use crate::lifecycle::SessionLifecycle;
use crate::shortcut::ShortcutManager;

/// The host controller: every store and engine, wired together.
pub struct Controller {
    pub backend: Arc<dyn Backend>,
    pub broker: Arc<RpcBroker>,
    pub lifecycle: Arc<SessionLifecycle>,
    pub actions: Arc<ActionRouter>,
    pub library: Arc<LibraryStore>,
    pub console: Arc<ConsoleStore>,
    pub layout: Arc<LayoutStore>,
    pub shortcuts: Arc<ShortcutManager>,
    console_listener: Mutex<Option<EventSubscription>>,
    monitor: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl Controller {
    /// Build and start the controller over the given backend.
    pub fn new(config: &Config, backend: Arc<dyn Backend>) -> Arc<Self> {
        let broker = Arc::new(
            RpcBroker::new(Arc::clone(&backend)).with_default_timeout(config.request_timeout()),
        );
        let lifecycle = Arc::new(SessionLifecycle::new(Arc::clone(&backend), Arc::clone(&broker)));
        let actions = Arc::new(ActionRouter::new());
        let library = LibraryStore::new(if config.detached { None } else { config.library_path() });
        let console =
            Arc::new(ConsoleStore::with_capacity(config.console_capacity, crate::console::MAX_HOOK_ENTRIES));
        let layout = Arc::new(LayoutStore::new(if config.detached { None } else { config.layout_path() }));
        let shortcuts = Arc::new(ShortcutManager::new());

        broker.start();
        let console_listener = console.start_event_listener(&broker);
        let monitor = lifecycle.spawn_monitor();

        // Session teardown reconciles the UI: drop per-session work, route
        // back to the attach tab, and tell the user why.
        {
            let actions = Arc::clone(&actions);
            let console_hook = Arc::clone(&console);
            lifecycle.on_teardown(move |reason| {
                console_hook.warn(format!("session ended: {reason}"));
                actions.reconcile_on_detach();
            });
        }

        Arc::new(Self {
            backend,
            broker,
            lifecycle,
            actions,
            library,
            console,
            layout,
            shortcuts,
            console_listener: Mutex::new(Some(console_listener)),
            monitor: Mutex::new(Some(monitor)),
        })
    }

    /// Orderly shutdown: detach, stop the broker, flush persisted state.
    pub async fn shutdown(&self) {
        if let Err(e) = self.lifecycle.detach().await {
            warn!(error = %e, "detach during shutdown failed");
        }
        if let Some(listener) = self.console_listener.lock().take() {
            listener.cancel();
        }
        self.broker.stop();
        if let Some(monitor) = self.monitor.lock().take() {
            monitor.abort();
        }
        self.library.flush();
    }
}

/// Initialise tracing from the config.
pub fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_new(&config.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if config.log_format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Run the headless controller until ctrl-c.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let backend: Arc<dyn Backend> = if config.detached {
        Arc::new(DetachedBackend::new())
    } else {
        Arc::new(LoopbackBackend::new())
    };
    info!(hosted = backend.is_hosted(), "backend ready");

    let controller = Controller::new(&config, backend);
    let version = controller.backend.version().await.unwrap_or_else(|_| "unknown".to_owned());
    info!(version = %version, "controller started");

    if let Some(pid) = config.pid {
        let session = controller.lifecycle.attach(&config.device, pid).await?;
        info!(session_id = session.session_id, pid, "attached to target");
        let reply = controller.lifecycle.request("ping", None).await?;
        info!(reply = %reply, "agent is answering");
    }

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    controller.shutdown().await;
    Ok(())
}
