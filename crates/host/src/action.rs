// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cross-tab action router.
//!
//! "Act on this target" flows between views as message passing: the router
//! resolves the destination tab, fires the registered tab-switch callback,
//! and parks the action in a single pending slot that the destination view
//! consumes on activation.  A small recent-items ring backs quick recall.

use std::collections::VecDeque;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Capacity of the recent-items ring.
pub const RECENT_CAPACITY: usize = 20;

/// What the user asked to do with a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    ReadMemory,
    HookFunction,
    ViewModule,
    ViewClass,
}

/// Destination views.  `Console` and `Settings` are always available and
/// survive session teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tab {
    Attach,
    Memory,
    Hooks,
    Modules,
    Classes,
    Scanner,
    Watches,
    Library,
    Console,
    Settings,
}

impl Tab {
    /// Tabs that stay usable without a live session.
    pub fn always_available(&self) -> bool {
        matches!(self, Self::Console | Self::Settings)
    }
}

impl ActionKind {
    /// Fixed destination mapping.
    pub fn destination(&self) -> Tab {
        match self {
            Self::ReadMemory => Tab::Memory,
            Self::HookFunction => Tab::Hooks,
            Self::ViewModule => Tab::Modules,
            Self::ViewClass => Tab::Classes,
        }
    }
}

/// The target an action refers to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionTarget {
    pub address: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub target_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// One queued navigation action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetAction {
    pub kind: ActionKind,
    pub target: ActionTarget,
    pub timestamp_ms: u64,
}

type TabSwitch = Box<dyn Fn(Tab) + Send + Sync>;

struct RouterState {
    pending: Option<TargetAction>,
    recent: VecDeque<TargetAction>,
    current_tab: Tab,
}

/// The router itself: one pending slot, one switch callback, one ring.
pub struct ActionRouter {
    state: Mutex<RouterState>,
    tab_switch: Mutex<Option<TabSwitch>>,
}

impl ActionRouter {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RouterState {
                pending: None,
                recent: VecDeque::new(),
                current_tab: Tab::Attach,
            }),
            tab_switch: Mutex::new(None),
        }
    }

    /// Register the tab-switch callback (the windowing layer's hook).
    pub fn set_tab_switch(&self, callback: impl Fn(Tab) + Send + Sync + 'static) {
        *self.tab_switch.lock() = Some(Box::new(callback));
    }

    /// Record a direct tab change so teardown reconciliation knows where the
    /// user is.
    pub fn note_current_tab(&self, tab: Tab) {
        self.state.lock().current_tab = tab;
    }

    pub fn current_tab(&self) -> Tab {
        self.state.lock().current_tab
    }

    /// Queue an action: resolve the tab, switch, park the action.  A newer
    /// action overwrites an unconsumed one.
    pub fn queue_action(&self, kind: ActionKind, target: ActionTarget) {
        let action = TargetAction { kind, target, timestamp_ms: now_ms() };
        let tab = kind.destination();
        {
            let mut state = self.state.lock();
            remember(&mut state.recent, &action);
            state.pending = Some(action);
            state.current_tab = tab;
        }
        if let Some(ref switch) = *self.tab_switch.lock() {
            switch(tab);
        }
    }

    /// Take the pending action, if any.  Consuming clears the slot.
    pub fn consume_pending_action(&self) -> Option<TargetAction> {
        self.state.lock().pending.take()
    }

    /// Recent actions, newest first, deduplicated by (address, target type).
    pub fn recent(&self) -> Vec<TargetAction> {
        self.state.lock().recent.iter().cloned().collect()
    }

    /// Route back to the attach tab after session loss, unless the user is
    /// on an always-available view.
    pub fn reconcile_on_detach(&self) {
        let needs_switch = {
            let mut state = self.state.lock();
            state.pending = None;
            if state.current_tab.always_available() {
                false
            } else {
                state.current_tab = Tab::Attach;
                true
            }
        };
        if needs_switch {
            if let Some(ref switch) = *self.tab_switch.lock() {
                switch(Tab::Attach);
            }
        }
    }
}

impl Default for ActionRouter {
    fn default() -> Self {
        Self::new()
    }
}

fn remember(recent: &mut VecDeque<TargetAction>, action: &TargetAction) {
    recent.retain(|a| {
        !(a.target.address == action.target.address
            && a.target.target_type == action.target.target_type)
    });
    recent.push_front(action.clone());
    recent.truncate(RECENT_CAPACITY);
}

fn now_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
}

#[cfg(test)]
#[path = "action_tests.rs"]
mod tests;
