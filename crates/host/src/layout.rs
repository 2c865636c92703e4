// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persisted layout preferences: panel sizes, open/closed flags, and the
//! selected right/bottom panel tabs.  Hydration is partial — fields missing
//! from disk take their defaults, so older documents keep working.

use std::path::PathBuf;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// File name under the data directory.
pub const LAYOUT_FILE: &str = "layout.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutPrefs {
    pub left_panel_width: f64,
    pub right_panel_width: f64,
    pub bottom_panel_height: f64,
    pub right_panel_open: bool,
    pub bottom_panel_open: bool,
    pub right_panel_tab: String,
    pub bottom_panel_tab: String,
}

impl Default for LayoutPrefs {
    fn default() -> Self {
        Self {
            left_panel_width: 260.0,
            right_panel_width: 320.0,
            bottom_panel_height: 220.0,
            right_panel_open: true,
            bottom_panel_open: true,
            right_panel_tab: "inspector".to_owned(),
            bottom_panel_tab: "console".to_owned(),
        }
    }
}

/// Store for the layout document.  Without a path (browser-only mode) the
/// preferences live in memory only.
pub struct LayoutStore {
    path: Option<PathBuf>,
    prefs: Mutex<LayoutPrefs>,
}

impl LayoutStore {
    pub fn new(path: Option<PathBuf>) -> Self {
        let prefs = match path.as_deref() {
            Some(p) if p.exists() => match std::fs::read_to_string(p) {
                Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|e| {
                    warn!(error = %e, "layout document unreadable, using defaults");
                    LayoutPrefs::default()
                }),
                Err(e) => {
                    warn!(error = %e, "layout document unreadable, using defaults");
                    LayoutPrefs::default()
                }
            },
            _ => LayoutPrefs::default(),
        };
        Self { path, prefs: Mutex::new(prefs) }
    }

    pub fn prefs(&self) -> LayoutPrefs {
        self.prefs.lock().clone()
    }

    /// Apply a change and persist it.
    pub fn update(&self, f: impl FnOnce(&mut LayoutPrefs)) {
        let snapshot = {
            let mut prefs = self.prefs.lock();
            f(&mut prefs);
            prefs.clone()
        };
        self.save(&snapshot);
    }

    fn save(&self, prefs: &LayoutPrefs) {
        let Some(ref path) = self.path else {
            return;
        };
        let result = (|| -> anyhow::Result<()> {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let json = serde_json::to_string_pretty(prefs)?;
            let tmp_path = path.with_extension("tmp");
            std::fs::write(&tmp_path, json)?;
            std::fs::rename(&tmp_path, path)?;
            Ok(())
        })();
        if let Err(e) = result {
            warn!(error = %e, "layout save failed");
        }
    }
}

#[cfg(test)]
#[path = "layout_tests.rs"]
mod tests;
