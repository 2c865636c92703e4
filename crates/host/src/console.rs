// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Console log store.
//!
//! A bounded ring of log entries with level/category/search filters, plus a
//! separate, smaller ring for interceptor hook-call events.  Both rings draw
//! ids from the same counter.  `start_event_listener` bridges the broker's
//! event stream into `event`-level entries.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{SecondsFormat, TimeZone, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::broker::{BrokerEvent, EventSubscription, RpcBroker};

/// Console ring capacity default.
pub const MAX_LOG_ENTRIES: usize = 1000;
/// Hook-call ring capacity.
pub const MAX_HOOK_ENTRIES: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
    Success,
    Debug,
    Event,
}

impl LogLevel {
    pub fn all() -> [LogLevel; 6] {
        [Self::Info, Self::Warn, Self::Error, Self::Success, Self::Debug, Self::Event]
    }

    fn export_tag(&self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Warn => "WARN",
            Self::Error => "ERROR",
            Self::Success => "SUCCESS",
            Self::Debug => "DEBUG",
            Self::Event => "EVENT",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogSource {
    User,
    Agent,
    System,
}

/// One console line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: u64,
    pub timestamp_ms: u64,
    pub level: LogLevel,
    pub source: LogSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Optional metadata on a log call.
#[derive(Debug, Clone, Default)]
pub struct LogMeta {
    pub source: Option<LogSource>,
    pub category: Option<String>,
    pub data: Option<Value>,
}

struct ConsoleState {
    logs: VecDeque<LogEntry>,
    hook_logs: VecDeque<LogEntry>,
    paused: bool,
    show_timestamps: bool,
    show_json: bool,
    selected_levels: HashSet<LogLevel>,
    category_filter: String,
    search: String,
}

/// The store.
pub struct ConsoleStore {
    state: Mutex<ConsoleState>,
    next_id: AtomicU64,
    capacity: usize,
    hook_capacity: usize,
}

impl ConsoleStore {
    pub fn new() -> Self {
        Self::with_capacity(MAX_LOG_ENTRIES, MAX_HOOK_ENTRIES)
    }

    pub fn with_capacity(capacity: usize, hook_capacity: usize) -> Self {
        Self {
            state: Mutex::new(ConsoleState {
                logs: VecDeque::new(),
                hook_logs: VecDeque::new(),
                paused: false,
                show_timestamps: true,
                show_json: false,
                selected_levels: LogLevel::all().into_iter().collect(),
                category_filter: String::new(),
                search: String::new(),
            }),
            next_id: AtomicU64::new(1),
            capacity: capacity.max(1),
            hook_capacity: hook_capacity.max(1),
        }
    }

    // -- Writing --------------------------------------------------------------

    pub fn log(&self, level: LogLevel, message: impl Into<String>, meta: LogMeta) {
        let entry = self.make_entry(level, message.into(), meta);
        let mut state = self.state.lock();
        if state.paused {
            return;
        }
        state.logs.push_back(entry);
        while state.logs.len() > self.capacity {
            state.logs.pop_front();
        }
    }

    pub fn info(&self, message: impl Into<String>) {
        self.log(LogLevel::Info, message, LogMeta::default());
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.log(LogLevel::Warn, message, LogMeta::default());
    }

    pub fn error(&self, message: impl Into<String>) {
        self.log(LogLevel::Error, message, LogMeta::default());
    }

    pub fn success(&self, message: impl Into<String>) {
        self.log(LogLevel::Success, message, LogMeta::default());
    }

    pub fn debug(&self, message: impl Into<String>) {
        self.log(LogLevel::Debug, message, LogMeta::default());
    }

    /// Record an interceptor call in the hook ring.  Hook entries share the
    /// console id space but live in their own, smaller ring.
    pub fn log_hook_call(&self, message: impl Into<String>, data: Option<Value>) {
        let entry = self.make_entry(
            LogLevel::Event,
            message.into(),
            LogMeta {
                source: Some(LogSource::Agent),
                category: Some("hook".to_owned()),
                data,
            },
        );
        let mut state = self.state.lock();
        if state.paused {
            return;
        }
        state.hook_logs.push_back(entry);
        while state.hook_logs.len() > self.hook_capacity {
            state.hook_logs.pop_front();
        }
    }

    fn make_entry(&self, level: LogLevel, message: String, meta: LogMeta) -> LogEntry {
        LogEntry {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            timestamp_ms: now_ms(),
            level,
            source: meta.source.unwrap_or(LogSource::System),
            category: meta.category,
            message,
            data: meta.data,
        }
    }

    // -- Controls -------------------------------------------------------------

    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.logs.clear();
    }

    /// While paused, new entries are dropped (not queued).
    pub fn pause(&self) {
        self.state.lock().paused = true;
    }

    pub fn resume(&self) {
        self.state.lock().paused = false;
    }

    pub fn is_paused(&self) -> bool {
        self.state.lock().paused
    }

    pub fn toggle_timestamps(&self) -> bool {
        let mut state = self.state.lock();
        state.show_timestamps = !state.show_timestamps;
        state.show_timestamps
    }

    pub fn toggle_json(&self) -> bool {
        let mut state = self.state.lock();
        state.show_json = !state.show_json;
        state.show_json
    }

    pub fn set_level_enabled(&self, level: LogLevel, enabled: bool) {
        let mut state = self.state.lock();
        if enabled {
            state.selected_levels.insert(level);
        } else {
            state.selected_levels.remove(&level);
        }
    }

    pub fn set_category_filter(&self, category: &str) {
        self.state.lock().category_filter = category.to_owned();
    }

    pub fn set_search(&self, search: &str) {
        self.state.lock().search = search.to_owned();
    }

    // -- Reading --------------------------------------------------------------

    pub fn len(&self) -> usize {
        self.state.lock().logs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().logs.is_empty()
    }

    pub fn hook_logs(&self) -> Vec<LogEntry> {
        self.state.lock().hook_logs.iter().cloned().collect()
    }

    /// The filtered view: level ∈ selected ∧ category matches ∧ search
    /// appears in message, category, or rendered data.
    pub fn filtered(&self) -> Vec<LogEntry> {
        let state = self.state.lock();
        let category_needle = state.category_filter.trim().to_lowercase();
        let search_needle = state.search.trim().to_lowercase();
        state
            .logs
            .iter()
            .filter(|entry| state.selected_levels.contains(&entry.level))
            .filter(|entry| {
                category_needle.is_empty()
                    || entry
                        .category
                        .as_deref()
                        .is_some_and(|c| c.to_lowercase().contains(&category_needle))
            })
            .filter(|entry| search_needle.is_empty() || search_matches(entry, &search_needle))
            .cloned()
            .collect()
    }

    /// Export all entries, one line each.
    pub fn export(&self) -> String {
        let state = self.state.lock();
        let mut out = String::new();
        for entry in &state.logs {
            out.push_str(&format!(
                "[{}] [{}] [{}] {}",
                iso_timestamp(entry.timestamp_ms),
                entry.level.export_tag(),
                entry.category.as_deref().unwrap_or(""),
                entry.message,
            ));
            if let Some(ref data) = entry.data {
                out.push_str(&format!(" | {data}"));
            }
            out.push('\n');
        }
        out
    }

    /// Bridge broker events into the console: `carf:event`s land at level
    /// `event`, raw agent chatter at `debug`.  Interceptor calls also feed
    /// the hook ring.
    pub fn start_event_listener(self: &Arc<Self>, broker: &RpcBroker) -> EventSubscription {
        let store = Arc::clone(self);
        broker.on_event(move |event| {
            match event {
                BrokerEvent::Event { name, fields } => {
                    let data = Value::Object(fields.clone());
                    if name == "interceptor_call" {
                        store.log_hook_call(name.clone(), Some(data.clone()));
                    }
                    store.log(
                        LogLevel::Event,
                        name.clone(),
                        LogMeta {
                            source: Some(LogSource::Agent),
                            category: Some("agent".to_owned()),
                            data: Some(data),
                        },
                    );
                }
                BrokerEvent::Raw { message } => {
                    store.log(
                        LogLevel::Debug,
                        message.to_string(),
                        LogMeta {
                            source: Some(LogSource::Agent),
                            category: Some("script".to_owned()),
                            data: None,
                        },
                    );
                }
            }
            Ok(())
        })
    }
}

impl Default for ConsoleStore {
    fn default() -> Self {
        Self::new()
    }
}

fn search_matches(entry: &LogEntry, needle: &str) -> bool {
    if entry.message.to_lowercase().contains(needle) {
        return true;
    }
    if entry.category.as_deref().is_some_and(|c| c.to_lowercase().contains(needle)) {
        return true;
    }
    entry
        .data
        .as_ref()
        .is_some_and(|d| d.to_string().to_lowercase().contains(needle))
}

fn iso_timestamp(timestamp_ms: u64) -> String {
    match Utc.timestamp_millis_opt(timestamp_ms as i64).single() {
        Some(ts) => ts.to_rfc3339_opts(SecondsFormat::Millis, true),
        None => timestamp_ms.to_string(),
    }
}

fn now_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
}

#[cfg(test)]
#[path = "console_tests.rs"]
mod tests;
