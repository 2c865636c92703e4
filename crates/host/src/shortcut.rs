// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Keyboard-shortcut engine.
//!
//! Chords are written `"mod+shift+k"`; `mod` resolves to the platform's
//! primary modifier (Command on Apple platforms, Control elsewhere).
//! Dispatch walks registrations in order and fires the first match.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

/// Which primary modifier `mod` maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    MacLike,
    Other,
}

impl Platform {
    /// The platform this build runs on.
    pub fn current() -> Self {
        if cfg!(any(target_os = "macos", target_os = "ios")) {
            Self::MacLike
        } else {
            Self::Other
        }
    }
}

/// A parse failure, carrying the offending chord text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChordParseError(pub String);

impl fmt::Display for ChordParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid shortcut: {}", self.0)
    }
}

impl std::error::Error for ChordParseError {}

/// A fully resolved chord: exact modifier set plus a single key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chord {
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
    pub meta: bool,
    pub key: String,
}

impl Chord {
    /// Parse `"mod+shift+k"` grammar.  Exactly one non-modifier token is
    /// required.
    pub fn parse(spec: &str, platform: Platform) -> Result<Self, ChordParseError> {
        let mut chord = Self { ctrl: false, alt: false, shift: false, meta: false, key: String::new() };
        for token in spec.split('+') {
            let token = token.trim().to_lowercase();
            match token.as_str() {
                "" => return Err(ChordParseError(spec.to_owned())),
                "mod" => match platform {
                    Platform::MacLike => chord.meta = true,
                    Platform::Other => chord.ctrl = true,
                },
                "ctrl" | "control" => chord.ctrl = true,
                "alt" | "option" => chord.alt = true,
                "shift" => chord.shift = true,
                "meta" | "cmd" | "command" => chord.meta = true,
                key => {
                    if !chord.key.is_empty() {
                        return Err(ChordParseError(spec.to_owned()));
                    }
                    chord.key = key.to_owned();
                }
            }
        }
        if chord.key.is_empty() {
            return Err(ChordParseError(spec.to_owned()));
        }
        Ok(chord)
    }

    /// Exact match against a key event (modifiers compared strictly).
    pub fn matches(&self, event: &KeyEvent) -> bool {
        self.ctrl == event.ctrl
            && self.alt == event.alt
            && self.shift == event.shift
            && self.meta == event.meta
            && self.key == event.key.to_lowercase()
    }
}

/// A key press as delivered by the windowing layer.
#[derive(Debug, Clone, Default)]
pub struct KeyEvent {
    pub key: String,
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
    pub meta: bool,
    /// Whether an editable element had focus.
    pub from_editable: bool,
}

/// Per-registration behavior flags.
#[derive(Debug, Clone, Copy)]
pub struct ShortcutOptions {
    /// Skip this handler while an editable element has focus.
    pub ignore_when_editing: bool,
    /// Ask the windowing layer to swallow the event.  On by default.
    pub prevent_default: bool,
}

impl Default for ShortcutOptions {
    fn default() -> Self {
        Self { ignore_when_editing: false, prevent_default: true }
    }
}

/// What the windowing layer should do after dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub handled: bool,
    pub prevent_default: bool,
}

type ShortcutAction = Arc<dyn Fn() + Send + Sync>;

struct ShortcutEntry {
    id: u64,
    chord: Chord,
    options: ShortcutOptions,
    action: ShortcutAction,
}

/// The global dispatcher.
pub struct ShortcutManager {
    platform: Platform,
    entries: Arc<Mutex<Vec<ShortcutEntry>>>,
    next_id: AtomicU64,
}

impl ShortcutManager {
    pub fn new() -> Self {
        Self::for_platform(Platform::current())
    }

    pub fn for_platform(platform: Platform) -> Self {
        Self { platform, entries: Arc::new(Mutex::new(Vec::new())), next_id: AtomicU64::new(1) }
    }

    /// Register a chord.  The returned guard unregisters on drop.
    pub fn register(
        &self,
        spec: &str,
        options: ShortcutOptions,
        action: impl Fn() + Send + Sync + 'static,
    ) -> Result<ShortcutHandle, ChordParseError> {
        let chord = Chord::parse(spec, self.platform)?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.entries.lock().push(ShortcutEntry {
            id,
            chord,
            options,
            action: Arc::new(action),
        });
        Ok(ShortcutHandle { id, entries: Arc::downgrade(&self.entries) })
    }

    /// Dispatch a key event to the first matching registration.
    pub fn dispatch(&self, event: &KeyEvent) -> DispatchOutcome {
        let matched: Option<(ShortcutAction, ShortcutOptions)> = {
            let entries = self.entries.lock();
            entries
                .iter()
                .filter(|entry| !(entry.options.ignore_when_editing && event.from_editable))
                .find(|entry| entry.chord.matches(event))
                .map(|entry| (Arc::clone(&entry.action), entry.options))
        };
        match matched {
            Some((action, options)) => {
                action();
                DispatchOutcome { handled: true, prevent_default: options.prevent_default }
            }
            None => DispatchOutcome { handled: false, prevent_default: false },
        }
    }
}

impl Default for ShortcutManager {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII registration handle.
pub struct ShortcutHandle {
    id: u64,
    entries: Weak<Mutex<Vec<ShortcutEntry>>>,
}

impl Drop for ShortcutHandle {
    fn drop(&mut self) {
        if let Some(entries) = self.entries.upgrade() {
            entries.lock().retain(|entry| entry.id != self.id);
        }
    }
}

#[cfg(test)]
#[path = "shortcut_tests.rs"]
mod tests;
