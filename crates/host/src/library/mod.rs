// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Content library: entries and folders with tags, stars, search, sort,
//! import/export, and disk persistence.
//!
//! The store is the sole writer of the library document.  Every mutation
//! advances `updated_at` and schedules a debounced save; shutdown calls
//! [`LibraryStore::flush`] so nothing outstanding is lost.  In browser-only
//! mode (no path) persistence is a no-op and everything lives in memory.

pub mod persist;
pub mod query;

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::{Arc, Weak};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

pub use query::{LibraryQuery, SortBy, SortOrder};

/// Coalescing window for scheduled saves.
pub const SAVE_DEBOUNCE: Duration = Duration::from_millis(200);

/// What an entry bookmarks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    Function,
    Address,
    Class,
    Symbol,
    Module,
    Method,
    MemoryRegion,
    Watch,
    Hook,
}

impl EntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Address => "address",
            Self::Class => "class",
            Self::Symbol => "symbol",
            Self::Module => "module",
            Self::Method => "method",
            Self::MemoryRegion => "memory_region",
            Self::Watch => "watch",
            Self::Hook => "hook",
        }
    }
}

/// A saved target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryEntry {
    pub id: String,
    #[serde(rename = "type")]
    pub entry_type: EntryType,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder_id: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub tags: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default)]
    pub starred: bool,
    pub created_at: u64,
    pub updated_at: u64,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, Value>,
}

/// A folder grouping entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryFolder {
    pub id: String,
    pub name: String,
    pub created_at: u64,
}

/// The persisted document: everything the library owns.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LibraryDocument {
    #[serde(default)]
    pub entries: IndexMap<String, LibraryEntry>,
    #[serde(default)]
    pub folders: IndexMap<String, LibraryFolder>,
}

/// Input for a new entry.
#[derive(Debug, Clone, Default)]
pub struct EntryDraft {
    pub name: String,
    pub address: Option<String>,
    pub module: Option<String>,
    pub folder_id: Option<String>,
    pub tags: Vec<String>,
    pub notes: Option<String>,
    pub metadata: serde_json::Map<String, Value>,
}

/// Fields `update_entry` may change; `None` leaves a field alone.
#[derive(Debug, Clone, Default)]
pub struct EntryPatch {
    pub name: Option<String>,
    pub address: Option<String>,
    pub module: Option<String>,
    pub metadata: Option<serde_json::Map<String, Value>>,
}

struct LibraryState {
    entries: IndexMap<String, LibraryEntry>,
    folders: IndexMap<String, LibraryFolder>,
    selection: Vec<String>,
    query: LibraryQuery,
    error: Option<String>,
}

/// The store.  Construct with [`LibraryStore::new`]; it loads the document
/// once and spawns the debounced saver when a path is configured.
pub struct LibraryStore {
    state: Mutex<LibraryState>,
    path: Option<PathBuf>,
    save_tx: Mutex<Option<mpsc::UnboundedSender<()>>>,
}

impl LibraryStore {
    pub fn new(path: Option<PathBuf>) -> Arc<Self> {
        let mut error = None;
        let document = match path.as_deref() {
            Some(p) if p.exists() => match persist::load_document(p) {
                Ok(document) => document,
                Err(e) => {
                    warn!(error = %e, "library load failed, starting empty");
                    error = Some(format!("library load failed: {e}"));
                    LibraryDocument::default()
                }
            },
            _ => LibraryDocument::default(),
        };

        let store = Arc::new(Self {
            state: Mutex::new(LibraryState {
                entries: document.entries,
                folders: document.folders,
                selection: Vec::new(),
                query: LibraryQuery::default(),
                error,
            }),
            path: path.clone(),
            save_tx: Mutex::new(None),
        });

        if let Some(path) = path {
            let (tx, rx) = mpsc::unbounded_channel();
            *store.save_tx.lock() = Some(tx);
            tokio::spawn(run_saver(Arc::downgrade(&store), path, rx));
        }
        store
    }

    /// Persistence failure recorded by the last load/save, if any.
    pub fn error(&self) -> Option<String> {
        self.state.lock().error.clone()
    }

    // -- Entries --------------------------------------------------------------

    pub fn add_entry(&self, entry_type: EntryType, draft: EntryDraft) -> String {
        let id = Uuid::new_v4().to_string();
        let now = now_ms();
        let entry = LibraryEntry {
            id: id.clone(),
            entry_type,
            name: draft.name,
            address: draft.address,
            module: draft.module,
            folder_id: draft.folder_id,
            tags: draft.tags.into_iter().collect(),
            notes: draft.notes,
            starred: false,
            created_at: now,
            updated_at: now,
            metadata: draft.metadata,
        };
        self.state.lock().entries.insert(id.clone(), entry);
        self.schedule_save();
        id
    }

    pub fn update_entry(&self, id: &str, patch: EntryPatch) -> bool {
        self.mutate_entry(id, |entry| {
            if let Some(name) = patch.name.clone() {
                entry.name = name;
            }
            if let Some(address) = patch.address.clone() {
                entry.address = Some(address);
            }
            if let Some(module) = patch.module.clone() {
                entry.module = Some(module);
            }
            if let Some(metadata) = patch.metadata.clone() {
                entry.metadata = metadata;
            }
        })
    }

    pub fn remove_entry(&self, id: &str) -> bool {
        let removed = {
            let mut state = self.state.lock();
            let removed = state.entries.shift_remove(id).is_some();
            state.selection.retain(|s| s != id);
            removed
        };
        if removed {
            self.schedule_save();
        }
        removed
    }

    pub fn toggle_star(&self, id: &str) -> bool {
        self.mutate_entry(id, |entry| entry.starred = !entry.starred)
    }

    pub fn add_tag(&self, id: &str, tag: &str) -> bool {
        let tag = tag.trim();
        if tag.is_empty() {
            return false;
        }
        self.mutate_entry(id, |entry| {
            entry.tags.insert(tag.to_owned());
        })
    }

    pub fn remove_tag(&self, id: &str, tag: &str) -> bool {
        self.mutate_entry(id, |entry| {
            entry.tags.remove(tag);
        })
    }

    pub fn set_notes(&self, id: &str, notes: Option<String>) -> bool {
        self.mutate_entry(id, |entry| entry.notes = notes.clone())
    }

    /// Move an entry into a folder (or to the root with `None`).  Fails when
    /// the folder does not exist.
    pub fn move_to_folder(&self, id: &str, folder_id: Option<String>) -> bool {
        {
            let state = self.state.lock();
            if let Some(ref folder_id) = folder_id {
                if !state.folders.contains_key(folder_id) {
                    return false;
                }
            }
        }
        self.mutate_entry(id, |entry| entry.folder_id = folder_id.clone())
    }

    pub fn entry(&self, id: &str) -> Option<LibraryEntry> {
        self.state.lock().entries.get(id).cloned()
    }

    pub fn entry_count(&self) -> usize {
        self.state.lock().entries.len()
    }

    // -- Folders --------------------------------------------------------------

    pub fn create_folder(&self, name: &str) -> String {
        let id = Uuid::new_v4().to_string();
        let folder = LibraryFolder { id: id.clone(), name: name.to_owned(), created_at: now_ms() };
        self.state.lock().folders.insert(id.clone(), folder);
        self.schedule_save();
        id
    }

    pub fn rename_folder(&self, id: &str, name: &str) -> bool {
        let renamed = {
            let mut state = self.state.lock();
            match state.folders.get_mut(id) {
                Some(folder) => {
                    folder.name = name.to_owned();
                    true
                }
                None => false,
            }
        };
        if renamed {
            self.schedule_save();
        }
        renamed
    }

    /// Remove a folder.  `delete_contents` cascades to its entries;
    /// otherwise they are reparented to the root.
    pub fn remove_folder(&self, id: &str, delete_contents: bool) -> bool {
        let removed = {
            let mut state = self.state.lock();
            if state.folders.shift_remove(id).is_none() {
                return false;
            }
            if delete_contents {
                let doomed: Vec<String> = state
                    .entries
                    .values()
                    .filter(|e| e.folder_id.as_deref() == Some(id))
                    .map(|e| e.id.clone())
                    .collect();
                for entry_id in &doomed {
                    state.entries.shift_remove(entry_id);
                    state.selection.retain(|s| s != entry_id);
                }
            } else {
                let now = now_ms();
                for entry in state.entries.values_mut() {
                    if entry.folder_id.as_deref() == Some(id) {
                        entry.folder_id = None;
                        entry.updated_at = now;
                    }
                }
            }
            true
        };
        if removed {
            self.schedule_save();
        }
        removed
    }

    pub fn folders(&self) -> Vec<LibraryFolder> {
        self.state.lock().folders.values().cloned().collect()
    }

    // -- Selection ------------------------------------------------------------

    /// Select an entry.  With `multi`, toggles membership; otherwise the
    /// selection becomes exactly this entry.
    pub fn select(&self, id: &str, multi: bool) {
        let mut state = self.state.lock();
        if !state.entries.contains_key(id) {
            return;
        }
        if multi {
            if state.selection.iter().any(|s| s == id) {
                state.selection.retain(|s| s != id);
            } else {
                state.selection.push(id.to_owned());
            }
        } else {
            state.selection = vec![id.to_owned()];
        }
    }

    pub fn clear_selection(&self) {
        self.state.lock().selection.clear();
    }

    pub fn selected(&self) -> Vec<String> {
        self.state.lock().selection.clone()
    }

    // -- Query ----------------------------------------------------------------

    pub fn set_filter_type(&self, filter: Option<EntryType>) {
        self.state.lock().query.filter_type = filter;
    }

    pub fn set_search(&self, search: &str) {
        self.state.lock().query.search = search.to_owned();
    }

    pub fn set_sort(&self, sort_by: SortBy, sort_order: SortOrder) {
        let mut state = self.state.lock();
        state.query.sort_by = sort_by;
        state.query.sort_order = sort_order;
    }

    /// The derived view under the current query.
    pub fn filtered(&self) -> Vec<LibraryEntry> {
        let state = self.state.lock();
        query::apply(&state.entries, &state.query)
    }

    // -- Import / export ------------------------------------------------------

    /// Snapshot the whole document.
    pub fn export(&self) -> LibraryDocument {
        let state = self.state.lock();
        LibraryDocument { entries: state.entries.clone(), folders: state.folders.clone() }
    }

    /// Import a document.  Everything gets fresh ids so an import never
    /// collides with existing data; timestamps are rewritten to now.
    /// Returns the number of imported entries.
    pub fn import(&self, document: LibraryDocument) -> usize {
        let now = now_ms();
        let mut imported = 0usize;
        {
            let mut state = self.state.lock();

            let mut folder_ids: IndexMap<String, String> = IndexMap::new();
            for (old_id, folder) in document.folders {
                let new_id = Uuid::new_v4().to_string();
                folder_ids.insert(old_id, new_id.clone());
                state.folders.insert(
                    new_id.clone(),
                    LibraryFolder { id: new_id, name: folder.name, created_at: now },
                );
            }

            for (_, mut entry) in document.entries {
                let new_id = Uuid::new_v4().to_string();
                entry.id = new_id.clone();
                entry.folder_id = entry
                    .folder_id
                    .and_then(|old| folder_ids.get(&old).cloned());
                entry.created_at = now;
                entry.updated_at = now;
                state.entries.insert(new_id, entry);
                imported += 1;
            }
        }
        self.schedule_save();
        imported
    }

    /// Drop every entry and folder.
    pub fn clear(&self) {
        {
            let mut state = self.state.lock();
            state.entries.clear();
            state.folders.clear();
            state.selection.clear();
        }
        self.schedule_save();
    }

    // -- Persistence ----------------------------------------------------------

    /// Write the document out immediately (shutdown path).
    pub fn flush(&self) {
        let Some(ref path) = self.path else {
            return;
        };
        self.save_now(path);
    }

    fn save_now(&self, path: &std::path::Path) {
        let document = self.export();
        match persist::save_document(path, &document) {
            Ok(()) => {
                self.state.lock().error = None;
                debug!(entries = document.entries.len(), "library saved");
            }
            Err(e) => {
                warn!(error = %e, "library save failed, continuing in memory");
                self.state.lock().error = Some(format!("library save failed: {e}"));
            }
        }
    }

    fn schedule_save(&self) {
        if let Some(ref tx) = *self.save_tx.lock() {
            let _ = tx.send(());
        }
    }

    fn mutate_entry(&self, id: &str, f: impl Fn(&mut LibraryEntry)) -> bool {
        let mutated = {
            let mut state = self.state.lock();
            match state.entries.get_mut(id) {
                Some(entry) => {
                    f(entry);
                    entry.updated_at = now_ms();
                    true
                }
                None => false,
            }
        };
        if mutated {
            self.schedule_save();
        }
        mutated
    }
}

async fn run_saver(
    store: Weak<LibraryStore>,
    path: PathBuf,
    mut rx: mpsc::UnboundedReceiver<()>,
) {
    while rx.recv().await.is_some() {
        tokio::time::sleep(SAVE_DEBOUNCE).await;
        // Coalesce everything that arrived during the window.
        while rx.try_recv().is_ok() {}
        let Some(store) = store.upgrade() else {
            break;
        };
        store.save_now(&path);
    }
}

fn now_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
