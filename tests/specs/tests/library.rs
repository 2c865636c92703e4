// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Library round trips: export → import with fresh ids, and persistence.

use std::time::{SystemTime, UNIX_EPOCH};

use carf::library::{EntryDraft, EntryType, LibraryDocument, LibraryStore};

fn draft(name: &str, tags: &[&str]) -> EntryDraft {
    EntryDraft {
        name: name.to_owned(),
        tags: tags.iter().map(|t| (*t).to_owned()).collect(),
        ..EntryDraft::default()
    }
}

fn now_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
}

#[tokio::test]
async fn export_import_round_trip_rewrites_ids() -> anyhow::Result<()> {
    let store = LibraryStore::new(None);
    let mut ids = Vec::new();
    ids.push(store.add_entry(EntryType::Function, draft("alpha", &["core"])));
    ids.push(store.add_entry(EntryType::Address, draft("beta", &["core", "hot"])));
    ids.push(store.add_entry(EntryType::Class, draft("gamma", &["ui"])));
    ids.push(store.add_entry(EntryType::Symbol, draft("delta", &[])));
    ids.push(store.add_entry(EntryType::Module, draft("epsilon", &[])));
    store.toggle_star(&ids[0]);
    store.toggle_star(&ids[2]);

    // Export through JSON, as the UI's file download would.
    let exported = serde_json::to_string(&store.export())?;

    store.clear();
    assert_eq!(store.entry_count(), 0);

    let import_time = now_ms();
    let document: LibraryDocument = serde_json::from_str(&exported)?;
    let imported = store.import(document);
    assert_eq!(imported, 5);
    assert_eq!(store.entry_count(), 5);

    let entries = store.filtered();
    assert_eq!(entries.iter().filter(|e| e.starred).count(), 2);
    assert!(entries.iter().all(|e| !ids.contains(&e.id)), "ids must be rewritten");
    assert!(entries.iter().all(|e| e.updated_at >= import_time));

    let Some(beta) = entries.iter().find(|e| e.name == "beta") else {
        anyhow::bail!("beta must survive the round trip");
    };
    assert!(beta.tags.contains("core") && beta.tags.contains("hot"));
    Ok(())
}

#[tokio::test]
async fn importing_twice_never_collides() -> anyhow::Result<()> {
    let store = LibraryStore::new(None);
    store.add_entry(EntryType::Function, draft("dup", &[]));
    let exported = store.export();

    store.import(exported.clone());
    store.import(exported);
    assert_eq!(store.entry_count(), 3);

    let mut seen = std::collections::HashSet::new();
    for entry in store.filtered() {
        assert!(seen.insert(entry.id.clone()), "duplicate id {}", entry.id);
    }
    Ok(())
}

#[tokio::test]
async fn reparenting_folder_removal_keeps_entries() -> anyhow::Result<()> {
    let store = LibraryStore::new(None);
    let folder = store.create_folder("session-notes");
    let id = store.add_entry(EntryType::Address, draft("hp", &[]));
    store.move_to_folder(&id, Some(folder.clone()));

    assert!(store.remove_folder(&folder, false));
    let Some(entry) = store.entry(&id) else {
        anyhow::bail!("entry must survive");
    };
    assert_eq!(entry.folder_id, None);
    Ok(())
}

#[tokio::test]
async fn library_persists_across_controllers() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("library.json");

    {
        let store = LibraryStore::new(Some(path.clone()));
        let id = store.add_entry(EntryType::Hook, draft("open-hook", &["persist"]));
        store.set_notes(&id, Some("attached at export open".to_owned()));
        store.flush();
    }

    let store = LibraryStore::new(Some(path));
    assert_eq!(store.entry_count(), 1);
    let entries = store.filtered();
    assert_eq!(entries[0].name, "open-hook");
    assert_eq!(entries[0].notes.as_deref(), Some("attached at export open"));
    Ok(())
}
