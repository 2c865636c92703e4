// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Library persistence: load/save the single JSON document with atomic
//! writes.

use std::path::Path;

use super::LibraryDocument;

/// Load the library document from a JSON file.
pub fn load_document(path: &Path) -> anyhow::Result<LibraryDocument> {
    let contents = std::fs::read_to_string(path)?;
    let document: LibraryDocument = serde_json::from_str(&contents)?;
    Ok(document)
}

/// Save the library document atomically (write tmp + rename).
pub fn save_document(path: &Path, document: &LibraryDocument) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(document)?;
    let tmp_path = path.with_extension("tmp");
    std::fs::write(&tmp_path, json)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}
