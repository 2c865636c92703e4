// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Derived library view: `filter_type ∘ search ∘ sort`.

use std::cmp::Ordering;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::{EntryType, LibraryEntry};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    Name,
    Type,
    CreatedAt,
    UpdatedAt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    Desc,
}

/// Current filter/sort settings.
#[derive(Debug, Clone)]
pub struct LibraryQuery {
    pub filter_type: Option<EntryType>,
    pub search: String,
    pub sort_by: SortBy,
    pub sort_order: SortOrder,
}

impl Default for LibraryQuery {
    fn default() -> Self {
        Self {
            filter_type: None,
            search: String::new(),
            sort_by: SortBy::Name,
            sort_order: SortOrder::Asc,
        }
    }
}

/// Apply the query to the entry map, returning a sorted snapshot.
pub fn apply(entries: &IndexMap<String, LibraryEntry>, query: &LibraryQuery) -> Vec<LibraryEntry> {
    let needle = query.search.trim().to_lowercase();
    let mut out: Vec<LibraryEntry> = entries
        .values()
        .filter(|entry| query.filter_type.is_none_or(|t| entry.entry_type == t))
        .filter(|entry| needle.is_empty() || matches(entry, &needle))
        .cloned()
        .collect();
    out.sort_by(|a, b| {
        let ordering = compare(a, b, query.sort_by);
        match query.sort_order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    });
    out
}

/// Case-insensitive substring match over name, address, module, tags, and
/// notes.
fn matches(entry: &LibraryEntry, needle: &str) -> bool {
    if entry.name.to_lowercase().contains(needle) {
        return true;
    }
    if entry.address.as_deref().is_some_and(|a| a.to_lowercase().contains(needle)) {
        return true;
    }
    if entry.module.as_deref().is_some_and(|m| m.to_lowercase().contains(needle)) {
        return true;
    }
    if entry.tags.iter().any(|tag| tag.to_lowercase().contains(needle)) {
        return true;
    }
    entry.notes.as_deref().is_some_and(|n| n.to_lowercase().contains(needle))
}

/// Name ordering folds case; full locale collation is out of scope.
fn compare(a: &LibraryEntry, b: &LibraryEntry, sort_by: SortBy) -> Ordering {
    let by_name = |x: &LibraryEntry, y: &LibraryEntry| {
        x.name.to_lowercase().cmp(&y.name.to_lowercase()).then_with(|| x.name.cmp(&y.name))
    };
    match sort_by {
        SortBy::Name => by_name(a, b),
        SortBy::Type => a
            .entry_type
            .as_str()
            .cmp(b.entry_type.as_str())
            .then_with(|| by_name(a, b)),
        SortBy::CreatedAt => a.created_at.cmp(&b.created_at).then_with(|| by_name(a, b)),
        SortBy::UpdatedAt => a.updated_at.cmp(&b.updated_at).then_with(|| by_name(a, b)),
    }
}
