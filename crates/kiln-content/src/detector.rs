//! Change detection between content fetches.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::model::{ContentItem, Timestamp};

/// What changed between the persisted index and a fresh fetch.
#[derive(Debug, Default)]
pub struct ChangeSet {
    /// Items not present in the index.
    pub created: Vec<ContentItem>,

    /// Items whose last-modified timestamp advanced.
    pub updated: Vec<ContentItem>,

    /// Keys present in the index but missing from the fetch.
    pub deleted: Vec<String>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.updated.is_empty() && self.deleted.is_empty()
    }

    pub fn len(&self) -> usize {
        self.created.len() + self.updated.len() + self.deleted.len()
    }

    /// Items that need rendering. Deletions are handled by pruning, not here.
    pub fn renderable(&self) -> impl Iterator<Item = &ContentItem> {
        self.created.iter().chain(self.updated.iter())
    }
}

/// Persisted map of item key to the last-modified timestamp seen for it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContentIndex {
    #[serde(default)]
    entries: BTreeMap<String, Timestamp>,
}

impl ContentIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Diff a full fetch against the index.
    ///
    /// An unchanged timestamp is no change, and a timestamp older than the
    /// indexed one is not a change either.
    pub fn diff(&self, items: &[ContentItem]) -> ChangeSet {
        let mut changes = ChangeSet::default();
        let mut seen = BTreeSet::new();

        for item in items {
            let key = item.key();
            seen.insert(key.clone());

            match self.entries.get(&key) {
                None => changes.created.push(item.clone()),
                Some(previous) if item.modified > *previous => {
                    changes.updated.push(item.clone())
                }
                Some(_) => {}
            }
        }

        changes.deleted = self
            .entries
            .keys()
            .filter(|key| !seen.contains(*key))
            .cloned()
            .collect();

        changes
    }

    /// Replace the index with the state of a full fetch.
    pub fn apply(&mut self, items: &[ContentItem]) {
        self.apply_except(items, &BTreeSet::new());
    }

    /// Replace the index with the state of a full fetch, except for items
    /// in `skip`: those keep their previous entry (or stay absent) so the
    /// next diff reports them again.
    pub fn apply_except(&mut self, items: &[ContentItem], skip: &BTreeSet<String>) {
        let mut next = BTreeMap::new();

        for item in items {
            let key = item.key();
            if skip.contains(&key) {
                if let Some(previous) = self.entries.get(&key) {
                    next.insert(key, *previous);
                }
            } else {
                next.insert(key, item.modified);
            }
        }

        self.entries = next;
    }
}
