//! Render manifest: per-route generation metadata plus the content index.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use kiln_content::{ContentIndex, ContentItem, Timestamp};

use crate::store::StoreError;

/// Manifest file name inside the output directory. Dotted so a plain file
/// copy deploy ships it without it showing up next to the pages.
pub const MANIFEST_FILE: &str = ".kiln.json";

/// Generation metadata for one rendered route.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// When the artifact was written, UTC.
    pub generated_at: Timestamp,

    /// SHA-256 of the HTML body, hex.
    pub content_hash: String,

    /// Keys of the content items this route depends on.
    #[serde(default)]
    pub sources: Vec<String>,
}

/// State carried between runs: one entry per rendered route, plus the
/// content index the next diff runs against.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub entries: BTreeMap<String, ManifestEntry>,

    #[serde(default)]
    pub index: ContentIndex,
}

impl Manifest {
    /// Load the manifest from an output directory. An absent file is an
    /// empty manifest, not an error.
    pub fn load(root: &Path) -> Result<Self, StoreError> {
        let path = root.join(MANIFEST_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(&path).map_err(|e| StoreError::Io {
            path: path.clone(),
            source: e,
        })?;

        serde_json::from_str(&raw).map_err(StoreError::Serialize)
    }

    /// Save atomically: write a temp file, then rename over the target.
    pub fn save(&self, root: &Path) -> Result<(), StoreError> {
        fs::create_dir_all(root).map_err(|e| StoreError::Io {
            path: root.to_path_buf(),
            source: e,
        })?;

        let path = root.join(MANIFEST_FILE);
        let tmp = root.join(format!("{MANIFEST_FILE}.tmp"));

        let json = serde_json::to_string_pretty(self).map_err(StoreError::Serialize)?;

        fs::write(&tmp, json).map_err(|e| StoreError::Io {
            path: tmp.clone(),
            source: e,
        })?;
        fs::rename(&tmp, &path).map_err(|e| StoreError::Io {
            path: path.clone(),
            source: e,
        })?;

        Ok(())
    }

    /// A route is stale iff it has no entry, or any associated item was
    /// modified after the entry was generated.
    pub fn is_stale(&self, route: &str, items: &[&ContentItem]) -> bool {
        match self.entries.get(route) {
            None => true,
            Some(entry) => items.iter().any(|item| item.modified > entry.generated_at),
        }
    }

    /// Record a freshly written artifact.
    pub fn record(&mut self, route: &str, content_hash: String, sources: Vec<String>) {
        self.entries.insert(
            route.to_string(),
            ManifestEntry {
                generated_at: Timestamp::now(),
                content_hash,
                sources,
            },
        );
    }

    pub fn remove(&mut self, route: &str) {
        self.entries.remove(route);
    }
}
