//! Filesystem store for rendered artifacts.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use crate::manifest::Manifest;

/// Errors that can occur while writing or pruning artifacts.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("manifest serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Normalize a route to the `/segment/segment/` form used as the store key.
pub fn normalize_route(route: &str) -> String {
    let trimmed = route.trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{trimmed}/")
    }
}

/// Writes rendered HTML into an output directory keyed by route.
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Filesystem location of a route's artifact.
    ///
    /// `/` maps to `index.html`; `/about/` maps to `about/index.html`.
    pub fn artifact_path(&self, route: &str) -> PathBuf {
        let normalized = normalize_route(route);
        let trimmed = normalized.trim_matches('/');

        if trimmed.is_empty() {
            self.root.join("index.html")
        } else {
            let mut path = self.root.clone();
            for segment in trimmed.split('/') {
                path.push(segment);
            }
            path.join("index.html")
        }
    }

    /// Write a route's HTML, creating parent directories as needed.
    pub fn write(&self, route: &str, html: &str) -> Result<PathBuf, StoreError> {
        let path = self.artifact_path(route);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| StoreError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        fs::write(&path, html).map_err(|e| StoreError::Io {
            path: path.clone(),
            source: e,
        })?;

        tracing::debug!("wrote {} ({} bytes)", path.display(), html.len());

        Ok(path)
    }

    /// Hex SHA-256 of an HTML body, as recorded in the manifest.
    pub fn content_hash(html: &str) -> String {
        let digest = Sha256::digest(html.as_bytes());
        digest.iter().fold(String::with_capacity(64), |mut acc, b| {
            use std::fmt::Write;
            let _ = write!(acc, "{b:02x}");
            acc
        })
    }

    /// Delete artifacts for routes that are no longer live, along with
    /// manifest entries and now-empty directories. Also sweeps artifacts
    /// on disk that neither the manifest nor the live set knows about
    /// (leftovers of an interrupted run).
    pub fn prune(
        &self,
        live: &BTreeSet<String>,
        manifest: &mut Manifest,
    ) -> Result<usize, StoreError> {
        let mut removed = 0;

        let dead: Vec<String> = manifest
            .entries
            .keys()
            .filter(|route| !live.contains(*route))
            .cloned()
            .collect();

        for route in dead {
            let path = self.artifact_path(&route);
            if path.exists() {
                fs::remove_file(&path).map_err(|e| StoreError::Io {
                    path: path.clone(),
                    source: e,
                })?;
                removed += 1;
            }
            manifest.remove(&route);
            self.remove_empty_parents(&path);
            tracing::info!("pruned {}", route);
        }

        for orphan in self.orphans(manifest, live) {
            fs::remove_file(&orphan).map_err(|e| StoreError::Io {
                path: orphan.clone(),
                source: e,
            })?;
            removed += 1;
            self.remove_empty_parents(&orphan);
            tracing::info!("pruned orphan {}", orphan.display());
        }

        Ok(removed)
    }

    /// Artifacts present on disk but unknown to both the manifest and the
    /// live route set.
    fn orphans(&self, manifest: &Manifest, live: &BTreeSet<String>) -> Vec<PathBuf> {
        let mut orphans = Vec::new();

        if !self.root.exists() {
            return orphans;
        }

        for entry in WalkDir::new(&self.root).into_iter().filter_map(|e| e.ok()) {
            let path = entry.path();
            if !path.is_file() || path.file_name().and_then(|n| n.to_str()) != Some("index.html") {
                continue;
            }

            let route = self.route_for_path(path);
            if !live.contains(&route) && !manifest.entries.contains_key(&route) {
                orphans.push(path.to_path_buf());
            }
        }

        orphans
    }

    /// Inverse of [`ArtifactStore::artifact_path`].
    fn route_for_path(&self, path: &Path) -> String {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);

        match relative.parent() {
            Some(parent) if parent != Path::new("") => {
                normalize_route(&parent.to_string_lossy().replace('\\', "/"))
            }
            _ => "/".to_string(),
        }
    }

    fn remove_empty_parents(&self, path: &Path) {
        let mut current = path.parent();

        while let Some(dir) = current {
            if dir == self.root {
                break;
            }
            let empty = fs::read_dir(dir).map(|mut d| d.next().is_none()).unwrap_or(false);
            if !empty {
                break;
            }
            if fs::remove_dir(dir).is_err() {
                break;
            }
            current = dir.parent();
        }
    }

    /// Write `sitemap.xml` and `robots.txt` for the deployable directory.
    pub fn write_sitemap(
        &self,
        routes: &BTreeSet<String>,
        public_base: &str,
    ) -> Result<(), StoreError> {
        let base = public_base.trim_end_matches('/');

        let urls: Vec<String> = routes
            .iter()
            .map(|route| format!("  <url>\n    <loc>{base}{route}</loc>\n  </url>"))
            .collect();

        let sitemap = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
{}
</urlset>"#,
            urls.join("\n")
        );

        let sitemap_path = self.root.join("sitemap.xml");
        fs::write(&sitemap_path, sitemap).map_err(|e| StoreError::Io {
            path: sitemap_path,
            source: e,
        })?;

        let robots = format!("User-agent: *\nAllow: /\nSitemap: {base}/sitemap.xml\n");
        let robots_path = self.root.join("robots.txt");
        fs::write(&robots_path, robots).map_err(|e| StoreError::Io {
            path: robots_path,
            source: e,
        })?;

        Ok(())
    }
}
