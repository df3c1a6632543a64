//! Artifact store and render manifest.
//!
//! Rendered HTML lands in an output directory keyed by route, alongside a
//! JSON manifest recording when each route was generated and which content
//! items it depends on. The manifest is what makes incremental runs
//! incremental: a route is only re-rendered when one of its items moved
//! past the recorded generation time.

pub mod manifest;
pub mod store;

pub use manifest::{Manifest, ManifestEntry, MANIFEST_FILE};
pub use store::{normalize_route, ArtifactStore, StoreError};
