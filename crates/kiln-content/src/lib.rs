//! Content API client and change detection.
//!
//! This crate talks to a headless CMS over its JSON REST API, models the
//! content items kiln cares about, and diffs fetches against a persisted
//! index to work out what changed since the last run.

pub mod client;
pub mod detector;
pub mod model;

pub use client::{ClientConfig, ContentClient, FetchError};
pub use detector::{ChangeSet, ContentIndex};
pub use model::{ContentItem, ContentKind, Timestamp};
