//! Collection store abstraction.
//!
//! The [`CollectionStore`] trait is the seam between the pipelines and the
//! persistent vector store. Every operation is keyed by collection name so
//! several collections (source code, documentation, ...) share one backend.
//!
//! # Operations
//!
//! | Method | Purpose |
//! |--------|---------|
//! | [`create_or_open`](CollectionStore::create_or_open) | Ensure a collection exists |
//! | [`delete`](CollectionStore::delete) | Drop a collection and all its records |
//! | [`add`](CollectionStore::add) | Insert records; same id overwrites |
//! | [`query`](CollectionStore::query) | Top-k by ascending cosine distance |
//! | [`count`](CollectionStore::count) | Number of records |
//! | [`list`](CollectionStore::list) | All stored collections |

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{CollectionInfo, QueryHit, Record};

#[async_trait]
pub trait CollectionStore: Send + Sync {
    /// Creates the collection if missing. An existing collection keeps its
    /// records and original description.
    async fn create_or_open(&self, name: &str, description: &str) -> Result<CollectionInfo>;

    /// Removes the collection and every record in it. Missing is not an error.
    async fn delete(&self, name: &str) -> Result<()>;

    /// Writes `records`, last write wins per id. Fails if the collection
    /// has not been created.
    async fn add(&self, collection: &str, records: &[Record]) -> Result<()>;

    /// Up to `top_k` hits ordered closest-first. Empty or missing
    /// collections return an empty list.
    async fn query(&self, collection: &str, vector: &[f32], top_k: usize) -> Result<Vec<QueryHit>>;

    /// Record count; 0 for a missing collection.
    async fn count(&self, collection: &str) -> Result<u64>;

    async fn list(&self) -> Result<Vec<CollectionInfo>>;
}

/// Sorts hits by ascending distance and keeps the first `top_k`.
///
/// Ties keep their incoming order, so results are deterministic for a
/// deterministic scan order.
pub fn rank_hits(mut hits: Vec<QueryHit>, top_k: usize) -> Vec<QueryHit> {
    hits.sort_by(|a, b| {
        a.distance
            .partial_cmp(&b.distance)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    hits.truncate(top_k);
    hits
}
