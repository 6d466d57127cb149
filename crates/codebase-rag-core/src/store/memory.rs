//! In-memory [`CollectionStore`] for tests.
//!
//! Collections live in a `HashMap` behind a `std::sync::RwLock`; records
//! keep insertion order (an overwrite keeps the original slot). Queries are
//! brute-force cosine distance over the records whose vector length
//! matches the query; the rest are skipped with a warning.

use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::embedding::cosine_distance;
use crate::models::{CollectionInfo, QueryHit, Record};

use super::{rank_hits, CollectionStore};

struct MemCollection {
    description: String,
    created_at: DateTime<Utc>,
    records: Vec<Record>,
}

impl MemCollection {
    fn info(&self, name: &str) -> CollectionInfo {
        CollectionInfo {
            name: name.to_string(),
            description: self.description.clone(),
            record_count: self.records.len() as u64,
            created_at: self.created_at,
        }
    }
}

#[derive(Default)]
pub struct InMemoryStore {
    collections: RwLock<HashMap<String, MemCollection>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T) -> anyhow::Error {
    anyhow!("in-memory store lock poisoned")
}

#[async_trait]
impl CollectionStore for InMemoryStore {
    async fn create_or_open(&self, name: &str, description: &str) -> Result<CollectionInfo> {
        let mut collections = self.collections.write().map_err(poisoned)?;
        let coll = collections
            .entry(name.to_string())
            .or_insert_with(|| MemCollection {
                description: description.to_string(),
                created_at: Utc::now(),
                records: Vec::new(),
            });
        Ok(coll.info(name))
    }

    async fn delete(&self, name: &str) -> Result<()> {
        self.collections.write().map_err(poisoned)?.remove(name);
        Ok(())
    }

    async fn add(&self, collection: &str, records: &[Record]) -> Result<()> {
        let mut collections = self.collections.write().map_err(poisoned)?;
        let Some(coll) = collections.get_mut(collection) else {
            bail!("collection '{}' does not exist", collection);
        };
        for record in records {
            match coll.records.iter_mut().find(|r| r.id == record.id) {
                Some(existing) => *existing = record.clone(),
                None => coll.records.push(record.clone()),
            }
        }
        Ok(())
    }

    async fn query(&self, collection: &str, vector: &[f32], top_k: usize) -> Result<Vec<QueryHit>> {
        let collections = self.collections.read().map_err(poisoned)?;
        let Some(coll) = collections.get(collection) else {
            return Ok(Vec::new());
        };
        let (matching, mismatched): (Vec<&Record>, Vec<&Record>) = coll
            .records
            .iter()
            .partition(|r| r.embedding.len() == vector.len());
        if !mismatched.is_empty() {
            tracing::warn!(
                collection,
                skipped = mismatched.len(),
                query_dims = vector.len(),
                "skipping records embedded with a different dimensionality"
            );
        }
        let hits = matching
            .into_iter()
            .map(|r| QueryHit {
                id: r.id.clone(),
                text: r.text.clone(),
                metadata: r.metadata.clone(),
                distance: cosine_distance(vector, &r.embedding),
            })
            .collect();
        Ok(rank_hits(hits, top_k))
    }

    async fn count(&self, collection: &str) -> Result<u64> {
        let collections = self.collections.read().map_err(poisoned)?;
        Ok(collections
            .get(collection)
            .map(|c| c.records.len() as u64)
            .unwrap_or(0))
    }

    async fn list(&self) -> Result<Vec<CollectionInfo>> {
        let collections = self.collections.read().map_err(poisoned)?;
        let mut infos: Vec<_> = collections.iter().map(|(n, c)| c.info(n)).collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(infos)
    }
}
