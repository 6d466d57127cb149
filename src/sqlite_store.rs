//! SQLite-backed [`CollectionStore`].
//!
//! Collections and records live in two tables (see [`crate::migrate`]).
//! Embeddings are stored as little-endian `f32` BLOBs and queried by a
//! brute-force cosine scan over the collection, which is adequate for the
//! few thousand chunks of a single project.
//!
//! Each record keeps its vector length in `dims`; a query only scores
//! records whose `dims` matches the query vector, and warns about the rest
//! (a collection ingested with a different embedding model).

use std::path::Path;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use codebase_rag_core::embedding::{blob_to_vec, cosine_distance, vec_to_blob};
use codebase_rag_core::models::{CollectionInfo, QueryHit, Record, RecordMetadata};
use codebase_rag_core::store::{rank_hits, CollectionStore};

use crate::{db, migrate};

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connects to the database at `path` and ensures the schema exists.
    pub async fn open(path: &Path) -> Result<Self> {
        let pool = db::connect(path).await?;
        migrate::run_migrations(&pool).await?;
        Ok(Self::new(pool))
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn exists(&self, name: &str) -> Result<bool> {
        let found: Option<String> =
            sqlx::query_scalar("SELECT name FROM collections WHERE name = ?")
                .bind(name)
                .fetch_optional(&self.pool)
                .await?;
        Ok(found.is_some())
    }
}

fn from_timestamp(ts: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(ts, 0).unwrap_or_default()
}

#[async_trait]
impl CollectionStore for SqliteStore {
    async fn create_or_open(&self, name: &str, description: &str) -> Result<CollectionInfo> {
        sqlx::query(
            "INSERT INTO collections (name, description, created_at) VALUES (?, ?, ?)
             ON CONFLICT(name) DO NOTHING",
        )
        .bind(name)
        .bind(description)
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await?;

        let row = sqlx::query(
            "SELECT c.name, c.description, c.created_at,
                    (SELECT COUNT(*) FROM records r WHERE r.collection = c.name) AS record_count
             FROM collections c WHERE c.name = ?",
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await?;

        Ok(CollectionInfo {
            name: row.get("name"),
            description: row.get("description"),
            record_count: row.get::<i64, _>("record_count") as u64,
            created_at: from_timestamp(row.get("created_at")),
        })
    }

    async fn delete(&self, name: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM records WHERE collection = ?")
            .bind(name)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM collections WHERE name = ?")
            .bind(name)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn add(&self, collection: &str, records: &[Record]) -> Result<()> {
        if !self.exists(collection).await? {
            bail!("collection '{}' does not exist", collection);
        }

        let mut tx = self.pool.begin().await?;
        for record in records {
            sqlx::query(
                r#"
                INSERT INTO records (collection, id, text, embedding, dims, file_path,
                                     chunk_index, file_extension, hash)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(collection, id) DO UPDATE SET
                    text = excluded.text,
                    embedding = excluded.embedding,
                    dims = excluded.dims,
                    file_path = excluded.file_path,
                    chunk_index = excluded.chunk_index,
                    file_extension = excluded.file_extension,
                    hash = excluded.hash
                "#,
            )
            .bind(collection)
            .bind(&record.id)
            .bind(&record.text)
            .bind(vec_to_blob(&record.embedding))
            .bind(record.embedding.len() as i64)
            .bind(&record.metadata.file_path)
            .bind(record.metadata.chunk_index as i64)
            .bind(&record.metadata.file_extension)
            .bind(&record.hash)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn query(&self, collection: &str, vector: &[f32], top_k: usize) -> Result<Vec<QueryHit>> {
        let rows = sqlx::query(
            "SELECT id, text, embedding, dims, file_path, chunk_index, file_extension
             FROM records WHERE collection = ? ORDER BY rowid",
        )
        .bind(collection)
        .fetch_all(&self.pool)
        .await?;

        let (matching, mismatched): (Vec<_>, Vec<_>) = rows
            .iter()
            .partition(|row| row.get::<i64, _>("dims") == vector.len() as i64);
        if !mismatched.is_empty() {
            tracing::warn!(
                collection,
                skipped = mismatched.len(),
                query_dims = vector.len(),
                stored_dims = mismatched[0].get::<i64, _>("dims"),
                "skipping records embedded with a different dimensionality; re-ingest with --force"
            );
        }

        let hits = matching
            .into_iter()
            .map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                QueryHit {
                    id: row.get("id"),
                    text: row.get("text"),
                    metadata: RecordMetadata {
                        file_path: row.get("file_path"),
                        chunk_index: row.get::<i64, _>("chunk_index") as usize,
                        file_extension: row.get("file_extension"),
                    },
                    distance: cosine_distance(vector, &blob_to_vec(&blob)),
                }
            })
            .collect();

        Ok(rank_hits(hits, top_k))
    }

    async fn count(&self, collection: &str) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM records WHERE collection = ?")
            .bind(collection)
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    async fn list(&self) -> Result<Vec<CollectionInfo>> {
        let rows = sqlx::query(
            "SELECT c.name, c.description, c.created_at, COUNT(r.id) AS record_count
             FROM collections c LEFT JOIN records r ON r.collection = c.name
             GROUP BY c.name ORDER BY c.name",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| CollectionInfo {
                name: row.get("name"),
                description: row.get("description"),
                record_count: row.get::<i64, _>("record_count") as u64,
                created_at: from_timestamp(row.get("created_at")),
            })
            .collect())
    }
}
