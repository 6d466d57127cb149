//! Core data models that flow through ingestion and retrieval.
//!
//! A [`Chunk`] is a window of one source file. Once embedded it becomes a
//! [`Record`], the persisted unit of a collection. Queries return
//! [`QueryHit`]s ordered closest-first.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::chunk::TextWindow;
use crate::error::RagError;

/// A contiguous span of text extracted from one source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Path relative to the project root, `/`-separated.
    pub file_path: String,
    /// Zero-based position of this chunk within its file.
    pub chunk_index: usize,
    /// Length of `text` in characters (not bytes).
    pub char_len: usize,
    /// Extension including the leading dot, or empty.
    pub file_extension: String,
    pub text: String,
}

impl Chunk {
    pub fn from_window(file_path: &str, window: &TextWindow<'_>) -> Self {
        Self {
            file_path: file_path.to_string(),
            chunk_index: window.index,
            char_len: window.char_len,
            file_extension: file_extension(file_path),
            text: window.text.to_string(),
        }
    }

    /// Deterministic record identifier: same file, same index, same id.
    pub fn record_id(&self) -> String {
        record_id(&self.file_path, self.chunk_index)
    }
}

/// Builds the identifier for chunk `index` of `file_path`.
pub fn record_id(file_path: &str, index: usize) -> String {
    format!("{}_{}", file_path, index)
}

/// Returns the extension of `path` with its leading dot (`".ts"`), or `""`.
pub fn file_extension(path: &str) -> String {
    Path::new(path)
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default()
}

/// Metadata stored alongside every record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMetadata {
    pub file_path: String,
    pub chunk_index: usize,
    pub file_extension: String,
}

/// The persisted unit of a collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: String,
    pub text: String,
    pub embedding: Vec<f32>,
    pub metadata: RecordMetadata,
    /// SHA-256 of `text`, hex encoded.
    pub hash: String,
}

impl Record {
    /// Pairs a chunk with its embedding. Rejects an empty vector, which is
    /// how a failed embedding call is represented upstream.
    pub fn new(chunk: Chunk, embedding: Vec<f32>) -> Result<Self, RagError> {
        if embedding.is_empty() {
            return Err(RagError::InvalidRecord(format!(
                "empty embedding for {}",
                chunk.record_id()
            )));
        }
        let mut hasher = Sha256::new();
        hasher.update(chunk.text.as_bytes());
        let hash = format!("{:x}", hasher.finalize());

        Ok(Self {
            id: chunk.record_id(),
            hash,
            embedding,
            metadata: RecordMetadata {
                file_path: chunk.file_path,
                chunk_index: chunk.chunk_index,
                file_extension: chunk.file_extension,
            },
            text: chunk.text,
        })
    }
}

/// A record returned by a similarity query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryHit {
    pub id: String,
    pub text: String,
    pub metadata: RecordMetadata,
    /// Cosine distance to the query vector; smaller is closer.
    pub distance: f32,
}

/// Summary of a stored collection.
#[derive(Debug, Clone, Serialize)]
pub struct CollectionInfo {
    pub name: String,
    pub description: String,
    pub record_count: u64,
    pub created_at: DateTime<Utc>,
}
