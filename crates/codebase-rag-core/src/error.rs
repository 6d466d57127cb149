//! Error kinds shared by the ingestion and retrieval flows.
//!
//! Callers branch on the variant rather than on log text: transient kinds
//! (one file, one chunk, one embedding call) are contained and skipped,
//! while configuration and guard kinds abort the command.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RagError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("{0} environment variable not set")]
    MissingApiKey(String),

    #[error("project root does not exist: {}", .0.display())]
    ProjectRootMissing(PathBuf),

    #[error(
        "collection '{collection}' already contains {count} records. \
         Re-run with --force to delete and recreate it, or use `rag update` \
         to overwrite matching records in place"
    )]
    CollectionNotEmpty { collection: String, count: u64 },

    #[error("failed to read {}: {source}", path.display())]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("embedding failed: {0}")]
    Embedding(String),

    #[error("generation failed: {0}")]
    Generation(String),

    #[error("invalid record: {0}")]
    InvalidRecord(String),
}

impl RagError {
    /// True for failures local to one unit of work that the pipelines skip.
    pub fn is_transient(&self) -> bool {
        matches!(self, RagError::FileRead { .. } | RagError::Embedding(_))
    }

    /// Process exit code for a failure that reached `main`.
    pub fn exit_code(&self) -> u8 {
        match self {
            RagError::CollectionNotEmpty { .. } => 2,
            _ => 1,
        }
    }
}
