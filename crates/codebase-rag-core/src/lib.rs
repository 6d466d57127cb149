//! # Codebase RAG Core
//!
//! Runtime-agnostic logic for codebase-rag: data models, the overlapping
//! chunker, path filtering, the embedder and collection store traits, the
//! retrieval flow, and prompt construction.
//!
//! This crate contains no tokio, sqlx, HTTP or filesystem I/O. The `rag`
//! binary in the root package supplies the concrete backends.

pub mod chunk;
pub mod embedding;
pub mod error;
pub mod filter;
pub mod models;
pub mod prompt;
pub mod retrieve;
pub mod store;

pub use error::RagError;
