//! # Codebase RAG
//!
//! Retrieval-augmented generation over a local codebase.
//!
//! Source files are filtered per collection, split into overlapping
//! character windows, embedded, and stored in a local SQLite vector store.
//! A query is embedded the same way, the closest chunks are pulled back as
//! context, and an augmented prompt is handed to Gemini (API or local CLI).
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌───────────┐
//! │ Project dir │──▶│ Filter+Chunk │──▶│  SQLite   │
//! │  (walkdir)  │   │   +Embed     │   │ f32 BLOBs │
//! └─────────────┘   └──────────────┘   └─────┬─────┘
//!                                            │
//!                    ┌──────────┐      ┌─────▼─────┐
//!                    │  Gemini  │◀─────│  Prompt   │
//!                    │ API/CLI  │      │  builder  │
//!                    └──────────┘      └───────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! export GEMINI_API_KEY=...
//! rag ingest --project-root .             # build codebase_memory
//! rag query --query "how is auth wired?"  # ask about it
//! rag update --project-root .             # refresh in place
//! rag collections                         # what is stored
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`connector_fs`] | Project tree scan and filtering |
//! | [`ingest`] | Ingestion pipeline |
//! | [`query`] | Query command |
//! | [`embedding`] | Gemini and Ollama embedders |
//! | [`generate`] | Gemini API and CLI generators |
//! | [`sqlite_store`] | SQLite collection store |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema bootstrap |
//! | [`progress`] | Ingestion progress on stderr |
//! | [`collections`] | Collection listing |
//!
//! Pure logic (chunking, filters, prompt, retrieval flow) lives in the
//! `codebase-rag-core` crate.

pub mod collections;
pub mod config;
pub mod connector_fs;
pub mod db;
pub mod embedding;
pub mod generate;
pub mod ingest;
pub mod migrate;
pub mod progress;
pub mod query;
pub mod sqlite_store;

pub use codebase_rag_core::RagError;
