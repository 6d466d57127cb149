//! Ingestion pipeline orchestration.
//!
//! Coordinates one ingestion run: scan → filter → chunk → embed → store.
//! Failures local to one file or one chunk ([`RagError::is_transient`]) are
//! logged and counted; any other error aborts the run, as do configuration
//! errors, a missing project root, and the non-empty collection guard.

use std::path::Path;

use anyhow::Result;

use codebase_rag_core::chunk::Chunker;
use codebase_rag_core::embedding::{embed_checked, Embedder};
use codebase_rag_core::models::{Chunk, Record};
use codebase_rag_core::store::memory::InMemoryStore;
use codebase_rag_core::store::CollectionStore;
use codebase_rag_core::RagError;

use crate::config::{CollectionConfig, Config};
use crate::connector_fs::{self, SourceFile};
use crate::embedding::create_embedder;
use crate::progress::{IngestProgressEvent, IngestProgressReporter, ProgressMode};
use crate::sqlite_store::SqliteStore;

/// How a run treats a collection that already holds records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestOptions {
    /// Delete and recreate the collection before writing.
    pub force: bool,
    /// Refuse to write into a non-empty collection unless `force` is set.
    pub guard: bool,
    /// Scan and chunk only; no embedding calls, no store access.
    pub dry_run: bool,
}

impl IngestOptions {
    /// Options for `rag ingest`: guarded, optionally forced.
    pub fn ingest(force: bool, dry_run: bool) -> Self {
        Self {
            force,
            guard: true,
            dry_run,
        }
    }

    /// Options for `rag update`: overwrite matching ids in place.
    pub fn update(dry_run: bool) -> Self {
        Self {
            force: false,
            guard: false,
            dry_run,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub files_seen: u64,
    pub files_processed: u64,
    pub files_skipped: u64,
    pub files_failed: u64,
    pub chunks_created: u64,
    pub chunks_skipped: u64,
    pub records_written: u64,
}

pub struct IngestPipeline<'a> {
    collection: &'a str,
    settings: &'a CollectionConfig,
    chunker: Chunker,
    batch_size: usize,
    embedder: &'a dyn Embedder,
    store: &'a dyn CollectionStore,
    progress: &'a dyn IngestProgressReporter,
}

enum FileOutcome {
    Done,
    Failed,
}

impl<'a> IngestPipeline<'a> {
    pub fn new(
        collection: &'a str,
        settings: &'a CollectionConfig,
        chunker: Chunker,
        embedder: &'a dyn Embedder,
        store: &'a dyn CollectionStore,
        progress: &'a dyn IngestProgressReporter,
    ) -> Self {
        Self {
            collection,
            settings,
            chunker,
            batch_size: 64,
            embedder,
            store,
            progress,
        }
    }

    /// Maximum records per store write. Zero is treated as one.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub async fn run(&self, root: &Path, opts: IngestOptions) -> Result<IngestSummary> {
        self.progress.report(IngestProgressEvent::Discovering {
            collection: self.collection.to_string(),
        });
        let scan = connector_fs::scan_project(root, &self.settings.filter)?;
        tracing::info!(
            collection = self.collection,
            files = scan.files.len(),
            skipped = scan.skipped,
            "discovered files"
        );

        let mut summary = IngestSummary {
            files_seen: scan.seen as u64,
            files_skipped: scan.skipped as u64,
            ..IngestSummary::default()
        };

        if opts.dry_run {
            for file in &scan.files {
                match read_source(file).await {
                    Ok(text) => {
                        summary.files_processed += 1;
                        if !text.trim().is_empty() {
                            summary.chunks_created += self.chunker.windows(&text).count() as u64;
                        }
                    }
                    Err(e) => {
                        tracing::warn!("{}", e);
                        summary.files_failed += 1;
                    }
                }
            }
            return Ok(summary);
        }

        self.prepare_collection(opts).await?;

        let total = scan.files.len() as u64;
        for (i, file) in scan.files.iter().enumerate() {
            match self.ingest_file(file, &mut summary).await? {
                FileOutcome::Done => summary.files_processed += 1,
                FileOutcome::Failed => summary.files_failed += 1,
            }
            self.progress.report(IngestProgressEvent::Ingesting {
                collection: self.collection.to_string(),
                n: i as u64 + 1,
                total,
                chunks: summary.chunks_created,
                path: file.rel_path.clone(),
            });
        }

        tracing::info!(
            collection = self.collection,
            processed = summary.files_processed,
            failed = summary.files_failed,
            records = summary.records_written,
            "ingestion complete"
        );
        Ok(summary)
    }

    /// Applies the force and guard rules, then ensures the collection exists.
    async fn prepare_collection(&self, opts: IngestOptions) -> Result<()> {
        let existing = self.store.count(self.collection).await?;
        if existing > 0 {
            if opts.force {
                tracing::info!(
                    collection = self.collection,
                    records = existing,
                    "deleting collection before re-ingestion"
                );
                self.store.delete(self.collection).await?;
            } else if opts.guard {
                return Err(RagError::CollectionNotEmpty {
                    collection: self.collection.to_string(),
                    count: existing,
                }
                .into());
            } else {
                tracing::info!(
                    collection = self.collection,
                    records = existing,
                    "updating existing collection in place"
                );
            }
        }

        self.store
            .create_or_open(self.collection, &self.settings.description)
            .await?;
        Ok(())
    }

    async fn ingest_file(
        &self,
        file: &SourceFile,
        summary: &mut IngestSummary,
    ) -> Result<FileOutcome, RagError> {
        let text = match read_source(file).await {
            Ok(text) => text,
            Err(e) if e.is_transient() => {
                tracing::warn!("{}", e);
                return Ok(FileOutcome::Failed);
            }
            Err(e) => return Err(e),
        };
        if text.trim().is_empty() {
            tracing::debug!(path = %file.rel_path, "skipping empty file");
            return Ok(FileOutcome::Done);
        }

        let mut batch = Vec::with_capacity(self.batch_size);
        for window in self.chunker.windows(&text) {
            summary.chunks_created += 1;
            let embedding = match embed_checked(self.embedder, window.text).await {
                Ok(v) => v,
                Err(e) if e.is_transient() => {
                    tracing::warn!(path = %file.rel_path, chunk = window.index, "{}", e);
                    summary.chunks_skipped += 1;
                    continue;
                }
                Err(e) => return Err(e),
            };
            batch.push(Record::new(Chunk::from_window(&file.rel_path, &window), embedding)?);
            if batch.len() >= self.batch_size && !self.flush(file, &mut batch, summary).await {
                return Ok(FileOutcome::Failed);
            }
        }

        if !batch.is_empty() && !self.flush(file, &mut batch, summary).await {
            return Ok(FileOutcome::Failed);
        }
        Ok(FileOutcome::Done)
    }

    async fn flush(
        &self,
        file: &SourceFile,
        batch: &mut Vec<Record>,
        summary: &mut IngestSummary,
    ) -> bool {
        match self.store.add(self.collection, batch).await {
            Ok(()) => {
                summary.records_written += batch.len() as u64;
                batch.clear();
                true
            }
            Err(e) => {
                tracing::error!(path = %file.rel_path, "failed to store records: {:#}", e);
                batch.clear();
                false
            }
        }
    }
}

/// Reads a file as UTF-8, replacing undecodable bytes.
async fn read_source(file: &SourceFile) -> Result<String, RagError> {
    let bytes = tokio::fs::read(&file.path)
        .await
        .map_err(|source| RagError::FileRead {
            path: file.path.clone(),
            source,
        })?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Entry point for `rag ingest` and `rag update`.
pub async fn run_ingest(
    config: &Config,
    root: &Path,
    collection: Option<&str>,
    opts: IngestOptions,
    progress: ProgressMode,
) -> Result<IngestSummary> {
    let (name, settings) = config.collection(collection)?;
    let chunker = config.chunking.chunker()?;
    let embedder = create_embedder(&config.embedding)?;
    let reporter = progress.reporter();

    tracing::info!(
        collection = name,
        root = %root.display(),
        embedder = embedder.model_name(),
        "starting ingestion"
    );

    // A dry run never touches the store; an empty in-memory one satisfies
    // the pipeline without creating the database file.
    let summary = if opts.dry_run {
        let store = InMemoryStore::new();
        IngestPipeline::new(name, settings, chunker, embedder.as_ref(), &store, reporter.as_ref())
            .run(root, opts)
            .await?
    } else {
        let store = SqliteStore::open(&config.store.path).await?;
        let result = IngestPipeline::new(
            name,
            settings,
            chunker,
            embedder.as_ref(),
            &store,
            reporter.as_ref(),
        )
        .with_batch_size(config.embedding.batch_size)
        .run(root, opts)
        .await;
        store.close().await;
        result?
    };

    print_summary(name, &summary, opts.dry_run);
    Ok(summary)
}

fn print_summary(collection: &str, s: &IngestSummary, dry_run: bool) {
    if dry_run {
        println!("ingest {} (dry-run)", collection);
        println!("  files found: {}", s.files_processed + s.files_failed);
        println!("  files skipped: {}", s.files_skipped);
        println!("  estimated chunks: {}", s.chunks_created);
        return;
    }
    println!("ingest {}", collection);
    println!("  files seen: {}", s.files_seen);
    println!("  files processed: {}", s.files_processed);
    println!("  files skipped: {}", s.files_skipped);
    println!("  files failed: {}", s.files_failed);
    println!("  chunks created: {}", s.chunks_created);
    println!("  chunks skipped: {}", s.chunks_skipped);
    println!("  records written: {}", s.records_written);
}
