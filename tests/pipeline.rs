//! Library-level ingestion tests: real files in a temp dir, the offline
//! keyword embedder, and both store backends.

use std::fs;
use std::path::Path;

use async_trait::async_trait;
use tempfile::TempDir;

use codebase_rag::config::{CollectionConfig, Config};
use codebase_rag::ingest::{IngestOptions, IngestPipeline, IngestSummary};
use codebase_rag::progress::{CollectingProgress, IngestProgressEvent, NoProgress};
use codebase_rag::sqlite_store::SqliteStore;
use codebase_rag::RagError;
use codebase_rag_core::chunk::Chunker;
use codebase_rag_core::embedding::{Embedder, KeywordEmbedder};
use codebase_rag_core::filter::PathFilter;
use codebase_rag_core::store::memory::InMemoryStore;
use codebase_rag_core::store::CollectionStore;

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn default_collection() -> CollectionConfig {
    CollectionConfig {
        description: "test".to_string(),
        filter: PathFilter::default(),
    }
}

async fn ingest(
    root: &Path,
    settings: &CollectionConfig,
    store: &dyn CollectionStore,
    opts: IngestOptions,
) -> anyhow::Result<IngestSummary> {
    let embedder = KeywordEmbedder::default();
    IngestPipeline::new("code", settings, Chunker::default(), &embedder, store, &NoProgress)
        .run(root, opts)
        .await
}

#[tokio::test]
async fn single_small_file_becomes_one_record() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "a.ts", "function foo() { return 1; }");

    let store = InMemoryStore::new();
    let summary = ingest(tmp.path(), &default_collection(), &store, IngestOptions::ingest(false, false))
        .await
        .unwrap();

    assert_eq!(summary.files_processed, 1);
    assert_eq!(summary.chunks_created, 1);
    assert_eq!(summary.records_written, 1);
    assert_eq!(store.count("code").await.unwrap(), 1);

    let hits = store
        .query("code", &KeywordEmbedder::default().embed_sync("foo"), 5)
        .await
        .unwrap();
    assert_eq!(hits[0].id, "a.ts_0");
    assert_eq!(hits[0].metadata.file_extension, ".ts");
}

#[tokio::test]
async fn long_file_is_split_into_overlapping_records() {
    let tmp = TempDir::new().unwrap();
    let body: String = "abcdefghij".repeat(120);
    write(tmp.path(), "src/long.ts", &body);

    let store = InMemoryStore::new();
    let summary = ingest(tmp.path(), &default_collection(), &store, IngestOptions::ingest(false, false))
        .await
        .unwrap();

    assert_eq!(summary.chunks_created, 3);
    assert_eq!(summary.records_written, 3);
    assert_eq!(store.count("code").await.unwrap(), 3);
}

#[tokio::test]
async fn empty_and_blank_files_produce_nothing() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "empty.ts", "");
    write(tmp.path(), "blank.md", "  \n\t\n");

    let store = InMemoryStore::new();
    let summary = ingest(tmp.path(), &default_collection(), &store, IngestOptions::ingest(false, false))
        .await
        .unwrap();

    assert_eq!(summary.files_processed, 2);
    assert_eq!(summary.chunks_created, 0);
    assert_eq!(store.count("code").await.unwrap(), 0);
}

#[tokio::test]
async fn invalid_utf8_is_replaced_not_fatal() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("bin.js"), [b'o', b'k', 0xff, 0xfe, b'!']).unwrap();

    let store = InMemoryStore::new();
    let summary = ingest(tmp.path(), &default_collection(), &store, IngestOptions::ingest(false, false))
        .await
        .unwrap();

    assert_eq!(summary.files_failed, 0);
    assert_eq!(summary.chunks_created, 1);
}

#[tokio::test]
async fn content_collection_filters_paths() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "src/content/post.md", "# Post about deployment");
    write(tmp.path(), "docs/guide.mdx", "Guide to the deployment flow");
    write(tmp.path(), "src/app.ts", "export const app = 1;");
    write(tmp.path(), "README.md", "Readme outside the include prefixes");
    write(tmp.path(), "docs/node_modules/x.md", "vendored docs");

    let config = Config::default();
    let (_, settings) = config.collection(Some("content_memory")).unwrap();

    let store = InMemoryStore::new();
    let summary = ingest(tmp.path(), settings, &store, IngestOptions::ingest(false, false))
        .await
        .unwrap();

    assert_eq!(summary.records_written, 2);
    let hits = store.query("code", &[0.0; 256], 10).await.unwrap();
    let mut paths: Vec<_> = hits.iter().map(|h| h.metadata.file_path.clone()).collect();
    paths.sort();
    assert_eq!(paths, vec!["docs/guide.mdx", "src/content/post.md"]);
}

#[tokio::test]
async fn named_config_file_is_ingested_without_json_extension() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "package.json", r#"{ "name": "shop" }"#);
    write(tmp.path(), "data.json", r#"{ "rows": [] }"#);
    write(tmp.path(), "notes.md", "notes");

    let settings = CollectionConfig {
        description: String::new(),
        filter: PathFilter {
            extensions: vec![".md".to_string()],
            ..PathFilter::default()
        },
    };
    let store = InMemoryStore::new();
    let summary = ingest(tmp.path(), &settings, &store, IngestOptions::ingest(false, false))
        .await
        .unwrap();

    assert_eq!(summary.files_skipped, 1);
    assert_eq!(summary.records_written, 2);
}

#[tokio::test]
async fn guard_rejects_non_empty_collection_without_mutation() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "a.ts", "function foo() { return 1; }");
    let store = InMemoryStore::new();
    let settings = default_collection();

    ingest(tmp.path(), &settings, &store, IngestOptions::ingest(false, false))
        .await
        .unwrap();
    write(tmp.path(), "b.ts", "function bar() { return 2; }");

    let err = ingest(tmp.path(), &settings, &store, IngestOptions::ingest(false, false))
        .await
        .unwrap_err();
    match err.downcast_ref::<RagError>() {
        Some(RagError::CollectionNotEmpty { collection, count }) => {
            assert_eq!(collection, "code");
            assert_eq!(*count, 1);
        }
        other => panic!("expected guard error, got {:?}", other),
    }
    assert_eq!(store.count("code").await.unwrap(), 1);
}

#[tokio::test]
async fn force_recreates_and_update_overwrites() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "a.ts", "function foo() { return 1; }");
    write(tmp.path(), "gone.ts", "const temporary = true;");
    let store = InMemoryStore::new();
    let settings = default_collection();

    ingest(tmp.path(), &settings, &store, IngestOptions::ingest(false, false))
        .await
        .unwrap();
    assert_eq!(store.count("code").await.unwrap(), 2);

    // Update keeps records of deleted files and overwrites matching ids.
    fs::remove_file(tmp.path().join("gone.ts")).unwrap();
    write(tmp.path(), "a.ts", "function foo() { return 42; }");
    ingest(tmp.path(), &settings, &store, IngestOptions::update(false))
        .await
        .unwrap();
    assert_eq!(store.count("code").await.unwrap(), 2);
    let hits = store
        .query("code", &KeywordEmbedder::default().embed_sync("foo"), 1)
        .await
        .unwrap();
    assert_eq!(hits[0].text, "function foo() { return 42; }");

    // Force starts from an empty collection.
    ingest(tmp.path(), &settings, &store, IngestOptions::ingest(true, false))
        .await
        .unwrap();
    assert_eq!(store.count("code").await.unwrap(), 1);
}

#[tokio::test]
async fn dry_run_counts_without_writing() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "a.ts", "function foo() { return 1; }");
    write(tmp.path(), "b.ts", &"x".repeat(900));

    let store = InMemoryStore::new();
    let summary = ingest(tmp.path(), &default_collection(), &store, IngestOptions::ingest(false, true))
        .await
        .unwrap();

    assert_eq!(summary.files_processed, 2);
    assert_eq!(summary.chunks_created, 3);
    assert_eq!(summary.records_written, 0);
    assert!(store.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn missing_project_root_is_an_error() {
    let tmp = TempDir::new().unwrap();
    let store = InMemoryStore::new();
    let err = ingest(
        &tmp.path().join("missing"),
        &default_collection(),
        &store,
        IngestOptions::ingest(false, false),
    )
    .await
    .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<RagError>(),
        Some(RagError::ProjectRootMissing(_))
    ));
}

struct FlakyEmbedder;

#[async_trait]
impl Embedder for FlakyEmbedder {
    fn model_name(&self) -> &str {
        "flaky"
    }
    fn dims(&self) -> Option<usize> {
        Some(2)
    }
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        if text.contains("fail") {
            anyhow::bail!("quota exceeded");
        }
        Ok(vec![1.0, 0.0])
    }
}

#[tokio::test]
async fn failed_embeddings_skip_only_their_chunk() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "a.ts", "this chunk will fail");
    write(tmp.path(), "b.ts", "this chunk is fine");

    let store = InMemoryStore::new();
    let settings = default_collection();
    let summary = IngestPipeline::new(
        "code",
        &settings,
        Chunker::default(),
        &FlakyEmbedder,
        &store,
        &NoProgress,
    )
    .run(tmp.path(), IngestOptions::ingest(false, false))
    .await
    .unwrap();

    assert_eq!(summary.files_processed, 2);
    assert_eq!(summary.chunks_created, 2);
    assert_eq!(summary.chunks_skipped, 1);
    assert_eq!(summary.records_written, 1);
}

/// Declares more dimensions than it returns.
struct MisdeclaredEmbedder;

#[async_trait]
impl Embedder for MisdeclaredEmbedder {
    fn model_name(&self) -> &str {
        "misdeclared"
    }
    fn dims(&self) -> Option<usize> {
        Some(768)
    }
    async fn embed(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
        Ok(vec![1.0, 0.0])
    }
}

#[tokio::test]
async fn wrong_dimension_embeddings_are_skipped_not_stored() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "a.ts", "function foo() {}");

    let store = InMemoryStore::new();
    let settings = default_collection();
    let summary = IngestPipeline::new(
        "code",
        &settings,
        Chunker::default(),
        &MisdeclaredEmbedder,
        &store,
        &NoProgress,
    )
    .run(tmp.path(), IngestOptions::ingest(false, false))
    .await
    .unwrap();

    assert_eq!(summary.files_processed, 1);
    assert_eq!(summary.chunks_skipped, 1);
    assert_eq!(summary.records_written, 0);
    assert_eq!(store.count("code").await.unwrap(), 0);
}

#[tokio::test]
async fn progress_reports_every_file_against_known_total() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "a.ts", "function foo() {}");
    write(tmp.path(), "b.ts", "function bar() {}");

    let store = InMemoryStore::new();
    let settings = default_collection();
    let progress = CollectingProgress::default();
    let embedder = KeywordEmbedder::default();
    IngestPipeline::new("code", &settings, Chunker::default(), &embedder, &store, &progress)
        .run(tmp.path(), IngestOptions::ingest(false, false))
        .await
        .unwrap();

    let events = progress.events();
    assert!(matches!(events[0], IngestProgressEvent::Discovering { .. }));
    let files: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            IngestProgressEvent::Ingesting { n, total, path, .. } => Some((*n, *total, path.as_str())),
            _ => None,
        })
        .collect();
    assert_eq!(files, vec![(1, 2, "a.ts"), (2, 2, "b.ts")]);
}

#[tokio::test]
async fn sqlite_store_batches_and_persists() {
    let tmp = TempDir::new().unwrap();
    let project = tmp.path().join("project");
    write(&project, "src/long.ts", &"word ".repeat(400));
    write(&project, "src/short.ts", "function foo() { return 1; }");

    let db_path = tmp.path().join(".rag/store.sqlite");
    let settings = default_collection();
    {
        let store = SqliteStore::open(&db_path).await.unwrap();
        let embedder = KeywordEmbedder::default();
        let summary =
            IngestPipeline::new("code", &settings, Chunker::default(), &embedder, &store, &NoProgress)
                .with_batch_size(2)
                .run(&project, IngestOptions::ingest(false, false))
                .await
                .unwrap();
        assert_eq!(summary.records_written, 6);
        store.close().await;
    }

    let store = SqliteStore::open(&db_path).await.unwrap();
    assert_eq!(store.count("code").await.unwrap(), 6);
    let hits = store
        .query("code", &KeywordEmbedder::default().embed_sync("function foo"), 1)
        .await
        .unwrap();
    assert_eq!(hits[0].id, "src/short.ts_0");
}
