//! TOML configuration parsing and validation.
//!
//! Every section is optional; a missing config file at the default path
//! yields [`Config::default`]. The resulting [`Config`] is built once per
//! invocation and passed explicitly to the ingestion and query commands.
//!
//! ```toml
//! [store]
//! path = ".rag/store.sqlite"
//!
//! [chunking]
//! chunk_size = 500
//! chunk_overlap = 100
//!
//! [embedding]
//! provider = "gemini"          # gemini | ollama | keywords
//! model = "text-embedding-004"
//!
//! [generation]
//! provider = "gemini-cli"      # gemini | gemini-cli
//! timeout_secs = 30
//!
//! [collections.codebase_memory]
//! description = "Project source code"
//! exclude_substrings = ["node_modules", ".git", "dist"]
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use codebase_rag_core::chunk::{Chunker, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
use codebase_rag_core::embedding::DEFAULT_KEYWORD_DIMS;
use codebase_rag_core::filter::PathFilter;
use codebase_rag_core::prompt::DEFAULT_PROJECT_NAME;
use codebase_rag_core::RagError;

pub const DEFAULT_CONFIG_PATH: &str = "./config/rag.toml";
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";
pub const DEFAULT_COLLECTION: &str = "codebase_memory";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub prompt: PromptConfig,
    #[serde(default = "default_collections")]
    pub collections: BTreeMap<String, CollectionConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            chunking: ChunkingConfig::default(),
            embedding: EmbeddingConfig::default(),
            generation: GenerationConfig::default(),
            retrieval: RetrievalConfig::default(),
            prompt: PromptConfig::default(),
            collections: default_collections(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

fn default_store_path() -> PathBuf {
    PathBuf::from(".rag/store.sqlite")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}
fn default_chunk_overlap() -> usize {
    DEFAULT_CHUNK_OVERLAP
}

impl ChunkingConfig {
    pub fn chunker(&self) -> Result<Chunker, RagError> {
        Chunker::new(self.chunk_size, self.chunk_overlap)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL for the `ollama` provider, or a Gemini API base override.
    #[serde(default)]
    pub url: Option<String>,
    /// Maximum records per store write.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default)]
    pub max_retries: u32,
    /// No timeout when unset.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: None,
            dims: None,
            url: None,
            batch_size: default_batch_size(),
            max_retries: 0,
            timeout_secs: None,
        }
    }
}

fn default_embedding_provider() -> String {
    "gemini".to_string()
}
fn default_batch_size() -> usize {
    64
}

impl EmbeddingConfig {
    pub fn model_or_default(&self) -> String {
        self.model.clone().unwrap_or_else(|| {
            match self.provider.as_str() {
                "ollama" => "nomic-embed-text",
                "keywords" => "keywords",
                _ => "text-embedding-004",
            }
            .to_string()
        })
    }

    pub fn keyword_dims(&self) -> usize {
        self.dims.unwrap_or(DEFAULT_KEYWORD_DIMS)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_generation_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_generation_timeout")]
    pub timeout_secs: u64,
    /// Gemini API base override for the `gemini` provider.
    #[serde(default)]
    pub url: Option<String>,
    /// Executable for the `gemini-cli` provider.
    #[serde(default = "default_cli_command")]
    pub cli_command: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_generation_provider(),
            model: None,
            timeout_secs: default_generation_timeout(),
            url: None,
            cli_command: default_cli_command(),
        }
    }
}

fn default_generation_provider() -> String {
    "gemini".to_string()
}
fn default_generation_timeout() -> u64 {
    30
}
fn default_cli_command() -> String {
    "gemini".to_string()
}

impl GenerationConfig {
    pub fn model_or_default(&self) -> String {
        self.model
            .clone()
            .unwrap_or_else(|| "gemini-1.5-flash".to_string())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_collection_name")]
    pub default_collection: String,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            default_collection: default_collection_name(),
        }
    }
}

fn default_top_k() -> usize {
    5
}
fn default_collection_name() -> String {
    DEFAULT_COLLECTION.to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct PromptConfig {
    #[serde(default = "default_project_name")]
    pub project_name: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            project_name: default_project_name(),
        }
    }
}

fn default_project_name() -> String {
    DEFAULT_PROJECT_NAME.to_string()
}

/// One named collection: its description and file selection rules.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct CollectionConfig {
    #[serde(default)]
    pub description: String,
    #[serde(flatten)]
    pub filter: PathFilter,
}

fn default_collections() -> BTreeMap<String, CollectionConfig> {
    let mut map = BTreeMap::new();
    map.insert(
        DEFAULT_COLLECTION.to_string(),
        CollectionConfig {
            description: "Project codebase memory".to_string(),
            filter: PathFilter::default(),
        },
    );
    map.insert(
        "content_memory".to_string(),
        CollectionConfig {
            description: "Project content and documentation".to_string(),
            filter: PathFilter {
                extensions: [".md", ".mdx", ".json", ".yml", ".yaml"]
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
                include_prefixes: vec!["src/content".to_string(), "docs".to_string()],
                ..PathFilter::default()
            },
        },
    );
    map
}

impl Config {
    /// Looks up a collection by name, or the default collection when `None`.
    pub fn collection<'a>(
        &'a self,
        name: Option<&'a str>,
    ) -> Result<(&'a str, &'a CollectionConfig), RagError> {
        let name = name.unwrap_or(&self.retrieval.default_collection);
        self.collections
            .get_key_value(name)
            .map(|(k, v)| (k.as_str(), v))
            .ok_or_else(|| {
                let known: Vec<&str> = self.collections.keys().map(String::as_str).collect();
                RagError::Config(format!(
                    "unknown collection '{}'. Configured collections: {}",
                    name,
                    known.join(", ")
                ))
            })
    }

    /// True when a configured provider calls the Gemini API.
    pub fn requires_api_key(&self) -> bool {
        self.embedding.provider == "gemini" || self.generation.provider == "gemini"
    }

    /// Startup gate: the Gemini API key must be present when any provider
    /// needs it.
    pub fn check_api_key(&self) -> Result<(), RagError> {
        if self.requires_api_key() && api_key().is_none() {
            return Err(RagError::MissingApiKey(API_KEY_ENV.to_string()));
        }
        Ok(())
    }
}

/// Reads the Gemini API key; empty values count as unset.
pub fn api_key() -> Option<String> {
    std::env::var(API_KEY_ENV).ok().filter(|k| !k.trim().is_empty())
}

/// Loads `path`, or the default location when `None`. A missing file at
/// the default location is not an error.
pub fn load_or_default(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(p) => load_config(p),
        None => {
            let default = Path::new(DEFAULT_CONFIG_PATH);
            if default.exists() {
                load_config(default)
            } else {
                let config = Config::default();
                validate(&config)?;
                Ok(config)
            }
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    config.chunking.chunker()?;

    if config.retrieval.top_k < 1 {
        bail!("retrieval.top_k must be >= 1");
    }

    if config.embedding.batch_size == 0 {
        bail!("embedding.batch_size must be > 0");
    }

    match config.embedding.provider.as_str() {
        "gemini" | "ollama" | "keywords" => {}
        other => bail!(
            "Unknown embedding provider: '{}'. Must be gemini, ollama, or keywords.",
            other
        ),
    }

    match config.generation.provider.as_str() {
        "gemini" | "gemini-cli" => {}
        other => bail!(
            "Unknown generation provider: '{}'. Must be gemini or gemini-cli.",
            other
        ),
    }

    if config.collections.is_empty() {
        bail!("at least one [collections.<name>] entry is required");
    }
    if config.collections.keys().any(|k| k.trim().is_empty()) {
        bail!("collection names must not be empty");
    }
    if !config
        .collections
        .contains_key(&config.retrieval.default_collection)
    {
        bail!(
            "retrieval.default_collection '{}' is not a configured collection",
            config.retrieval.default_collection
        );
    }

    Ok(())
}
