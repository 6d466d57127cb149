//! Embedding providers.
//!
//! Concrete [`Embedder`] implementations selected by `embedding.provider`:
//! - **[`GeminiEmbedder`]**: Gemini `embedContent` REST API (`text-embedding-004`).
//! - **[`OllamaEmbedder`]**: a local Ollama instance's `/api/embed` endpoint.
//! - **`keywords`**: the offline [`KeywordEmbedder`] from the core crate.
//!
//! # Retry Strategy
//!
//! HTTP calls go through [`send_with_retry`]. With `max_retries = 0` (the
//! default) a failure is reported once and the caller skips that chunk.
//! - HTTP 429 and 5xx → retry
//! - other 4xx → fail immediately
//! - network errors → retry
//! - backoff: 1s, 2s, 4s, ... capped at 32s
//!
//! The Gemini key travels in the `x-goog-api-key` header, never in the
//! URL, and transport errors are stripped of their URL before reporting.

use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use serde_json::{json, Value};

use codebase_rag_core::embedding::{Embedder, KeywordEmbedder};

use crate::config::{self, EmbeddingConfig, API_KEY_ENV};

pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Builds the embedder named by `config.provider`.
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Box<dyn Embedder>> {
    match config.provider.as_str() {
        "gemini" => Ok(Box::new(GeminiEmbedder::new(config)?)),
        "ollama" => Ok(Box::new(OllamaEmbedder::new(config)?)),
        "keywords" => Ok(Box::new(KeywordEmbedder::new(config.keyword_dims()))),
        other => bail!("Unknown embedding provider: {}", other),
    }
}

pub(crate) fn http_client(timeout_secs: Option<u64>) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder();
    if let Some(secs) = timeout_secs {
        builder = builder.timeout(Duration::from_secs(secs));
    }
    Ok(builder.build()?)
}

/// POSTs `body` to `url` and returns the parsed JSON response.
///
/// `api_key`, when given, is sent as the `x-goog-api-key` header.
pub(crate) async fn send_with_retry(
    client: &reqwest::Client,
    url: &str,
    api_key: Option<&str>,
    body: &Value,
    max_retries: u32,
    label: &str,
) -> Result<Value> {
    let mut last_err = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let delay = Duration::from_secs(1 << (attempt - 1).min(5));
            tracing::debug!(attempt, ?delay, "retrying {} request", label);
            tokio::time::sleep(delay).await;
        }

        let mut request = client.post(url).json(body);
        if let Some(key) = api_key {
            request = request.header(API_KEY_HEADER, key);
        }

        match request.send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    return response
                        .json()
                        .await
                        .map_err(|e| anyhow!("{} response error: {}", label, e.without_url()));
                }

                let body_text = response.text().await.unwrap_or_default();
                if status.as_u16() == 429 || status.is_server_error() {
                    last_err = Some(anyhow!("{} API error {}: {}", label, status, body_text));
                    continue;
                }
                bail!("{} API error {}: {}", label, status, body_text);
            }
            Err(e) => {
                last_err = Some(anyhow!("{} request error: {}", label, e.without_url()));
                continue;
            }
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow!("{} request failed after retries", label)))
}

// ============ Gemini ============

pub struct GeminiEmbedder {
    client: reqwest::Client,
    base_url: String,
    model: String,
    dims: Option<usize>,
    api_key: String,
    max_retries: u32,
}

impl GeminiEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = config::api_key()
            .ok_or_else(|| anyhow!("{} environment variable not set", API_KEY_ENV))?;
        Self::with_api_key(config, api_key)
    }

    pub fn with_api_key(config: &EmbeddingConfig, api_key: String) -> Result<Self> {
        Ok(Self {
            client: http_client(config.timeout_secs)?,
            base_url: config
                .url
                .clone()
                .unwrap_or_else(|| GEMINI_API_BASE.to_string()),
            model: config.model_or_default(),
            dims: config.dims,
            api_key,
            max_retries: config.max_retries,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:embedContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

#[async_trait]
impl Embedder for GeminiEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> Option<usize> {
        self.dims
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let body = json!({
            "model": format!("models/{}", self.model),
            "content": { "parts": [{ "text": text }] },
        });
        let json = send_with_retry(
            &self.client,
            &self.endpoint(),
            Some(&self.api_key),
            &body,
            self.max_retries,
            "Gemini",
        )
        .await?;
        parse_gemini_embedding(&json)
    }
}

/// Extracts `embedding.values` from an `embedContent` response.
fn parse_gemini_embedding(json: &Value) -> Result<Vec<f32>> {
    let values = json
        .get("embedding")
        .and_then(|e| e.get("values"))
        .and_then(|v| v.as_array())
        .ok_or_else(|| anyhow!("Invalid Gemini response: missing embedding.values"))?;
    Ok(to_f32_vec(values))
}

fn to_f32_vec(values: &[Value]) -> Vec<f32> {
    values
        .iter()
        .map(|v| v.as_f64().unwrap_or(0.0) as f32)
        .collect()
}

// ============ Ollama ============

/// Requires Ollama running with the model pulled
/// (`ollama pull nomic-embed-text`).
pub struct OllamaEmbedder {
    client: reqwest::Client,
    model: String,
    dims: Option<usize>,
    url: String,
    max_retries: u32,
}

impl OllamaEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        Ok(Self {
            client: http_client(config.timeout_secs)?,
            model: config.model_or_default(),
            dims: config.dims,
            url: config
                .url
                .clone()
                .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string()),
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> Option<usize> {
        self.dims
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let body = json!({ "model": self.model, "input": [text] });
        let url = format!("{}/api/embed", self.url.trim_end_matches('/'));
        let json = send_with_retry(&self.client, &url, None, &body, self.max_retries, "Ollama").await?;
        parse_ollama_embedding(&json)
    }
}

fn parse_ollama_embedding(json: &Value) -> Result<Vec<f32>> {
    let first = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .and_then(|e| e.first())
        .and_then(|e| e.as_array())
        .ok_or_else(|| anyhow!("Invalid Ollama response: missing embeddings array"))?;
    Ok(to_f32_vec(first))
}
