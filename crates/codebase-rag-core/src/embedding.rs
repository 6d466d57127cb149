//! Embedder trait and vector utilities.
//!
//! Defines the [`Embedder`] trait implemented by every embedding backend,
//! the checked [`embed_checked`] call and its soft-failing [`embed_or_skip`]
//! wrapper, BLOB
//! encoding helpers for the SQLite store, cosine similarity/distance, and
//! the offline [`KeywordEmbedder`].
//!
//! HTTP-backed embedders (Gemini, Ollama) live in the `codebase-rag` app
//! crate.

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::RagError;

/// Converts text into a fixed-dimension vector.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Model identifier (e.g. `"text-embedding-004"`).
    fn model_name(&self) -> &str;
    /// Vector dimensionality, when known up front.
    fn dims(&self) -> Option<usize>;
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>>;
}

/// Embeds `text`, reporting every failure as [`RagError::Embedding`].
///
/// An empty vector, or one whose length differs from a declared
/// [`Embedder::dims`], counts as a failure.
pub async fn embed_checked(embedder: &dyn Embedder, text: &str) -> Result<Vec<f32>, RagError> {
    let v = embedder.embed(text).await.map_err(|e| {
        RagError::Embedding(format!("{}: {:#}", embedder.model_name(), e))
    })?;
    if v.is_empty() {
        return Err(RagError::Embedding(format!(
            "{}: service returned an empty vector",
            embedder.model_name()
        )));
    }
    match embedder.dims() {
        Some(dims) if dims != v.len() => Err(RagError::Embedding(format!(
            "{}: expected {} dimensions, got {}",
            embedder.model_name(),
            dims,
            v.len()
        ))),
        _ => Ok(v),
    }
}

/// Embeds `text`, logging and returning `None` on any failure.
///
/// Callers skip the unit of work (a chunk, or the whole retrieval) instead
/// of aborting.
pub async fn embed_or_skip(embedder: &dyn Embedder, text: &str) -> Option<Vec<f32>> {
    match embed_checked(embedder, text).await {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::warn!("{}", e);
            None
        }
    }
}

/// Encode a float vector as little-endian f32 bytes.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB produced by [`vec_to_blob`].
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Cosine similarity in `[-1.0, 1.0]`; `0.0` for empty, zero or
/// mismatched vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

/// Cosine distance `1 - similarity`, in `[0.0, 2.0]`. Smaller is closer.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    1.0 - cosine_similarity(a, b)
}

const STOP_WORDS: &[&str] = &[
    "the", "and", "but", "for", "with", "are", "was", "were", "been", "have", "has", "had",
    "does", "did", "will", "would", "could", "should", "this", "that", "these", "those", "you",
    "she", "they", "him", "her", "them",
];

pub const DEFAULT_KEYWORD_DIMS: usize = 256;

/// Offline embedder: hashed bag of keywords.
///
/// Lower-cases the text, keeps word tokens longer than two characters that
/// are not stop words, and counts each into one of `dims` buckets chosen by
/// SHA-256. The result is L2-normalised. Text with no keywords yields the
/// zero vector, which is at distance 1.0 from everything.
#[derive(Debug, Clone)]
pub struct KeywordEmbedder {
    dims: usize,
}

impl KeywordEmbedder {
    pub fn new(dims: usize) -> Self {
        Self { dims: dims.max(1) }
    }

    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dims];
        for word in keywords(text) {
            v[bucket(&word, self.dims)] += 1.0;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in v.iter_mut() {
                *x /= norm;
            }
        }
        v
    }
}

impl Default for KeywordEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_KEYWORD_DIMS)
    }
}

#[async_trait]
impl Embedder for KeywordEmbedder {
    fn model_name(&self) -> &str {
        "keywords"
    }

    fn dims(&self) -> Option<usize> {
        Some(self.dims)
    }

    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        Ok(self.embed_sync(text))
    }
}

fn keywords(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|w| w.chars().count() > 2)
        .map(|w| w.to_lowercase())
        .filter(|w| !STOP_WORDS.contains(&w.as_str()))
}

fn bucket(word: &str, dims: usize) -> usize {
    let digest = Sha256::digest(word.as_bytes());
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    (u64::from_le_bytes(head) % dims as u64) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingEmbedder;

    #[async_trait]
    impl Embedder for FailingEmbedder {
        fn model_name(&self) -> &str {
            "failing"
        }
        fn dims(&self) -> Option<usize> {
            None
        }
        async fn embed(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
            anyhow::bail!("quota exceeded")
        }
    }

    #[test]
    fn test_vec_blob_roundtrip() {
        let vec = vec![1.0f32, -2.5, 3.125, 0.0, -0.001];
        assert_eq!(blob_to_vec(&vec_to_blob(&vec)), vec);
    }

    #[test]
    fn test_cosine_identical_and_orthogonal() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
        assert!(cosine_distance(&v, &v).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_degenerate_inputs() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn test_keyword_embedder_shared_terms_are_closer() {
        let e = KeywordEmbedder::default();
        let doc = e.embed_sync("function foo() { return 1; }");
        let near = e.embed_sync("what does foo do");
        let far = e.embed_sync("kubernetes deployment manifests");
        assert!(cosine_distance(&doc, &near) < cosine_distance(&doc, &far));
    }

    #[test]
    fn test_keyword_embedder_ignores_stop_words_and_short_tokens() {
        let e = KeywordEmbedder::new(16);
        let v = e.embed_sync("the an is to of");
        assert_eq!(v.len(), 16);
        assert!(v.iter().all(|x| *x == 0.0));
    }

    struct FixedEmbedder {
        dims: Option<usize>,
        out: Vec<f32>,
    }

    #[async_trait]
    impl Embedder for FixedEmbedder {
        fn model_name(&self) -> &str {
            "fixed"
        }
        fn dims(&self) -> Option<usize> {
            self.dims
        }
        async fn embed(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
            Ok(self.out.clone())
        }
    }

    #[tokio::test]
    async fn test_embed_checked_classifies_failures() {
        let err = embed_checked(&FailingEmbedder, "text").await.unwrap_err();
        assert!(matches!(err, RagError::Embedding(_)));
        assert!(err.is_transient());
        assert!(err.to_string().contains("quota exceeded"));

        let empty = FixedEmbedder { dims: None, out: vec![] };
        assert!(matches!(
            embed_checked(&empty, "text").await,
            Err(RagError::Embedding(_))
        ));

        let short = FixedEmbedder { dims: Some(3), out: vec![1.0, 2.0] };
        let err = embed_checked(&short, "text").await.unwrap_err();
        assert!(err.to_string().contains("expected 3 dimensions, got 2"));

        let ok = FixedEmbedder { dims: Some(2), out: vec![1.0, 2.0] };
        assert_eq!(embed_checked(&ok, "text").await.unwrap(), vec![1.0, 2.0]);
    }

    #[tokio::test]
    async fn test_embed_or_skip_swallows_failures() {
        assert!(embed_or_skip(&FailingEmbedder, "text").await.is_none());
        let v = embed_or_skip(&KeywordEmbedder::default(), "foo bar baz").await;
        assert_eq!(v.map(|v| v.len()), Some(DEFAULT_KEYWORD_DIMS));
    }
}
