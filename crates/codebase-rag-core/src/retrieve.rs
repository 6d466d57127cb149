//! Query flow: embed → similarity search → prompt → generation.
//!
//! Nothing in this module returns an error to its caller. A failed query
//! embedding or store lookup degrades to an empty context, and a failed
//! generation call becomes the response text.

use async_trait::async_trait;

use crate::embedding::{embed_or_skip, Embedder};
use crate::error::RagError;
use crate::models::QueryHit;
use crate::prompt::build_prompt;
use crate::store::CollectionStore;

/// Turns a prompt into response text via an external model.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Display name, used in the response banner.
    fn name(&self) -> &str;
    async fn generate(&self, prompt: &str) -> Result<String, RagError>;
}

/// Retrieves up to `top_k` hits for `query`, closest first.
pub async fn retrieve_context(
    embedder: &dyn Embedder,
    store: &dyn CollectionStore,
    collection: &str,
    query: &str,
    top_k: usize,
) -> Vec<QueryHit> {
    let Some(query_vec) = embed_or_skip(embedder, query).await else {
        tracing::error!("failed to generate query embedding; continuing without context");
        return Vec::new();
    };

    match store.query(collection, &query_vec, top_k).await {
        Ok(hits) => hits,
        Err(e) => {
            tracing::error!(collection, "failed to retrieve context: {:#}", e);
            Vec::new()
        }
    }
}

/// Runs the generator, converting any failure into response text.
pub async fn generate_response(generator: &dyn Generator, prompt: &str) -> String {
    match generator.generate(prompt).await {
        Ok(text) => text,
        Err(RagError::Generation(msg)) => {
            tracing::error!(generator = generator.name(), "{}", msg);
            msg
        }
        Err(e) => {
            tracing::error!(generator = generator.name(), "failed to generate response: {}", e);
            format!("Error generating response: {}", e)
        }
    }
}

/// Parameters for [`answer_query`].
#[derive(Debug, Clone)]
pub struct QueryRequest<'a> {
    pub collection: &'a str,
    pub query: &'a str,
    pub top_k: usize,
    pub project_name: &'a str,
}

/// Everything produced by one query, for display and tests.
#[derive(Debug, Clone)]
pub struct QueryOutcome {
    pub context: Vec<QueryHit>,
    pub prompt: String,
    pub response: String,
}

pub async fn answer_query(
    embedder: &dyn Embedder,
    store: &dyn CollectionStore,
    generator: &dyn Generator,
    req: &QueryRequest<'_>,
) -> QueryOutcome {
    tracing::info!("processing query: {}", req.query);
    let context = retrieve_context(embedder, store, req.collection, req.query, req.top_k).await;
    tracing::info!("retrieved {} relevant chunks", context.len());

    let prompt = build_prompt(req.query, &context, req.project_name);
    let response = generate_response(generator, &prompt).await;

    QueryOutcome {
        context,
        prompt,
        response,
    }
}
