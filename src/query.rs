//! `rag query`: retrieve context, build the prompt, print the response.

use anyhow::Result;

use codebase_rag_core::retrieve::{answer_query, QueryOutcome, QueryRequest};
use codebase_rag_core::RagError;

use crate::config::Config;
use crate::embedding::create_embedder;
use crate::generate::create_generator;
use crate::sqlite_store::SqliteStore;

const BANNER_WIDTH: usize = 80;

pub async fn run_query(
    config: &Config,
    query: &str,
    collection: Option<&str>,
    top_k: Option<usize>,
    show_prompt: bool,
) -> Result<QueryOutcome> {
    let (name, _) = config.collection(collection)?;
    let top_k = top_k.unwrap_or(config.retrieval.top_k);
    if top_k == 0 {
        return Err(RagError::Config("top_k must be at least 1".to_string()).into());
    }
    let embedder = create_embedder(&config.embedding)?;
    let generator = create_generator(&config.generation)?;
    let store = SqliteStore::open(&config.store.path).await?;

    let req = QueryRequest {
        collection: name,
        query,
        top_k,
        project_name: &config.prompt.project_name,
    };
    let outcome = answer_query(embedder.as_ref(), &store, generator.as_ref(), &req).await;
    store.close().await;

    if show_prompt {
        print_framed("PROMPT:", &outcome.prompt);
    }
    tracing::debug!(generator = generator.name(), "printing response");
    print_framed("GEMINI RESPONSE:", &outcome.response);
    Ok(outcome)
}

fn print_framed(title: &str, body: &str) {
    let banner = "=".repeat(BANNER_WIDTH);
    println!("\n{}", banner);
    println!("{}", title);
    println!("{}", banner);
    println!("{}", body);
    println!("{}", banner);
}
