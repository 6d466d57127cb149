//! `rag collections`: configured collections and what the store holds.

use std::collections::BTreeMap;

use anyhow::Result;

use codebase_rag_core::models::CollectionInfo;
use codebase_rag_core::store::CollectionStore;

use crate::config::{CollectionConfig, Config};
use crate::sqlite_store::SqliteStore;

/// One line of the listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionRow {
    pub name: String,
    pub description: String,
    pub filter: String,
    /// False for a stored collection missing from config.
    pub configured: bool,
    pub records: u64,
}

pub async fn run_collections(config: &Config) -> Result<Vec<CollectionRow>> {
    // Listing must not create the database as a side effect.
    let stored = if config.store.path.exists() {
        let store = SqliteStore::open(&config.store.path).await?;
        let infos = store.list().await?;
        store.close().await;
        infos
    } else {
        Vec::new()
    };

    let rows = collection_rows(config, &stored);
    print_rows(&config.retrieval.default_collection, &rows);
    Ok(rows)
}

/// Merges configured collections with stored ones, configured first.
pub fn collection_rows(config: &Config, stored: &[CollectionInfo]) -> Vec<CollectionRow> {
    let counts: BTreeMap<&str, &CollectionInfo> =
        stored.iter().map(|c| (c.name.as_str(), c)).collect();

    let mut rows: Vec<CollectionRow> = config
        .collections
        .iter()
        .map(|(name, settings)| CollectionRow {
            name: name.clone(),
            description: settings.description.clone(),
            filter: summarize_filter(settings),
            configured: true,
            records: counts.get(name.as_str()).map(|c| c.record_count).unwrap_or(0),
        })
        .collect();

    rows.extend(
        stored
            .iter()
            .filter(|c| !config.collections.contains_key(&c.name))
            .map(|c| CollectionRow {
                name: c.name.clone(),
                description: c.description.clone(),
                filter: "(not configured)".to_string(),
                configured: false,
                records: c.record_count,
            }),
    );
    rows
}

fn summarize_filter(settings: &CollectionConfig) -> String {
    let f = &settings.filter;
    let mut parts = vec![format!("{} extensions", f.extensions.len())];
    if !f.include_prefixes.is_empty() {
        parts.push(format!("include {}", f.include_prefixes.join(",")));
    }
    if !f.exclude_substrings.is_empty() {
        parts.push(format!("{} excludes", f.exclude_substrings.len()));
    }
    parts.join("; ")
}

fn print_rows(default_collection: &str, rows: &[CollectionRow]) {
    println!("{:<20} {:>8}  {:<40} DESCRIPTION", "COLLECTION", "RECORDS", "FILTER");
    for row in rows {
        let marker = if row.name == default_collection { "*" } else { "" };
        println!(
            "{:<20} {:>8}  {:<40} {}",
            format!("{}{}", row.name, marker),
            row.records,
            row.filter,
            row.description
        );
    }
}
