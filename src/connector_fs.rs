//! Project tree scan for ingestion.
//!
//! Walks the project root in sorted order, prunes excluded directories
//! before descending, and applies the collection's [`PathFilter`] to each
//! file, counting what was seen and skipped.

use std::path::{Path, PathBuf};

use anyhow::Result;
use walkdir::{DirEntry, WalkDir};

use codebase_rag_core::filter::{FilterDecision, PathFilter};
use codebase_rag_core::RagError;

/// A file selected for ingestion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    /// Relative to the project root, `/`-separated.
    pub rel_path: String,
}

#[derive(Debug, Default)]
pub struct Scan {
    /// Accepted files, sorted by `rel_path`.
    pub files: Vec<SourceFile>,
    /// Every regular file the walk visited.
    pub seen: usize,
    /// Files rejected by the filter.
    pub skipped: usize,
}

/// Walks `root` and returns the files `filter` accepts.
///
/// Directories whose relative path hits an exclude substring are pruned
/// without descending. Unreadable directory entries are logged and skipped.
pub fn scan_project(root: &Path, filter: &PathFilter) -> Result<Scan> {
    if !root.is_dir() {
        return Err(RagError::ProjectRootMissing(root.to_path_buf()).into());
    }

    let mut scan = Scan::default();

    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_excluded_dir(root, e, filter));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("skipping unreadable entry: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        scan.seen += 1;

        let rel_path = relative_path(root, entry.path());
        match filter.decide(&rel_path) {
            FilterDecision::Accept => scan.files.push(SourceFile {
                path: entry.into_path(),
                rel_path,
            }),
            reason => {
                tracing::debug!(path = %rel_path, ?reason, "skipping file");
                scan.skipped += 1;
            }
        }
    }

    scan.files.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
    Ok(scan)
}

fn is_excluded_dir(root: &Path, entry: &DirEntry, filter: &PathFilter) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && filter.is_excluded(&relative_path(root, entry.path()))
}

fn relative_path(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
