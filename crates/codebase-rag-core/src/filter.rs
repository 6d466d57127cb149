//! Per-collection file selection.
//!
//! A [`PathFilter`] decides whether a file (identified by its path relative
//! to the project root) belongs in a collection. Rules apply in order:
//!
//! 1. Extension allow-list. Files named in `always_include_files` pass this
//!    step whatever their extension.
//! 2. Include prefixes. When any are configured, the path must contain one.
//! 3. Exclude substrings. Any match rejects the file, overriding 1 and 2.

use serde::{Deserialize, Serialize};

use crate::models::file_extension;

pub const DEFAULT_EXTENSIONS: &[&str] = &[
    ".tsx", ".ts", ".js", ".jsx", ".astro", ".md", ".json", ".yml", ".yaml", ".scss", ".css",
    ".py", ".sh",
];

pub const DEFAULT_ALWAYS_INCLUDE: &[&str] = &[
    "package.json",
    "tsconfig.json",
    "astro.config.json",
    "vercel.json",
];

pub const DEFAULT_EXCLUDES: &[&str] = &[
    "node_modules",
    ".git",
    "dist",
    "build",
    ".next",
    "__pycache__",
    ".pytest_cache",
    "coverage",
    "venv",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathFilter {
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    #[serde(default = "default_always_include")]
    pub always_include_files: Vec<String>,
    #[serde(default)]
    pub include_prefixes: Vec<String>,
    #[serde(default = "default_excludes")]
    pub exclude_substrings: Vec<String>,
}

fn to_strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn default_extensions() -> Vec<String> {
    to_strings(DEFAULT_EXTENSIONS)
}

fn default_always_include() -> Vec<String> {
    to_strings(DEFAULT_ALWAYS_INCLUDE)
}

fn default_excludes() -> Vec<String> {
    to_strings(DEFAULT_EXCLUDES)
}

impl Default for PathFilter {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
            always_include_files: default_always_include(),
            include_prefixes: Vec::new(),
            exclude_substrings: default_excludes(),
        }
    }
}

/// Outcome of [`PathFilter::decide`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterDecision {
    Accept,
    /// Extension not allowed and not a named config file.
    Extension,
    /// Outside every configured include prefix.
    NotIncluded,
    /// Matched an exclude substring.
    Excluded,
}

impl FilterDecision {
    pub fn is_accept(self) -> bool {
        self == FilterDecision::Accept
    }
}

impl PathFilter {
    pub fn decide(&self, rel_path: &str) -> FilterDecision {
        let file_name = rel_path.rsplit('/').next().unwrap_or(rel_path);
        let ext = file_extension(rel_path);
        let named = self.always_include_files.iter().any(|f| f == file_name);
        if !named && !self.extensions.iter().any(|e| *e == ext) {
            return FilterDecision::Extension;
        }

        if !self.include_prefixes.is_empty()
            && !self.include_prefixes.iter().any(|p| rel_path.contains(p.as_str()))
        {
            return FilterDecision::NotIncluded;
        }

        if self.is_excluded(rel_path) {
            return FilterDecision::Excluded;
        }

        FilterDecision::Accept
    }

    /// True when `rel_path` contains any exclude substring. Also used to
    /// prune whole directories during the walk.
    pub fn is_excluded(&self, rel_path: &str) -> bool {
        self.exclude_substrings
            .iter()
            .any(|s| rel_path.contains(s.as_str()))
    }

    pub fn accepts(&self, rel_path: &str) -> bool {
        self.decide(rel_path).is_accept()
    }
}
