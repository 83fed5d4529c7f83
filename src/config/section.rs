//! `[pages]`, `[index]` and `[store]` sections.
//!
//! # Example
//!
//! ```toml
//! [pages]
//! dir = "pages"                 # Page files, one per page
//! extension = "txt"             # Only files with this extension are pages
//!
//! [index]
//! syntax = "wiki"               # "wiki" or "markdown"
//! match_plurals = true          # [Bugs] resolves to an existing "Bug"
//!
//! [store]
//! dir = ".wikiref/references"   # Persisted reference store
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::extract::Syntax;

/// Where page files live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PagesConfig {
    pub dir: PathBuf,
    /// File extension without the leading dot.
    pub extension: String,
}

impl Default for PagesConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("pages"),
            extension: "txt".into(),
        }
    }
}

/// How links are extracted and resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    pub syntax: Syntax,
    /// Resolve `[Bugs]` to `Bug` (and back) when only the alias exists.
    pub match_plurals: bool,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            syntax: Syntax::Wiki,
            match_plurals: true,
        }
    }
}

/// Where the reference store is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(".wikiref/references"),
        }
    }
}
