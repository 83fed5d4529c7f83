//! Link name canonicalization with singular/plural aliasing.
//!
//! A raw link name resolves in a fixed order:
//!
//! 1. exact existing page
//! 2. singular form, if that page exists
//! 3. plural form, if that page exists
//! 4. otherwise the raw name, unresolved (a dangling reference)
//!
//! The order matters when both `Bug` and `Bugs` exist: `[Bugs]` resolves to
//! `Bugs` (exact), `[Bug]` to `Bug`, and the alias step is never reached.

use std::sync::Arc;

use crate::core::{PageName, PageSet};

/// Existence oracle consulted during canonicalization.
pub trait PageExists {
    fn page_exists(&self, name: &str) -> bool;
}

impl PageExists for PageSet {
    #[inline]
    fn page_exists(&self, name: &str) -> bool {
        self.contains(name)
    }
}

/// Pluralization strategy.
pub trait Inflector: Send + Sync {
    /// Singular form of `name`, if it has one distinct from `name`.
    fn singular(&self, name: &str) -> Option<String>;
    /// Plural form of `name`.
    fn plural(&self, name: &str) -> Option<String>;
}

/// English trailing-"s" heuristic: `Bugs` <-> `Bug`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrailingS;

impl Inflector for TrailingS {
    fn singular(&self, name: &str) -> Option<String> {
        name.strip_suffix('s')
            .filter(|stem| !stem.is_empty())
            .map(str::to_string)
    }

    fn plural(&self, name: &str) -> Option<String> {
        Some(format!("{name}s"))
    }
}

/// Outcome of canonicalizing a raw link name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Name of the existing page the link points at.
    Resolved(PageName),
    /// Raw name as written; no page matches.
    Unresolved(PageName),
}

impl Resolution {
    #[inline]
    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved(_))
    }

    #[inline]
    pub fn name(&self) -> &PageName {
        match self {
            Self::Resolved(name) | Self::Unresolved(name) => name,
        }
    }

    #[inline]
    pub fn into_name(self) -> PageName {
        match self {
            Self::Resolved(name) | Self::Unresolved(name) => name,
        }
    }
}

/// Resolves raw link names to canonical page names.
#[derive(Clone)]
pub struct Canonicalizer {
    /// `None` disables alias matching (exact names only).
    inflector: Option<Arc<dyn Inflector>>,
}

impl Default for Canonicalizer {
    fn default() -> Self {
        Self::with_inflector(TrailingS)
    }
}

impl std::fmt::Debug for Canonicalizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Canonicalizer")
            .field("match_plurals", &self.inflector.is_some())
            .finish()
    }
}

impl Canonicalizer {
    pub fn with_inflector(inflector: impl Inflector + 'static) -> Self {
        Self {
            inflector: Some(Arc::new(inflector)),
        }
    }

    /// Exact matching only.
    pub fn exact() -> Self {
        Self { inflector: None }
    }

    pub fn from_config(match_plurals: bool) -> Self {
        if match_plurals {
            Self::default()
        } else {
            Self::exact()
        }
    }

    /// Resolve `raw` against the pages in `pages`. Never fails.
    pub fn canonicalize(&self, raw: &PageName, pages: &impl PageExists) -> Resolution {
        if pages.page_exists(raw.as_str()) {
            return Resolution::Resolved(raw.clone());
        }

        if let Some(inflector) = &self.inflector {
            let aliases = [
                inflector.singular(raw.as_str()),
                inflector.plural(raw.as_str()),
            ];
            for alias in aliases.into_iter().flatten() {
                if pages.page_exists(&alias) {
                    return Resolution::Resolved(PageName::from(alias.as_str()));
                }
            }
        }

        Resolution::Unresolved(raw.clone())
    }

    /// Raw names that may resolve to `name` once it exists.
    ///
    /// Used when a page is created to find dangling references that now have a
    /// target. Always includes `name` itself.
    pub fn alias_candidates(&self, name: &PageName) -> Vec<PageName> {
        let mut out = vec![name.clone()];
        if let Some(inflector) = &self.inflector {
            let forms = [
                inflector.plural(name.as_str()),
                inflector.singular(name.as_str()),
            ];
            out.extend(
                forms
                    .into_iter()
                    .flatten()
                    .filter(|form| form != name.as_str())
                    .map(|form| PageName::from(form.as_str())),
            );
        }
        out
    }
}
