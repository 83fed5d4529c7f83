//! Page name type for type-safe reference keys.

use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Canonical page name.
///
/// Invariants:
/// - Case-sensitive, compared by exact string equality
/// - Never empty, never surrounded by whitespace
///
/// Cloning is cheap (`Arc<str>`), since the same name is stored in both the
/// outbound and inbound tables.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageName(Arc<str>);

impl PageName {
    /// Create a page name, trimming surrounding whitespace.
    ///
    /// Returns `None` when nothing is left after trimming.
    pub fn new(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(Arc::from(trimmed)))
        }
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for PageName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for PageName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PageName {
    /// Infallible conversion for literals and already-validated names.
    ///
    /// Unlike [`PageName::new`] this keeps the string as given.
    fn from(s: &str) -> Self {
        Self(Arc::from(s))
    }
}
