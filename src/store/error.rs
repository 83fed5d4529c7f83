//! Reference store error types.

use std::path::PathBuf;
use thiserror::Error;

use crate::core::PageName;

/// Failure of a store operation.
///
/// Whenever one of these is returned, the in-memory tables and the derived
/// sets are exactly as they were before the operation started.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error at `{0}`")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("malformed store file `{0}`")]
    Serialize(PathBuf, #[source] serde_json::Error),

    #[error("corrupt store: {0}")]
    Corrupt(String),

    #[error("failed to list pages")]
    Pages(#[source] std::io::Error),

    #[error("failed to read page `{0}`")]
    Content(PageName, #[source] std::io::Error),

    #[error("page set changed while rebuilding (gave up after {attempts} attempts)")]
    InconsistentRebuild { attempts: usize },

    #[error("injected backend failure")]
    Injected,
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        Self::Io(path.into(), err)
    }
}
