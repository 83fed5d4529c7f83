//! Common utilities shared across CLI commands.

use std::sync::Arc;

use anyhow::{Context, Result, bail};

use crate::config::WikiConfig;
use crate::core::PageName;
use crate::index::ReferenceIndex;
use crate::log;
use crate::page::DirPageSource;
use crate::store::{FileBackend, ReferenceStore};
use crate::utils::plural_count;

/// Page files of the configured wiki.
pub fn page_source(config: &WikiConfig) -> Arc<DirPageSource> {
    Arc::new(DirPageSource::new(
        config.pages_dir(),
        config.pages.extension.as_str(),
    ))
}

/// Open the persisted index, building it first if there is none.
pub fn open_index(config: &WikiConfig) -> Result<(ReferenceIndex, Arc<DirPageSource>)> {
    let source = page_source(config);
    let backend = FileBackend::new(config.store_dir());

    let (index, loaded) = ReferenceIndex::open(backend, source.clone(), config.index)
        .with_context(|| {
            format!(
                "failed to open reference store at {}",
                config.store_dir().display()
            )
        })?;

    if !loaded {
        log!(
            "index";
            "built new index: {}",
            plural_count(index.stats().pages, "page")
        );
    }
    Ok((index, source))
}

/// Index over the configured wiki that ignores whatever is persisted.
pub fn fresh_index(config: &WikiConfig) -> (ReferenceIndex, Arc<DirPageSource>) {
    let source = page_source(config);
    let store = ReferenceStore::new(FileBackend::new(config.store_dir()));
    let index = ReferenceIndex::new(store, source.clone(), config.index);
    (index, source)
}

/// Validate a page name given on the command line.
pub fn page_name(raw: &str) -> Result<PageName> {
    match PageName::new(raw) {
        Some(name) => Ok(name),
        None => bail!("page name must not be empty"),
    }
}
