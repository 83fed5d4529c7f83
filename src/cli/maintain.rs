//! Commands that change the index: rebuild, sync and page lifecycle.
//!
//! Lifecycle commands change the page file first and then report the event
//! to the index, the same order a wiki engine follows.

use anyhow::{Context, Result, anyhow};

use super::common::{fresh_index, open_index, page_name};
use crate::config::WikiConfig;
use crate::log;
use crate::page::PageSource;
use crate::utils::plural_count;

/// Rebuild the index from scratch, replacing whatever was persisted.
pub fn rebuild(config: &WikiConfig) -> Result<()> {
    let (index, _) = fresh_index(config);
    log!("rebuild"; "scanning {}", config.pages_dir().display());

    let stats = index.rebuild().context("rebuild failed")?;
    log!(
        "rebuild";
        "indexed {} with {}, {} uncreated, {} unreferenced",
        plural_count(stats.pages, "page"),
        plural_count(stats.edges, "reference"),
        stats.uncreated,
        stats.unreferenced
    );
    Ok(())
}

/// Re-index pages changed since the index was last written.
pub fn sync(config: &WikiConfig) -> Result<()> {
    let (index, _) = open_index(config)?;
    let report = index.sync().context("sync failed")?;
    log!(
        "sync";
        "{} re-indexed, {} removed, {} unchanged",
        plural_count(report.indexed, "page"),
        report.removed,
        report.unchanged
    );
    Ok(())
}

/// Index a page after its file was written.
pub fn save(config: &WikiConfig, page: &str) -> Result<()> {
    let name = page_name(page)?;
    let (index, source) = open_index(config)?;

    let text = source
        .read(&name)
        .with_context(|| format!("failed to read page `{name}`"))?
        .ok_or_else(|| anyhow!("page `{name}` not found in {}", source.dir().display()))?;

    index.on_page_saved(&name, &text)?;
    log!(
        "index";
        "{}: {}",
        name,
        plural_count(index.get_refers_to(name.as_str()).len(), "reference")
    );
    Ok(())
}

/// Delete a page file and drop the page from the index.
pub fn delete(config: &WikiConfig, page: &str) -> Result<()> {
    let name = page_name(page)?;
    let (index, source) = open_index(config)?;

    let removed = source
        .remove(&name)
        .with_context(|| format!("failed to delete page `{name}`"))?;
    if !removed {
        log!("warning"; "page `{}` has no file, dropping it from the index only", name);
    }

    index.on_page_deleted(&name)?;
    let dangling = index.get_referred_by(name.as_str()).len();
    log!(
        "index";
        "deleted {}, {} still linking to it",
        name,
        plural_count(dangling, "page")
    );
    Ok(())
}

/// Rename a page file and repoint references to it.
pub fn rename(config: &WikiConfig, old: &str, new: &str) -> Result<()> {
    let old = page_name(old)?;
    let new = page_name(new)?;
    let (index, source) = open_index(config)?;

    source
        .rename(&old, &new)
        .with_context(|| format!("failed to rename page `{old}` to `{new}`"))?;

    index.on_page_renamed(&old, &new)?;
    log!(
        "index";
        "renamed {} to {}, {} repointed",
        old,
        new,
        plural_count(index.get_referred_by(new.as_str()).len(), "referrer")
    );
    Ok(())
}
