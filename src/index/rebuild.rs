//! Full rebuild and incremental sync against the page source.

use rayon::prelude::*;
use rustc_hash::FxHashSet;
use serde::Serialize;

use super::{Extracted, ReferenceIndex};
use crate::core::PageName;
use crate::debug;
use crate::store::{IndexStats, StoreError, Tables, Transaction};

/// Scans attempted before a changing page set is reported.
const REBUILD_ATTEMPTS: usize = 2;

/// Outcome of [`ReferenceIndex::sync`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Pages (re)indexed because they were new or their text changed.
    pub indexed: usize,
    /// Pages dropped because they no longer exist.
    pub removed: usize,
    pub unchanged: usize,
}

impl ReferenceIndex {
    /// Rebuild the whole index from the page source.
    ///
    /// Links are extracted in parallel into staging tables, which are
    /// persisted and then swapped in. If the page set changes during the
    /// scan the rebuild restarts once before giving up with
    /// [`StoreError::InconsistentRebuild`]. On any failure the previous
    /// index stays in place.
    pub fn rebuild(&self) -> Result<IndexStats, StoreError> {
        let _gate = self.gate.write();

        for attempt in 1..=REBUILD_ATTEMPTS {
            let before = self.source.page_names().map_err(StoreError::Pages)?;
            let staged = self.scan(&before)?;
            let after = self.source.page_names().map_err(StoreError::Pages)?;

            if same_pages(&before, &after) {
                let stats = staged.stats();
                self.store.replace(staged)?;
                debug!("rebuild"; "indexed {} pages, {} references", stats.pages, stats.edges);
                return Ok(stats);
            }
            debug!("rebuild"; "page set changed during scan (attempt {})", attempt);
        }

        Err(StoreError::InconsistentRebuild {
            attempts: REBUILD_ATTEMPTS,
        })
    }

    /// Reconcile the index with the page source.
    ///
    /// Pages whose text digest differs from the one they were indexed from
    /// (or that are new) are re-indexed against the full listed page set;
    /// pages no longer in the source are deleted. Everything else is left
    /// alone.
    pub fn sync(&self) -> Result<SyncReport, StoreError> {
        let _gate = self.gate.write();

        let names = self.source.page_names().map_err(StoreError::Pages)?;
        let listed: FxHashSet<&PageName> = names.iter().collect();
        let mut report = SyncReport::default();

        let gone: Vec<PageName> = self
            .store
            .read(|t| t.pages())
            .into_iter()
            .filter(|name| !listed.contains(name))
            .collect();
        for name in &gone {
            self.remove_page(name)?;
            self.release_page_lock(name);
        }
        report.removed = gone.len();

        let changed: Vec<Extracted> = self
            .read_all(&names)?
            .into_iter()
            .filter(|page| !self.is_unchanged(&page.name, &page.digest))
            .collect();
        report.unchanged = names.len() - changed.len();
        report.indexed = changed.len();

        // New pages must exist before any link is resolved, as in a rebuild
        let created: Vec<PageName> = self.store.transact(|txn| {
            let created: Vec<PageName> = changed
                .iter()
                .filter(|page| !txn.tables().exists(page.name.as_str()))
                .map(|page| page.name.clone())
                .collect();
            for name in &created {
                txn.set_exists(name, true);
            }
            Ok(created)
        })?;

        for page in changed {
            self.apply(page)?;
        }

        if !created.is_empty() {
            self.store.transact(|txn| {
                for name in &created {
                    self.adopt_aliases(txn, name);
                }
                Ok(())
            })?;
        }

        debug!(
            "sync";
            "{} indexed, {} removed, {} unchanged",
            report.indexed, report.removed, report.unchanged
        );
        Ok(report)
    }

    /// Read and extract `names` in parallel. Pages that vanished are skipped.
    fn read_all(&self, names: &[PageName]) -> Result<Vec<Extracted>, StoreError> {
        let pages: Vec<Option<Extracted>> = names
            .par_iter()
            .map(|name| {
                let text = self
                    .source
                    .read(name)
                    .map_err(|e| StoreError::Content(name.clone(), e))?;
                Ok(text.map(|text| self.extract(name, &text)))
            })
            .collect::<Result<_, StoreError>>()?;
        Ok(pages.into_iter().flatten().collect())
    }

    /// Build complete tables for `names` without touching the store.
    fn scan(&self, names: &[PageName]) -> Result<Tables, StoreError> {
        let pages = self.read_all(names)?;

        let mut tables = Tables::new();
        let mut txn = Transaction::staging(&mut tables);
        // Every page must exist before any link is resolved
        for page in &pages {
            txn.set_exists(&page.name, true);
        }
        for page in pages {
            let targets = self.resolve_all(&txn, &page.raw);
            txn.set_outbound(&page.name, &targets);
            txn.set_digest(&page.name, Some(page.digest));
        }
        drop(txn);

        Ok(tables)
    }
}

fn same_pages(before: &[PageName], after: &[PageName]) -> bool {
    let before: FxHashSet<&PageName> = before.iter().collect();
    let after: FxHashSet<&PageName> = after.iter().collect();
    before == after
}
