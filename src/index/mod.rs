//! The reference index: lifecycle events in, reference queries out.
//!
//! # Architecture
//!
//! ```text
//! on_page_* ──► LinkExtractor ──► Canonicalizer ──► ReferenceStore ──► RefBackend
//!                 (raw names)      (page names)      (Transaction)      (persist)
//! ```
//!
//! Lifecycle events on the same page are serialized by a per-page lock;
//! events on different pages run in parallel up to the store's write lock,
//! which is held only while one transaction is applied and committed.
//! `rebuild` and `sync` take the index gate exclusively, so they never
//! interleave with events.

mod lifecycle;
mod rebuild;

#[cfg(test)]
mod tests;

pub use rebuild::SyncReport;

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};

use crate::config::IndexConfig;
use crate::core::{PageName, PageSet};
use crate::debug;
use crate::extract::LinkExtractor;
use crate::page::PageSource;
use crate::resolve::Canonicalizer;
use crate::store::{IndexStats, RefBackend, ReferenceStore, StoreError, Transaction};
use crate::utils::hash;

/// Reference index of one wiki.
pub struct ReferenceIndex {
    store: ReferenceStore,
    extractor: LinkExtractor,
    canonicalizer: Canonicalizer,
    source: Arc<dyn PageSource>,
    page_locks: DashMap<PageName, Arc<Mutex<()>>>,
    /// Shared by lifecycle events, exclusive for rebuild and sync.
    gate: RwLock<()>,
}

/// Links of one page, extracted but not yet resolved.
struct Extracted {
    name: PageName,
    digest: String,
    raw: Vec<PageName>,
}

impl ReferenceIndex {
    pub fn new(store: ReferenceStore, source: Arc<dyn PageSource>, options: IndexConfig) -> Self {
        Self {
            store,
            extractor: LinkExtractor::new(options.syntax),
            canonicalizer: Canonicalizer::from_config(options.match_plurals),
            source,
            page_locks: DashMap::new(),
            gate: RwLock::new(()),
        }
    }

    /// Open the index persisted in `backend`, rebuilding it from `source` if
    /// nothing was persisted yet.
    ///
    /// Returns the index and whether a persisted snapshot was loaded.
    pub fn open(
        backend: impl RefBackend + 'static,
        source: Arc<dyn PageSource>,
        options: IndexConfig,
    ) -> Result<(Self, bool), StoreError> {
        let (store, loaded) = ReferenceStore::open(backend)?;
        let index = Self::new(store, source, options);
        if !loaded {
            debug!("index"; "no persisted index, rebuilding");
            index.rebuild()?;
        }
        Ok((index, loaded))
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Pages `name` links to. Empty for unknown names.
    pub fn get_refers_to(&self, name: &str) -> Vec<PageName> {
        sorted(self.store.read(|t| t.refers_to(name)))
    }

    /// Pages linking to `name`. Empty for unknown names.
    pub fn get_referred_by(&self, name: &str) -> Vec<PageName> {
        sorted(self.store.read(|t| t.referred_by(name)))
    }

    /// Link targets that have no page.
    pub fn find_uncreated(&self) -> Vec<PageName> {
        sorted(self.store.read(|t| t.not_created()))
    }

    /// Existing pages nothing links to.
    pub fn find_unreferenced(&self) -> Vec<PageName> {
        sorted(self.store.read(|t| t.not_referenced()))
    }

    /// Every page the index knows to exist.
    pub fn find_created(&self) -> Vec<PageName> {
        sorted(self.store.read(|t| t.pages()))
    }

    pub fn stats(&self) -> IndexStats {
        self.store.read(|t| t.stats())
    }

    // =========================================================================
    // Shared helpers
    // =========================================================================

    fn page_lock(&self, name: &PageName) -> Arc<Mutex<()>> {
        self.page_locks.entry(name.clone()).or_default().clone()
    }

    /// Forget the lock of a page that is gone, unless it is still held.
    fn release_page_lock(&self, name: &PageName) {
        self.page_locks
            .remove_if(name, |_, lock| Arc::strong_count(lock) == 1);
    }

    /// Extract raw link names from `text`.
    fn extract(&self, name: &PageName, text: &str) -> Extracted {
        let mut links = self.extractor.links(text);
        let raw: Vec<PageName> = links.by_ref().filter_map(|s| PageName::new(&s)).collect();
        for ignored in links.ignored() {
            debug!("index"; "{}: ignored {:?} at byte {}", name, ignored.reason, ignored.offset);
        }
        Extracted {
            name: name.clone(),
            digest: hash::digest(text),
            raw,
        }
    }

    /// Whether `name` was last indexed from text with this digest.
    fn is_unchanged(&self, name: &PageName, digest: &str) -> bool {
        self.store
            .read(|t| t.exists(name.as_str()) && t.digest(name.as_str()) == Some(digest))
    }

    /// Record `page` as existing with the outbound set its links resolve to.
    fn apply(&self, page: Extracted) -> Result<(), StoreError> {
        self.store.transact(|txn| {
            let created = !txn.tables().exists(page.name.as_str());
            txn.set_exists(&page.name, true);

            let targets = self.resolve_all(txn, &page.raw);
            let (added, removed) = txn.set_outbound(&page.name, &targets);
            txn.set_digest(&page.name, Some(page.digest));

            if created {
                self.adopt_aliases(txn, &page.name);
            }
            debug!("index"; "{}: +{} -{} references", page.name, added, removed);
            Ok(())
        })
    }

    /// Canonicalize raw names against the transaction's current page set.
    fn resolve_all(&self, txn: &Transaction<'_>, raw: &[PageName]) -> PageSet {
        raw.iter()
            .map(|name| self.canonicalizer.canonicalize(name, txn.tables()).into_name())
            .collect()
    }

    /// Repoint dangling references to alias forms of a page that now exists.
    fn adopt_aliases(&self, txn: &mut Transaction<'_>, name: &PageName) {
        for alias in self.canonicalizer.alias_candidates(name) {
            if &alias == name || !txn.tables().is_not_created(alias.as_str()) {
                continue;
            }
            let resolved = self.canonicalizer.canonicalize(&alias, txn.tables());
            if !resolved.is_resolved() {
                continue;
            }
            let referrers: Vec<PageName> = txn.tables().referred_by(alias.as_str());
            for referrer in &referrers {
                txn.rewrite_edge(referrer, &alias, resolved.name());
            }
            debug!("index"; "repointed {} references from {} to {}", referrers.len(), alias, resolved.name());
        }
    }
}

fn sorted(mut names: Vec<PageName>) -> Vec<PageName> {
    names.sort_unstable();
    names
}
