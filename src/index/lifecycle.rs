//! Page lifecycle events.
//!
//! Called by the page-content collaborator after the content change has been
//! committed. Each event leaves the index consistent with the new content or
//! fails with the index unchanged.

use super::ReferenceIndex;
use crate::core::PageName;
use crate::debug;
use crate::store::StoreError;

impl ReferenceIndex {
    /// A page was created with `text`.
    ///
    /// Dangling references whose name is `name` or one of its alias forms
    /// are repointed at the new page.
    pub fn on_page_created(&self, name: &PageName, text: &str) -> Result<(), StoreError> {
        self.index_page(name, text)
    }

    /// A page was saved with `text`. Saving an unknown page creates it.
    ///
    /// Links are re-resolved against the current pages and only the changed
    /// references are touched. A save that changes nothing commits nothing.
    pub fn on_page_saved(&self, name: &PageName, text: &str) -> Result<(), StoreError> {
        self.index_page(name, text)
    }

    /// A page was deleted.
    ///
    /// Its outbound references are dropped. Pages linking to it keep their
    /// reference, which now dangles and shows up in [`find_uncreated`].
    ///
    /// [`find_uncreated`]: ReferenceIndex::find_uncreated
    pub fn on_page_deleted(&self, name: &PageName) -> Result<(), StoreError> {
        let _gate = self.gate.read();
        let result = {
            let lock = self.page_lock(name);
            let _page = lock.lock();
            self.remove_page(name)
        };
        self.release_page_lock(name);
        result
    }

    /// A page was renamed from `old` to `new`.
    ///
    /// `new` takes over the outbound references of `old` (a self-reference
    /// follows the rename) and every referrer of `old` is repointed at `new`,
    /// one referrer per transaction. Each repoint is idempotent, so a rename
    /// that failed half-way can simply be retried.
    pub fn on_page_renamed(&self, old: &PageName, new: &PageName) -> Result<(), StoreError> {
        if old == new {
            return Ok(());
        }

        let _gate = self.gate.read();
        // Fixed lock order so two renames of the same pair cannot deadlock
        let (first, second) = if old < new { (old, new) } else { (new, old) };
        let first_lock = self.page_lock(first);
        let second_lock = self.page_lock(second);
        let first_guard = first_lock.lock();
        let second_guard = second_lock.lock();

        // Move the page itself. Nothing left to move means an earlier
        // attempt already did, and `new` must keep what it inherited.
        self.store.transact(|txn| {
            let tables = txn.tables();
            let existed = tables.exists(old.as_str());
            let outbound = tables.outbound(old.as_str()).cloned();
            if !existed && outbound.is_none() {
                return Ok(());
            }
            let outbound = outbound.unwrap_or_default();
            let digest = tables.digest(old.as_str()).map(str::to_string);

            txn.remove_all_edges(old);
            txn.set_exists(old, false);
            if existed {
                txn.set_exists(new, true);
                txn.set_digest(new, digest);
            }

            let moved = outbound
                .into_iter()
                .map(|dest| if &dest == old { new.clone() } else { dest })
                .collect();
            txn.set_outbound(new, &moved);
            Ok(())
        })?;

        // Repoint referrers, one transaction each
        let referrers = self.store.read(|t| t.referred_by(old.as_str()));
        for referrer in &referrers {
            self.store.transact(|txn| {
                txn.rewrite_edge(referrer, old, new);
                Ok(())
            })?;
        }

        // Dangling aliases of the new name now have a target
        self.store.transact(|txn| {
            if txn.tables().exists(new.as_str()) {
                self.adopt_aliases(txn, new);
            }
            Ok(())
        })?;

        drop(second_guard);
        drop(first_guard);
        drop(second_lock);
        drop(first_lock);
        self.release_page_lock(old);

        debug!("index"; "renamed {} to {} ({} referrers)", old, new, referrers.len());
        Ok(())
    }

    /// Shared create/save path.
    fn index_page(&self, name: &PageName, text: &str) -> Result<(), StoreError> {
        let _gate = self.gate.read();
        let lock = self.page_lock(name);
        let _page = lock.lock();

        // No digest shortcut here: identical text can still resolve
        // differently once an exact or singular page has appeared.
        let page = self.extract(name, text);
        self.apply(page)
    }

    /// Drop `name` as a page, keeping inbound references. Caller holds the
    /// page lock or the exclusive gate.
    pub(super) fn remove_page(&self, name: &PageName) -> Result<(), StoreError> {
        self.store.transact(|txn| {
            let removed = txn.remove_all_edges(name);
            txn.set_exists(name, false);
            debug!("index"; "{}: deleted, dropped {} references", name, removed);
            Ok(())
        })
    }
}
