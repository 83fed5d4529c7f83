//! Journaled transactions over the reference tables.
//!
//! Every mutation goes through a [`Transaction`], which is the only place
//! where the forward and reverse maps are written. Before a name is first
//! modified its prior state is journaled, so a transaction whose commit fails
//! can be rolled back exactly.

use rustc_hash::FxHashMap;

use super::backend::ChangeSet;
use super::tables::Tables;
use crate::core::{PageName, PageSet};

/// State of one name before the transaction touched it.
#[derive(Debug)]
struct Prior {
    refers_to: Option<PageSet>,
    referred_by: Option<PageSet>,
    exists: bool,
    digest: Option<String>,
    not_created: bool,
    not_referenced: bool,
}

/// A unit of mutation against [`Tables`].
pub struct Transaction<'t> {
    tables: &'t mut Tables,
    /// `None` for staging transactions (rebuild), which are never rolled back.
    journal: Option<FxHashMap<PageName, Prior>>,
}

impl<'t> Transaction<'t> {
    pub(super) fn new(tables: &'t mut Tables) -> Self {
        Self {
            tables,
            journal: Some(FxHashMap::default()),
        }
    }

    /// Transaction over freshly built tables, without journaling.
    pub fn staging(tables: &'t mut Tables) -> Self {
        Self {
            tables,
            journal: None,
        }
    }

    /// Read access to the current (uncommitted) state.
    #[inline]
    pub fn tables(&self) -> &Tables {
        self.tables
    }

    /// Whether anything was modified.
    pub fn is_empty(&self) -> bool {
        self.journal.as_ref().is_none_or(|j| j.is_empty())
    }

    // -------------------------------------------------------------------------
    // Edge operations
    // -------------------------------------------------------------------------

    /// Add edge `from → to`. No-op if present.
    pub fn add_edge(&mut self, from: &PageName, to: &PageName) {
        if self.tables.refers_to.get(from).is_some_and(|s| s.contains(to)) {
            return;
        }
        self.touch(from);
        self.touch(to);

        self.tables
            .refers_to
            .entry(from.clone())
            .or_default()
            .insert(to.clone());
        self.tables
            .referred_by
            .entry(to.clone())
            .or_default()
            .insert(from.clone());
        self.tables.refresh(to);
    }

    /// Remove edge `from → to`. No-op if absent.
    pub fn remove_edge(&mut self, from: &PageName, to: &PageName) {
        if !self.tables.refers_to.get(from).is_some_and(|s| s.contains(to)) {
            return;
        }
        self.touch(from);
        self.touch(to);

        remove_from(&mut self.tables.refers_to, from, to);
        remove_from(&mut self.tables.referred_by, to, from);
        self.tables.refresh(to);
    }

    /// Replace the outbound set of `from`, applying only the difference.
    ///
    /// Returns the number of edges added and removed.
    pub fn set_outbound(&mut self, from: &PageName, targets: &PageSet) -> (usize, usize) {
        let (removed, added): (Vec<PageName>, Vec<PageName>) =
            match self.tables.refers_to.get(from) {
                Some(old) => (
                    old.difference(targets).cloned().collect(),
                    targets.difference(old).cloned().collect(),
                ),
                None => (Vec::new(), targets.iter().cloned().collect()),
            };

        for to in &removed {
            self.remove_edge(from, to);
        }
        for to in &added {
            self.add_edge(from, to);
        }
        (added.len(), removed.len())
    }

    /// Remove every outbound edge of `from`.
    ///
    /// Inbound edges are kept: referrers still point at `from`, which becomes
    /// a dangling name once it no longer exists.
    pub fn remove_all_edges(&mut self, from: &PageName) -> usize {
        self.set_outbound(from, &PageSet::default()).1
    }

    /// Repoint `referrer → from` to `referrer → to`.
    ///
    /// Idempotent: returns `false` without changes if the edge is gone.
    pub fn rewrite_edge(&mut self, referrer: &PageName, from: &PageName, to: &PageName) -> bool {
        if !self
            .tables
            .refers_to
            .get(referrer)
            .is_some_and(|s| s.contains(from))
        {
            return false;
        }
        self.remove_edge(referrer, from);
        self.add_edge(referrer, to);
        true
    }

    // -------------------------------------------------------------------------
    // Page existence
    // -------------------------------------------------------------------------

    /// Mark `name` as an existing page (or not).
    pub fn set_exists(&mut self, name: &PageName, exists: bool) {
        if self.tables.pages.contains(name) == exists {
            return;
        }
        self.touch(name);
        if exists {
            self.tables.pages.insert(name.clone());
        } else {
            self.tables.pages.remove(name);
            self.tables.digests.remove(name);
        }
        self.tables.refresh(name);
    }

    /// Record the digest of the text `name` was indexed from.
    pub fn set_digest(&mut self, name: &PageName, digest: Option<String>) {
        if self.tables.digests.get(name) == digest.as_ref() {
            return;
        }
        self.touch(name);
        match digest {
            Some(d) => self.tables.digests.insert(name.clone(), d),
            None => self.tables.digests.remove(name),
        };
    }

    // -------------------------------------------------------------------------
    // Commit / rollback
    // -------------------------------------------------------------------------

    /// Persisted form of every touched node, plus the root.
    pub(super) fn changes(&self) -> ChangeSet {
        let nodes = self
            .journal
            .iter()
            .flat_map(|j| j.keys())
            .map(|name| (name.clone(), self.tables.node(name.as_str())))
            .collect();
        ChangeSet {
            nodes,
            root: self.tables.root(),
        }
    }

    /// Number of nodes touched so far.
    pub fn touched(&self) -> usize {
        self.journal.as_ref().map_or(0, |j| j.len())
    }

    /// Restore every touched name to its journaled state.
    pub(super) fn rollback(self) {
        let Some(journal) = self.journal else {
            return;
        };
        let t = self.tables;
        for (name, prior) in journal {
            restore(&mut t.refers_to, &name, prior.refers_to);
            restore(&mut t.referred_by, &name, prior.referred_by);

            if prior.exists {
                t.pages.insert(name.clone());
            } else {
                t.pages.remove(&name);
            }
            match prior.digest {
                Some(d) => t.digests.insert(name.clone(), d),
                None => t.digests.remove(&name),
            };
            if prior.not_created {
                t.not_created.insert(name.clone());
            } else {
                t.not_created.remove(&name);
            }
            if prior.not_referenced {
                t.not_referenced.insert(name);
            } else {
                t.not_referenced.remove(&name);
            }
        }
    }

    /// Journal the prior state of `name` on first touch.
    fn touch(&mut self, name: &PageName) {
        let Some(journal) = self.journal.as_mut() else {
            return;
        };
        if journal.contains_key(name) {
            return;
        }
        let t = &*self.tables;
        journal.insert(
            name.clone(),
            Prior {
                refers_to: t.refers_to.get(name).cloned(),
                referred_by: t.referred_by.get(name).cloned(),
                exists: t.pages.contains(name),
                digest: t.digests.get(name).cloned(),
                not_created: t.not_created.contains(name),
                not_referenced: t.not_referenced.contains(name),
            },
        );
    }
}

/// Remove `value` from `map[key]`, pruning the entry when it becomes empty.
fn remove_from(map: &mut FxHashMap<PageName, PageSet>, key: &PageName, value: &PageName) {
    if let Some(set) = map.get_mut(key) {
        set.remove(value);
        if set.is_empty() {
            map.remove(key);
        }
    }
}

fn restore(map: &mut FxHashMap<PageName, PageSet>, key: &PageName, prior: Option<PageSet>) {
    match prior {
        Some(set) => {
            map.insert(key.clone(), set);
        }
        None => {
            map.remove(key);
        }
    }
}
