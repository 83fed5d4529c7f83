//! In-memory reference tables.
//!
//! Maintains both forward (page → pages it links to) and reverse
//! (page → pages linking to it) mappings, plus the derived sets.
//!
//! # Invariants
//! - Forward and reverse mappings are always consistent
//! - Sets stored in either map are never empty (empty entries are pruned)
//! - `not_created` = { d | reverse[d] non-empty, d not an existing page }
//! - `not_referenced` = { p | p existing page, reverse[p] empty }
//!
//! All mutation goes through [`Transaction`](super::Transaction).

use std::collections::BTreeSet;

use rustc_hash::FxHashMap;

use super::backend::{NodeRecord, RootRecord, Snapshot};
use crate::core::{PageName, PageSet};
use crate::resolve::PageExists;

type PageSetMap = FxHashMap<PageName, PageSet>;

/// Edge tables and derived sets.
#[derive(Debug, Default, Clone)]
pub struct Tables {
    /// Forward: page → pages it links to (outgoing links)
    pub(super) refers_to: PageSetMap,
    /// Reverse: page → pages that link to it (backlinks)
    pub(super) referred_by: PageSetMap,
    /// Pages that currently exist.
    pub(super) pages: PageSet,
    /// Content digest each existing page was last indexed from.
    pub(super) digests: FxHashMap<PageName, String>,
    pub(super) not_created: PageSet,
    pub(super) not_referenced: PageSet,
}

/// Counters reported by `stats`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct IndexStats {
    pub pages: usize,
    pub edges: usize,
    pub uncreated: usize,
    pub unreferenced: usize,
}

impl Tables {
    pub fn new() -> Self {
        Self::default()
    }

    // -------------------------------------------------------------------------
    // Queries
    // -------------------------------------------------------------------------

    /// Pages `name` links to.
    pub fn refers_to(&self, name: &str) -> Vec<PageName> {
        collect(self.refers_to.get(name))
    }

    /// Pages linking to `name`.
    pub fn referred_by(&self, name: &str) -> Vec<PageName> {
        collect(self.referred_by.get(name))
    }

    #[inline]
    pub fn outbound(&self, name: &str) -> Option<&PageSet> {
        self.refers_to.get(name)
    }

    #[inline]
    pub fn inbound(&self, name: &str) -> Option<&PageSet> {
        self.referred_by.get(name)
    }

    pub fn not_created(&self) -> Vec<PageName> {
        self.not_created.iter().cloned().collect()
    }

    pub fn not_referenced(&self) -> Vec<PageName> {
        self.not_referenced.iter().cloned().collect()
    }

    pub fn is_not_created(&self, name: &str) -> bool {
        self.not_created.contains(name)
    }

    pub fn pages(&self) -> Vec<PageName> {
        self.pages.iter().cloned().collect()
    }

    #[inline]
    pub fn exists(&self, name: &str) -> bool {
        self.pages.contains(name)
    }

    pub fn digest(&self, name: &str) -> Option<&str> {
        self.digests.get(name).map(String::as_str)
    }

    /// Whether `name` has an entry at all.
    pub fn has_entry(&self, name: &str) -> bool {
        self.pages.contains(name)
            || self.refers_to.contains_key(name)
            || self.referred_by.contains_key(name)
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            pages: self.pages.len(),
            edges: self.refers_to.values().map(|set| set.len()).sum(),
            uncreated: self.not_created.len(),
            unreferenced: self.not_referenced.len(),
        }
    }

    // -------------------------------------------------------------------------
    // Derived sets
    // -------------------------------------------------------------------------

    /// Recompute derived membership of a single name. O(1).
    pub(super) fn refresh(&mut self, name: &PageName) {
        let exists = self.pages.contains(name);
        let referenced = self.referred_by.contains_key(name);

        if exists && !referenced {
            self.not_referenced.insert(name.clone());
        } else {
            self.not_referenced.remove(name);
        }

        if !exists && referenced {
            self.not_created.insert(name.clone());
        } else {
            self.not_created.remove(name);
        }
    }

    /// Recompute both derived sets from scratch.
    pub(super) fn recompute_derived(&mut self) {
        self.not_referenced = self
            .pages
            .iter()
            .filter(|p| !self.referred_by.contains_key(*p))
            .cloned()
            .collect();
        self.not_created = self
            .referred_by
            .keys()
            .filter(|d| !self.pages.contains(*d))
            .cloned()
            .collect();
    }

    // -------------------------------------------------------------------------
    // Persistence mapping
    // -------------------------------------------------------------------------

    /// Persisted form of one entry, or `None` if the name has no entry.
    pub(super) fn node(&self, name: &str) -> Option<NodeRecord> {
        if !self.has_entry(name) {
            return None;
        }
        Some(NodeRecord {
            exists: self.pages.contains(name),
            refers_to: sorted(self.refers_to.get(name)),
            referred_by: sorted(self.referred_by.get(name)),
            digest: self.digests.get(name).cloned(),
        })
    }

    pub(super) fn root(&self) -> RootRecord {
        RootRecord {
            not_created: self.not_created.iter().cloned().collect(),
            not_referenced: self.not_referenced.iter().cloned().collect(),
            ..RootRecord::default()
        }
    }

    pub(super) fn to_snapshot(&self) -> Snapshot {
        let names: BTreeSet<&PageName> = self
            .pages
            .iter()
            .chain(self.refers_to.keys())
            .chain(self.referred_by.keys())
            .collect();

        let nodes = names
            .into_iter()
            .filter_map(|name| self.node(name.as_str()).map(|node| (name.clone(), node)))
            .collect();

        Snapshot {
            root: self.root(),
            nodes,
        }
    }

    /// Rebuild tables from a persisted snapshot.
    ///
    /// The outbound sets are authoritative: inbound sets and the derived sets
    /// are recomputed from them. Returns the tables and the number of persisted
    /// inbound/derived entries that disagreed with the recomputation.
    pub(super) fn from_snapshot(snapshot: &Snapshot) -> (Self, usize) {
        let mut tables = Self::new();

        for (name, node) in &snapshot.nodes {
            if node.exists {
                tables.pages.insert(name.clone());
                if let Some(digest) = &node.digest {
                    tables.digests.insert(name.clone(), digest.clone());
                }
            }
            if !node.refers_to.is_empty() {
                tables
                    .refers_to
                    .insert(name.clone(), node.refers_to.iter().cloned().collect());
            }
            for dest in &node.refers_to {
                tables
                    .referred_by
                    .entry(dest.clone())
                    .or_default()
                    .insert(name.clone());
            }
        }
        tables.recompute_derived();

        let mut mismatches = snapshot
            .nodes
            .iter()
            .filter(|(name, node)| node.referred_by != sorted(tables.referred_by.get(*name)))
            .count();
        if snapshot.root != tables.root() {
            mismatches += 1;
        }

        (tables, mismatches)
    }
}

impl PageExists for Tables {
    #[inline]
    fn page_exists(&self, name: &str) -> bool {
        self.pages.contains(name)
    }
}

fn collect(set: Option<&PageSet>) -> Vec<PageName> {
    set.map(|s| s.iter().cloned().collect()).unwrap_or_default()
}

fn sorted(set: Option<&PageSet>) -> BTreeSet<PageName> {
    set.map(|s| s.iter().cloned().collect()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> PageName {
        PageName::from(s)
    }

    #[test]
    fn test_refresh_classifies_names() {
        let mut t = Tables::new();
        t.pages.insert(name("Orphan"));
        t.refresh(&name("Orphan"));
        assert!(t.not_referenced.contains("Orphan"));

        t.referred_by
            .entry(name("Missing"))
            .or_default()
            .insert(name("Orphan"));
        t.refresh(&name("Missing"));
        assert!(t.not_created.contains("Missing"));
        assert!(!t.not_referenced.contains("Missing"));
    }

    #[test]
    fn test_snapshot_recomputes_inbound() {
        let mut snapshot = Snapshot::default();
        snapshot.nodes.insert(
            name("A"),
            NodeRecord {
                exists: true,
                refers_to: [name("B"), name("C")].into_iter().collect(),
                ..Default::default()
            },
        );
        snapshot.nodes.insert(
            name("B"),
            NodeRecord {
                exists: true,
                ..Default::default()
            },
        );

        let (tables, mismatches) = Tables::from_snapshot(&snapshot);
        assert_eq!(tables.referred_by("B"), vec![name("A")]);
        assert_eq!(tables.not_created(), vec![name("C")]);
        assert_eq!(tables.not_referenced(), vec![name("A")]);
        // B's persisted inbound set and the root were both stale
        assert_eq!(mismatches, 2);

        let (again, clean) = Tables::from_snapshot(&tables.to_snapshot());
        assert_eq!(clean, 0);
        assert_eq!(again.stats(), tables.stats());
    }

    #[test]
    fn test_unknown_name_queries_are_empty() {
        let t = Tables::new();
        assert!(t.refers_to("Nope").is_empty());
        assert!(t.referred_by("Nope").is_empty());
        assert!(t.node("Nope").is_none());
    }
}
