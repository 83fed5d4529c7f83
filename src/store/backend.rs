//! Persistence backends for the reference tables.
//!
//! Persisted layout is a tree rooted at a fixed location:
//!
//! ```text
//! root      { version, notCreated: [..], notReferenced: [..] }
//! ├── Main  { exists, refersTo: [..], referredBy: [..], digest }
//! ├── About { ... }
//! └── ...
//! ```
//!
//! A backend receives either the nodes touched by one transaction
//! ([`ChangeSet`]) or a complete [`Snapshot`] after a rebuild.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::StoreError;
use crate::core::PageName;

/// Current persisted format version.
pub const FORMAT_VERSION: u32 = 1;

/// Persisted state of one page name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeRecord {
    /// Whether a page with this name exists.
    #[serde(default)]
    pub exists: bool,
    #[serde(default)]
    pub refers_to: BTreeSet<PageName>,
    #[serde(default)]
    pub referred_by: BTreeSet<PageName>,
    /// blake3 hex digest of the text the outbound set was extracted from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

/// Root properties: cached derived sets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RootRecord {
    pub version: u32,
    #[serde(default)]
    pub not_created: BTreeSet<PageName>,
    #[serde(default)]
    pub not_referenced: BTreeSet<PageName>,
}

impl Default for RootRecord {
    fn default() -> Self {
        Self {
            version: FORMAT_VERSION,
            not_created: BTreeSet::new(),
            not_referenced: BTreeSet::new(),
        }
    }
}

/// Complete persisted state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub root: RootRecord,
    pub nodes: BTreeMap<PageName, NodeRecord>,
}

/// Nodes touched by one transaction, plus the refreshed root.
///
/// A `None` record means the node no longer exists and must be removed.
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    pub nodes: Vec<(PageName, Option<NodeRecord>)>,
    pub root: RootRecord,
}

impl Snapshot {
    /// Apply a change set in place.
    pub fn apply(&mut self, changes: &ChangeSet) {
        for (name, record) in &changes.nodes {
            match record {
                Some(record) => {
                    self.nodes.insert(name.clone(), record.clone());
                }
                None => {
                    self.nodes.remove(name);
                }
            }
        }
        self.root = changes.root.clone();
    }
}

/// Durable storage for the reference tables.
///
/// `commit` and `replace` are all-or-nothing from the store's point of view:
/// on `Err` the in-memory tables are rolled back, so a backend must never
/// report success for a partial write.
pub trait RefBackend: Send + Sync {
    /// Load the persisted state, or `None` if nothing was persisted yet.
    fn load(&self) -> Result<Option<Snapshot>, StoreError>;

    /// Persist the nodes touched by one transaction.
    fn commit(&self, changes: &ChangeSet) -> Result<(), StoreError>;

    /// Replace the whole persisted state (used by rebuild).
    fn replace(&self, snapshot: &Snapshot) -> Result<(), StoreError>;
}

impl<B: RefBackend + ?Sized> RefBackend for std::sync::Arc<B> {
    fn load(&self) -> Result<Option<Snapshot>, StoreError> {
        (**self).load()
    }

    fn commit(&self, changes: &ChangeSet) -> Result<(), StoreError> {
        (**self).commit(changes)
    }

    fn replace(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        (**self).replace(snapshot)
    }
}

// ============================================================================
// MemoryBackend
// ============================================================================

/// Volatile backend, with failure injection for tests.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    snapshot: Mutex<Option<Snapshot>>,
    pass_commits: AtomicUsize,
    fail_commits: AtomicUsize,
    fail_replace: AtomicBool,
    commits: AtomicUsize,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` commits fail with [`StoreError::Injected`].
    pub fn fail_next_commits(&self, n: usize) {
        self.fail_commits_after(0, n);
    }

    /// Let `passing` commits through, then fail the `failing` after them.
    pub fn fail_commits_after(&self, passing: usize, failing: usize) {
        self.pass_commits.store(passing, Ordering::SeqCst);
        self.fail_commits.store(failing, Ordering::SeqCst);
    }

    /// Make the next replace fail with [`StoreError::Injected`].
    pub fn fail_next_replace(&self) {
        self.fail_replace.store(true, Ordering::SeqCst);
    }

    /// Number of successful commits so far.
    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> Option<Snapshot> {
        self.snapshot.lock().clone()
    }
}

impl RefBackend for MemoryBackend {
    fn load(&self) -> Result<Option<Snapshot>, StoreError> {
        Ok(self.snapshot.lock().clone())
    }

    fn commit(&self, changes: &ChangeSet) -> Result<(), StoreError> {
        let passing = self
            .pass_commits
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        let armed = !passing
            && self
                .fail_commits
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
        if armed {
            return Err(StoreError::Injected);
        }

        self.snapshot
            .lock()
            .get_or_insert_with(Snapshot::default)
            .apply(changes);
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn replace(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        if self.fail_replace.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Injected);
        }
        *self.snapshot.lock() = Some(snapshot.clone());
        Ok(())
    }
}
