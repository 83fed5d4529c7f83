//! Durable bidirectional reference store.
//!
//! [`ReferenceStore`] owns the in-memory [`Tables`] behind a read-write lock
//! and a [`RefBackend`] that persists them. Readers see the last committed
//! state; writers go through [`ReferenceStore::transact`], which holds the
//! write lock for the duration of one [`Transaction`] and its commit.

mod backend;
mod error;
mod file;
mod tables;
mod txn;

pub use backend::{ChangeSet, MemoryBackend, NodeRecord, RefBackend, RootRecord, Snapshot};
pub use error::StoreError;
pub use file::FileBackend;
pub use tables::{IndexStats, Tables};
pub use txn::Transaction;

use parking_lot::RwLock;

use crate::debug;

/// Reference tables plus their persistence backend.
pub struct ReferenceStore {
    tables: RwLock<Tables>,
    backend: Box<dyn RefBackend>,
}

impl std::fmt::Debug for ReferenceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReferenceStore")
            .field("stats", &self.tables.read().stats())
            .finish_non_exhaustive()
    }
}

impl ReferenceStore {
    /// Empty store in front of `backend`, ignoring anything already persisted.
    pub fn new(backend: impl RefBackend + 'static) -> Self {
        Self {
            tables: RwLock::new(Tables::new()),
            backend: Box::new(backend),
        }
    }

    /// Open a store, loading the persisted snapshot if there is one.
    ///
    /// Returns the store and whether a snapshot was found.
    pub fn open(backend: impl RefBackend + 'static) -> Result<(Self, bool), StoreError> {
        let snapshot = backend.load()?;
        let store = Self::new(backend);
        let Some(snapshot) = snapshot else {
            return Ok((store, false));
        };

        let (tables, mismatches) = Tables::from_snapshot(&snapshot);
        if mismatches > 0 {
            debug!("store"; "{} persisted entries disagreed with outbound sets, recomputed", mismatches);
        }
        *store.tables.write() = tables;
        Ok((store, true))
    }

    /// Run `f` against the committed tables.
    #[inline]
    pub fn read<R>(&self, f: impl FnOnce(&Tables) -> R) -> R {
        f(&self.tables.read())
    }

    /// Run `f` inside a transaction and commit its changes.
    ///
    /// If `f` or the backend commit fails, every touched entry is restored and
    /// the error is returned. A transaction that changed nothing is not
    /// committed.
    pub fn transact<R>(
        &self,
        f: impl FnOnce(&mut Transaction<'_>) -> Result<R, StoreError>,
    ) -> Result<R, StoreError> {
        let mut tables = self.tables.write();
        let mut txn = Transaction::new(&mut tables);

        let value = match f(&mut txn) {
            Ok(value) => value,
            Err(e) => {
                txn.rollback();
                return Err(e);
            }
        };
        if txn.is_empty() {
            return Ok(value);
        }

        match self.backend.commit(&txn.changes()) {
            Ok(()) => Ok(value),
            Err(e) => {
                debug!("store"; "commit of {} nodes failed, rolling back: {}", txn.touched(), e);
                txn.rollback();
                Err(e)
            }
        }
    }

    /// Persist `staged` as the complete state, then swap it in.
    ///
    /// On failure the current tables are left untouched.
    pub fn replace(&self, mut staged: Tables) -> Result<(), StoreError> {
        staged.recompute_derived();
        let snapshot = staged.to_snapshot();

        let mut tables = self.tables.write();
        self.backend.replace(&snapshot)?;
        *tables = staged;
        Ok(())
    }
}
