//! On-disk backend: one JSON file per page node.
//!
//! ```text
//! .wikiref/references/
//! ├── root.json            # RootRecord
//! ├── commit.json          # pending commit, present only mid-commit
//! └── nodes/
//!     ├── %4Dain.json      # NodeRecord for "Main"
//!     └── ...
//! ```
//!
//! Node filenames are percent-encoded page names. Upper-case letters are
//! encoded too, so `Bug` and `bug` never collide on case-insensitive file
//! systems.
//!
//! A commit first writes every touched file next to its target as `*.tmp`.
//! Writing `commit.json` is the commit point: once it exists the temp files
//! are moved into place, and [`FileBackend::load`] finishes the moves if
//! that was interrupted. A commit that fails before the journal is written
//! leaves the tree as it was.

use std::fs;
use std::path::{Path, PathBuf};

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::StoreError;
use super::backend::{ChangeSet, FORMAT_VERSION, NodeRecord, RefBackend, RootRecord, Snapshot};
use crate::core::PageName;
use crate::{debug, log};

const ROOT_FILE: &str = "root.json";
const NODES_DIR: &str = "nodes";
const JOURNAL_FILE: &str = "commit.json";

const NODE_FILENAME: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .add(b'A')
    .add(b'B')
    .add(b'C')
    .add(b'D')
    .add(b'E')
    .add(b'F')
    .add(b'G')
    .add(b'H')
    .add(b'I')
    .add(b'J')
    .add(b'K')
    .add(b'L')
    .add(b'M')
    .add(b'N')
    .add(b'O')
    .add(b'P')
    .add(b'Q')
    .add(b'R')
    .add(b'S')
    .add(b'T')
    .add(b'U')
    .add(b'V')
    .add(b'W')
    .add(b'X')
    .add(b'Y')
    .add(b'Z');

/// Node files a commit moves into place, by encoded filename stem.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Journal {
    write: Vec<String>,
    remove: Vec<String>,
}

/// Backend persisting the reference tables under a directory.
#[derive(Debug, Clone)]
pub struct FileBackend {
    root: PathBuf,
}

impl FileBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory a replacement tree is written to before being swapped in.
    fn staging_dir(&self) -> PathBuf {
        self.root.with_extension("staging")
    }

    /// Where the previous tree is parked during the swap.
    fn parked_dir(&self) -> PathBuf {
        self.root.with_extension("old")
    }

    /// Finish a swap interrupted between its two renames, and a commit
    /// interrupted after its journal was written.
    fn recover(&self) -> Result<(), StoreError> {
        let parked = self.parked_dir();
        if !self.root.exists() && parked.is_dir() {
            debug!("store"; "restoring interrupted swap from {}", parked.display());
            fs::rename(&parked, &self.root).map_err(|e| StoreError::io(&parked, e))?;
        }

        self.finish_pending()
    }

    /// Apply a journal left behind by an unfinished commit.
    fn finish_pending(&self) -> Result<(), StoreError> {
        let journal_path = self.root.join(JOURNAL_FILE);
        if !journal_path.is_file() {
            return Ok(());
        }
        debug!("store"; "finishing interrupted commit");
        let journal: Journal = read_json(&journal_path)?;
        self.finish(&journal)
    }

    /// Write every file of `changes` as a temp file beside its target.
    ///
    /// On failure the temp files written so far are removed.
    fn stage(&self, changes: &ChangeSet) -> Result<Journal, StoreError> {
        let nodes_dir = self.root.join(NODES_DIR);
        fs::create_dir_all(&nodes_dir).map_err(|e| StoreError::io(&nodes_dir, e))?;

        let mut journal = Journal::default();
        let mut staged = Vec::new();
        let result = (|| -> Result<(), StoreError> {
            for (name, record) in &changes.nodes {
                let stem = encode_name(name);
                match record {
                    Some(record) => {
                        let tmp = temp_path(&node_file(&nodes_dir, &stem));
                        write_json(&tmp, record)?;
                        staged.push(tmp);
                        journal.write.push(stem);
                    }
                    None => journal.remove.push(stem),
                }
            }
            let tmp = temp_path(&self.root.join(ROOT_FILE));
            write_json(&tmp, &changes.root)?;
            staged.push(tmp);
            Ok(())
        })();

        if let Err(e) = result {
            for tmp in &staged {
                let _ = fs::remove_file(tmp);
            }
            return Err(e);
        }
        Ok(journal)
    }

    /// Move the staged files of `journal` into place and drop the journal.
    /// Safe to repeat.
    fn finish(&self, journal: &Journal) -> Result<(), StoreError> {
        let nodes_dir = self.root.join(NODES_DIR);
        for stem in &journal.write {
            move_staged(&node_file(&nodes_dir, stem))?;
        }
        for stem in &journal.remove {
            let path = node_file(&nodes_dir, stem);
            match fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(StoreError::io(&path, e)),
            }
        }
        move_staged(&self.root.join(ROOT_FILE))?;

        let journal_path = self.root.join(JOURNAL_FILE);
        fs::remove_file(&journal_path).map_err(|e| StoreError::io(&journal_path, e))
    }
}

impl RefBackend for FileBackend {
    fn load(&self) -> Result<Option<Snapshot>, StoreError> {
        self.recover()?;

        let root_path = self.root.join(ROOT_FILE);
        if !root_path.exists() {
            return Ok(None);
        }
        let root: RootRecord = read_json(&root_path)?;
        if root.version != FORMAT_VERSION {
            return Err(StoreError::Corrupt(format!(
                "unsupported format version {} (expected {FORMAT_VERSION})",
                root.version
            )));
        }

        let mut snapshot = Snapshot {
            root,
            ..Snapshot::default()
        };

        let nodes_dir = self.root.join(NODES_DIR);
        if !nodes_dir.is_dir() {
            return Ok(Some(snapshot));
        }
        let entries = fs::read_dir(&nodes_dir).map_err(|e| StoreError::io(&nodes_dir, e))?;
        for entry in entries {
            let path = entry.map_err(|e| StoreError::io(&nodes_dir, e))?.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            let name = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(decode_name)
                .ok_or_else(|| {
                    StoreError::Corrupt(format!("invalid node filename {}", path.display()))
                })?;
            let node: NodeRecord = read_json(&path)?;
            snapshot.nodes.insert(name, node);
        }

        Ok(Some(snapshot))
    }

    fn commit(&self, changes: &ChangeSet) -> Result<(), StoreError> {
        self.finish_pending()?;
        let journal = self.stage(changes)?;
        write_json_atomic(&self.root.join(JOURNAL_FILE), &journal)?;

        // Committed from here on: load() completes whatever is left
        if let Err(e) = self.finish(&journal) {
            log!("error"; "commit recorded but not yet applied, finishing on next open: {}", e);
        }
        Ok(())
    }

    fn replace(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        let staging = self.staging_dir();
        if staging.exists() {
            fs::remove_dir_all(&staging).map_err(|e| StoreError::io(&staging, e))?;
        }

        let nodes_dir = staging.join(NODES_DIR);
        fs::create_dir_all(&nodes_dir).map_err(|e| StoreError::io(&nodes_dir, e))?;
        for (name, record) in &snapshot.nodes {
            write_json(&node_file(&nodes_dir, &encode_name(name)), record)?;
        }
        write_json(&staging.join(ROOT_FILE), &snapshot.root)?;

        let parked = self.parked_dir();
        if parked.exists() {
            fs::remove_dir_all(&parked).map_err(|e| StoreError::io(&parked, e))?;
        }
        if self.root.exists() {
            fs::rename(&self.root, &parked).map_err(|e| StoreError::io(&self.root, e))?;
        }
        if let Err(e) = fs::rename(&staging, &self.root) {
            // Put the previous tree back so the store stays loadable
            let _ = fs::rename(&parked, &self.root);
            return Err(StoreError::io(&staging, e));
        }
        if parked.exists() {
            fs::remove_dir_all(&parked).map_err(|e| StoreError::io(&parked, e))?;
        }

        debug!("store"; "replaced {} with {} nodes", self.root.display(), snapshot.nodes.len());
        Ok(())
    }
}

fn node_file(nodes_dir: &Path, stem: &str) -> PathBuf {
    nodes_dir.join(format!("{stem}.json"))
}

fn temp_path(path: &Path) -> PathBuf {
    path.with_extension("json.tmp")
}

/// Rename the temp file of `path` over it, if it is still there.
fn move_staged(path: &Path) -> Result<(), StoreError> {
    let tmp = temp_path(path);
    if !tmp.is_file() {
        return Ok(());
    }
    fs::rename(&tmp, path).map_err(|e| StoreError::io(path, e))
}

fn encode_name(name: &PageName) -> String {
    utf8_percent_encode(name.as_str(), NODE_FILENAME).to_string()
}

fn decode_name(stem: &str) -> Option<PageName> {
    let decoded = percent_decode_str(stem).decode_utf8().ok()?;
    PageName::new(&decoded)
}

/// Write `value` as pretty JSON.
fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let json = serde_json::to_vec_pretty(value)
        .map_err(|e| StoreError::Serialize(path.to_path_buf(), e))?;
    fs::write(path, json).map_err(|e| StoreError::io(path, e))
}

/// Write `value` as pretty JSON, atomically (temp file + rename).
fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let tmp = temp_path(path);
    write_json(&tmp, value)?;
    fs::rename(&tmp, path).map_err(|e| StoreError::io(path, e))
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, StoreError> {
    let bytes = fs::read(path).map_err(|e| StoreError::io(path, e))?;
    serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialize(path.to_path_buf(), e))
}
