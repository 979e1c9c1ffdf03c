//! Leaf persistence for the commitment trees.
//!
//! The indexer depends only on [`TreeStore`]. Two implementations:
//!
//! - [`MemoryTreeStore`]: leaves live in process memory; nothing survives a
//!   restart. Used by tests and throwaway runs.
//! - [`FileTreeStore`]: per tree, an append-only log of `index decimal` lines
//!   plus a periodic JSON snapshot.
//!
//! # File layout
//!
//! ```text
//! <dir>/deposit.log              one "index leaf" line per append, fsync'd
//! <dir>/deposit.snapshot.json    {"leaves": ["…", …]}, replaced atomically
//! <dir>/withdrawal.log
//! <dir>/withdrawal.snapshot.json
//! ```
//!
//! Loading reads the snapshot, then replays log lines past its end. Log
//! lines already covered by the snapshot (left behind if the process stopped
//! between writing a snapshot and truncating the log) are skipped.

use std::{
    collections::HashMap,
    fs::{self, File, OpenOptions},
    io::{BufRead, BufReader, Write},
    path::{Path, PathBuf},
};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{FieldElement, StoreError, TreeId};

/// Persistence for tree leaves.
///
/// Calls for one tree are serialized by the caller; calls for different
/// trees may run concurrently.
pub trait TreeStore: Send + Sync {
    /// All persisted leaves of `tree`, in index order.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the stored data cannot be read or is
    /// inconsistent.
    fn load(&self, tree: TreeId) -> Result<Vec<FieldElement>, StoreError>;

    /// Persist the leaf at `index`. `index` is always the current leaf count.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::IndexGap`] if `index` is not the next index, or
    /// an I/O error.
    fn append(&self, tree: TreeId, index: usize, leaf: &FieldElement) -> Result<(), StoreError>;

    /// Record the full leaf set so later loads can skip replaying the log.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the snapshot cannot be written.
    fn snapshot(&self, tree: TreeId, leaves: &[FieldElement]) -> Result<(), StoreError>;
}

impl<T: TreeStore + ?Sized> TreeStore for Box<T> {
    fn load(&self, tree: TreeId) -> Result<Vec<FieldElement>, StoreError> {
        (**self).load(tree)
    }

    fn append(&self, tree: TreeId, index: usize, leaf: &FieldElement) -> Result<(), StoreError> {
        (**self).append(tree, index, leaf)
    }

    fn snapshot(&self, tree: TreeId, leaves: &[FieldElement]) -> Result<(), StoreError> {
        (**self).snapshot(tree, leaves)
    }
}

// =============================================================================
// In-memory store
// =============================================================================

/// Leaves held in memory.
#[derive(Debug, Default)]
pub struct MemoryTreeStore {
    trees: Mutex<HashMap<TreeId, Vec<FieldElement>>>,
}

impl MemoryTreeStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with leaves.
    pub fn with_leaves(trees: impl IntoIterator<Item = (TreeId, Vec<FieldElement>)>) -> Self {
        Self {
            trees: Mutex::new(trees.into_iter().collect()),
        }
    }
}

impl TreeStore for MemoryTreeStore {
    fn load(&self, tree: TreeId) -> Result<Vec<FieldElement>, StoreError> {
        Ok(self.trees.lock().get(&tree).cloned().unwrap_or_default())
    }

    fn append(&self, tree: TreeId, index: usize, leaf: &FieldElement) -> Result<(), StoreError> {
        let mut trees = self.trees.lock();
        let leaves = trees.entry(tree).or_default();
        if index != leaves.len() {
            return Err(StoreError::IndexGap {
                tree,
                expected: leaves.len(),
                actual: index,
            });
        }
        leaves.push(leaf.clone());
        Ok(())
    }

    fn snapshot(&self, _tree: TreeId, _leaves: &[FieldElement]) -> Result<(), StoreError> {
        // appends already hold the full leaf set
        Ok(())
    }
}

// =============================================================================
// File store
// =============================================================================

#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    leaves: Vec<FieldElement>,
}

/// Append-only log plus snapshot per tree.
#[derive(Debug)]
pub struct FileTreeStore {
    dir: PathBuf,
}

impl FileTreeStore {
    /// Open (creating if needed) a store rooted at `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the directory cannot be created.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| StoreError::Io {
            path: dir.clone(),
            source,
        })?;
        info!(dir = %dir.display(), "opened file tree store");
        Ok(Self { dir })
    }

    /// Directory holding the tree files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn log_path(&self, tree: TreeId) -> PathBuf {
        self.dir.join(format!("{tree}.log"))
    }

    fn snapshot_path(&self, tree: TreeId) -> PathBuf {
        self.dir.join(format!("{tree}.snapshot.json"))
    }

    fn read_snapshot(&self, tree: TreeId) -> Result<Vec<FieldElement>, StoreError> {
        let path = self.snapshot_path(tree);
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        let snapshot: Snapshot = serde_json::from_reader(BufReader::new(file))
            .map_err(|source| StoreError::Snapshot { path, source })?;
        Ok(snapshot.leaves)
    }

    fn replay_log(&self, tree: TreeId, leaves: &mut Vec<FieldElement>) -> Result<(), StoreError> {
        let path = self.log_path(tree);
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(source) => return Err(StoreError::Io { path, source }),
        };

        for (line_no, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|source| StoreError::Io {
                path: path.clone(),
                source,
            })?;
            if line.trim().is_empty() {
                continue;
            }
            let corrupt = |reason: String| StoreError::Corrupt {
                path: path.clone(),
                line: line_no + 1,
                reason,
            };

            let (index, value) = line
                .split_once(' ')
                .ok_or_else(|| corrupt("expected \"index leaf\"".to_string()))?;
            let index: usize = index
                .parse()
                .map_err(|e| corrupt(format!("bad index: {e}")))?;
            let leaf = FieldElement::from_decimal(value)
                .map_err(|e| corrupt(format!("bad leaf: {e}")))?;

            if index < leaves.len() {
                continue;
            }
            if index != leaves.len() {
                return Err(StoreError::IndexGap {
                    tree,
                    expected: leaves.len(),
                    actual: index,
                });
            }
            leaves.push(leaf);
        }
        Ok(())
    }
}

impl TreeStore for FileTreeStore {
    fn load(&self, tree: TreeId) -> Result<Vec<FieldElement>, StoreError> {
        let mut leaves = self.read_snapshot(tree)?;
        let from_snapshot = leaves.len();
        self.replay_log(tree, &mut leaves)?;
        debug!(
            %tree,
            from_snapshot,
            from_log = leaves.len() - from_snapshot,
            "loaded tree leaves"
        );
        Ok(leaves)
    }

    fn append(&self, tree: TreeId, index: usize, leaf: &FieldElement) -> Result<(), StoreError> {
        let path = self.log_path(tree);
        let io = |source| StoreError::Io {
            path: path.clone(),
            source,
        };
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(io)?;
        writeln!(file, "{index} {leaf}").map_err(io)?;
        file.sync_data().map_err(io)?;
        Ok(())
    }

    fn snapshot(&self, tree: TreeId, leaves: &[FieldElement]) -> Result<(), StoreError> {
        let path = self.snapshot_path(tree);
        let tmp = path.with_extension("json.tmp");
        let io = |path: &Path| {
            let path = path.to_path_buf();
            move |source| StoreError::Io { path, source }
        };

        let body = serde_json::to_vec(&Snapshot {
            leaves: leaves.to_vec(),
        })
        .map_err(|source| StoreError::Snapshot {
            path: path.clone(),
            source,
        })?;

        let mut file = File::create(&tmp).map_err(io(&tmp))?;
        file.write_all(&body).map_err(io(&tmp))?;
        file.sync_all().map_err(io(&tmp))?;
        fs::rename(&tmp, &path).map_err(io(&path))?;

        // the snapshot now covers every logged leaf
        let log = self.log_path(tree);
        File::create(&log)
            .and_then(|f| f.sync_all())
            .map_err(io(&log))?;

        info!(%tree, leaves = leaves.len(), "wrote tree snapshot");
        Ok(())
    }
}
