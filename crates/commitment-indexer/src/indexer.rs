//! Commitment indexer.
//!
//! Owns one [`CommitmentTree`] per [`TreeId`] and serves append, root, proof
//! and status queries keyed by [`OperationKind`].
//!
//! # Lifecycle
//!
//! The trees only exist after [`CommitmentIndexer::initialize`] has built the
//! hash engine and replayed the store. Before that every tree operation
//! returns [`IndexerError::NotInitialized`]; the check lives in one place,
//! where the trees are looked up.
//!
//! # Locking
//!
//! Each tree sits behind its own mutex held for the whole append (persist,
//! then hash) and for the whole proof walk. Different trees never contend.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::{
    CommitmentTree, FieldElement, HashEngine, InclusionProof, IndexerError, OperationKind,
    StoreError, TreeError, TreeId, TreeOp, TreeStore, error::preview, tree::DEFAULT_DEPTH,
};

/// Default number of appends between snapshots.
pub const DEFAULT_SNAPSHOT_INTERVAL: usize = 1024;

/// Tree shape and persistence cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexerOptions {
    /// Depth of every tree
    pub depth: usize,
    /// Appends between snapshots
    pub snapshot_interval: usize,
}

impl Default for IndexerOptions {
    fn default() -> Self {
        Self {
            depth: DEFAULT_DEPTH,
            snapshot_interval: DEFAULT_SNAPSHOT_INTERVAL,
        }
    }
}

/// Result of appending a commitment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendOutcome {
    /// Leaf index of the new commitment
    pub index: usize,
    /// Tree root after the append
    pub root: FieldElement,
}

/// Most recent root of a tree and when it was computed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RootRecord {
    /// Root value
    pub root: FieldElement,
    /// Leaf count the root covers
    pub leaf_count: usize,
    /// When it was computed
    pub updated_at: DateTime<Utc>,
}

/// Status of one operation kind's tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KindStatus {
    /// Operation kind
    pub kind: OperationKind,
    /// Tree the kind writes to
    pub tree: TreeId,
    /// Number of leaves, zero before initialization
    pub leaf_count: usize,
    /// Last root as 64 hex characters, if the tree has any leaves
    pub last_root: Option<String>,
    /// When the last root was computed
    pub updated_at: Option<DateTime<Utc>>,
}

/// Snapshot of every tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexerStatus {
    /// Whether `initialize` has completed
    pub ready: bool,
    /// Tree depth
    pub depth: usize,
    /// One entry per operation kind
    pub kinds: Vec<KindStatus>,
}

struct TreeSlot {
    tree: CommitmentTree,
    last_root: Option<RootRecord>,
    appends_since_snapshot: usize,
}

struct Trees {
    deposit: Mutex<TreeSlot>,
    withdrawal: Mutex<TreeSlot>,
}

impl Trees {
    fn slot(&self, tree: TreeId) -> &Mutex<TreeSlot> {
        match tree {
            TreeId::Deposit => &self.deposit,
            TreeId::Withdrawal => &self.withdrawal,
        }
    }
}

/// Commitment trees for every operation kind.
pub struct CommitmentIndexer<S> {
    options: IndexerOptions,
    store: S,
    engine: HashEngine,
    trees: OnceCell<Trees>,
}

impl<S: TreeStore> CommitmentIndexer<S> {
    /// Create an uninitialized indexer.
    pub fn new(store: S, options: IndexerOptions) -> Self {
        Self {
            options,
            store,
            engine: HashEngine::new(),
            trees: OnceCell::new(),
        }
    }

    /// Build the hash engine and load every tree from the store. Calling this
    /// again after it has succeeded is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the hash engine fails to build, the store cannot
    /// be read, or the stored leaves do not fit the configured depth.
    pub async fn initialize(&self) -> Result<(), IndexerError> {
        self.trees
            .get_or_try_init(|| async {
                self.engine.build().await?;
                let trees = Trees {
                    deposit: Mutex::new(self.load_slot(TreeId::Deposit)?),
                    withdrawal: Mutex::new(self.load_slot(TreeId::Withdrawal)?),
                };
                info!(depth = self.options.depth, "commitment indexer ready");
                Ok::<_, IndexerError>(trees)
            })
            .await
            .map(|_| ())
    }

    fn load_slot(&self, tree: TreeId) -> Result<TreeSlot, IndexerError> {
        let leaves = self.store.load(tree)?;
        let capacity = 1usize
            .checked_shl(self.options.depth as u32)
            .unwrap_or(usize::MAX);
        if leaves.len() > capacity {
            return Err(StoreError::OverCapacity {
                tree,
                leaf_count: leaves.len(),
                capacity,
            }
            .into());
        }

        let kind = tree.kinds()[0];
        let context = |source| IndexerError::Tree {
            kind,
            op: TreeOp::Load,
            source,
        };
        let mut commitment_tree =
            CommitmentTree::with_leaves(self.options.depth, self.engine.hasher()?, leaves)
                .map_err(context)?;

        let last_root = if commitment_tree.is_empty() {
            None
        } else {
            Some(RootRecord {
                root: commitment_tree.root().map_err(context)?,
                leaf_count: commitment_tree.len(),
                updated_at: Utc::now(),
            })
        };
        info!(%tree, leaves = commitment_tree.len(), "loaded commitment tree");

        Ok(TreeSlot {
            tree: commitment_tree,
            last_root,
            appends_since_snapshot: 0,
        })
    }

    fn trees(&self) -> Result<&Trees, IndexerError> {
        self.trees.get().ok_or(IndexerError::NotInitialized)
    }

    /// Whether `initialize` has completed.
    pub fn is_ready(&self) -> bool {
        self.trees.initialized()
    }

    /// Tree depth.
    pub fn depth(&self) -> usize {
        self.options.depth
    }

    /// Backing store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Append a commitment given as hex or decimal.
    ///
    /// `0x`-prefixed input is hex. Unprefixed input of exactly 64 characters
    /// is also hex, even when every character is a decimal digit. Shorter
    /// all-digit input is decimal.
    ///
    /// The leaf is persisted before it becomes visible. Duplicates are
    /// appended as distinct leaves. If hashing the new root fails, the leaf
    /// stays persisted and in the tree, and the error is returned.
    ///
    /// # Errors
    ///
    /// - [`IndexerError::NotInitialized`] before `initialize`
    /// - [`IndexerError::InvalidCommitmentFormat`] for unparsable input
    /// - [`TreeError::CapacityExceeded`] (wrapped) when the tree is full
    /// - [`IndexerError::Store`] if persisting fails
    pub fn add_commitment(
        &self,
        kind: OperationKind,
        raw: &str,
    ) -> Result<AppendOutcome, IndexerError> {
        let trees = self.trees()?;
        let leaf = parse_commitment(raw)?;
        let tree = kind.tree();

        let mut slot = trees.slot(tree).lock();
        let context = |source| IndexerError::Tree {
            kind,
            op: TreeOp::Append,
            source,
        };

        if slot.tree.is_full() {
            return Err(context(TreeError::CapacityExceeded {
                capacity: slot.tree.capacity(),
            }));
        }
        let index = slot.tree.len();
        self.store.append(tree, index, &leaf)?;
        let (index, root) = slot.tree.append(leaf).map_err(context)?;

        slot.last_root = Some(RootRecord {
            root: root.clone(),
            leaf_count: index + 1,
            updated_at: Utc::now(),
        });

        slot.appends_since_snapshot += 1;
        if slot.appends_since_snapshot >= self.options.snapshot_interval {
            // leaves are already in the log, a failed snapshot only costs replay time
            match self.store.snapshot(tree, slot.tree.leaves()) {
                Ok(()) => slot.appends_since_snapshot = 0,
                Err(e) => warn!(%tree, error = %e, "tree snapshot failed"),
            }
        }

        info!(%kind, %tree, index, root = %root.to_hex(), "appended commitment");
        Ok(AppendOutcome { index, root })
    }

    /// Current root of a kind's tree.
    ///
    /// # Errors
    ///
    /// [`IndexerError::NotInitialized`] before `initialize`, or
    /// [`TreeError::Empty`] (wrapped) if the tree has no leaves.
    pub fn get_root(&self, kind: OperationKind) -> Result<FieldElement, IndexerError> {
        let trees = self.trees()?;
        let mut slot = trees.slot(kind.tree()).lock();
        slot.tree.root().map_err(|source| IndexerError::Tree {
            kind,
            op: TreeOp::Root,
            source,
        })
    }

    /// Inclusion proof for a commitment given as hex or decimal, parsed as
    /// in [`add_commitment`](Self::add_commitment).
    ///
    /// # Errors
    ///
    /// [`IndexerError::NotInitialized`], [`IndexerError::InvalidCommitmentFormat`],
    /// or a wrapped [`TreeError::Empty`] / [`TreeError::CommitmentNotFound`].
    pub fn get_proof(
        &self,
        kind: OperationKind,
        raw: &str,
    ) -> Result<InclusionProof, IndexerError> {
        let trees = self.trees()?;
        let commitment = parse_commitment(raw)?;
        let mut slot = trees.slot(kind.tree()).lock();
        let proof = slot
            .tree
            .proof_by_value(&commitment)
            .map_err(|source| IndexerError::Tree {
                kind,
                op: TreeOp::Proof,
                source,
            })?;
        debug!(%kind, index = proof.leaf_index, "built inclusion proof");
        Ok(proof)
    }

    /// Inclusion proof for the leaf at `index`.
    ///
    /// # Errors
    ///
    /// [`IndexerError::NotInitialized`], or a wrapped
    /// [`TreeError::IndexOutOfRange`].
    pub fn get_proof_at(
        &self,
        kind: OperationKind,
        index: usize,
    ) -> Result<InclusionProof, IndexerError> {
        let trees = self.trees()?;
        let mut slot = trees.slot(kind.tree()).lock();
        slot.tree.proof(index).map_err(|source| IndexerError::Tree {
            kind,
            op: TreeOp::Proof,
            source,
        })
    }

    /// Check that `proof` replays from `raw` to its root.
    ///
    /// # Errors
    ///
    /// [`IndexerError::NotInitialized`] or [`IndexerError::InvalidCommitmentFormat`].
    pub fn verify_proof(&self, proof: &InclusionProof, raw: &str) -> Result<bool, IndexerError> {
        let mut hasher = self.engine.hasher().map_err(|e| match e {
            crate::HashError::NotInitialized => IndexerError::NotInitialized,
            other => other.into(),
        })?;
        let leaf = parse_commitment(raw)?;
        Ok(proof.verify(&mut hasher, &leaf)?)
    }

    /// Number of leaves in a kind's tree, zero before initialization.
    pub fn leaf_count(&self, kind: OperationKind) -> usize {
        self.trees()
            .map(|trees| trees.slot(kind.tree()).lock().tree.len())
            .unwrap_or(0)
    }

    /// Per-kind leaf counts and last roots. Never fails.
    pub fn status(&self) -> IndexerStatus {
        let trees = self.trees().ok();
        let kinds = OperationKind::iter()
            .map(|kind| {
                let tree = kind.tree();
                let (leaf_count, last_root) = trees
                    .map(|trees| {
                        let slot = trees.slot(tree).lock();
                        (slot.tree.len(), slot.last_root.clone())
                    })
                    .unwrap_or((0, None));
                KindStatus {
                    kind,
                    tree,
                    leaf_count,
                    last_root: last_root.as_ref().map(|r| r.root.to_hex()),
                    updated_at: last_root.map(|r| r.updated_at),
                }
            })
            .collect();

        IndexerStatus {
            ready: trees.is_some(),
            depth: self.options.depth,
            kinds,
        }
    }
}

fn parse_commitment(raw: &str) -> Result<FieldElement, IndexerError> {
    FieldElement::parse(raw).map_err(|source| IndexerError::InvalidCommitmentFormat {
        input: preview(raw),
        source,
    })
}
