//! Error types for the commitment indexer.
//!
//! # Error Taxonomy
//!
//! | Error | Retry | Meaning |
//! |-------|-------|---------|
//! | `NotInitialized` | after a delay | Hash engine not built yet |
//! | `InvalidCommitmentFormat` | never | Input is neither hex nor decimal, or out of field |
//! | `Empty` / `CommitmentNotFound` / `IndexOutOfRange` | check status first | Depends on tree contents |
//! | `CapacityExceeded` | never | Tree holds `2^depth` leaves |
//! | `PublishFailed` | fresh publish | Carries the ledger's cause |
//! | `RootPendingTimeout` | back off | Root is still pending, not failed |
//!
//! Tree errors are wrapped with the operation kind and operation name when
//! they cross the indexer boundary, so a caller sees which tree, which
//! commitment and how many leaves were involved.

use std::path::PathBuf;

use root_registry_interface::RegistryError;
use solana_pubkey::Pubkey;
use strum::Display;
use thiserror::Error;

use crate::{OperationKind, TreeId};

/// Errors raised while parsing or converting field elements.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FieldError {
    /// The input is empty or only a `0x` prefix.
    #[error("empty field element")]
    Empty,

    /// The input contains characters outside the chosen radix.
    #[error("invalid {radix} digits in {input:?}")]
    InvalidDigits {
        /// Preview of the rejected input
        input: String,
        /// Radix the input was parsed as
        radix: &'static str,
    },

    /// More hex digits than fit in 32 bytes.
    #[error("{digits} hex digits exceed 32 bytes")]
    TooLong {
        /// Number of hex digits supplied
        digits: usize,
    },

    /// The value is not below the BN254 scalar modulus.
    #[error("value {input:?} is not below the BN254 scalar modulus")]
    OutOfField {
        /// Preview of the rejected input
        input: String,
    },
}

/// Errors raised by the hash engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HashError {
    /// The engine has not finished its build step.
    #[error("hash engine not initialized")]
    NotInitialized,

    /// The Poseidon permutation could not be built or evaluated.
    #[error("poseidon error: {0}")]
    Poseidon(String),

    /// The build step produced a permutation with the wrong output.
    #[error("poseidon self-check failed: expected {expected}, got {actual}")]
    SelfCheck {
        /// Known-good output
        expected: String,
        /// Output of the freshly built permutation
        actual: String,
    },

    /// The blocking build task panicked or was cancelled.
    #[error("hash engine build task failed: {0}")]
    Build(String),
}

/// Errors raised by a single commitment tree.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TreeError {
    /// Depth outside the supported range.
    #[error("tree depth {depth} outside 1..={max}")]
    InvalidDepth {
        /// Requested depth
        depth: usize,
        /// Largest supported depth
        max: usize,
    },

    /// The tree already holds `2^depth` leaves.
    #[error("tree is full: capacity {capacity}")]
    CapacityExceeded {
        /// Maximum number of leaves
        capacity: usize,
    },

    /// The tree has no leaves, so it has no root.
    #[error("tree is empty")]
    Empty,

    /// No leaf exists at the requested index.
    #[error("leaf index {index} out of range (tree has {leaf_count} leaves)")]
    IndexOutOfRange {
        /// Requested index
        index: usize,
        /// Number of leaves in the tree
        leaf_count: usize,
    },

    /// No leaf equals the requested commitment.
    #[error("commitment {commitment} not found among {leaf_count} leaves")]
    CommitmentNotFound {
        /// Preview of the normalized commitment
        commitment: String,
        /// Number of leaves in the tree
        leaf_count: usize,
    },

    /// Hashing failed while walking the tree.
    #[error(transparent)]
    Hash(#[from] HashError),
}

/// Errors raised by tree stores.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Filesystem error.
    #[error("io error at {path}: {source}")]
    Io {
        /// File or directory involved
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// Snapshot could not be encoded or decoded.
    #[error("snapshot error at {path}: {source}")]
    Snapshot {
        /// Snapshot file
        path: PathBuf,
        /// Underlying error
        source: serde_json::Error,
    },

    /// A log line could not be parsed.
    #[error("corrupt log {path} line {line}: {reason}")]
    Corrupt {
        /// Log file
        path: PathBuf,
        /// 1-based line number
        line: usize,
        /// What was wrong with the line
        reason: String,
    },

    /// A leaf was written or read out of sequence.
    #[error("{tree} tree store expected leaf {expected}, got {actual}")]
    IndexGap {
        /// Tree the leaf belongs to
        tree: TreeId,
        /// Next index the store expected
        expected: usize,
        /// Index supplied or found
        actual: usize,
    },

    /// The store holds more leaves than the tree can.
    #[error("{tree} tree store holds {leaf_count} leaves, capacity is {capacity}")]
    OverCapacity {
        /// Tree the leaves belong to
        tree: TreeId,
        /// Persisted leaf count
        leaf_count: usize,
        /// Tree capacity
        capacity: usize,
    },
}

/// Indexer operation named in error context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum TreeOp {
    /// Appending a commitment
    Append,
    /// Reading the root
    Root,
    /// Building an inclusion proof
    Proof,
    /// Rebuilding from the store
    Load,
}

/// Errors raised by the commitment indexer.
#[derive(Debug, Error)]
pub enum IndexerError {
    /// `initialize` has not completed.
    #[error("commitment indexer not initialized")]
    NotInitialized,

    /// The commitment string is neither valid hex nor valid decimal.
    #[error("invalid commitment format {input:?}: {source}")]
    InvalidCommitmentFormat {
        /// Preview of the raw input
        input: String,
        /// Parse failure
        source: FieldError,
    },

    /// A tree operation failed.
    #[error("{op} on {kind} tree failed: {source}")]
    Tree {
        /// Operation kind the caller asked for
        kind: OperationKind,
        /// Operation that failed
        op: TreeOp,
        /// Tree failure
        source: TreeError,
    },

    /// Persisting or loading leaves failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Building the hash engine failed.
    #[error(transparent)]
    Hash(#[from] HashError),
}

impl IndexerError {
    /// The wrapped tree error, if this is a tree failure.
    pub fn tree_error(&self) -> Option<&TreeError> {
        match self {
            Self::Tree { source, .. } => Some(source),
            _ => None,
        }
    }

    /// Whether the failure is an empty tree.
    pub fn is_tree_empty(&self) -> bool {
        matches!(self.tree_error(), Some(TreeError::Empty))
    }
}

/// Errors raised by ledger collaborators.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// The ledger could not be reached or answered with an error.
    #[error("ledger transport error: {0}")]
    Transport(String),

    /// The transaction was rejected before landing.
    #[error("transaction rejected: {0}")]
    Rejected(String),

    /// The transaction was sent but not confirmed.
    #[error("transaction {signature} not confirmed: {reason}")]
    NotConfirmed {
        /// Transaction signature
        signature: String,
        /// Reason reported by the ledger
        reason: String,
    },
}

/// Errors raised by the root publisher.
#[derive(Debug, Error)]
pub enum PublishError {
    /// A publish attempt for this root failed.
    #[error("publishing root {root} failed: {cause}")]
    PublishFailed {
        /// Root hex
        root: String,
        /// Underlying cause
        cause: String,
    },

    /// The root was still pending after the last poll.
    #[error("root {root} still pending after {attempts} attempts")]
    RootPendingTimeout {
        /// Root hex
        root: String,
        /// Number of polls made
        attempts: u32,
    },

    /// No publish attempt was ever recorded for this root.
    #[error("root {root} has no publication status")]
    RootNotTracked {
        /// Root hex
        root: String,
    },

    /// The roots account exists but does not decode.
    #[error("malformed registry account {account}: {source}")]
    MalformedExternalState {
        /// Roots account address
        account: Pubkey,
        /// Layout failure
        source: RegistryError,
    },

    /// The ledger failed while reading registry state.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Reading the root to publish failed.
    #[error(transparent)]
    Indexer(#[from] IndexerError),
}

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config {path}: {source}")]
    Io {
        /// Config path
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// The config file is not valid TOML for this schema.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A field holds an unsupported value.
    #[error("invalid config field {field}: {reason}")]
    Invalid {
        /// Dotted field path
        field: &'static str,
        /// What is wrong with it
        reason: String,
    },
}

/// Shorten a user-supplied string for error context.
pub(crate) fn preview(input: &str) -> String {
    const MAX: usize = 18;
    if input.chars().count() <= MAX {
        input.to_string()
    } else {
        let head: String = input.chars().take(MAX).collect();
        format!("{head}…")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_truncates_long_input() {
        assert_eq!(preview("0xff"), "0xff");
        let long = "1".repeat(70);
        let shown = preview(&long);
        assert!(shown.ends_with('…'));
        assert_eq!(shown.chars().count(), 19);
    }

    #[test]
    fn test_indexer_error_exposes_tree_context() {
        let err = IndexerError::Tree {
            kind: OperationKind::Transfer,
            op: TreeOp::Proof,
            source: TreeError::Empty,
        };
        assert!(err.is_tree_empty());
        assert_eq!(err.to_string(), "proof on transfer tree failed: tree is empty");
    }
}
