//! Commitment Indexer
//!
//! Keeps the shielded pool's commitment trees off-chain, serves inclusion
//! proofs against them and publishes their roots to the on-chain root
//! registry.
//!
//! # Architecture
//!
//! ```text
//!   add_commitment(kind, "0x…" | "123…")
//!                │
//!                ▼
//! ┌──────────────────────────────┐      ┌──────────────────────────┐
//! │      CommitmentIndexer       │─────►│        TreeStore         │
//! │  deposit tree   (Deposit,    │      │  memory | log+snapshot   │
//! │                  Transfer)   │      └──────────────────────────┘
//! │  withdrawal tree (Withdrawal)│
//! └──────────────────────────────┘
//!                │ root
//!                ▼
//! ┌──────────────────────────────┐      ┌──────────────────────────┐
//! │         RootPublisher        │─────►│       LedgerClient       │
//! │  Pending/Published/Failed    │      │  root registry program   │
//! └──────────────────────────────┘      └──────────────────────────┘
//!                │
//!                ▼
//!        SyncStatusReporter
//! ```
//!
//! # Modules
//!
//! - [`field`]: BN254 scalar field elements and their encodings
//! - [`hasher`]: Poseidon hash engine with an explicit build step
//! - [`tree`]: Fixed-depth commitment tree and inclusion proofs
//! - [`store`]: Leaf persistence
//! - [`kind`]: Operation kinds and the trees they map to
//! - [`indexer`]: Per-kind trees behind per-tree locks
//! - [`ledger`]: Ledger collaborator port and an in-memory registry
//! - [`publisher`]: Root publication and publication waits
//! - [`status`]: Combined status snapshot
//! - [`config`]: TOML configuration
//! - [`api`]: Response shapes
//! - [`error`]: Error types

pub mod api;
pub mod config;
pub mod error;
pub mod field;
pub mod hasher;
pub mod indexer;
pub mod kind;
pub mod ledger;
pub mod publisher;
pub mod status;
pub mod store;
pub mod tree;

pub use api::{AddCommitmentResponse, ProofResponse, RootResponse};
pub use config::{IndexerConfig, StoreBackend};
pub use error::{
    ConfigError, FieldError, HashError, IndexerError, LedgerError, PublishError, StoreError,
    TreeError, TreeOp,
};
pub use field::FieldElement;
pub use hasher::{HashEngine, Hasher};
pub use indexer::{AppendOutcome, CommitmentIndexer, IndexerOptions, IndexerStatus, KindStatus};
pub use kind::{OperationKind, TreeId};
pub use ledger::{LedgerClient, MemoryLedger};
pub use publisher::{PublishOutcome, RootPublisher, RootState, RootStatus, WaitPolicy};
pub use status::{SyncStatus, SyncStatusReporter};
pub use store::{FileTreeStore, MemoryTreeStore, TreeStore};
pub use tree::{CommitmentTree, InclusionProof};
