//! One consistent status read across the indexer and the publisher.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{CommitmentIndexer, IndexerStatus, RootPublisher, RootStatus, TreeStore};

/// Combined status snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    /// Whether the indexer is initialized and accepting commitments
    pub listening: bool,
    /// Whether roots are being published
    pub publishing_enabled: bool,
    /// Per-kind tree status
    pub indexer: IndexerStatus,
    /// Every tracked root, most recently updated first
    pub root_statuses: Vec<RootStatus>,
}

/// Aggregates [`CommitmentIndexer`] and [`RootPublisher`] state. Holds no
/// state of its own.
pub struct SyncStatusReporter<S> {
    indexer: Arc<CommitmentIndexer<S>>,
    publisher: Arc<RootPublisher>,
}

impl<S> Clone for SyncStatusReporter<S> {
    fn clone(&self) -> Self {
        Self {
            indexer: Arc::clone(&self.indexer),
            publisher: Arc::clone(&self.publisher),
        }
    }
}

impl<S: TreeStore> SyncStatusReporter<S> {
    /// Reporter over shared handles.
    pub fn new(indexer: Arc<CommitmentIndexer<S>>, publisher: Arc<RootPublisher>) -> Self {
        Self { indexer, publisher }
    }

    /// Current status. Never fails, also before initialization.
    pub fn snapshot(&self) -> SyncStatus {
        let indexer = self.indexer.status();
        SyncStatus {
            listening: indexer.ready,
            publishing_enabled: self.publisher.publishing_enabled(),
            indexer,
            root_statuses: self.publisher.statuses(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{IndexerOptions, MemoryTreeStore, OperationKind};

    fn reporter() -> (
        Arc<CommitmentIndexer<MemoryTreeStore>>,
        SyncStatusReporter<MemoryTreeStore>,
    ) {
        let indexer = Arc::new(CommitmentIndexer::new(
            MemoryTreeStore::new(),
            IndexerOptions {
                depth: 4,
                ..IndexerOptions::default()
            },
        ));
        let reporter = SyncStatusReporter::new(indexer.clone(), Arc::new(RootPublisher::disabled()));
        (indexer, reporter)
    }

    #[test]
    fn test_snapshot_before_initialize() {
        let (_, reporter) = reporter();
        let status = reporter.snapshot();

        assert!(!status.listening);
        assert!(!status.publishing_enabled);
        assert_eq!(status.indexer.depth, 4);
        assert_eq!(status.indexer.kinds.len(), 3, "one entry per operation kind");
        assert!(status.indexer.kinds.iter().all(|k| k.leaf_count == 0));
        assert!(status.root_statuses.is_empty());
    }

    #[tokio::test]
    async fn test_snapshot_reflects_appends() {
        let (indexer, reporter) = reporter();
        indexer.initialize().await.unwrap();
        let outcome = indexer.add_commitment(OperationKind::Transfer, "7").unwrap();

        let status = reporter.snapshot();
        assert!(status.listening);

        let deposit = status
            .indexer
            .kinds
            .iter()
            .find(|k| k.kind == OperationKind::Deposit)
            .unwrap();
        assert_eq!(deposit.leaf_count, 1, "transfer lands in the deposit tree");
        assert_eq!(deposit.last_root, Some(outcome.root.to_hex()));

        let withdrawal = status
            .indexer
            .kinds
            .iter()
            .find(|k| k.kind == OperationKind::Withdrawal)
            .unwrap();
        assert_eq!(withdrawal.leaf_count, 0);
        assert_eq!(withdrawal.last_root, None);
    }

    #[test]
    fn test_snapshot_serializes_camel_case() {
        let (_, reporter) = reporter();
        let json = serde_json::to_value(reporter.snapshot()).unwrap();
        assert_eq!(json["listening"], false);
        assert!(json.get("rootStatuses").is_some());
        assert!(json.get("publishingEnabled").is_some());
        assert_eq!(json["indexer"]["kinds"][0]["leafCount"], 0);
    }
}
