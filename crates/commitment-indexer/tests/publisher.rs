//! Root publication and publication waits.

mod common;

use std::{sync::Arc, time::Duration};

use commitment_indexer::{
    FieldElement, OperationKind, PublishError, PublishOutcome, RootPublisher, RootState,
    SyncStatusReporter, WaitPolicy,
};
use root_registry_interface::{ROOT_REGISTRY_DISCRIMINATOR, RegistryAccounts, RootRegistry};
use tokio::time::Instant;

use common::{ScriptedLedger, memory_publisher, ready_indexer};

fn policy(max_attempts: u32) -> WaitPolicy {
    WaitPolicy {
        max_attempts,
        interval: Duration::from_secs(5),
    }
}

#[tokio::test]
async fn test_second_publish_short_circuits() {
    let (ledger, publisher) = memory_publisher();
    let root = FieldElement::from(42u64);

    let first = publisher.publish_root(&root).await.unwrap();
    assert!(matches!(first, PublishOutcome::Submitted { .. }));
    assert_eq!(ledger.submissions(), 1);

    let second = publisher.publish_root(&root).await.unwrap();
    assert_eq!(second, PublishOutcome::AlreadyRegistered);
    assert_eq!(ledger.submissions(), 1, "no duplicate transaction");
    assert_eq!(
        publisher.root_status(&root).unwrap().state,
        RootState::Published
    );
}

#[tokio::test]
async fn test_concurrent_publishes_of_one_root_send_once() {
    let ledger = Arc::new(ScriptedLedger::yielding());
    let publisher = RootPublisher::new(ledger.clone(), RegistryAccounts::canonical());
    let root = FieldElement::from(21u64);

    let (first, second) = tokio::join!(
        publisher.publish_root(&root),
        publisher.publish_root(&root)
    );

    assert_eq!(ledger.sends(), 1, "only one transaction per root");
    assert!(matches!(first, Ok(PublishOutcome::Submitted { .. })));
    assert_eq!(second.unwrap(), PublishOutcome::InFlight);

    let status = publisher
        .wait_for_publication(&root, WaitPolicy::default())
        .await
        .unwrap();
    assert_eq!(status.state, RootState::Published);
}

#[tokio::test]
async fn test_distinct_roots_publish_concurrently() {
    let ledger = Arc::new(ScriptedLedger::yielding());
    let publisher = RootPublisher::new(ledger.clone(), RegistryAccounts::canonical());

    let root_a = FieldElement::from(1u64);
    let root_b = FieldElement::from(2u64);
    let (a, b) = tokio::join!(
        publisher.publish_root(&root_a),
        publisher.publish_root(&root_b)
    );
    assert!(matches!(a, Ok(PublishOutcome::Submitted { .. })));
    assert!(matches!(b, Ok(PublishOutcome::Submitted { .. })));
    assert_eq!(ledger.sends(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_publish_marks_root_failed() {
    let ledger = Arc::new(ScriptedLedger::stalled());
    let publisher = RootPublisher::new(ledger.clone(), RegistryAccounts::canonical());
    let root = FieldElement::from(22u64);

    let timed_out =
        tokio::time::timeout(Duration::from_secs(1), publisher.publish_root(&root)).await;
    assert!(timed_out.is_err());

    let status = publisher.root_status(&root).unwrap();
    assert_eq!(status.state, RootState::Failed, "no stuck pending entry");
    assert_eq!(status.error.as_deref(), Some("publish attempt cancelled"));
    assert_eq!(ledger.sends(), 0);
}

#[tokio::test]
async fn test_root_registered_elsewhere_is_not_resubmitted() {
    let (ledger, publisher) = memory_publisher();
    let root = FieldElement::from(7u64);
    ledger.register_root(root.to_le_bytes());

    assert!(publisher.root_exists_on_chain(&root).await.unwrap());
    assert_eq!(
        publisher.publish_root(&root).await.unwrap(),
        PublishOutcome::AlreadyRegistered
    );
    assert_eq!(ledger.submissions(), 0);
    assert_eq!(publisher.root_status(&root).unwrap().transaction_ref, None);
}

#[tokio::test]
async fn test_roots_beyond_size_are_not_present() {
    // stale entry in the second slot, outside the live `size`
    let registry = RootRegistry {
        discriminator: ROOT_REGISTRY_DISCRIMINATOR,
        roots: vec![
            FieldElement::from(1u64).to_le_bytes(),
            FieldElement::from(2u64).to_le_bytes(),
        ],
        cursor: 1,
        size: 1,
        capacity: 4,
    };
    let data = registry.encode();

    let ledger = Arc::new(ScriptedLedger::serving(Some(data)));
    let publisher = RootPublisher::new(ledger.clone(), RegistryAccounts::canonical());

    assert!(publisher.root_exists_on_chain(&FieldElement::from(1u64)).await.unwrap());
    assert!(!publisher.root_exists_on_chain(&FieldElement::from(2u64)).await.unwrap());
}

#[tokio::test]
async fn test_malformed_registry_is_treated_as_empty() {
    let ledger = Arc::new(ScriptedLedger::serving(Some(vec![0u8; 10])));
    let publisher = RootPublisher::new(ledger.clone(), RegistryAccounts::canonical());
    let root = FieldElement::from(5u64);

    assert!(matches!(
        publisher.root_exists_on_chain(&root).await,
        Err(PublishError::MalformedExternalState { .. })
    ));

    let outcome = publisher.publish_root(&root).await.unwrap();
    assert_eq!(
        outcome,
        PublishOutcome::Submitted {
            signature: "scripted-1".to_string()
        }
    );
    assert_eq!(ledger.sends(), 1);
}

#[tokio::test]
async fn test_missing_registry_account_is_treated_as_empty() {
    let ledger = Arc::new(ScriptedLedger::serving(None));
    let publisher = RootPublisher::new(ledger.clone(), RegistryAccounts::canonical());

    assert!(
        !publisher
            .root_exists_on_chain(&FieldElement::from(5u64))
            .await
            .unwrap()
    );
    assert!(matches!(
        publisher.publish_root(&FieldElement::from(5u64)).await,
        Ok(PublishOutcome::Submitted { .. })
    ));
}

#[tokio::test]
async fn test_confirm_failure_keeps_transaction_ref() {
    let (ledger, publisher) = memory_publisher();
    let root = FieldElement::from(11u64);
    ledger.fail_next_confirm("block height exceeded");

    let err = publisher.publish_root(&root).await.unwrap_err();
    match err {
        PublishError::PublishFailed { root: key, cause } => {
            assert_eq!(key, root.to_hex());
            assert!(cause.contains("block height exceeded"), "{cause}");
        }
        other => panic!("expected PublishFailed, got {other:?}"),
    }

    let status = publisher.root_status(&root).unwrap();
    assert_eq!(status.state, RootState::Failed);
    assert_eq!(status.transaction_ref.as_deref(), Some("memory-00000001"));
}

#[tokio::test]
async fn test_failed_root_can_be_retried() {
    let (ledger, publisher) = memory_publisher();
    let root = FieldElement::from(12u64);

    ledger.fail_next_send("rpc unavailable");
    assert!(publisher.publish_root(&root).await.is_err());
    assert_eq!(publisher.root_status(&root).unwrap().state, RootState::Failed);

    publisher.publish_root(&root).await.unwrap();
    let status = publisher.root_status(&root).unwrap();
    assert_eq!(status.state, RootState::Published);
    assert_eq!(status.error, None, "fresh attempt replaces the failure");
}

#[tokio::test]
async fn test_publish_current_uses_kind_tree() {
    let (ledger, publisher) = memory_publisher();
    let indexer = ready_indexer(4).await;

    let err = publisher
        .publish_current(&indexer, OperationKind::Deposit)
        .await
        .unwrap_err();
    assert!(matches!(err, PublishError::Indexer(ref e) if e.is_tree_empty()));
    assert_eq!(ledger.submissions(), 0);

    let appended = indexer.add_commitment(OperationKind::Transfer, "0x2a").unwrap();
    let (root, outcome) = publisher
        .publish_current(&indexer, OperationKind::Deposit)
        .await
        .unwrap();
    assert_eq!(root, appended.root);
    assert!(matches!(outcome, PublishOutcome::Submitted { .. }));
    assert_eq!(ledger.registered_roots(), vec![root.to_le_bytes()]);
}

#[tokio::test(start_paused = true)]
async fn test_wait_returns_published_status() {
    let (_, publisher) = memory_publisher();
    let root = FieldElement::from(1u64);
    publisher.publish_root(&root).await.unwrap();

    let start = Instant::now();
    let status = publisher
        .wait_for_publication(&root, policy(12))
        .await
        .unwrap();
    assert_eq!(status.state, RootState::Published);
    assert_eq!(start.elapsed(), Duration::ZERO, "no sleep when already published");
}

#[tokio::test(start_paused = true)]
async fn test_wait_sees_publication_midway() {
    let (_, publisher) = memory_publisher();
    let root = FieldElement::from(2u64);

    let background = publisher.clone();
    let publish_root = root.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(12)).await;
        background.publish_root(&publish_root).await.unwrap();
    });

    let start = Instant::now();
    let status = publisher
        .wait_for_publication(&root, policy(12))
        .await
        .unwrap();
    assert_eq!(status.state, RootState::Published);
    assert_eq!(start.elapsed(), Duration::from_secs(15), "picked up on the fourth poll");
}

#[tokio::test(start_paused = true)]
async fn test_wait_fails_fast_on_failed_root() {
    let (ledger, publisher) = memory_publisher();
    let root = FieldElement::from(3u64);
    ledger.fail_next_send("insufficient funds");
    let _ = publisher.publish_root(&root).await;

    let start = Instant::now();
    let err = publisher
        .wait_for_publication(&root, policy(12))
        .await
        .unwrap_err();
    assert!(matches!(err, PublishError::PublishFailed { ref cause, .. } if cause.contains("insufficient funds")));
    assert_eq!(start.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_wait_times_out_while_pending() {
    let ledger = Arc::new(ScriptedLedger::stalled());
    let publisher = Arc::new(RootPublisher::new(ledger, RegistryAccounts::canonical()));
    let root = FieldElement::from(4u64);

    let background = publisher.clone();
    let publish_root = root.clone();
    tokio::spawn(async move {
        let _ = background.publish_root(&publish_root).await;
    });
    tokio::task::yield_now().await;
    assert_eq!(
        publisher.root_status(&root).unwrap().state,
        RootState::Pending
    );

    let start = Instant::now();
    let err = publisher
        .wait_for_publication(&root, policy(12))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        PublishError::RootPendingTimeout { attempts: 12, .. }
    ));
    assert_eq!(start.elapsed(), Duration::from_secs(55), "11 sleeps between 12 polls");
}

#[tokio::test(start_paused = true)]
async fn test_wait_on_unknown_root_is_not_tracked() {
    let (_, publisher) = memory_publisher();

    let err = publisher
        .wait_for_publication(&FieldElement::from(99u64), policy(3))
        .await
        .unwrap_err();
    assert!(matches!(err, PublishError::RootNotTracked { .. }));
}

#[tokio::test(start_paused = true)]
async fn test_zero_attempts_still_polls_once() {
    let (_, publisher) = memory_publisher();
    let root = FieldElement::from(5u64);
    publisher.publish_root(&root).await.unwrap();

    assert!(publisher.wait_for_publication(&root, policy(0)).await.is_ok());
}

#[tokio::test]
async fn test_status_reporter_lists_root_statuses() {
    let (ledger, publisher) = memory_publisher();
    let indexer = Arc::new(ready_indexer(4).await);
    let reporter = SyncStatusReporter::new(indexer.clone(), publisher.clone());

    let first = indexer.add_commitment(OperationKind::Deposit, "1").unwrap();
    publisher.publish_root(&first.root).await.unwrap();
    let second = indexer.add_commitment(OperationKind::Withdrawal, "2").unwrap();
    ledger.fail_next_send("rejected");
    let _ = publisher.publish_root(&second.root).await;

    let status = reporter.snapshot();
    assert!(status.listening);
    assert!(status.publishing_enabled);
    assert_eq!(status.root_statuses.len(), 2);

    let state_of = |root: &FieldElement| {
        status
            .root_statuses
            .iter()
            .find(|s| s.root == root.to_hex())
            .map(|s| s.state)
    };
    assert_eq!(state_of(&first.root), Some(RootState::Published));
    assert_eq!(state_of(&second.root), Some(RootState::Failed));
}
