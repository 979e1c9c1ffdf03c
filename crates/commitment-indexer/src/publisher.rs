//! Root publication.
//!
//! Takes a root computed by the indexer and makes sure the registry program
//! knows it, recording the outcome per root:
//!
//! ```text
//!             publish_root
//!                  │
//!                  ▼
//!   ┌──────────► Pending ───────────────┐
//!   │              │                    │
//!   │   already in registry, or         │ read, send or
//!   │   sent and confirmed              │ confirm failed
//!   │              ▼                    ▼
//!   │          Published              Failed
//!   │                                   │
//!   └───────────── fresh publish_root ──┘
//! ```
//!
//! A publish is a single attempt; nothing here retries on its own. Callers
//! that must not proceed before a root is on chain use
//! [`RootPublisher::wait_for_publication`].

use std::{collections::HashMap, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use root_registry_interface::{RegistryAccounts, RootRegistry, add_root_instruction};
use serde::{Deserialize, Serialize};
use solana_pubkey::Pubkey;
use strum::Display;
use tracing::{debug, info, warn};

use crate::{
    CommitmentIndexer, FieldElement, LedgerClient, OperationKind, PublishError, TreeStore,
};

/// Default number of status polls while waiting for publication.
pub const DEFAULT_WAIT_ATTEMPTS: u32 = 12;

/// Default spacing between status polls.
pub const DEFAULT_WAIT_INTERVAL: Duration = Duration::from_secs(5);

/// Publication state of one root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RootState {
    /// A publish attempt is in flight
    Pending,
    /// The root is in the on-chain registry
    Published,
    /// The last publish attempt failed
    Failed,
}

/// Status table entry, keyed by the root's 64-char hex.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RootStatus {
    /// Root as 64 lowercase hex characters, no prefix
    pub root: String,
    /// Current state
    pub state: RootState,
    /// Signature of the registering transaction, if this process sent one
    pub transaction_ref: Option<String>,
    /// Failure cause when `state` is `Failed`
    pub error: Option<String>,
    /// Time of the last transition
    pub updated_at: DateTime<Utc>,
}

/// What a publish attempt did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// No signer configured; nothing was done.
    Disabled,
    /// The registry already held the root; nothing was sent.
    AlreadyRegistered,
    /// Another attempt for this root is pending; nothing was sent.
    InFlight,
    /// A transaction was sent and confirmed.
    Submitted {
        /// Transaction signature
        signature: String,
    },
}

/// Polling schedule for [`RootPublisher::wait_for_publication`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitPolicy {
    /// Number of status reads
    pub max_attempts: u32,
    /// Sleep between reads
    pub interval: Duration,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_WAIT_ATTEMPTS,
            interval: DEFAULT_WAIT_INTERVAL,
        }
    }
}

/// Number of root statuses kept before the oldest settled ones are dropped.
pub const DEFAULT_STATUS_RETENTION: usize = 256;

struct Tracked {
    seq: u64,
    status: RootStatus,
}

/// Root statuses in insertion order, bounded to `retention` settled entries.
struct StatusTable {
    entries: HashMap<String, Tracked>,
    next_seq: u64,
    retention: usize,
}

impl StatusTable {
    fn new(retention: usize) -> Self {
        Self {
            entries: HashMap::new(),
            next_seq: 0,
            retention,
        }
    }

    fn get(&self, key: &str) -> Option<&RootStatus> {
        self.entries.get(key).map(|tracked| &tracked.status)
    }

    fn upsert(&mut self, status: RootStatus) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries
            .insert(status.root.clone(), Tracked { seq, status });
        self.prune();
    }

    /// Drop the oldest settled entries until within `retention`. Pending
    /// entries are never dropped.
    fn prune(&mut self) {
        while self.entries.len() > self.retention {
            let oldest = self
                .entries
                .iter()
                .filter(|(_, tracked)| tracked.status.state != RootState::Pending)
                .min_by_key(|(_, tracked)| tracked.seq)
                .map(|(key, _)| key.clone());
            match oldest {
                Some(key) => {
                    self.entries.remove(&key);
                }
                None => break,
            }
        }
    }

    /// Most recently updated first.
    fn sorted(&self) -> Vec<RootStatus> {
        let mut tracked: Vec<_> = self.entries.values().collect();
        tracked.sort_by(|a, b| b.seq.cmp(&a.seq));
        tracked.into_iter().map(|t| t.status.clone()).collect()
    }
}

/// Marks a root `Failed` if its publish attempt is dropped before settling.
struct PendingAttempt<'a> {
    publisher: &'a RootPublisher,
    key: &'a str,
    settled: bool,
}

impl Drop for PendingAttempt<'_> {
    fn drop(&mut self) {
        if !self.settled {
            warn!(root = %self.key, "root publish cancelled");
            self.publisher.record(
                self.key,
                RootState::Failed,
                None,
                Some("publish attempt cancelled".to_string()),
            );
        }
    }
}

/// Publishes roots to the registry and tracks their status.
///
/// One instance is shared by every caller in the process. At most one
/// attempt per root is in flight; a second caller gets
/// [`PublishOutcome::InFlight`] and should use
/// [`wait_for_publication`](Self::wait_for_publication).
///
/// The status table keeps every pending root plus the most recent
/// [`DEFAULT_STATUS_RETENTION`] settled ones (see
/// [`with_retention`](Self::with_retention)).
pub struct RootPublisher {
    ledger: Option<Arc<dyn LedgerClient>>,
    accounts: RegistryAccounts,
    statuses: RwLock<StatusTable>,
}

impl RootPublisher {
    /// Publisher backed by `ledger`, targeting `accounts`.
    pub fn new(ledger: Arc<dyn LedgerClient>, accounts: RegistryAccounts) -> Self {
        Self {
            ledger: Some(ledger),
            accounts,
            statuses: RwLock::new(StatusTable::new(DEFAULT_STATUS_RETENTION)),
        }
    }

    /// Publisher with no ledger. Every publish is a no-op.
    pub fn disabled() -> Self {
        Self {
            ledger: None,
            accounts: RegistryAccounts::canonical(),
            statuses: RwLock::new(StatusTable::new(DEFAULT_STATUS_RETENTION)),
        }
    }

    /// Keep at most `retention` settled root statuses. Zero is treated as one.
    pub fn with_retention(self, retention: usize) -> Self {
        self.statuses.write().retention = retention.max(1);
        self
    }

    /// Registry accounts this publisher targets.
    pub fn accounts(&self) -> &RegistryAccounts {
        &self.accounts
    }

    /// Whether a ledger with a signing authority is configured.
    pub fn publishing_enabled(&self) -> bool {
        self.ledger
            .as_ref()
            .is_some_and(|ledger| ledger.authority().is_some())
    }

    /// Whether the roots account currently lists `root`.
    ///
    /// A missing roots account counts as "not registered".
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::MalformedExternalState`] if the account does
    /// not decode, or [`PublishError::Ledger`] if it cannot be read. A
    /// publisher without a ledger answers `Ok(false)`.
    pub async fn root_exists_on_chain(&self, root: &FieldElement) -> Result<bool, PublishError> {
        let Some(ledger) = &self.ledger else {
            return Ok(false);
        };
        let Some(data) = ledger.get_account_data(&self.accounts.roots).await? else {
            debug!(account = %self.accounts.roots, "roots account not found");
            return Ok(false);
        };
        let registry =
            RootRegistry::decode(&data).map_err(|source| PublishError::MalformedExternalState {
                account: self.accounts.roots,
                source,
            })?;
        Ok(registry.contains(&root.to_le_bytes()))
    }

    /// Make sure the registry holds `root`. Single attempt, no retries.
    ///
    /// If another attempt for the same root is already pending, returns
    /// [`PublishOutcome::InFlight`] without touching the ledger.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::PublishFailed`] if reading the registry,
    /// sending or confirming fails. The root is marked `Failed` first.
    pub async fn publish_root(&self, root: &FieldElement) -> Result<PublishOutcome, PublishError> {
        let (Some(ledger), Some(authority)) = (
            self.ledger.as_ref(),
            self.ledger.as_ref().and_then(|ledger| ledger.authority()),
        ) else {
            debug!(root = %root.to_hex(), "publishing disabled, skipping root");
            return Ok(PublishOutcome::Disabled);
        };

        let key = root.to_hex();
        if !self.begin(&key) {
            debug!(root = %key, "publish already in flight");
            return Ok(PublishOutcome::InFlight);
        }

        let mut pending = PendingAttempt {
            publisher: self,
            key: &key,
            settled: false,
        };
        let result = self.attempt(&**ledger, authority, root, &key).await;
        pending.settled = true;
        result
    }

    async fn attempt(
        &self,
        ledger: &dyn LedgerClient,
        authority: Pubkey,
        root: &FieldElement,
        key: &str,
    ) -> Result<PublishOutcome, PublishError> {
        let registered = match self.root_exists_on_chain(root).await {
            Ok(found) => found,
            Err(PublishError::MalformedExternalState { account, source }) => {
                warn!(%account, error = %source, "malformed roots account, treating as empty");
                false
            }
            Err(e) => return Err(self.fail(key, None, e.to_string())),
        };
        if registered {
            info!(root = %key, "root already registered");
            self.record(key, RootState::Published, None, None);
            return Ok(PublishOutcome::AlreadyRegistered);
        }

        let instruction = add_root_instruction(&self.accounts, &authority, &root.to_le_bytes());
        let signature = match ledger.send_instruction(instruction).await {
            Ok(signature) => signature,
            Err(e) => return Err(self.fail(key, None, e.to_string())),
        };
        if let Err(e) = ledger.confirm(&signature).await {
            return Err(self.fail(key, Some(signature), e.to_string()));
        }

        info!(root = %key, %signature, "root published");
        self.record(key, RootState::Published, Some(signature.clone()), None);
        Ok(PublishOutcome::Submitted { signature })
    }

    /// Mark `key` Pending unless an attempt for it already is.
    fn begin(&self, key: &str) -> bool {
        let mut table = self.statuses.write();
        if table
            .get(key)
            .is_some_and(|status| status.state == RootState::Pending)
        {
            return false;
        }
        table.upsert(RootStatus {
            root: key.to_string(),
            state: RootState::Pending,
            transaction_ref: None,
            error: None,
            updated_at: Utc::now(),
        });
        true
    }

    /// Publish the current root of `kind`'s tree.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::Indexer`] if the root cannot be read (for
    /// example an empty tree), otherwise as [`publish_root`](Self::publish_root).
    pub async fn publish_current<S: TreeStore>(
        &self,
        indexer: &CommitmentIndexer<S>,
        kind: OperationKind,
    ) -> Result<(FieldElement, PublishOutcome), PublishError> {
        let root = indexer.get_root(kind)?;
        let outcome = self.publish_root(&root).await?;
        Ok((root, outcome))
    }

    /// Poll the status table until `root` is published.
    ///
    /// Reads the status up to `policy.max_attempts` times, sleeping
    /// `policy.interval` between reads.
    ///
    /// # Errors
    ///
    /// - [`PublishError::PublishFailed`] as soon as the root is `Failed`
    /// - [`PublishError::RootPendingTimeout`] if it is still `Pending` after
    ///   the last read
    /// - [`PublishError::RootNotTracked`] if no publish was ever recorded
    pub async fn wait_for_publication(
        &self,
        root: &FieldElement,
        policy: WaitPolicy,
    ) -> Result<RootStatus, PublishError> {
        let key = root.to_hex();
        let attempts = policy.max_attempts.max(1);
        let mut seen = false;

        for attempt in 1..=attempts {
            match self.status_by_key(&key) {
                Some(status) if status.state == RootState::Published => return Ok(status),
                Some(status) if status.state == RootState::Failed => {
                    return Err(PublishError::PublishFailed {
                        root: key,
                        cause: status.error.unwrap_or_else(|| "unknown".to_string()),
                    });
                }
                Some(_) => seen = true,
                None => {}
            }
            debug!(root = %key, attempt, attempts, "root not yet published");
            if attempt < attempts {
                tokio::time::sleep(policy.interval).await;
            }
        }

        if seen {
            Err(PublishError::RootPendingTimeout {
                root: key,
                attempts,
            })
        } else {
            Err(PublishError::RootNotTracked { root: key })
        }
    }

    /// Status of `root`, if a publish was ever attempted.
    pub fn root_status(&self, root: &FieldElement) -> Option<RootStatus> {
        self.status_by_key(&root.to_hex())
    }

    fn status_by_key(&self, key: &str) -> Option<RootStatus> {
        self.statuses.read().get(key).cloned()
    }

    /// Tracked roots, most recently updated first.
    pub fn statuses(&self) -> Vec<RootStatus> {
        self.statuses.read().sorted()
    }

    fn record(
        &self,
        key: &str,
        state: RootState,
        transaction_ref: Option<String>,
        error: Option<String>,
    ) {
        let status = RootStatus {
            root: key.to_string(),
            state,
            transaction_ref,
            error,
            updated_at: Utc::now(),
        };
        self.statuses.write().upsert(status);
    }

    fn fail(&self, key: &str, transaction_ref: Option<String>, cause: String) -> PublishError {
        warn!(root = %key, error = %cause, "root publish failed");
        self.record(
            key,
            RootState::Failed,
            transaction_ref,
            Some(cause.clone()),
        );
        PublishError::PublishFailed {
            root: key.to_string(),
            cause,
        }
    }
}
