//! Indexer configuration.
//!
//! Loaded from TOML. Every field has a default, so an empty file (or no file)
//! is a valid in-memory setup:
//!
//! ```toml
//! [tree]
//! depth = 20
//!
//! [store]
//! backend = "file"          # or "memory"
//! path = "data/trees"
//! snapshot_interval = 1024
//!
//! [publish]
//! wait_attempts = 12
//! wait_interval_ms = 5000
//! status_retention = 256
//! # roots_account = "<base58>"   overrides the canonical PDA
//!
//! [log]
//! filter = "info"
//! ```

use std::{
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use root_registry_interface::RegistryAccounts;
use serde::{Deserialize, Serialize};
use solana_pubkey::Pubkey;
use strum::Display;

use crate::{
    ConfigError, FileTreeStore, IndexerOptions, MemoryTreeStore, StoreError, TreeStore, WaitPolicy,
    indexer::DEFAULT_SNAPSHOT_INTERVAL,
    publisher::{DEFAULT_STATUS_RETENTION, DEFAULT_WAIT_ATTEMPTS, DEFAULT_WAIT_INTERVAL},
    tree::{DEFAULT_DEPTH, MAX_DEPTH},
};

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IndexerConfig {
    /// Tree shape
    pub tree: TreeConfig,
    /// Leaf persistence
    pub store: StoreConfig,
    /// Root publication
    pub publish: PublishConfig,
    /// Logging
    pub log: LogConfig,
}

/// `[tree]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TreeConfig {
    /// Depth of every commitment tree
    pub depth: usize,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            depth: DEFAULT_DEPTH,
        }
    }
}

/// Where leaves are kept.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Process memory only
    #[default]
    Memory,
    /// Append-only log plus snapshots under `path`
    File,
}

/// `[store]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// Backend
    pub backend: StoreBackend,
    /// Directory for the file backend
    pub path: PathBuf,
    /// Appends between snapshots
    pub snapshot_interval: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            path: PathBuf::from("data/trees"),
            snapshot_interval: DEFAULT_SNAPSHOT_INTERVAL,
        }
    }
}

/// `[publish]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PublishConfig {
    /// Status polls while waiting for a root
    pub wait_attempts: u32,
    /// Milliseconds between polls
    pub wait_interval_ms: u64,
    /// Registry config account, base58
    pub config_account: Option<String>,
    /// Registry roots account, base58
    pub roots_account: Option<String>,
    /// Registry admin account, base58
    pub admin_account: Option<String>,
    /// Settled root statuses kept in memory
    pub status_retention: usize,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            wait_attempts: DEFAULT_WAIT_ATTEMPTS,
            wait_interval_ms: DEFAULT_WAIT_INTERVAL.as_millis() as u64,
            config_account: None,
            roots_account: None,
            admin_account: None,
            status_retention: DEFAULT_STATUS_RETENTION,
        }
    }
}

/// `[log]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogConfig {
    /// `tracing` filter directive, used when `RUST_LOG` is unset
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

impl IndexerConfig {
    /// Read and validate a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, otherwise as
    /// [`from_toml_str`](Self::from_toml_str).
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    /// Parse and validate TOML.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML or unknown keys, and
    /// [`ConfigError::Invalid`] if validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_DEPTH).contains(&self.tree.depth) {
            return Err(ConfigError::Invalid {
                field: "tree.depth",
                reason: format!("{} not in 1..={MAX_DEPTH}", self.tree.depth),
            });
        }
        if self.store.snapshot_interval == 0 {
            return Err(ConfigError::Invalid {
                field: "store.snapshot_interval",
                reason: "must be positive".to_string(),
            });
        }
        if self.publish.wait_attempts == 0 {
            return Err(ConfigError::Invalid {
                field: "publish.wait_attempts",
                reason: "must be positive".to_string(),
            });
        }
        if self.publish.wait_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "publish.wait_interval_ms",
                reason: "must be positive".to_string(),
            });
        }
        if self.publish.status_retention == 0 {
            return Err(ConfigError::Invalid {
                field: "publish.status_retention",
                reason: "must be positive".to_string(),
            });
        }
        self.registry_accounts()?;
        Ok(())
    }

    /// Canonical registry accounts with any configured overrides applied.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if an override is not a valid
    /// base58 address.
    pub fn registry_accounts(&self) -> Result<RegistryAccounts, ConfigError> {
        let mut accounts = RegistryAccounts::canonical();
        let publish = &self.publish;
        if let Some(raw) = &publish.config_account {
            accounts.config = parse_account("publish.config_account", raw)?;
        }
        if let Some(raw) = &publish.roots_account {
            accounts.roots = parse_account("publish.roots_account", raw)?;
        }
        if let Some(raw) = &publish.admin_account {
            accounts.admin = parse_account("publish.admin_account", raw)?;
        }
        Ok(accounts)
    }

    /// Polling schedule for publication waits.
    pub fn wait_policy(&self) -> WaitPolicy {
        WaitPolicy {
            max_attempts: self.publish.wait_attempts,
            interval: Duration::from_millis(self.publish.wait_interval_ms),
        }
    }

    /// Tree options for the indexer.
    pub fn indexer_options(&self) -> IndexerOptions {
        IndexerOptions {
            depth: self.tree.depth,
            snapshot_interval: self.store.snapshot_interval,
        }
    }

    /// Open the configured store.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the file store directory cannot be
    /// created.
    pub fn open_store(&self) -> Result<Box<dyn TreeStore>, StoreError> {
        let store: Box<dyn TreeStore> = match self.store.backend {
            StoreBackend::Memory => Box::new(MemoryTreeStore::new()),
            StoreBackend::File => Box::new(FileTreeStore::open(&self.store.path)?),
        };
        Ok(store)
    }
}

fn parse_account(field: &'static str, raw: &str) -> Result<Pubkey, ConfigError> {
    Pubkey::from_str(raw).map_err(|e| ConfigError::Invalid {
        field,
        reason: format!("{raw:?}: {e}"),
    })
}
