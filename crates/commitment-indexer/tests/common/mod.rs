//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use commitment_indexer::{
    CommitmentIndexer, Hasher, HashEngine, IndexerOptions, LedgerClient, LedgerError,
    MemoryLedger, MemoryTreeStore, RootPublisher,
};
use root_registry_interface::RegistryAccounts;
use solana_instruction::Instruction;
use solana_pubkey::Pubkey;

/// Signer used by every test ledger.
pub const AUTHORITY: Pubkey = Pubkey::new_from_array([7u8; 32]);

/// `Poseidon(1, 2)`, big-endian hex.
pub const HASH_ONE_TWO: &str = "115cc0f5e7d690413df64c6b9662e9cf2a3617f2743245519e19607a4417189a";

/// Initialized in-memory indexer.
pub async fn ready_indexer(depth: usize) -> CommitmentIndexer<MemoryTreeStore> {
    let indexer = CommitmentIndexer::new(
        MemoryTreeStore::new(),
        IndexerOptions {
            depth,
            ..IndexerOptions::default()
        },
    );
    indexer.initialize().await.unwrap();
    indexer
}

/// Built hasher for replaying proofs.
pub async fn hasher() -> Hasher {
    let engine = HashEngine::new();
    engine.build().await.unwrap();
    engine.hasher().unwrap()
}

/// Publisher backed by a fresh [`MemoryLedger`].
pub fn memory_publisher() -> (Arc<MemoryLedger>, Arc<RootPublisher>) {
    let ledger = Arc::new(MemoryLedger::new(AUTHORITY));
    let publisher = Arc::new(RootPublisher::new(
        ledger.clone(),
        RegistryAccounts::canonical(),
    ));
    (ledger, publisher)
}

/// Ledger that serves fixed account data and accepts every transaction.
///
/// With `stall_reads` set, account reads never complete. With
/// `yield_reads` set, each read yields to the scheduler once first.
pub struct ScriptedLedger {
    pub roots_data: Option<Vec<u8>>,
    pub stall_reads: bool,
    pub yield_reads: bool,
    pub sends: AtomicUsize,
}

impl ScriptedLedger {
    pub fn serving(roots_data: Option<Vec<u8>>) -> Self {
        Self {
            roots_data,
            stall_reads: false,
            yield_reads: false,
            sends: AtomicUsize::new(0),
        }
    }

    pub fn yielding() -> Self {
        Self {
            yield_reads: true,
            ..Self::serving(None)
        }
    }

    pub fn stalled() -> Self {
        Self {
            roots_data: None,
            stall_reads: true,
            yield_reads: false,
            sends: AtomicUsize::new(0),
        }
    }

    pub fn sends(&self) -> usize {
        self.sends.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LedgerClient for ScriptedLedger {
    fn authority(&self) -> Option<Pubkey> {
        Some(AUTHORITY)
    }

    async fn get_account_data(&self, _address: &Pubkey) -> Result<Option<Vec<u8>>, LedgerError> {
        if self.stall_reads {
            std::future::pending::<()>().await;
        }
        if self.yield_reads {
            tokio::task::yield_now().await;
        }
        Ok(self.roots_data.clone())
    }

    async fn send_instruction(&self, _instruction: Instruction) -> Result<String, LedgerError> {
        let n = self.sends.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("scripted-{n}"))
    }

    async fn confirm(&self, _signature: &str) -> Result<(), LedgerError> {
        Ok(())
    }
}
