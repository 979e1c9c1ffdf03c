//! Ledger collaborator port.
//!
//! The publisher needs four things from the chain: who may sign, what an
//! account holds, a way to send one instruction, and a way to wait for it to
//! land. Transaction construction, signing and broadcast stay behind this
//! trait.

mod memory;

pub use memory::MemoryLedger;

use async_trait::async_trait;
use solana_instruction::Instruction;
use solana_pubkey::Pubkey;

use crate::LedgerError;

/// Access to the external ledger.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Signer allowed to register roots, if one is configured.
    fn authority(&self) -> Option<Pubkey>;

    /// Raw data of `address`, or `None` if the account does not exist.
    ///
    /// # Errors
    ///
    /// Returns a [`LedgerError`] if the ledger cannot be queried.
    async fn get_account_data(&self, address: &Pubkey) -> Result<Option<Vec<u8>>, LedgerError>;

    /// Sign and submit a transaction carrying `instruction`, returning its
    /// signature.
    ///
    /// # Errors
    ///
    /// Returns a [`LedgerError`] if the transaction is rejected or cannot be
    /// sent.
    async fn send_instruction(&self, instruction: Instruction) -> Result<String, LedgerError>;

    /// Wait until the transaction with `signature` is confirmed.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::NotConfirmed`] if it fails or never lands.
    async fn confirm(&self, signature: &str) -> Result<(), LedgerError>;
}
