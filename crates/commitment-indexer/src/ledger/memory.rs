//! In-process ledger that behaves like the root registry program.
//!
//! Used by tests and local runs. `add_root` instructions are validated the
//! way the program validates them (program id, account order, signer) and
//! pushed into a real encoded roots account, so the publisher reads back the
//! exact bytes it would read from chain.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use parking_lot::Mutex;
use root_registry_interface::{
    ROOT_REGISTRY_DISCRIMINATOR, RegistryAccounts, RootBytes, RootRegistry, add_root_accounts,
    parse_add_root,
};
use solana_instruction::Instruction;
use solana_pubkey::Pubkey;
use tracing::debug;

use super::LedgerClient;
use crate::LedgerError;

/// Ring buffer length of the emulated roots account.
pub const DEFAULT_REGISTRY_CAPACITY: u16 = 64;

#[derive(Default)]
struct State {
    accounts: HashMap<Pubkey, Vec<u8>>,
    sent: HashSet<String>,
    submissions: usize,
    reads: usize,
    fail_next_send: Option<String>,
    fail_next_confirm: Option<String>,
}

/// Emulated registry program and ledger.
pub struct MemoryLedger {
    authority: Option<Pubkey>,
    registry: RegistryAccounts,
    state: Mutex<State>,
}

impl MemoryLedger {
    /// Ledger with an initialized canonical registry and `authority` as the
    /// publishing signer.
    pub fn new(authority: Pubkey) -> Self {
        Self::with_registry(
            Some(authority),
            RegistryAccounts::canonical(),
            DEFAULT_REGISTRY_CAPACITY,
        )
    }

    /// Ledger with an initialized registry at `registry` accounts.
    pub fn with_registry(
        authority: Option<Pubkey>,
        registry: RegistryAccounts,
        capacity: u16,
    ) -> Self {
        let empty = RootRegistry::with_capacity(ROOT_REGISTRY_DISCRIMINATOR, capacity);
        let mut state = State::default();
        state.accounts.insert(registry.roots, empty.encode());
        Self {
            authority,
            registry,
            state: Mutex::new(state),
        }
    }

    /// Overwrite the raw data of an account.
    pub fn set_account_data(&self, address: Pubkey, data: Vec<u8>) {
        self.state.lock().accounts.insert(address, data);
    }

    /// Delete an account.
    pub fn remove_account(&self, address: &Pubkey) {
        self.state.lock().accounts.remove(address);
    }

    /// Register a root directly, as if another process had published it.
    pub fn register_root(&self, root_le: RootBytes) {
        let mut state = self.state.lock();
        let roots = self.registry.roots;
        let mut registry = state
            .accounts
            .get(&roots)
            .and_then(|data| RootRegistry::decode(data).ok())
            .unwrap_or_else(|| {
                RootRegistry::with_capacity(ROOT_REGISTRY_DISCRIMINATOR, DEFAULT_REGISTRY_CAPACITY)
            });
        registry.push(root_le);
        state.accounts.insert(roots, registry.encode());
    }

    /// Live roots in the registry, little-endian.
    pub fn registered_roots(&self) -> Vec<RootBytes> {
        let state = self.state.lock();
        state
            .accounts
            .get(&self.registry.roots)
            .and_then(|data| RootRegistry::decode(data).ok())
            .map(|registry| registry.active_roots().to_vec())
            .unwrap_or_default()
    }

    /// Number of transactions accepted so far.
    pub fn submissions(&self) -> usize {
        self.state.lock().submissions
    }

    /// Number of account reads so far.
    pub fn reads(&self) -> usize {
        self.state.lock().reads
    }

    /// Reject the next submitted transaction with `reason`.
    pub fn fail_next_send(&self, reason: impl Into<String>) {
        self.state.lock().fail_next_send = Some(reason.into());
    }

    /// Report the next confirmation as failed with `reason`. The transaction
    /// itself has already landed.
    pub fn fail_next_confirm(&self, reason: impl Into<String>) {
        self.state.lock().fail_next_confirm = Some(reason.into());
    }

    fn check_accounts(&self, instruction: &Instruction) -> Result<(), LedgerError> {
        if instruction.program_id != self.registry.program_id {
            return Err(LedgerError::Rejected(format!(
                "unknown program {}",
                instruction.program_id
            )));
        }
        let metas = &instruction.accounts;
        if metas.len() != add_root_accounts::COUNT {
            return Err(LedgerError::Rejected(format!(
                "expected {} accounts, got {}",
                add_root_accounts::COUNT,
                metas.len()
            )));
        }

        let expected = [
            (add_root_accounts::CONFIG, self.registry.config, false),
            (add_root_accounts::ROOTS, self.registry.roots, true),
            (add_root_accounts::ADMIN, self.registry.admin, false),
            (
                add_root_accounts::SYSTEM_PROGRAM,
                self.registry.system_program,
                false,
            ),
        ];
        for (index, pubkey, writable) in expected {
            let meta = &metas[index];
            if meta.pubkey != pubkey || meta.is_writable != writable {
                return Err(LedgerError::Rejected(format!(
                    "account {index} mismatch: {}",
                    meta.pubkey
                )));
            }
        }

        let signer = &metas[add_root_accounts::AUTHORITY];
        if !signer.is_signer || Some(signer.pubkey) != self.authority {
            return Err(LedgerError::Rejected("missing authority signature".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerClient for MemoryLedger {
    fn authority(&self) -> Option<Pubkey> {
        self.authority
    }

    async fn get_account_data(&self, address: &Pubkey) -> Result<Option<Vec<u8>>, LedgerError> {
        let mut state = self.state.lock();
        state.reads += 1;
        Ok(state.accounts.get(address).cloned())
    }

    async fn send_instruction(&self, instruction: Instruction) -> Result<String, LedgerError> {
        if let Some(reason) = self.state.lock().fail_next_send.take() {
            return Err(LedgerError::Rejected(reason));
        }
        self.check_accounts(&instruction)?;
        let args =
            parse_add_root(&instruction.data).map_err(|e| LedgerError::Rejected(e.to_string()))?;

        let mut state = self.state.lock();
        let data = state
            .accounts
            .get(&self.registry.roots)
            .ok_or_else(|| LedgerError::Rejected("roots account not initialized".into()))?;
        let mut registry =
            RootRegistry::decode(data).map_err(|e| LedgerError::Rejected(e.to_string()))?;
        registry.push(args.root);
        state.accounts.insert(self.registry.roots, registry.encode());

        state.submissions += 1;
        let signature = format!("memory-{:08}", state.submissions);
        state.sent.insert(signature.clone());
        debug!(%signature, "memory ledger accepted add_root");
        Ok(signature)
    }

    async fn confirm(&self, signature: &str) -> Result<(), LedgerError> {
        let mut state = self.state.lock();
        if let Some(reason) = state.fail_next_confirm.take() {
            return Err(LedgerError::NotConfirmed {
                signature: signature.to_string(),
                reason,
            });
        }
        if !state.sent.contains(signature) {
            return Err(LedgerError::NotConfirmed {
                signature: signature.to_string(),
                reason: "unknown signature".into(),
            });
        }
        Ok(())
    }
}
