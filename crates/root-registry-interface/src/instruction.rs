//! `add_root` instruction builder.
//!
//! The registry program exposes a single instruction the indexer needs:
//! register a tree root in the roots ring buffer. Data is an 8-byte
//! discriminator followed by the root as 32 little-endian bytes.

use borsh::{BorshDeserialize, BorshSerialize};
use solana_instruction::{AccountMeta, Instruction};
use solana_pubkey::Pubkey;

use crate::{
    ADMIN_ADDRESS, CONFIG_ADDRESS, ROOT_REGISTRY_PROGRAM_ID, ROOTS_ADDRESS, RegistryError,
    RootBytes, SYSTEM_PROGRAM_ID,
};

// ============================================================================
// Instruction Data
// ============================================================================

/// First 8 bytes of `sha256(preimage)`, evaluated at compile time.
pub(crate) const fn sighash(preimage: &[u8]) -> [u8; 8] {
    let hash = sha2_const_stable::Sha256::new().update(preimage).finalize();
    let mut out = [0u8; 8];
    let mut i = 0;
    while i < 8 {
        out[i] = hash[i];
        i += 1;
    }
    out
}

/// Discriminator of `add_root`: first 8 bytes of `sha256("global:add_root")`.
pub const ADD_ROOT_DISCRIMINATOR: [u8; 8] = sighash(b"global:add_root");

/// Total length of `add_root` instruction data.
pub const ADD_ROOT_DATA_LEN: usize = ADD_ROOT_DISCRIMINATOR.len() + 32;

/// Arguments of `add_root`, borsh-encoded after the discriminator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct AddRootArgs {
    /// Root as little-endian field bytes
    pub root: RootBytes,
}

/// Build instruction data for `add_root`.
///
/// Layout: [discriminator: 8 bytes, root: 32 bytes LE]
pub fn build_add_root_instruction_data(root_le: &RootBytes) -> [u8; ADD_ROOT_DATA_LEN] {
    let mut data = [0u8; ADD_ROOT_DATA_LEN];
    data[..8].copy_from_slice(&ADD_ROOT_DISCRIMINATOR);
    data[8..].copy_from_slice(root_le);
    data
}

/// Parse `add_root` instruction data.
///
/// # Errors
///
/// Returns [`RegistryError::InvalidInstruction`] if the discriminator does not
/// match or the data is not exactly [`ADD_ROOT_DATA_LEN`] bytes.
pub fn parse_add_root(data: &[u8]) -> Result<AddRootArgs, RegistryError> {
    let (disc, rest) = data
        .split_first_chunk::<8>()
        .ok_or(RegistryError::InvalidInstruction)?;
    if *disc != ADD_ROOT_DISCRIMINATOR {
        return Err(RegistryError::InvalidInstruction);
    }
    AddRootArgs::try_from_slice(rest).map_err(|_| RegistryError::InvalidInstruction)
}

// ============================================================================
// Account Layout Constants
// ============================================================================

/// Account indices for `add_root`.
///
/// Account layout (5 accounts):
/// 0. config - Registry config PDA
/// 1. roots (mut) - Roots ring buffer PDA
/// 2. authority (signer, mut) - Publishing authority, pays for the transaction
/// 3. admin - Admin PDA
/// 4. system_program - System program
pub mod add_root_accounts {
    /// Registry config account (readonly)
    pub const CONFIG: usize = 0;
    /// Roots account (writable)
    pub const ROOTS: usize = 1;
    /// Publishing authority (signer, writable)
    pub const AUTHORITY: usize = 2;
    /// Admin account (readonly)
    pub const ADMIN: usize = 3;
    /// System program
    pub const SYSTEM_PROGRAM: usize = 4;
    /// Total number of accounts
    pub const COUNT: usize = 5;
}

/// The registry accounts an `add_root` instruction targets.
///
/// Defaults to the canonical PDAs of the compiled-in registry program.
/// Deployments that do not use canonical PDAs override individual fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegistryAccounts {
    /// Registry program ID
    pub program_id: Pubkey,
    /// Config account
    pub config: Pubkey,
    /// Roots ring buffer account
    pub roots: Pubkey,
    /// Admin account
    pub admin: Pubkey,
    /// System program
    pub system_program: Pubkey,
}

impl RegistryAccounts {
    /// Canonical accounts of the compiled-in registry program.
    pub const fn canonical() -> Self {
        Self {
            program_id: ROOT_REGISTRY_PROGRAM_ID,
            config: CONFIG_ADDRESS,
            roots: ROOTS_ADDRESS,
            admin: ADMIN_ADDRESS,
            system_program: SYSTEM_PROGRAM_ID,
        }
    }
}

impl Default for RegistryAccounts {
    fn default() -> Self {
        Self::canonical()
    }
}

/// Build the `add_root` instruction for a little-endian root.
pub fn add_root_instruction(
    accounts: &RegistryAccounts,
    authority: &Pubkey,
    root_le: &RootBytes,
) -> Instruction {
    Instruction {
        program_id: accounts.program_id,
        accounts: vec![
            AccountMeta::new_readonly(accounts.config, false),
            AccountMeta::new(accounts.roots, false),
            AccountMeta::new(*authority, true),
            AccountMeta::new_readonly(accounts.admin, false),
            AccountMeta::new_readonly(accounts.system_program, false),
        ],
        data: build_add_root_instruction_data(root_le).to_vec(),
    }
}
