//! Root registry program ID and PDA constants.
//!
//! Addresses are imported from the `registry-program-ids` crate and decoded
//! at compile time. The registry's PDAs are derived at compile time as well,
//! so the default account set costs nothing at runtime.
//!
//! The correct addresses are selected at compile-time based on the network feature.

use solana_pubkey::Pubkey;

// =============================================================================
// Program IDs (imported from registry-program-ids crate)
// =============================================================================

/// Root registry program ID as raw bytes.
pub const ROOT_REGISTRY_PROGRAM_ID_BYTES: [u8; 32] =
    five8_const::decode_32_const(registry_program_ids::ROOT_REGISTRY_ID);

/// Root registry program ID.
///
/// Owns the config, roots and admin accounts and accepts `add_root`.
pub const ROOT_REGISTRY_PROGRAM_ID: Pubkey = Pubkey::new_from_array(ROOT_REGISTRY_PROGRAM_ID_BYTES);

/// System program ID.
pub const SYSTEM_PROGRAM_ID: Pubkey =
    Pubkey::new_from_array(five8_const::decode_32_const(registry_program_ids::SYSTEM_PROGRAM_ID));

// =============================================================================
// PDA Seeds
// =============================================================================

/// Registry config PDA seed.
pub const CONFIG_SEED: &[u8] = b"config";

/// Roots ring buffer PDA seed.
pub const ROOTS_SEED: &[u8] = b"roots";

/// Admin PDA seed.
pub const ADMIN_SEED: &[u8] = b"admin";

// =============================================================================
// Canonical PDAs (derived at compile time)
// =============================================================================

const CONFIG_PDA: ([u8; 32], u8) =
    const_crypto::ed25519::derive_program_address(&[CONFIG_SEED], &ROOT_REGISTRY_PROGRAM_ID_BYTES);

const ROOTS_PDA: ([u8; 32], u8) =
    const_crypto::ed25519::derive_program_address(&[ROOTS_SEED], &ROOT_REGISTRY_PROGRAM_ID_BYTES);

const ADMIN_PDA: ([u8; 32], u8) =
    const_crypto::ed25519::derive_program_address(&[ADMIN_SEED], &ROOT_REGISTRY_PROGRAM_ID_BYTES);

/// Registry config PDA address.
pub const CONFIG_ADDRESS: Pubkey = Pubkey::new_from_array(CONFIG_PDA.0);

/// Roots account PDA address.
pub const ROOTS_ADDRESS: Pubkey = Pubkey::new_from_array(ROOTS_PDA.0);

/// Admin PDA address.
pub const ADMIN_ADDRESS: Pubkey = Pubkey::new_from_array(ADMIN_PDA.0);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_program_id_matches_base58() {
        assert_eq!(
            ROOT_REGISTRY_PROGRAM_ID.to_string(),
            registry_program_ids::ROOT_REGISTRY_ID
        );
    }

    #[test]
    fn test_system_program_is_all_zero() {
        assert_eq!(SYSTEM_PROGRAM_ID.to_bytes(), [0u8; 32]);
    }

    #[test]
    fn test_pdas_are_distinct() {
        assert_ne!(CONFIG_ADDRESS, ROOTS_ADDRESS);
        assert_ne!(ROOTS_ADDRESS, ADMIN_ADDRESS);
        assert_ne!(CONFIG_ADDRESS, ADMIN_ADDRESS);
    }

    #[test]
    fn test_addresses_derive_from_seeds() {
        for (seed, address) in [
            (CONFIG_SEED, CONFIG_ADDRESS),
            (ROOTS_SEED, ROOTS_ADDRESS),
            (ADMIN_SEED, ADMIN_ADDRESS),
        ] {
            let (derived, _) = const_crypto::ed25519::derive_program_address(
                &[seed],
                &ROOT_REGISTRY_PROGRAM_ID_BYTES,
            );
            assert_eq!(address.to_bytes(), derived, "seed {seed:?}");
        }
    }
}
