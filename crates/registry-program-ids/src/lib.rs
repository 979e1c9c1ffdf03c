//! Single source of truth for the program addresses the commitment indexer
//! talks to.
//!
//! Addresses are `&'static str` base58 constants so they can be decoded at
//! compile time (`five8_const::decode_32_const`) by the interface crate.
//!
//! # Feature Flags
//!
//! - `devnet` - Use devnet program IDs
//! - `mainnet` - Use mainnet program IDs (default)
//! - `localnet` - Use localnet program IDs (same as mainnet)
//!
//! # Usage
//!
//! ```rust
//! let id = registry_program_ids::ROOT_REGISTRY_ID;
//! assert!(id.len() >= 32);
//! ```

#![no_std]

// =============================================================================
// Root Registry Program ID
// =============================================================================

/// Root registry program ID (devnet).
///
/// Owns the ring buffer of published commitment tree roots that withdrawal and
/// transfer proofs are checked against.
#[cfg(feature = "devnet")]
pub const ROOT_REGISTRY_ID: &str = "5KhuFi6R727MUsXSVwExpmLDvfHwmAh2dcbWefiGrKt9";

/// Root registry program ID (mainnet/localnet).
///
/// Owns the ring buffer of published commitment tree roots that withdrawal and
/// transfer proofs are checked against.
#[cfg(not(feature = "devnet"))]
pub const ROOT_REGISTRY_ID: &str = "2D3rut4vk8B7C4vjipjwWkHeYpPEd2a7fMddGKr8E7rK";

// =============================================================================
// Native Programs
// =============================================================================

/// System program ID. Identical on every cluster.
pub const SYSTEM_PROGRAM_ID: &str = "11111111111111111111111111111111";
