//! Root Registry Interface
//!
//! Off-chain view of the root registry program: the bit-exact layout of its
//! roots account and the single instruction the indexer sends to it.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  commitment-indexer (off-chain)              │
//! │  • Poseidon commitment trees                                 │
//! │  • Computes roots and inclusion proofs                       │
//! │  • Publishes roots, tracks Pending/Published/Failed          │
//! └─────────────────────────────────────────────────────────────┘
//!               │ add_root(root)              ▲ roots account data
//!               ▼                             │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  root registry program (on-chain)            │
//! │  • Ring buffer of recently registered roots                  │
//! │  • Authority-gated registration                              │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`layout`]: Roots account decoder and encoder
//! - [`instruction`]: `add_root` instruction data and account ordering
//! - [`program_ids`]: Program ID and PDA constants
//! - [`error`]: Registry error types

pub mod error;
pub mod instruction;
pub mod layout;
pub mod program_ids;

pub use error::*;
pub use instruction::*;
pub use layout::*;
pub use program_ids::*;
