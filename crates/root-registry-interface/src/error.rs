//! Registry error types.

use thiserror::Error;

/// Errors raised while reading registry state or instruction data.
///
/// All of these describe data produced by the external program. Callers that
/// only need a membership answer treat them as "nothing registered yet".
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Account data ends before the field being read.
    #[error("registry account too short: need {expected} bytes, got {actual}")]
    TooShort {
        /// Minimum length required to read the next field
        expected: usize,
        /// Length of the account data
        actual: usize,
    },

    /// The vector length prefix cannot describe an in-memory slice.
    #[error("registry vector length {count} overflows the account bounds")]
    LengthOverflow {
        /// Decoded vector length
        count: u32,
    },

    /// The ring buffer claims more live entries than are stored.
    #[error("registry size {size} exceeds the {entries} stored entries")]
    SizeExceedsEntries {
        /// Decoded `size` field
        size: u16,
        /// Number of root entries in the vector
        entries: usize,
    },

    /// Instruction data does not start with the `add_root` discriminator or
    /// has the wrong length.
    #[error("instruction data is not a valid add_root instruction")]
    InvalidInstruction,
}
