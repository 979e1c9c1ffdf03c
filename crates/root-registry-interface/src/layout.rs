//! Roots account layout.
//!
//! The registry program owns this account; the indexer only reads it. The
//! layout is fixed by the program and decoded byte for byte:
//!
//! ```text
//! [0..8)              discriminator (not checked)
//! [8..12)             u32 LE vector length N
//! [12..12+32N)        N root entries, 32 bytes each (little-endian values)
//! [12+32N..+2)        u16 LE cursor   (next slot to overwrite)
//! [+2..+4)            u16 LE size     (number of live entries)
//! [+4..+6)            u16 LE capacity (ring buffer length)
//! ```
//!
//! A root is registered iff it equals one of the first `size` entries.

use bytemuck::{Pod, Zeroable};

use crate::RegistryError;

/// Account discriminator length in bytes.
pub const DISCRIMINATOR_LEN: usize = 8;

/// Discriminator the registry program writes at the start of the roots
/// account: first 8 bytes of `sha256("account:RootRegistry")`. Decoding does
/// not check it.
pub const ROOT_REGISTRY_DISCRIMINATOR: [u8; DISCRIMINATOR_LEN] =
    crate::instruction::sighash(b"account:RootRegistry");

/// Length of the little-endian `u32` vector prefix.
pub const VEC_LEN_SIZE: usize = 4;

/// Length of one root entry.
pub const ROOT_LEN: usize = 32;

/// Offset of the first root entry.
pub const ROOTS_OFFSET: usize = DISCRIMINATOR_LEN + VEC_LEN_SIZE;

/// Length of the ring buffer bookkeeping that follows the roots.
pub const TAIL_LEN: usize = core::mem::size_of::<RingTail>();

/// A root as stored on-chain: the field element in little-endian order.
pub type RootBytes = [u8; ROOT_LEN];

/// Ring buffer bookkeeping stored after the root entries.
///
/// Fields are kept as raw little-endian byte pairs so the struct has
/// alignment 1 and can be read from any offset.
#[repr(C)]
#[derive(Pod, Zeroable, Copy, Clone, Debug, PartialEq, Eq)]
pub struct RingTail {
    /// Next slot to overwrite (u16 LE)
    pub cursor: [u8; 2],
    /// Number of live entries (u16 LE)
    pub size: [u8; 2],
    /// Ring buffer length (u16 LE)
    pub capacity: [u8; 2],
}

impl RingTail {
    /// Create a tail from native values.
    pub const fn new(cursor: u16, size: u16, capacity: u16) -> Self {
        Self {
            cursor: cursor.to_le_bytes(),
            size: size.to_le_bytes(),
            capacity: capacity.to_le_bytes(),
        }
    }

    /// Next slot to overwrite.
    pub const fn cursor(&self) -> u16 {
        u16::from_le_bytes(self.cursor)
    }

    /// Number of live entries.
    pub const fn size(&self) -> u16 {
        u16::from_le_bytes(self.size)
    }

    /// Ring buffer length.
    pub const fn capacity(&self) -> u16 {
        u16::from_le_bytes(self.capacity)
    }
}

/// Decoded roots account.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RootRegistry {
    /// Raw account discriminator, carried through for re-encoding
    pub discriminator: [u8; DISCRIMINATOR_LEN],
    /// Stored root entries (may include stale slots beyond `size`)
    pub roots: Vec<RootBytes>,
    /// Next slot to overwrite
    pub cursor: u16,
    /// Number of live entries
    pub size: u16,
    /// Ring buffer length
    pub capacity: u16,
}

impl RootRegistry {
    /// Create an empty registry with the given ring buffer length.
    pub fn with_capacity(discriminator: [u8; DISCRIMINATOR_LEN], capacity: u16) -> Self {
        Self {
            discriminator,
            roots: Vec::with_capacity(capacity as usize),
            cursor: 0,
            size: 0,
            capacity,
        }
    }

    /// Decode account data.
    ///
    /// Trailing bytes after the tail are ignored (accounts are commonly
    /// over-allocated).
    ///
    /// # Errors
    ///
    /// Returns a [`RegistryError`] when the data is shorter than the layout it
    /// declares or when `size` exceeds the number of stored entries.
    pub fn decode(data: &[u8]) -> Result<Self, RegistryError> {
        let too_short = |expected: usize| RegistryError::TooShort {
            expected,
            actual: data.len(),
        };

        let mut discriminator = [0u8; DISCRIMINATOR_LEN];
        discriminator.copy_from_slice(
            data.get(..DISCRIMINATOR_LEN)
                .ok_or_else(|| too_short(ROOTS_OFFSET))?,
        );

        let mut len_bytes = [0u8; VEC_LEN_SIZE];
        len_bytes.copy_from_slice(
            data.get(DISCRIMINATOR_LEN..ROOTS_OFFSET)
                .ok_or_else(|| too_short(ROOTS_OFFSET))?,
        );
        let count = u32::from_le_bytes(len_bytes);

        let roots_end = (count as usize)
            .checked_mul(ROOT_LEN)
            .and_then(|len| len.checked_add(ROOTS_OFFSET))
            .ok_or(RegistryError::LengthOverflow { count })?;
        let tail_end = roots_end
            .checked_add(TAIL_LEN)
            .ok_or(RegistryError::LengthOverflow { count })?;

        let roots_bytes = data
            .get(ROOTS_OFFSET..roots_end)
            .ok_or_else(|| too_short(tail_end))?;
        let tail_bytes = data
            .get(roots_end..tail_end)
            .ok_or_else(|| too_short(tail_end))?;
        let tail: RingTail =
            bytemuck::try_pod_read_unaligned(tail_bytes).map_err(|_| too_short(tail_end))?;

        let roots: Vec<RootBytes> = roots_bytes
            .chunks_exact(ROOT_LEN)
            .map(|chunk| {
                let mut root = [0u8; ROOT_LEN];
                root.copy_from_slice(chunk);
                root
            })
            .collect();

        if tail.size() as usize > roots.len() {
            return Err(RegistryError::SizeExceedsEntries {
                size: tail.size(),
                entries: roots.len(),
            });
        }

        Ok(Self {
            discriminator,
            roots,
            cursor: tail.cursor(),
            size: tail.size(),
            capacity: tail.capacity(),
        })
    }

    /// Encode into the on-chain layout.
    pub fn encode(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(ROOTS_OFFSET + self.roots.len() * ROOT_LEN + TAIL_LEN);
        data.extend_from_slice(&self.discriminator);
        data.extend_from_slice(&(self.roots.len() as u32).to_le_bytes());
        for root in &self.roots {
            data.extend_from_slice(root);
        }
        let tail = RingTail::new(self.cursor, self.size, self.capacity);
        data.extend_from_slice(bytemuck::bytes_of(&tail));
        data
    }

    /// Live entries, i.e. the first `size` roots.
    pub fn active_roots(&self) -> &[RootBytes] {
        let live = (self.size as usize).min(self.roots.len());
        &self.roots[..live]
    }

    /// Check whether a little-endian root is among the live entries.
    pub fn contains(&self, root: &RootBytes) -> bool {
        self.active_roots().iter().any(|entry| entry == root)
    }

    /// Insert a root the way the registry program does: fill the vector up
    /// to `capacity`, then overwrite the slot at `cursor`.
    ///
    /// A zero-capacity registry drops the root.
    pub fn push(&mut self, root: RootBytes) {
        if self.capacity == 0 {
            return;
        }

        let slot = self.cursor as usize;
        if slot < self.roots.len() {
            self.roots[slot] = root;
        } else {
            self.roots.push(root);
        }

        self.cursor = ((slot + 1) % self.capacity as usize) as u16;
        self.size = self.size.saturating_add(1).min(self.capacity);
    }
}
