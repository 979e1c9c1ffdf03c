//! BN254 scalar field elements.
//!
//! Every commitment, node and root in the trees is a [`FieldElement`]. The
//! canonical representation is an arbitrary-precision integer below the
//! BN254 scalar modulus; byte arrays and hex strings are produced only at
//! the edges (proof responses, ledger instructions, status keys).
//!
//! # Commitment string parsing
//!
//! Callers send commitments as hex or decimal strings. [`FieldElement::parse`]
//! resolves the radix in this order:
//!
//! 1. `0x` / `0X` prefix: hex, 1 to 64 digits
//! 2. exactly 64 hex digits: hex (the fixed-width form this crate emits)
//! 3. decimal digits only: decimal
//! 4. hex digits only: hex
//!
//! Anything else is rejected, as is any value not below the modulus.

use std::{fmt, str::FromStr, sync::LazyLock};

use ark_bn254::Fr;
use ark_ff::{BigInteger, PrimeField};
use num_bigint::BigUint;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{FieldError, preview};

/// Width of the fixed-size byte encoding.
pub const FIELD_BYTES: usize = 32;

/// Width of the fixed-size hex encoding.
pub const FIELD_HEX_LEN: usize = FIELD_BYTES * 2;

/// BN254 scalar modulus, big-endian.
const MODULUS_BE: [u8; FIELD_BYTES] = [
    0x30, 0x64, 0x4e, 0x72, 0xe1, 0x31, 0xa0, 0x29, 0xb8, 0x50, 0x45, 0xb6, 0x81, 0x81, 0x58, 0x5d,
    0x28, 0x33, 0xe8, 0x48, 0x79, 0xb9, 0x70, 0x91, 0x43, 0xe1, 0xf5, 0x93, 0xf0, 0x00, 0x00, 0x01,
];

static MODULUS: LazyLock<BigUint> = LazyLock::new(|| BigUint::from_bytes_be(&MODULUS_BE));

/// Element of the BN254 scalar field, always reduced.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct FieldElement(BigUint);

impl FieldElement {
    /// The zero element.
    pub fn zero() -> Self {
        Self(BigUint::default())
    }

    /// BN254 scalar modulus.
    pub fn modulus() -> &'static BigUint {
        &MODULUS
    }

    /// Parse a commitment string in hex or decimal form.
    ///
    /// # Errors
    ///
    /// Returns a [`FieldError`] if the string is empty, uses characters
    /// outside both radixes, or encodes a value outside the field.
    pub fn parse(raw: &str) -> Result<Self, FieldError> {
        if raw.is_empty() {
            return Err(FieldError::Empty);
        }
        if let Some(digits) = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
            return Self::from_hex_digits(raw, digits);
        }

        let all_hex = raw.bytes().all(|b| b.is_ascii_hexdigit());
        if raw.len() == FIELD_HEX_LEN && all_hex {
            return Self::from_hex_digits(raw, raw);
        }
        if raw.bytes().all(|b| b.is_ascii_digit()) {
            return Self::from_decimal(raw);
        }
        if all_hex {
            return Self::from_hex_digits(raw, raw);
        }

        Err(FieldError::InvalidDigits {
            input: preview(raw),
            radix: "hex or decimal",
        })
    }

    /// Parse a decimal string, the canonical storage form.
    ///
    /// # Errors
    ///
    /// Returns a [`FieldError`] for empty input, non-digit characters, or a
    /// value outside the field.
    pub fn from_decimal(raw: &str) -> Result<Self, FieldError> {
        if raw.is_empty() {
            return Err(FieldError::Empty);
        }
        // `BigUint` parsing tolerates `_` and a leading `+`
        if !raw.bytes().all(|b| b.is_ascii_digit()) {
            return Err(FieldError::InvalidDigits {
                input: preview(raw),
                radix: "decimal",
            });
        }
        let value = BigUint::parse_bytes(raw.as_bytes(), 10).ok_or_else(|| {
            FieldError::InvalidDigits {
                input: preview(raw),
                radix: "decimal",
            }
        })?;
        Self::reduced(value, raw)
    }

    /// Parse hex digits, with or without a `0x` prefix.
    ///
    /// # Errors
    ///
    /// Returns a [`FieldError`] for empty input, more than 64 digits,
    /// non-hex characters, or a value outside the field.
    pub fn from_hex(raw: &str) -> Result<Self, FieldError> {
        let digits = raw
            .strip_prefix("0x")
            .or_else(|| raw.strip_prefix("0X"))
            .unwrap_or(raw);
        Self::from_hex_digits(raw, digits)
    }

    fn from_hex_digits(raw: &str, digits: &str) -> Result<Self, FieldError> {
        if digits.is_empty() {
            return Err(FieldError::Empty);
        }
        if digits.len() > FIELD_HEX_LEN {
            return Err(FieldError::TooLong {
                digits: digits.len(),
            });
        }
        if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(FieldError::InvalidDigits {
                input: preview(raw),
                radix: "hex",
            });
        }
        let value = BigUint::parse_bytes(digits.as_bytes(), 16).ok_or_else(|| {
            FieldError::InvalidDigits {
                input: preview(raw),
                radix: "hex",
            }
        })?;
        Self::reduced(value, raw)
    }

    fn reduced(value: BigUint, raw: &str) -> Result<Self, FieldError> {
        if value >= *MODULUS {
            return Err(FieldError::OutOfField {
                input: preview(raw),
            });
        }
        Ok(Self(value))
    }

    /// Decode 32 big-endian bytes.
    ///
    /// # Errors
    ///
    /// Returns [`FieldError::OutOfField`] if the value is not below the
    /// modulus.
    pub fn from_be_bytes(bytes: &[u8; FIELD_BYTES]) -> Result<Self, FieldError> {
        let value = BigUint::from_bytes_be(bytes);
        Self::reduced(value, &hex::encode(bytes))
    }

    /// Decode 32 little-endian bytes.
    ///
    /// # Errors
    ///
    /// Returns [`FieldError::OutOfField`] if the value is not below the
    /// modulus.
    pub fn from_le_bytes(bytes: &[u8; FIELD_BYTES]) -> Result<Self, FieldError> {
        let mut be = *bytes;
        be.reverse();
        Self::from_be_bytes(&be)
    }

    /// 32-byte big-endian encoding, zero-padded.
    pub fn to_be_bytes(&self) -> [u8; FIELD_BYTES] {
        let digits = self.0.to_bytes_be();
        let mut out = [0u8; FIELD_BYTES];
        out[FIELD_BYTES - digits.len()..].copy_from_slice(&digits);
        out
    }

    /// 32-byte little-endian encoding, zero-padded. This is the order the
    /// registry program stores roots in.
    pub fn to_le_bytes(&self) -> [u8; FIELD_BYTES] {
        let mut out = self.to_be_bytes();
        out.reverse();
        out
    }

    /// 64 lowercase hex characters of the big-endian encoding, no prefix.
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_be_bytes())
    }

    /// Underlying integer.
    pub fn as_biguint(&self) -> &BigUint {
        &self.0
    }

    /// Whether this is the zero element.
    pub fn is_zero(&self) -> bool {
        self.0.bits() == 0
    }

    pub(crate) fn to_fr(&self) -> Fr {
        Fr::from_be_bytes_mod_order(&self.to_be_bytes())
    }

    pub(crate) fn from_fr(value: Fr) -> Self {
        Self(BigUint::from_bytes_be(&value.into_bigint().to_bytes_be()))
    }
}

impl From<u64> for FieldElement {
    fn from(value: u64) -> Self {
        Self(BigUint::from(value))
    }
}

impl FromStr for FieldElement {
    type Err = FieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for FieldElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for FieldElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FieldElement({})", self.0)
    }
}

impl Serialize for FieldElement {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for FieldElement {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::from_decimal(&raw).map_err(serde::de::Error::custom)
    }
}
