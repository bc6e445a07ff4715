//! Field Elements
//!
//! Every committed or hashed value is a BN254 scalar-field element. The
//! wrapper keeps values normalized in `[0, p)` and owns the canonical
//! encodings used outside the crate:
//!
//! ```text
//! hex:     0x + 64 lower-case digits, 32-byte big-endian
//! decimal: base-10 big integer (persisted note records)
//! ```

use std::fmt;
use std::iter::Sum;
use std::ops::Add;

use ark_bn254::Fr;
use ark_ff::{BigInteger, PrimeField, UniformRand};
use num_bigint::BigUint;
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::FieldError;

/// Number of hex digits in the canonical encoding
pub const HEX_DIGITS: usize = 64;

/// A BN254 scalar-field element, always reduced mod p
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FieldElement(Fr);

impl FieldElement {
    pub fn zero() -> Self {
        Self(Fr::from(0u64))
    }

    pub fn from_u64(value: u64) -> Self {
        Self(Fr::from(value))
    }

    pub fn from_u128(value: u128) -> Self {
        Self(Fr::from(value))
    }

    /// Reduce big-endian bytes of any length mod p
    pub fn reduce(bytes_be: &[u8]) -> Self {
        Self(Fr::from_be_bytes_mod_order(bytes_be))
    }

    /// Reduce an arbitrary non-negative integer mod p
    pub fn from_biguint(value: &BigUint) -> Self {
        Self::reduce(&value.to_bytes_be())
    }

    /// Parse a base-10 integer, reducing it mod p
    pub fn from_decimal(s: &str) -> Result<Self, FieldError> {
        let s = s.trim();
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(FieldError::InvalidDecimal(s.to_string()));
        }
        let value = BigUint::parse_bytes(s.as_bytes(), 10)
            .ok_or_else(|| FieldError::InvalidDecimal(s.to_string()))?;
        Ok(Self::from_biguint(&value))
    }

    /// Parse the canonical hex encoding.
    ///
    /// Accepts an optional `0x` prefix and 1 to 64 hex digits. Values that
    /// are not already reduced are rejected rather than silently wrapped.
    pub fn from_hex(s: &str) -> Result<Self, FieldError> {
        let digits = strip_hex_prefix(s);
        if digits.is_empty()
            || digits.len() > HEX_DIGITS
            || !digits.bytes().all(|b| b.is_ascii_hexdigit())
        {
            return Err(FieldError::InvalidHex(s.to_string()));
        }

        let padded = format!("{:0>width$}", digits, width = HEX_DIGITS);
        let bytes = hex::decode(&padded).map_err(|_| FieldError::InvalidHex(s.to_string()))?;

        let value = BigUint::from_bytes_be(&bytes);
        if value >= modulus() {
            return Err(FieldError::NonCanonical(s.to_string()));
        }
        Ok(Self::reduce(&bytes))
    }

    /// Map a hex wallet address (any length) into the field
    pub fn from_address(address: &str) -> Result<Self, FieldError> {
        let digits = strip_hex_prefix(address.trim());
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(FieldError::InvalidHex(address.to_string()));
        }
        let padded = if digits.len() % 2 == 1 {
            format!("0{}", digits)
        } else {
            digits.to_string()
        };
        let bytes =
            hex::decode(&padded).map_err(|_| FieldError::InvalidHex(address.to_string()))?;
        Ok(Self::reduce(&bytes))
    }

    /// Uniform sample from `[0, p)`
    pub fn random<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        Self(Fr::rand(rng))
    }

    /// 32-byte big-endian representation
    pub fn to_bytes_be(&self) -> [u8; 32] {
        let bytes = self.0.into_bigint().to_bytes_be();
        let mut out = [0u8; 32];
        let start = 32 - bytes.len().min(32);
        out[start..].copy_from_slice(&bytes[bytes.len().saturating_sub(32)..]);
        out
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.to_bytes_be()))
    }

    pub fn to_biguint(&self) -> BigUint {
        BigUint::from_bytes_be(&self.to_bytes_be())
    }

    pub fn to_decimal(&self) -> String {
        self.to_biguint().to_string()
    }

    pub fn is_zero(&self) -> bool {
        self.0 == Fr::from(0u64)
    }

    pub(crate) fn inner(&self) -> Fr {
        self.0
    }

    pub(crate) fn from_inner(f: Fr) -> Self {
        Self(f)
    }
}

/// Sample a fresh field element from the OS RNG
pub fn random_field() -> FieldElement {
    FieldElement::random(&mut rand::rngs::OsRng)
}

/// The BN254 scalar-field modulus
pub fn modulus() -> BigUint {
    BigUint::from_bytes_le(&Fr::MODULUS.to_bytes_le())
}

fn strip_hex_prefix(s: &str) -> &str {
    s.strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s)
}

impl Default for FieldElement {
    fn default() -> Self {
        Self::zero()
    }
}

impl From<u64> for FieldElement {
    fn from(value: u64) -> Self {
        Self::from_u64(value)
    }
}

impl Add for FieldElement {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl Sum for FieldElement {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::zero(), Add::add)
    }
}

impl fmt::Display for FieldElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for FieldElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FieldElement({})", self.to_hex())
    }
}

impl Serialize for FieldElement {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for FieldElement {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Serde adapter for decimal-string fields
///
/// `#[serde(with = "shade_primitives::field::decimal")]`
pub mod decimal {
    use super::FieldElement;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &FieldElement,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_decimal())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<FieldElement, D::Error> {
        let s = String::deserialize(deserializer)?;
        FieldElement::from_decimal(&s).map_err(serde::de::Error::custom)
    }
}
