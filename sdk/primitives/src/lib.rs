//! Shade Primitives
//!
//! Client-side cryptographic primitives shared by the wallet and the
//! circuits. Everything is computed over the BN254 scalar field with the
//! same MiMC sponge the circuits use, so values produced here verify
//! inside proofs.
//!
//! # Usage
//!
//! ```ignore
//! use shade_primitives::{FieldElement, Note, random_field};
//!
//! let owner = FieldElement::from_address("0xabc123")?;
//! let note = Note::with_secret(owner, FieldElement::from_u64(1000), random_field());
//! let commitment = note.commitment();
//! let nullifier = note.nullifier();
//! ```

pub mod field;
pub mod merkle;
mod mimc;
pub mod note;

use thiserror::Error;

pub use field::{FieldElement, modulus, random_field};
pub use merkle::{
    MerklePath, MerkleTree, TREE_CAPACITY, TREE_DEPTH, compute_root, hash_pair,
};
pub use note::{Note, commit, nullify, nullify_note, ownership_hash};

/// Errors from parsing or hashing field elements
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FieldError {
    #[error("hash input must contain at least one element")]
    EmptyHashInput,

    #[error("invalid hex field element: {0:?}")]
    InvalidHex(String),

    #[error("hex value is not reduced mod p: {0}")]
    NonCanonical(String),

    #[error("invalid decimal field element: {0:?}")]
    InvalidDecimal(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MerkleError {
    #[error("leaf position {0} is outside the tree")]
    PositionOutOfRange(u64),
}

/// Hash a non-empty, ordered sequence of field elements
pub fn hash(inputs: &[FieldElement]) -> Result<FieldElement, FieldError> {
    if inputs.is_empty() {
        return Err(FieldError::EmptyHashInput);
    }
    let raw: Vec<_> = inputs.iter().map(FieldElement::inner).collect();
    Ok(FieldElement::from_inner(mimc::hash_n(&raw)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_rejects_empty() {
        assert_eq!(hash(&[]), Err(FieldError::EmptyHashInput));
    }

    #[test]
    fn test_hash_order_sensitive() {
        let a = FieldElement::from_u64(1);
        let b = FieldElement::from_u64(2);

        assert_ne!(hash(&[a, b]).unwrap(), hash(&[b, a]).unwrap());
        assert_eq!(hash(&[a, b]).unwrap(), hash_pair(a, b));
    }

    #[test]
    fn test_hash_single_element() {
        let a = FieldElement::from_u64(5);
        assert_eq!(hash(&[a]).unwrap(), hash(&[a]).unwrap());
        assert_ne!(hash(&[a]).unwrap(), a);
    }
}
