//! Shielded Notes
//!
//! A Note represents value held privately in the shielded pool.
//!
//! ```text
//! Note = {
//!     owner:  Field,   // wallet address mapped into the field
//!     value:  Field,   // amount in base units
//!     secret: Field,   // random, never derived from owner/value
//! }
//!
//! commitment     = H(owner, value, secret)
//! nullifier      = H(commitment, secret)
//! ownership_hash = H(commitment, secret, context)
//! ```

use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

use crate::field::FieldElement;
use crate::mimc::hash_n;

/// A shielded note representing privately held value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    /// Owner's address as a field element
    pub owner: FieldElement,
    /// The value (amount) held in this note
    pub value: FieldElement,
    /// Spending secret; knowledge of it is what allows spending
    pub secret: FieldElement,
}

impl Note {
    /// Create a new note with a fresh random secret
    pub fn new<R: RngCore + CryptoRng>(
        owner: FieldElement,
        value: FieldElement,
        rng: &mut R,
    ) -> Self {
        Self {
            owner,
            value,
            secret: FieldElement::random(rng),
        }
    }

    /// Create a note with an explicit secret (for testing/recovery)
    pub fn with_secret(owner: FieldElement, value: FieldElement, secret: FieldElement) -> Self {
        Self {
            owner,
            value,
            secret,
        }
    }

    pub fn commitment(&self) -> FieldElement {
        commit(self.owner, self.value, self.secret)
    }

    pub fn nullifier(&self) -> FieldElement {
        nullify_note(self.owner, self.value, self.secret)
    }

    pub fn ownership_hash(&self, context: FieldElement) -> FieldElement {
        ownership_hash(self.commitment(), self.secret, context)
    }
}

/// commitment = H(owner, value, secret)
pub fn commit(owner: FieldElement, value: FieldElement, secret: FieldElement) -> FieldElement {
    FieldElement::from_inner(hash_n(&[owner.inner(), value.inner(), secret.inner()]))
}

/// nullifier = H(commitment, secret)
pub fn nullify(commitment: FieldElement, secret: FieldElement) -> FieldElement {
    FieldElement::from_inner(hash_n(&[commitment.inner(), secret.inner()]))
}

/// Nullifier straight from note contents; identical to `nullify(commit(..), secret)`
pub fn nullify_note(
    owner: FieldElement,
    value: FieldElement,
    secret: FieldElement,
) -> FieldElement {
    nullify(commit(owner, value, secret), secret)
}

/// ownership_hash = H(commitment, secret, context)
///
/// Binds a note to an external challenge without revealing its nullifier.
pub fn ownership_hash(
    commitment: FieldElement,
    secret: FieldElement,
    context: FieldElement,
) -> FieldElement {
    FieldElement::from_inner(hash_n(&[
        commitment.inner(),
        secret.inner(),
        context.inner(),
    ]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash;
    use std::collections::HashSet;

    fn fe(v: u64) -> FieldElement {
        FieldElement::from_u64(v)
    }

    #[test]
    fn test_commitment_stable_across_calls() {
        let owner = FieldElement::from_hex("0xabc123").unwrap();
        let c1 = commit(owner, fe(1000), fe(12345));
        let c2 = commit(owner, fe(1000), fe(12345));

        assert_eq!(c1, c2, "commitment should be deterministic");
    }

    #[test]
    fn test_commit_matches_generic_hash() {
        let c = commit(fe(1), fe(2), fe(3));
        assert_eq!(c, hash(&[fe(1), fe(2), fe(3)]).unwrap());
    }

    #[test]
    fn test_nullify_note_matches_two_step() {
        let mut rng = rand::rngs::OsRng;
        for _ in 0..16 {
            let owner = FieldElement::random(&mut rng);
            let value = FieldElement::random(&mut rng);
            let secret = FieldElement::random(&mut rng);

            let two_step = nullify(commit(owner, value, secret), secret);
            assert_eq!(nullify_note(owner, value, secret), two_step);
        }
    }

    #[test]
    fn test_distinct_secrets_distinct_commitments() {
        let mut rng = rand::rngs::OsRng;
        let owner = fe(0xabc123);
        let value = fe(1000);

        let commitments: HashSet<FieldElement> = (0..64)
            .map(|_| Note::new(owner, value, &mut rng).commitment())
            .collect();

        assert_eq!(commitments.len(), 64);
    }

    #[test]
    fn test_commitment_binding() {
        let c1 = commit(fe(1), fe(1000), fe(42));
        let c2 = commit(fe(1), fe(2000), fe(42));
        let c3 = commit(fe(2), fe(1000), fe(42));

        assert_ne!(c1, c2, "different values should produce different commitments");
        assert_ne!(c1, c3, "different owners should produce different commitments");
    }

    #[test]
    fn test_ownership_hash_depends_on_context() {
        let note = Note::with_secret(fe(1), fe(1000), fe(42));

        assert_ne!(note.ownership_hash(fe(7)), note.ownership_hash(fe(8)));
        assert_eq!(
            note.ownership_hash(fe(7)),
            ownership_hash(note.commitment(), note.secret, fe(7))
        );
    }

    #[test]
    fn test_nullifier_differs_from_commitment() {
        let note = Note::with_secret(fe(1), fe(1000), fe(42));
        assert_ne!(note.nullifier(), note.commitment());
    }
}
