//! Circuit Input Builder
//!
//! Maps wallet objects onto each circuit's flat input schema and the typed
//! public outputs the caller gets back with the proof.
//!
//! Merkle convention (must match the circuits exactly):
//!
//! ```text
//! path_indices[i] == true   current is the right child: H(sibling, current)
//! path_indices[i] == false  current is the left child:  H(current, sibling)
//! ```
//!
//! Paths are checked against the supplied root before anything is proven,
//! so a stale root fails fast instead of after a long proving run.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use shade_primitives::{FieldElement, Note, TREE_DEPTH, compute_root};

use crate::ProverError;
use crate::circuit::CircuitType;

/// A single circuit input: a field or a (possibly nested) array of fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum InputValue {
    Field(FieldElement),
    Array(Vec<InputValue>),
}

impl From<FieldElement> for InputValue {
    fn from(value: FieldElement) -> Self {
        InputValue::Field(value)
    }
}

impl From<bool> for InputValue {
    fn from(value: bool) -> Self {
        InputValue::Field(FieldElement::from_u64(value as u64))
    }
}

impl<T: Into<InputValue>> From<Vec<T>> for InputValue {
    fn from(values: Vec<T>) -> Self {
        InputValue::Array(values.into_iter().map(Into::into).collect())
    }
}

/// Named inputs in the circuit's own naming, in stable order
pub type InputMap = BTreeMap<String, InputValue>;

/// A typed request for one circuit
pub trait CircuitRequest {
    /// Public outputs returned alongside the proof
    type Public;

    const CIRCUIT: CircuitType;

    /// Validate the request and produce `(inputs, public outputs)`
    fn build(&self) -> Result<(InputMap, Self::Public), ProverError>;
}

fn insert(map: &mut InputMap, name: &str, value: impl Into<InputValue>) {
    map.insert(name.to_string(), value.into());
}

fn insert_note(map: &mut InputMap, note: &Note) {
    insert(map, "owner", note.owner);
    insert(map, "value", note.value);
    insert(map, "secret", note.secret);
}

/// Check depth and re-hash `leaf` along the path to `root`
pub fn check_path(
    label: &str,
    leaf: FieldElement,
    siblings: &[FieldElement],
    indices: &[bool],
    root: FieldElement,
) -> Result<(), ProverError> {
    if siblings.len() != TREE_DEPTH || indices.len() != TREE_DEPTH {
        return Err(ProverError::InvalidInput(format!(
            "{}: merkle path must have {} siblings and indices, got {} and {}",
            label,
            TREE_DEPTH,
            siblings.len(),
            indices.len()
        )));
    }

    let computed = compute_root(leaf, siblings, indices);
    if computed != root {
        return Err(ProverError::InvalidInput(format!(
            "{}: merkle path hashes to {} but merkle_root is {}",
            label, computed, root
        )));
    }
    Ok(())
}

// ============================================================================
// Deposit
// ============================================================================

#[derive(Debug, Clone)]
pub struct DepositRequest {
    pub note: Note,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositPublicInputs {
    pub commitment: FieldElement,
    pub deposit_amount: FieldElement,
}

impl CircuitRequest for DepositRequest {
    type Public = DepositPublicInputs;
    const CIRCUIT: CircuitType = CircuitType::Deposit;

    fn build(&self) -> Result<(InputMap, DepositPublicInputs), ProverError> {
        let public = DepositPublicInputs {
            commitment: self.note.commitment(),
            deposit_amount: self.note.value,
        };

        let mut inputs = InputMap::new();
        insert_note(&mut inputs, &self.note);
        insert(&mut inputs, "commitment", public.commitment);
        insert(&mut inputs, "deposit_amount", public.deposit_amount);
        Ok((inputs, public))
    }
}

// ============================================================================
// Withdraw
// ============================================================================

#[derive(Debug, Clone)]
pub struct WithdrawRequest {
    pub note: Note,
    pub recipient: FieldElement,
    pub withdraw_amount: FieldElement,
    pub relayer_fee: FieldElement,
    pub merkle_path: Vec<FieldElement>,
    pub path_indices: Vec<bool>,
    pub merkle_root: FieldElement,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawPublicInputs {
    pub nullifier: FieldElement,
    pub merkle_root: FieldElement,
    pub recipient: FieldElement,
    pub withdraw_amount: FieldElement,
    pub relayer_fee: FieldElement,
}

impl CircuitRequest for WithdrawRequest {
    type Public = WithdrawPublicInputs;
    const CIRCUIT: CircuitType = CircuitType::Withdraw;

    fn build(&self) -> Result<(InputMap, WithdrawPublicInputs), ProverError> {
        check_path(
            "withdraw",
            self.note.commitment(),
            &self.merkle_path,
            &self.path_indices,
            self.merkle_root,
        )?;

        let public = WithdrawPublicInputs {
            nullifier: self.note.nullifier(),
            merkle_root: self.merkle_root,
            recipient: self.recipient,
            withdraw_amount: self.withdraw_amount,
            relayer_fee: self.relayer_fee,
        };

        let mut inputs = InputMap::new();
        insert_note(&mut inputs, &self.note);
        insert(&mut inputs, "merkle_path", self.merkle_path.clone());
        insert(&mut inputs, "path_indices", self.path_indices.clone());
        insert(&mut inputs, "nullifier", public.nullifier);
        insert(&mut inputs, "merkle_root", public.merkle_root);
        insert(&mut inputs, "recipient", public.recipient);
        insert(&mut inputs, "withdraw_amount", public.withdraw_amount);
        insert(&mut inputs, "relayer_fee", public.relayer_fee);
        Ok((inputs, public))
    }
}

// ============================================================================
// Transfer
// ============================================================================

/// Spend `input_notes` into `output_notes`.
///
/// Values are passed through as given; the circuit enforces conservation.
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub input_notes: Vec<Note>,
    pub output_notes: Vec<Note>,
    pub merkle_paths: Vec<Vec<FieldElement>>,
    pub path_indices: Vec<Vec<bool>>,
    pub merkle_root: FieldElement,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferPublicInputs {
    pub input_nullifiers: Vec<FieldElement>,
    pub output_commitments: Vec<FieldElement>,
    pub merkle_root: FieldElement,
}

impl CircuitRequest for TransferRequest {
    type Public = TransferPublicInputs;
    const CIRCUIT: CircuitType = CircuitType::Transfer;

    fn build(&self) -> Result<(InputMap, TransferPublicInputs), ProverError> {
        if self.input_notes.is_empty() || self.output_notes.is_empty() {
            return Err(ProverError::InvalidInput(
                "transfer needs at least one input and one output note".to_string(),
            ));
        }
        if self.merkle_paths.len() != self.input_notes.len()
            || self.path_indices.len() != self.input_notes.len()
        {
            return Err(ProverError::InvalidInput(format!(
                "transfer has {} input notes but {} merkle paths and {} index sets",
                self.input_notes.len(),
                self.merkle_paths.len(),
                self.path_indices.len()
            )));
        }

        for (i, note) in self.input_notes.iter().enumerate() {
            check_path(
                &format!("transfer input {}", i),
                note.commitment(),
                &self.merkle_paths[i],
                &self.path_indices[i],
                self.merkle_root,
            )?;
        }

        let public = TransferPublicInputs {
            input_nullifiers: self.input_notes.iter().map(Note::nullifier).collect(),
            output_commitments: self.output_notes.iter().map(Note::commitment).collect(),
            merkle_root: self.merkle_root,
        };

        let field = |notes: &[Note], f: fn(&Note) -> FieldElement| -> Vec<FieldElement> {
            notes.iter().map(f).collect()
        };

        let mut inputs = InputMap::new();
        insert(&mut inputs, "in_owner", field(&self.input_notes, |n| n.owner));
        insert(&mut inputs, "in_value", field(&self.input_notes, |n| n.value));
        insert(&mut inputs, "in_secret", field(&self.input_notes, |n| n.secret));
        insert(&mut inputs, "in_merkle_paths", self.merkle_paths.clone());
        insert(&mut inputs, "in_path_indices", self.path_indices.clone());
        insert(&mut inputs, "out_owner", field(&self.output_notes, |n| n.owner));
        insert(&mut inputs, "out_value", field(&self.output_notes, |n| n.value));
        insert(&mut inputs, "out_secret", field(&self.output_notes, |n| n.secret));
        insert(&mut inputs, "input_nullifiers", public.input_nullifiers.clone());
        insert(&mut inputs, "output_commitments", public.output_commitments.clone());
        insert(&mut inputs, "merkle_root", public.merkle_root);
        Ok((inputs, public))
    }
}

// ============================================================================
// Ownership
// ============================================================================

/// Prove a note of at least `min_value` is in the tree, bound to `context`
#[derive(Debug, Clone)]
pub struct OwnershipRequest {
    pub note: Note,
    pub merkle_path: Vec<FieldElement>,
    pub path_indices: Vec<bool>,
    pub merkle_root: FieldElement,
    pub context: FieldElement,
    pub min_value: FieldElement,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnershipPublicInputs {
    pub merkle_root: FieldElement,
    pub ownership_hash: FieldElement,
    pub min_value: FieldElement,
}

impl CircuitRequest for OwnershipRequest {
    type Public = OwnershipPublicInputs;
    const CIRCUIT: CircuitType = CircuitType::Ownership;

    fn build(&self) -> Result<(InputMap, OwnershipPublicInputs), ProverError> {
        check_path(
            "ownership",
            self.note.commitment(),
            &self.merkle_path,
            &self.path_indices,
            self.merkle_root,
        )?;

        let public = OwnershipPublicInputs {
            merkle_root: self.merkle_root,
            ownership_hash: self.note.ownership_hash(self.context),
            min_value: self.min_value,
        };

        let mut inputs = InputMap::new();
        insert_note(&mut inputs, &self.note);
        insert(&mut inputs, "merkle_path", self.merkle_path.clone());
        insert(&mut inputs, "path_indices", self.path_indices.clone());
        insert(&mut inputs, "context", self.context);
        insert(&mut inputs, "merkle_root", public.merkle_root);
        insert(&mut inputs, "ownership_hash", public.ownership_hash);
        insert(&mut inputs, "min_value", public.min_value);
        Ok((inputs, public))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shade_primitives::MerkleTree;

    fn note(value: u64, secret: u64) -> Note {
        Note::with_secret(
            FieldElement::from_u64(0xabc123),
            FieldElement::from_u64(value),
            FieldElement::from_u64(secret),
        )
    }

    #[test]
    fn test_deposit_inputs() {
        let n = note(1000, 12345);
        let (inputs, public) = DepositRequest { note: n }.build().unwrap();

        assert_eq!(public.commitment, n.commitment());
        assert_eq!(public.deposit_amount, FieldElement::from_u64(1000));
        assert_eq!(inputs["commitment"], InputValue::Field(n.commitment()));
        assert_eq!(inputs.len(), 5);
    }

    #[test]
    fn test_transfer_passes_values_through() {
        let a = note(70, 1);
        let b = note(30, 2);
        let mut tree = MerkleTree::new();
        let pa = tree.insert(a.commitment()).unwrap();
        let pb = tree.insert(b.commitment()).unwrap();
        let (path_a, path_b) = (tree.path(pa).unwrap(), tree.path(pb).unwrap());

        // Outputs deliberately do not balance; that is the circuit's concern
        let out = note(500, 3);
        let request = TransferRequest {
            input_notes: vec![a, b],
            output_notes: vec![out],
            merkle_paths: vec![path_a.siblings, path_b.siblings],
            path_indices: vec![path_a.indices, path_b.indices],
            merkle_root: tree.root(),
        };
        let (inputs, public) = request.build().unwrap();

        assert_eq!(public.input_nullifiers, vec![a.nullifier(), b.nullifier()]);
        assert_eq!(public.output_commitments, vec![out.commitment()]);
        assert_eq!(
            inputs["out_value"],
            InputValue::Array(vec![InputValue::Field(FieldElement::from_u64(500))])
        );
    }

    #[test]
    fn test_transfer_shape_errors() {
        let request = TransferRequest {
            input_notes: vec![note(1, 1)],
            output_notes: vec![note(1, 2)],
            merkle_paths: vec![],
            path_indices: vec![],
            merkle_root: FieldElement::zero(),
        };
        assert!(matches!(request.build(), Err(ProverError::InvalidInput(_))));

        let empty = TransferRequest {
            input_notes: vec![],
            ..request
        };
        assert!(matches!(empty.build(), Err(ProverError::InvalidInput(_))));
    }

    #[test]
    fn test_short_path_rejected() {
        let n = note(5, 5);
        let request = WithdrawRequest {
            note: n,
            recipient: FieldElement::from_u64(1),
            withdraw_amount: n.value,
            relayer_fee: FieldElement::zero(),
            merkle_path: vec![FieldElement::zero(); TREE_DEPTH - 1],
            path_indices: vec![false; TREE_DEPTH - 1],
            merkle_root: FieldElement::zero(),
        };
        assert!(matches!(request.build(), Err(ProverError::InvalidInput(_))));
    }

    #[test]
    fn test_ownership_binds_context() {
        let n = note(900, 77);
        let mut tree = MerkleTree::new();
        let pos = tree.insert(n.commitment()).unwrap();
        let path = tree.path(pos).unwrap();

        let request = OwnershipRequest {
            note: n,
            merkle_path: path.siblings,
            path_indices: path.indices,
            merkle_root: tree.root(),
            context: FieldElement::from_u64(2024),
            min_value: FieldElement::from_u64(500),
        };
        let (inputs, public) = request.build().unwrap();

        assert_eq!(public.ownership_hash, n.ownership_hash(FieldElement::from_u64(2024)));
        assert_eq!(public.min_value, FieldElement::from_u64(500));
        assert!(inputs.contains_key("context"));
    }

    #[test]
    fn test_bool_inputs_are_fields() {
        assert_eq!(InputValue::from(true), InputValue::Field(FieldElement::from_u64(1)));
        assert_eq!(InputValue::from(false), InputValue::Field(FieldElement::zero()));
    }
}
