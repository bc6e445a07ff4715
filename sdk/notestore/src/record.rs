//! Persisted note records
//!
//! ```text
//! {
//!   "owner": "<decimal>", "value": "<decimal>", "secret": "<decimal>",
//!   "commitment": "0x…", "nullifier": "0x…",
//!   "createdAt": <unix millis>, "spent": bool, "spendState": "unspent|pending|confirmed"
//! }
//! ```
//!
//! `spent` is kept for readers that only understand the boolean flag; records
//! written without `spendState` are read back as `confirmed` when `spent` is
//! set and `unspent` otherwise.

use serde::{Deserialize, Serialize};
use shade_primitives::field::decimal;
use shade_primitives::{FieldElement, Note};

/// Where a note is in its spend lifecycle
///
/// ```text
/// Unspent ──mark_spent──▶ Pending ──confirm──▶ Confirmed
///    ▲                       │
///    └────────reject─────────┘
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpendState {
    #[default]
    Unspent,
    /// Spend recorded locally, not yet confirmed on-chain
    Pending,
    Confirmed,
}

impl SpendState {
    pub fn is_spent(&self) -> bool {
        !matches!(self, SpendState::Unspent)
    }
}

/// A note together with its derived values and wallet bookkeeping
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "NoteRecord", from = "NoteRecord")]
pub struct StoredNote {
    pub owner: FieldElement,
    pub value: FieldElement,
    pub secret: FieldElement,
    pub commitment: FieldElement,
    pub nullifier: FieldElement,
    /// Unix time in milliseconds
    pub created_at: i64,
    pub(crate) spend_state: SpendState,
}

impl StoredNote {
    pub fn from_note(note: &Note, created_at: i64) -> Self {
        Self {
            owner: note.owner,
            value: note.value,
            secret: note.secret,
            commitment: note.commitment(),
            nullifier: note.nullifier(),
            created_at,
            spend_state: SpendState::Unspent,
        }
    }

    pub fn note(&self) -> Note {
        Note::with_secret(self.owner, self.value, self.secret)
    }

    pub fn spent(&self) -> bool {
        self.spend_state.is_spent()
    }

    pub fn spend_state(&self) -> SpendState {
        self.spend_state
    }

    /// Recompute commitment and nullifier and compare with the stored values
    pub fn verify(&self) -> bool {
        let note = self.note();
        note.commitment() == self.commitment && note.nullifier() == self.nullifier
    }
}

/// Wire form of [`StoredNote`]
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NoteRecord {
    #[serde(with = "decimal")]
    owner: FieldElement,
    #[serde(with = "decimal")]
    value: FieldElement,
    #[serde(with = "decimal")]
    secret: FieldElement,
    commitment: FieldElement,
    nullifier: FieldElement,
    created_at: i64,
    spent: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    spend_state: Option<SpendState>,
}

impl From<StoredNote> for NoteRecord {
    fn from(note: StoredNote) -> Self {
        Self {
            owner: note.owner,
            value: note.value,
            secret: note.secret,
            commitment: note.commitment,
            nullifier: note.nullifier,
            created_at: note.created_at,
            spent: note.spent(),
            spend_state: Some(note.spend_state),
        }
    }
}

impl From<NoteRecord> for StoredNote {
    fn from(record: NoteRecord) -> Self {
        let spend_state = record.spend_state.unwrap_or(if record.spent {
            SpendState::Confirmed
        } else {
            SpendState::Unspent
        });

        Self {
            owner: record.owner,
            value: record.value,
            secret: record.secret,
            commitment: record.commitment,
            nullifier: record.nullifier,
            created_at: record.created_at,
            spend_state,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> StoredNote {
        let note = Note::with_secret(
            FieldElement::from_u64(0xabc123),
            FieldElement::from_u64(1000),
            FieldElement::from_u64(12345),
        );
        StoredNote::from_note(&note, 1_700_000_000_000)
    }

    #[test]
    fn test_record_schema() {
        let json = serde_json::to_value(sample()).unwrap();

        assert_eq!(json["owner"], "11256099");
        assert_eq!(json["value"], "1000");
        assert_eq!(json["secret"], "12345");
        assert_eq!(json["createdAt"], 1_700_000_000_000i64);
        assert_eq!(json["spent"], false);
        assert_eq!(json["spendState"], "unspent");
        assert_eq!(json["commitment"].as_str().unwrap().len(), 66);
    }

    #[test]
    fn test_pending_serializes_as_spent() {
        let mut note = sample();
        note.spend_state = SpendState::Pending;

        let json = serde_json::to_value(&note).unwrap();
        assert_eq!(json["spent"], true);
        assert_eq!(json["spendState"], "pending");

        let back: StoredNote = serde_json::from_value(json).unwrap();
        assert_eq!(back.spend_state(), SpendState::Pending);
    }

    #[test]
    fn test_legacy_record_without_spend_state() {
        let mut json = serde_json::to_value(sample()).unwrap();
        json.as_object_mut().unwrap().remove("spendState");
        json["spent"] = serde_json::Value::Bool(true);

        let note: StoredNote = serde_json::from_value(json).unwrap();
        assert_eq!(note.spend_state(), SpendState::Confirmed);
        assert!(note.spent());
    }

    #[test]
    fn test_verify_detects_tampering() {
        let mut note = sample();
        assert!(note.verify());

        note.value = FieldElement::from_u64(1001);
        assert!(!note.verify());
    }
}
