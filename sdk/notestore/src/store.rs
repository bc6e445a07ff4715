//! Encrypted Note Store
//!
//! Holds the wallet's note collection encrypted under a PIN-derived key.
//! Every mutation decrypts, edits and re-encrypts the whole collection and
//! writes it back in one batch. That is fine for a personal wallet holding a
//! few hundred notes and is the ceiling of this design.
//!
//! The store assumes a single writer per session; callers must not mutate
//! it from two contexts at once.

use serde::de::DeserializeOwned;
use shade_primitives::{FieldElement, Note};
use tracing::{debug, info, warn};

use crate::StoreError;
use crate::crypto::{Envelope, KdfParams, PinRecord, UnlockedKey};
use crate::record::{SpendState, StoredNote};
use crate::storage::KeyValueStore;

const DEFAULT_NAMESPACE: &str = "shade";

/// What to do when stored data cannot be decrypted or parsed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CorruptionPolicy {
    /// Log a warning and carry on with an empty collection
    #[default]
    RecoverEmpty,
    /// Surface [`StoreError::Corrupted`]
    Fail,
}

/// PIN-gated note collection on top of a [`KeyValueStore`]
pub struct NoteStore<S> {
    storage: S,
    namespace: String,
    kdf: KdfParams,
    policy: CorruptionPolicy,
}

/// Decrypted view of the store for the duration of one operation
struct Unlocked {
    key: UnlockedKey,
    /// No PIN record existed; nothing on disk can be decrypted yet
    fresh: bool,
}

impl<S: KeyValueStore> NoteStore<S> {
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            namespace: DEFAULT_NAMESPACE.to_string(),
            kdf: KdfParams::default(),
            policy: CorruptionPolicy::default(),
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// KDF cost used when a new PIN record is created
    pub fn with_kdf_params(mut self, kdf: KdfParams) -> Self {
        self.kdf = kdf;
        self
    }

    pub fn with_corruption_policy(mut self, policy: CorruptionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn notes_key(&self) -> String {
        format!("{}.notes", self.namespace)
    }

    pub fn pin_key(&self) -> String {
        format!("{}.pin", self.namespace)
    }

    /// Persist a new note and return its stored record.
    ///
    /// Saving a note whose commitment is already stored returns the
    /// existing record without rewriting anything.
    pub fn save(&self, note: &Note, pin: &str) -> Result<StoredNote, StoreError> {
        let unlocked = self.unlock(pin)?;
        let mut notes = self.read_notes(&unlocked)?;

        let commitment = note.commitment();
        if let Some(existing) = notes.iter().find(|n| n.commitment == commitment) {
            debug!("note {} already stored", commitment);
            return Ok(existing.clone());
        }

        let stored = StoredNote::from_note(note, chrono::Utc::now().timestamp_millis());
        notes.push(stored.clone());
        self.write_notes(&unlocked, &notes)?;

        info!("Saved note {} ({} notes total)", commitment, notes.len());
        Ok(stored)
    }

    /// Fail with [`StoreError::Auth`] if `pin` does not open the store.
    ///
    /// A store without a PIN record accepts any non-empty PIN.
    pub fn check_pin(&self, pin: &str) -> Result<(), StoreError> {
        self.unlock(pin).map(|_| ())
    }

    /// Decrypt and return every stored note
    pub fn load_all(&self, pin: &str) -> Result<Vec<StoredNote>, StoreError> {
        let unlocked = self.unlock(pin)?;
        self.read_notes(&unlocked)
    }

    /// Record a spend: `Unspent -> Pending`.
    ///
    /// Returns `false` when no note has this nullifier or the note is not
    /// currently unspent; nothing is written in that case.
    pub fn mark_spent(&self, nullifier: &FieldElement, pin: &str) -> Result<bool, StoreError> {
        self.transition(nullifier, pin, SpendState::Unspent, SpendState::Pending)
    }

    /// The pending spend landed on-chain: `Pending -> Confirmed`
    pub fn confirm_spend(&self, nullifier: &FieldElement, pin: &str) -> Result<bool, StoreError> {
        self.transition(nullifier, pin, SpendState::Pending, SpendState::Confirmed)
    }

    /// The pending spend was rejected: `Pending -> Unspent`
    pub fn reject_spend(&self, nullifier: &FieldElement, pin: &str) -> Result<bool, StoreError> {
        self.transition(nullifier, pin, SpendState::Pending, SpendState::Unspent)
    }

    /// Remove a note from the collection (key-compromise cleanup)
    pub fn delete(&self, nullifier: &FieldElement, pin: &str) -> Result<bool, StoreError> {
        self.update(pin, |notes| {
            let before = notes.len();
            notes.retain(|n| n.nullifier != *nullifier);
            notes.len() != before
        })
    }

    /// Sum of the values of all unspent notes, reduced mod p.
    ///
    /// Totals at or above the field modulus wrap; sum `to_biguint()` values
    /// when an exact integer is needed.
    pub fn unspent_balance(&self, pin: &str) -> Result<FieldElement, StoreError> {
        Ok(self
            .load_all(pin)?
            .iter()
            .filter(|n| !n.spent())
            .map(|n| n.value)
            .sum())
    }

    pub fn list_unspent(&self, pin: &str) -> Result<Vec<StoredNote>, StoreError> {
        let mut notes = self.load_all(pin)?;
        notes.retain(|n| !n.spent());
        Ok(notes)
    }

    pub fn find_by_commitment(
        &self,
        commitment: &FieldElement,
        pin: &str,
    ) -> Result<Option<StoredNote>, StoreError> {
        Ok(self
            .load_all(pin)?
            .into_iter()
            .find(|n| n.commitment == *commitment))
    }

    pub fn find_by_nullifier(
        &self,
        nullifier: &FieldElement,
        pin: &str,
    ) -> Result<Option<StoredNote>, StoreError> {
        Ok(self
            .load_all(pin)?
            .into_iter()
            .find(|n| n.nullifier == *nullifier))
    }

    fn transition(
        &self,
        nullifier: &FieldElement,
        pin: &str,
        from: SpendState,
        to: SpendState,
    ) -> Result<bool, StoreError> {
        let changed = self.update(pin, |notes| {
            match notes
                .iter_mut()
                .find(|n| n.nullifier == *nullifier && n.spend_state == from)
            {
                Some(note) => {
                    note.spend_state = to;
                    true
                }
                None => false,
            }
        })?;

        if changed {
            info!("Note {} moved {:?} -> {:?}", nullifier, from, to);
        } else {
            debug!("No {:?} note with nullifier {}", from, nullifier);
        }
        Ok(changed)
    }

    /// Load, apply `f`, and rewrite the collection if `f` reports a change
    fn update<F>(&self, pin: &str, f: F) -> Result<bool, StoreError>
    where
        F: FnOnce(&mut Vec<StoredNote>) -> bool,
    {
        let unlocked = self.unlock(pin)?;
        let mut notes = self.read_notes(&unlocked)?;
        if !f(&mut notes) {
            return Ok(false);
        }
        self.write_notes(&unlocked, &notes)?;
        Ok(true)
    }

    fn unlock(&self, pin: &str) -> Result<Unlocked, StoreError> {
        if pin.is_empty() {
            return Err(StoreError::EmptyPin);
        }

        match self.read_slot::<PinRecord>(&self.pin_key())? {
            Some(record) => Ok(Unlocked {
                key: UnlockedKey::open(pin, record)?,
                fresh: false,
            }),
            None => Ok(Unlocked {
                key: UnlockedKey::create(pin, self.kdf)?,
                fresh: true,
            }),
        }
    }

    fn read_notes(&self, unlocked: &Unlocked) -> Result<Vec<StoredNote>, StoreError> {
        let envelope = match self.read_slot::<Envelope>(&self.notes_key())? {
            Some(envelope) => envelope,
            None => return Ok(Vec::new()),
        };

        if unlocked.fresh {
            return self.recover("notes present without a PIN record");
        }

        let plaintext = match unlocked.key.open_envelope(&envelope) {
            Some(plaintext) => plaintext,
            None => return self.recover("note ciphertext failed authentication"),
        };

        let notes: Vec<StoredNote> = match serde_json::from_slice(&plaintext) {
            Ok(notes) => notes,
            Err(e) => return self.recover(&format!("note collection unreadable: {}", e)),
        };

        if let Some(bad) = notes.iter().find(|n| !n.verify()) {
            let reason = format!("stored note {} does not match its contents", bad.commitment);
            if self.policy == CorruptionPolicy::Fail {
                return Err(StoreError::Corrupted(reason));
            }
            warn!("{}; dropping inconsistent records", reason);
            return Ok(notes.into_iter().filter(StoredNote::verify).collect());
        }

        Ok(notes)
    }

    fn write_notes(&self, unlocked: &Unlocked, notes: &[StoredNote]) -> Result<(), StoreError> {
        let plaintext = serde_json::to_vec(notes)
            .map_err(|e| StoreError::Backend(format!("encode notes: {}", e)))?;
        let envelope = serde_json::to_vec(&unlocked.key.seal(&plaintext)?)
            .map_err(|e| StoreError::Backend(format!("encode envelope: {}", e)))?;
        let record = serde_json::to_vec(&unlocked.key.record)
            .map_err(|e| StoreError::Backend(format!("encode pin record: {}", e)))?;

        let notes_key = self.notes_key();
        let pin_key = self.pin_key();
        self.storage.write_batch(&[
            (notes_key.as_str(), envelope.as_slice()),
            (pin_key.as_str(), record.as_slice()),
        ])?;

        debug!("Persisted {} notes", notes.len());
        Ok(())
    }

    /// Read and parse a JSON slot; an unreadable slot or backend file is corruption
    fn read_slot<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        let bytes = match self.storage.get(key) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return Ok(None),
            Err(StoreError::Corrupted(reason)) => return self.ignore_slot(key, &reason),
            Err(e) => return Err(e),
        };
        match serde_json::from_slice(&bytes) {
            Ok(value) => Ok(Some(value)),
            Err(e) => self.ignore_slot(key, &e.to_string()),
        }
    }

    fn ignore_slot<T>(&self, key: &str, cause: &str) -> Result<Option<T>, StoreError> {
        let reason = format!("slot {} unreadable: {}", key, cause);
        if self.policy == CorruptionPolicy::Fail {
            return Err(StoreError::Corrupted(reason));
        }
        warn!("{}; ignoring it", reason);
        Ok(None)
    }

    fn recover(&self, reason: &str) -> Result<Vec<StoredNote>, StoreError> {
        match self.policy {
            CorruptionPolicy::Fail => Err(StoreError::Corrupted(reason.to_string())),
            CorruptionPolicy::RecoverEmpty => {
                warn!("{}; continuing with an empty note collection", reason);
                Ok(Vec::new())
            }
        }
    }
}
