use shade_notestore::{
    CorruptionPolicy, Envelope, FileStorage, KdfParams, KeyValueStore, MemoryStorage, NoteStore,
    SpendState, StoreError,
};
use shade_primitives::{FieldElement, Note};

const PIN: &str = "123456";

fn memory_store() -> NoteStore<MemoryStorage> {
    NoteStore::new(MemoryStorage::new()).with_kdf_params(KdfParams::insecure_fast())
}

fn owner() -> FieldElement {
    FieldElement::from_address("0xabc123").unwrap()
}

fn random_note(value: u64) -> Note {
    Note::new(owner(), FieldElement::from_u64(value), &mut rand::rngs::OsRng)
}

/// Flip one ciphertext bit in the notes slot
fn tamper_notes<S: KeyValueStore>(store: &NoteStore<S>) {
    let key = store.notes_key();
    let raw = store.storage().get(&key).unwrap().unwrap();
    let mut envelope: Envelope = serde_json::from_slice(&raw).unwrap();
    envelope.ciphertext[0] ^= 0x01;
    store
        .storage()
        .put(&key, &serde_json::to_vec(&envelope).unwrap())
        .unwrap();
}

#[test]
fn saved_notes_round_trip() {
    let store = memory_store();
    let notes: Vec<Note> = (1..=5).map(|v| random_note(v * 100)).collect();

    for note in &notes {
        store.save(note, PIN).unwrap();
    }

    let loaded = store.load_all(PIN).unwrap();
    assert_eq!(loaded.len(), notes.len());
    for (stored, note) in loaded.iter().zip(&notes) {
        assert_eq!(stored.owner, note.owner);
        assert_eq!(stored.value, note.value);
        assert_eq!(stored.secret, note.secret);
        assert_eq!(stored.commitment, note.commitment());
        assert_eq!(stored.nullifier, note.nullifier());
        assert!(!stored.spent());
        assert!(stored.created_at > 0);
    }
}

#[test]
fn wrong_pin_is_auth_error() {
    let store = memory_store();
    store.save(&random_note(1), PIN).unwrap();

    assert!(matches!(store.load_all("000000"), Err(StoreError::Auth)));
    assert!(matches!(store.save(&random_note(2), "000000"), Err(StoreError::Auth)));
    // Failed attempts leave the collection untouched
    assert_eq!(store.load_all(PIN).unwrap().len(), 1);
}

#[test]
fn spend_boundary() {
    let store = memory_store();
    let kept = store.save(&random_note(700), PIN).unwrap();
    let spent = store.save(&random_note(300), PIN).unwrap();

    assert_eq!(store.unspent_balance(PIN).unwrap(), FieldElement::from_u64(1000));

    assert!(store.mark_spent(&spent.nullifier, PIN).unwrap());
    assert!(!store.mark_spent(&spent.nullifier, PIN).unwrap());

    assert_eq!(store.unspent_balance(PIN).unwrap(), kept.value);
    assert_eq!(store.list_unspent(PIN).unwrap(), vec![kept.clone()]);

    let pending = store.find_by_nullifier(&spent.nullifier, PIN).unwrap().unwrap();
    assert_eq!(pending.spend_state(), SpendState::Pending);
    assert!(pending.spent());
}

#[test]
fn mark_spent_unknown_nullifier() {
    let store = memory_store();
    store.save(&random_note(5), PIN).unwrap();

    let missing = FieldElement::from_u64(42);
    assert!(!store.mark_spent(&missing, PIN).unwrap());
    assert!(store.find_by_nullifier(&missing, PIN).unwrap().is_none());
}

#[test]
fn delete_removes_note() {
    let store = memory_store();
    let a = store.save(&random_note(1), PIN).unwrap();
    let b = store.save(&random_note(2), PIN).unwrap();

    assert!(store.delete(&a.nullifier, PIN).unwrap());
    assert!(!store.delete(&a.nullifier, PIN).unwrap());

    assert_eq!(store.load_all(PIN).unwrap(), vec![b.clone()]);
    assert!(store.find_by_commitment(&b.commitment, PIN).unwrap().is_some());
}

#[test]
fn corrupted_ciphertext_recovers_empty() {
    let store = memory_store();
    store.save(&random_note(1), PIN).unwrap();
    tamper_notes(&store);

    assert!(store.load_all(PIN).unwrap().is_empty());

    // The store stays usable after recovery
    store.save(&random_note(2), PIN).unwrap();
    assert_eq!(store.load_all(PIN).unwrap().len(), 1);
}

#[test]
fn corrupted_ciphertext_fails_when_strict() {
    let store = memory_store().with_corruption_policy(CorruptionPolicy::Fail);
    store.save(&random_note(1), PIN).unwrap();
    tamper_notes(&store);

    assert!(matches!(store.load_all(PIN), Err(StoreError::Corrupted(_))));
}

#[test]
fn garbage_slot_handling() {
    let lenient = memory_store();
    lenient.storage().put(&lenient.notes_key(), b"not json").unwrap();
    assert!(lenient.load_all(PIN).unwrap().is_empty());

    let strict = memory_store().with_corruption_policy(CorruptionPolicy::Fail);
    strict.storage().put(&strict.notes_key(), b"not json").unwrap();
    assert!(matches!(strict.load_all(PIN), Err(StoreError::Corrupted(_))));
}

#[test]
fn file_storage_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.json");

    let saved = {
        let store = NoteStore::new(FileStorage::open(&path).unwrap())
            .with_kdf_params(KdfParams::insecure_fast());
        store.save(&random_note(250), PIN).unwrap()
    };

    let store = NoteStore::new(FileStorage::open(&path).unwrap());
    let loaded = store.load_all(PIN).unwrap();
    assert_eq!(loaded, vec![saved]);
    assert!(matches!(store.load_all("999999"), Err(StoreError::Auth)));

    // Nothing is stored in plaintext
    let raw = std::fs::read_to_string(&path).unwrap();
    assert!(!raw.contains(&loaded[0].secret.to_decimal()));
}

fn truncate_half(path: &std::path::Path) {
    let contents = std::fs::read(path).unwrap();
    std::fs::write(path, &contents[..contents.len() / 2]).unwrap();
}

#[test]
fn truncated_slot_file_recovers_empty() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.json");
    let store = NoteStore::new(FileStorage::open(&path).unwrap())
        .with_kdf_params(KdfParams::insecure_fast());
    store.save(&random_note(10), PIN).unwrap();
    truncate_half(&path);

    assert!(store.load_all(PIN).unwrap().is_empty());

    // The next save rewrites the file from scratch
    let saved = store.save(&random_note(20), PIN).unwrap();
    assert_eq!(store.load_all(PIN).unwrap(), vec![saved]);
}

#[test]
fn truncated_slot_file_fails_when_strict() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("notes.json");
    let store = NoteStore::new(FileStorage::open(&path).unwrap())
        .with_kdf_params(KdfParams::insecure_fast())
        .with_corruption_policy(CorruptionPolicy::Fail);
    store.save(&random_note(10), PIN).unwrap();
    truncate_half(&path);

    assert!(matches!(store.load_all(PIN), Err(StoreError::Corrupted(_))));
    assert!(matches!(store.save(&random_note(20), PIN), Err(StoreError::Corrupted(_))));
}
