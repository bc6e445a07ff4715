//! Shade Note Store
//!
//! PIN-gated, encrypted persistence for the wallet's notes.
//!
//! ```text
//! ┌──────────────┐   save / load_all / mark_spent   ┌────────────────┐
//! │  NoteStore   │ ───────────────────────────────▶ │ KeyValueStore  │
//! │  (PIN → key) │                                  │ <ns>.notes     │
//! │              │ ◀─────────────────────────────── │ <ns>.pin       │
//! └──────────────┘        one atomic batch          └────────────────┘
//! ```
//!
//! The `pin` slot holds the Argon2id salt and a verification hash; the
//! `notes` slot holds the ChaCha20-Poly1305 sealed JSON collection.

pub mod crypto;
pub mod record;
pub mod storage;
pub mod store;

use thiserror::Error;

pub use crypto::{Envelope, KdfParams, PinRecord};
pub use record::{SpendState, StoredNote};
#[cfg(feature = "rocksdb")]
pub use storage::RocksDbStorage;
pub use storage::{FileStorage, KeyValueStore, MemoryStorage};
pub use store::{CorruptionPolicy, NoteStore};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("PIN must not be empty")]
    EmptyPin,

    #[error("PIN does not match the stored verification hash")]
    Auth,

    #[error("stored notes are corrupted: {0}")]
    Corrupted(String),

    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("encryption failed")]
    Encryption,

    #[error("key derivation failed: {0}")]
    KeyDerivation(String),
}
