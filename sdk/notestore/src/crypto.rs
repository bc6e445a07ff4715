//! At-rest encryption for the note collection
//!
//! ```text
//! Flow:
//! 1. key   = Argon2id(pin, salt)               salt: 16 random bytes
//! 2. check = BLAKE3-derive("…pin check v1", key)
//! 3. ct    = ChaCha20-Poly1305(key, nonce, notes_json, aad = version)
//! 4. Store (salt, check, kdf params) and (nonce, ct) in separate slots
//! ```

use argon2::{Algorithm, Argon2, Params, Version};
use chacha20poly1305::{
    ChaCha20Poly1305, Nonce,
    aead::{Aead, KeyInit, Payload},
};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::StoreError;

pub const ENVELOPE_VERSION: u8 = 1;
const SALT_LEN: usize = 16;
const PIN_CHECK_CONTEXT: &str = "shade notestore pin check v1";
const ENVELOPE_AAD: &[u8] = b"shade-notestore-v1";

/// Argon2id cost parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            memory_kib: Params::DEFAULT_M_COST,
            iterations: Params::DEFAULT_T_COST,
            parallelism: Params::DEFAULT_P_COST,
        }
    }
}

impl KdfParams {
    /// Minimal cost, for tests only
    pub fn insecure_fast() -> Self {
        Self {
            memory_kib: Params::MIN_M_COST,
            iterations: Params::MIN_T_COST,
            parallelism: Params::MIN_P_COST,
        }
    }
}

/// Contents of the PIN slot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PinRecord {
    pub version: u8,
    #[serde(with = "hex")]
    pub salt: [u8; SALT_LEN],
    #[serde(with = "hex")]
    pub check: [u8; 32],
    pub kdf: KdfParams,
}

/// Contents of the notes slot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub version: u8,
    #[serde(with = "hex")]
    pub nonce: [u8; 12],
    #[serde(with = "hex")]
    pub ciphertext: Vec<u8>,
}

/// A key derived from the PIN, together with the record that proves it
pub(crate) struct UnlockedKey {
    key: [u8; 32],
    pub(crate) record: PinRecord,
}

impl UnlockedKey {
    /// Derive a key under a fresh random salt
    pub(crate) fn create(pin: &str, kdf: KdfParams) -> Result<Self, StoreError> {
        let mut salt = [0u8; SALT_LEN];
        rand::rngs::OsRng.fill_bytes(&mut salt);

        let key = derive_key(pin, &salt, &kdf)?;
        let record = PinRecord {
            version: ENVELOPE_VERSION,
            salt,
            check: *pin_check(&key).as_bytes(),
            kdf,
        };
        Ok(Self { key, record })
    }

    /// Re-derive the key from an existing record, failing on a wrong PIN
    pub(crate) fn open(pin: &str, record: PinRecord) -> Result<Self, StoreError> {
        let key = derive_key(pin, &record.salt, &record.kdf)?;

        // blake3::Hash equality is constant-time
        if pin_check(&key) != blake3::Hash::from(record.check) {
            return Err(StoreError::Auth);
        }
        Ok(Self { key, record })
    }

    pub(crate) fn seal(&self, plaintext: &[u8]) -> Result<Envelope, StoreError> {
        let mut nonce = [0u8; 12];
        rand::rngs::OsRng.fill_bytes(&mut nonce);

        let cipher = ChaCha20Poly1305::new(&self.key.into());
        let ciphertext = cipher
            .encrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: plaintext,
                    aad: ENVELOPE_AAD,
                },
            )
            .map_err(|_| StoreError::Encryption)?;

        Ok(Envelope {
            version: ENVELOPE_VERSION,
            nonce,
            ciphertext,
        })
    }

    /// `None` when the envelope fails authentication
    pub(crate) fn open_envelope(&self, envelope: &Envelope) -> Option<Vec<u8>> {
        if envelope.version != ENVELOPE_VERSION {
            return None;
        }
        let cipher = ChaCha20Poly1305::new(&self.key.into());
        cipher
            .decrypt(
                Nonce::from_slice(&envelope.nonce),
                Payload {
                    msg: &envelope.ciphertext,
                    aad: ENVELOPE_AAD,
                },
            )
            .ok()
    }
}

fn derive_key(pin: &str, salt: &[u8], kdf: &KdfParams) -> Result<[u8; 32], StoreError> {
    let params = Params::new(kdf.memory_kib, kdf.iterations, kdf.parallelism, Some(32))
        .map_err(|e| StoreError::KeyDerivation(e.to_string()))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut key = [0u8; 32];
    argon2
        .hash_password_into(pin.as_bytes(), salt, &mut key)
        .map_err(|e| StoreError::KeyDerivation(e.to_string()))?;
    Ok(key)
}

fn pin_check(key: &[u8; 32]) -> blake3::Hash {
    let mut hasher = blake3::Hasher::new_derive_key(PIN_CHECK_CONTEXT);
    hasher.update(key);
    hasher.finalize()
}
