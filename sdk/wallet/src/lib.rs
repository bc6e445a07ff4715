//! Shade Wallet
//!
//! Shield/unshield flows on top of the note store and the proof client.
//!
//! # Usage
//!
//! ```ignore
//! let wallet = Wallet::new(store, prover, StaticIdentity::new("0xabc123"));
//!
//! let receipt = wallet.shield("1.5", "123456").await?;
//! assert_eq!(receipt.balance.to_string(), "1.5");
//!
//! let receipt = wallet.unshield(&receipt.note.nullifier, "123456").await?;
//! assert_eq!(receipt.balance.to_fixed(4), "0.0000");
//! ```

pub mod amount;
pub mod identity;
pub mod wallet;

use shade_notestore::StoreError;
use shade_primitives::FieldElement;
use shade_prover::ProverError;
use thiserror::Error;

pub use amount::{Balance, DEFAULT_DECIMALS, parse_units};
pub use identity::{StaticIdentity, WalletIdentity};
pub use wallet::{ShieldReceipt, UnshieldReceipt, Wallet, WalletStatus};

#[derive(Error, Debug)]
pub enum WalletError {
    #[error("invalid input: {0}")]
    InputValidation(String),

    #[error("incorrect PIN")]
    Auth,

    #[error("circuit unavailable: {0}")]
    ArtifactLoad(String),

    #[error("proof generation failed: {0}")]
    ProofGeneration(String),

    #[error("no note with nullifier {0}")]
    NotFound(FieldElement),

    #[error("note with nullifier {0} is already spent")]
    AlreadySpent(FieldElement),

    #[error("stored notes are corrupted: {0}")]
    StorageCorruption(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl From<StoreError> for WalletError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::EmptyPin => WalletError::InputValidation("PIN is required".to_string()),
            StoreError::Auth => WalletError::Auth,
            StoreError::Corrupted(reason) => WalletError::StorageCorruption(reason),
            other => WalletError::Storage(other.to_string()),
        }
    }
}

impl From<ProverError> for WalletError {
    fn from(e: ProverError) -> Self {
        match e {
            ProverError::InvalidInput(reason) => WalletError::InputValidation(reason),
            e if e.is_artifact_error() => WalletError::ArtifactLoad(e.to_string()),
            e => WalletError::ProofGeneration(e.to_string()),
        }
    }
}
