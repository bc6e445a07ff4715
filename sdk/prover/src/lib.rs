//! Shade Prover
//!
//! Builds circuit inputs from wallet notes and drives a proving backend.
//!
//! ```text
//! ┌────────────────┐   build()   ┌──────────┐   prove()   ┌────────────────┐
//! │ CircuitRequest │ ──────────▶ │ InputMap │ ──────────▶ │ ProvingBackend │
//! └────────────────┘             └──────────┘             └────────────────┘
//!                                                                 ▲
//!           ArtifactSource ──fetch──▶ CircuitCache ──prepare──────┘
//! ```
//!
//! Backends: [`NargoBackend`] shells out to `nargo` + `sunspot`;
//! [`MockBackend`] produces deterministic proofs without any toolchain.

pub mod artifacts;
pub mod backend;
pub mod cache;
pub mod circuit;
pub mod client;
pub mod inputs;
pub mod nargo;

use std::path::PathBuf;

use thiserror::Error;

pub use artifacts::{ArtifactSource, FsArtifacts, HttpArtifacts, MemoryArtifacts};
pub use backend::{MockBackend, MockMode, PROOF_SIZE, ProofData, ProvingBackend};
pub use cache::{CircuitCache, CircuitState};
pub use circuit::{CircuitArtifact, CircuitType};
pub use client::{Proof, ProofClient};
pub use inputs::{
    CircuitRequest, DepositPublicInputs, DepositRequest, InputMap, InputValue,
    OwnershipPublicInputs, OwnershipRequest, TransferPublicInputs, TransferRequest,
    WithdrawPublicInputs, WithdrawRequest,
};
pub use nargo::NargoBackend;

/// Errors that can occur while loading circuits or generating proofs
#[derive(Error, Debug)]
pub enum ProverError {
    #[error("invalid circuit input: {0}")]
    InvalidInput(String),

    #[error("failed to load {circuit} circuit: {reason}")]
    ArtifactLoad { circuit: CircuitType, reason: String },

    #[error("proof generation failed: {0}")]
    ProofGeneration(String),

    #[error("Circuit path does not exist: {0}")]
    CircuitNotFound(PathBuf),

    #[error("nargo execution failed: {0}")]
    NargoExecution(String),

    #[error("sunspot proving failed: {0}")]
    SunspotProving(String),

    #[error("Proof file not found: {0}")]
    ProofFileNotFound(PathBuf),

    #[error("Failed to serialize inputs: {0}")]
    SerializeInputs(#[from] toml::ser::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProverError {
    /// Whether the failure happened while loading the circuit
    pub fn is_artifact_error(&self) -> bool {
        matches!(
            self,
            ProverError::ArtifactLoad { .. } | ProverError::CircuitNotFound(_)
        )
    }
}
