//! Proof Client
//!
//! Owns the circuit cache and ties an [`ArtifactSource`] to a
//! [`ProvingBackend`]. The cache belongs to the client instance, so two
//! clients (or two tests) never share loaded circuits.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use shade_primitives::FieldElement;
use tracing::{error, info};

use crate::ProverError;
use crate::artifacts::ArtifactSource;
use crate::backend::{ProvingBackend, parse_public_witness};
use crate::cache::{CircuitCache, CircuitState};
use crate::circuit::{CircuitArtifact, CircuitType};
use crate::inputs::{
    CircuitRequest, DepositPublicInputs, DepositRequest, OwnershipPublicInputs, OwnershipRequest,
    TransferPublicInputs, TransferRequest, WithdrawPublicInputs, WithdrawRequest,
};

/// A generated proof with its typed public outputs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proof<P> {
    #[serde(with = "hex")]
    pub proof: Vec<u8>,
    #[serde(with = "hex")]
    pub public_witness: Vec<u8>,
    pub public_inputs: P,
    pub proving_time_ms: u64,
}

impl<P> Proof<P> {
    /// Public inputs as committed to by the proof, in circuit order
    pub fn public_witness_inputs(&self) -> Result<Vec<FieldElement>, ProverError> {
        parse_public_witness(&self.public_witness)
    }
}

pub struct ProofClient<A, B: ProvingBackend> {
    artifacts: A,
    backend: B,
    cache: CircuitCache<B::Circuit>,
}

impl<A: ArtifactSource, B: ProvingBackend> ProofClient<A, B> {
    pub fn new(artifacts: A, backend: B) -> Self {
        Self {
            artifacts,
            backend,
            cache: CircuitCache::new(),
        }
    }

    pub fn artifacts(&self) -> &A {
        &self.artifacts
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn state(&self, circuit: CircuitType) -> CircuitState {
        self.cache.state(circuit)
    }

    /// Load `circuit` now so the first proof does not pay for it
    pub async fn preload(&self, circuit: CircuitType) -> Result<(), ProverError> {
        self.load(circuit).await.map(|_| ())
    }

    /// Forget every loaded circuit
    pub fn clear_cache(&self) {
        self.cache.clear();
        info!("Circuit cache cleared");
    }

    async fn load(&self, circuit: CircuitType) -> Result<Arc<B::Circuit>, ProverError> {
        self.cache
            .get_or_load(circuit, || async move {
                let start = Instant::now();
                let bytes = self.artifacts.fetch(circuit).await?;
                let artifact = CircuitArtifact::from_json(circuit, &bytes)?;
                let prepared = self.backend.prepare(circuit, artifact).await?;
                info!(
                    "Loaded {} circuit in {}ms",
                    circuit,
                    start.elapsed().as_millis()
                );
                Ok(prepared)
            })
            .await
            .inspect_err(|e| error!("Failed to load {} circuit: {}", circuit, e))
    }

    /// Build inputs for `request`, load its circuit and prove
    pub async fn prove<R: CircuitRequest>(
        &self,
        request: &R,
    ) -> Result<Proof<R::Public>, ProverError> {
        let (inputs, public_inputs) = request.build()?;
        let circuit = self.load(R::CIRCUIT).await?;

        let start = Instant::now();
        let data = self.backend.prove(&circuit, &inputs).await?;
        let proving_time_ms = start.elapsed().as_millis() as u64;

        if data.proof.is_empty() {
            error!("{} backend returned an empty proof", R::CIRCUIT);
            return Err(ProverError::ProofGeneration(format!(
                "{} backend returned an empty proof",
                R::CIRCUIT
            )));
        }

        info!(
            "{} proof generated in {}ms (proof size: {} bytes)",
            R::CIRCUIT,
            proving_time_ms,
            data.proof.len()
        );

        Ok(Proof {
            proof: data.proof,
            public_witness: data.public_witness,
            public_inputs,
            proving_time_ms,
        })
    }

    pub async fn generate_deposit_proof(
        &self,
        request: &DepositRequest,
    ) -> Result<Proof<DepositPublicInputs>, ProverError> {
        self.prove(request).await
    }

    pub async fn generate_withdraw_proof(
        &self,
        request: &WithdrawRequest,
    ) -> Result<Proof<WithdrawPublicInputs>, ProverError> {
        self.prove(request).await
    }

    pub async fn generate_transfer_proof(
        &self,
        request: &TransferRequest,
    ) -> Result<Proof<TransferPublicInputs>, ProverError> {
        self.prove(request).await
    }

    pub async fn generate_ownership_proof(
        &self,
        request: &OwnershipRequest,
    ) -> Result<Proof<OwnershipPublicInputs>, ProverError> {
        self.prove(request).await
    }
}
