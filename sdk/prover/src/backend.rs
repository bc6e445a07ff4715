//! Proving backends
//!
//! A backend turns a compiled artifact into a prepared circuit once, then
//! proves any number of input maps against it.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use sha2::{Digest, Sha256};
use shade_primitives::FieldElement;
use tracing::info;

use crate::ProverError;
use crate::circuit::{CircuitArtifact, CircuitType};
use crate::inputs::{InputMap, InputValue};

/// Groth16 proof size produced by sunspot
pub const PROOF_SIZE: usize = 388;

/// Raw backend output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofData {
    pub proof: Vec<u8>,
    /// Public witness: 4-byte count, 8 bytes padding, 32 bytes per input
    pub public_witness: Vec<u8>,
}

pub trait ProvingBackend: Send + Sync {
    /// A circuit ready to prove against, cached per circuit type
    type Circuit: Send + Sync + 'static;

    fn prepare(
        &self,
        circuit: CircuitType,
        artifact: CircuitArtifact,
    ) -> impl Future<Output = Result<Self::Circuit, ProverError>> + Send;

    fn prove(
        &self,
        circuit: &Self::Circuit,
        inputs: &InputMap,
    ) -> impl Future<Output = Result<ProofData, ProverError>> + Send;
}

/// Decode a public witness: 4-byte big-endian count, 8 bytes padding, then
/// one 32-byte big-endian field element per public input
pub(crate) fn parse_public_witness(bytes: &[u8]) -> Result<Vec<FieldElement>, ProverError> {
    let malformed =
        |reason: String| ProverError::ProofGeneration(format!("public witness {}", reason));
    if bytes.len() < 12 {
        return Err(malformed(format!("too short ({} bytes)", bytes.len())));
    }

    let count = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
    let inputs: Vec<FieldElement> = bytes[12..]
        .chunks_exact(32)
        .take(count)
        .map(FieldElement::reduce)
        .collect();

    if inputs.len() != count {
        return Err(malformed(format!("declares {} inputs but holds {}", count, inputs.len())));
    }
    Ok(inputs)
}

// ============================================================================
// Mock Backend (for testing)
// ============================================================================

/// How the mock backend responds to `prove`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockMode {
    /// Deterministic 388-byte proof derived from the inputs
    Succeed,
    /// Report success with a zero-length proof
    EmptyProof,
    /// Fail with the given message
    Fail(String),
}

/// Prepared circuit of the mock backend
#[derive(Debug)]
pub struct MockCircuit {
    pub circuit: CircuitType,
    bytecode_hash: [u8; 32],
}

/// Backend that needs no nargo/sunspot install
#[derive(Debug)]
pub struct MockBackend {
    mode: MockMode,
    delay: Duration,
    prepares: AtomicUsize,
    proofs: AtomicUsize,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new(MockMode::Succeed)
    }
}

impl MockBackend {
    pub fn new(mode: MockMode) -> Self {
        Self {
            mode,
            delay: Duration::ZERO,
            prepares: AtomicUsize::new(0),
            proofs: AtomicUsize::new(0),
        }
    }

    /// Simulated time spent in `prepare` and in `prove`
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn prepare_count(&self) -> usize {
        self.prepares.load(Ordering::SeqCst)
    }

    pub fn proof_count(&self) -> usize {
        self.proofs.load(Ordering::SeqCst)
    }

    async fn simulate_work(&self) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }
}

fn hash_input(hasher: &mut Sha256, value: &InputValue) {
    match value {
        InputValue::Field(f) => hasher.update(f.to_bytes_be()),
        InputValue::Array(items) => {
            hasher.update((items.len() as u32).to_be_bytes());
            for item in items {
                hash_input(hasher, item);
            }
        }
    }
}

impl ProvingBackend for MockBackend {
    type Circuit = MockCircuit;

    async fn prepare(
        &self,
        circuit: CircuitType,
        artifact: CircuitArtifact,
    ) -> Result<MockCircuit, ProverError> {
        self.prepares.fetch_add(1, Ordering::SeqCst);
        self.simulate_work().await;

        Ok(MockCircuit {
            circuit,
            bytecode_hash: Sha256::digest(artifact.bytecode.as_bytes()).into(),
        })
    }

    async fn prove(
        &self,
        circuit: &MockCircuit,
        inputs: &InputMap,
    ) -> Result<ProofData, ProverError> {
        self.proofs.fetch_add(1, Ordering::SeqCst);
        self.simulate_work().await;

        match &self.mode {
            MockMode::Fail(message) => return Err(ProverError::ProofGeneration(message.clone())),
            MockMode::EmptyProof => {
                return Ok(ProofData {
                    proof: Vec::new(),
                    public_witness: Vec::new(),
                });
            }
            MockMode::Succeed => {}
        }

        info!("Mock proving {} with {} inputs", circuit.circuit, inputs.len());

        let mut hasher = Sha256::new();
        hasher.update(circuit.bytecode_hash);
        for (name, value) in inputs {
            hasher.update(name.as_bytes());
            hash_input(&mut hasher, value);
        }
        let hash = hasher.finalize();

        let proof: Vec<u8> = hash.iter().copied().cycle().take(PROOF_SIZE).collect();

        let mut public_witness = Vec::with_capacity(12 + 32);
        public_witness.extend_from_slice(&1u32.to_be_bytes()); // count
        public_witness.extend_from_slice(&[0; 8]); // padding
        public_witness.extend_from_slice(&FieldElement::reduce(&hash).to_bytes_be());

        Ok(ProofData {
            proof,
            public_witness,
        })
    }
}
