//! Noir Prover Backend
//!
//! Wraps the nargo and sunspot CLI tools. Each circuit lives in
//! `<circuits_dir>/<type>/` with its proving material under `target/`:
//!
//! ```text
//! <type>/target/<type>.json   compiled ACIR (written from the fetched artifact)
//! <type>/target/<type>.ccs    sunspot constraint system
//! <type>/target/<type>.pk     sunspot proving key
//! ```

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use crate::ProverError;
use crate::backend::{ProofData, ProvingBackend, parse_public_witness};
use crate::circuit::{CircuitArtifact, CircuitType};
use crate::inputs::InputMap;

/// Noir prover wrapper that uses nargo + sunspot
#[derive(Debug, Clone)]
pub struct NargoBackend {
    circuits_dir: PathBuf,
}

/// A circuit directory with its proving material in place
#[derive(Debug)]
pub struct NargoCircuit {
    circuit: CircuitType,
    dir: PathBuf,
    /// sunspot writes fixed output paths; one proof per circuit at a time
    lock: Mutex<()>,
}

impl NargoCircuit {
    fn target(&self, extension: &str) -> PathBuf {
        self.dir
            .join("target")
            .join(format!("{}.{}", self.circuit.name(), extension))
    }
}

impl NargoBackend {
    pub fn new(circuits_dir: impl Into<PathBuf>) -> Self {
        let circuits_dir = circuits_dir.into();
        // Canonicalize to absolute path to avoid working directory issues
        let circuits_dir = circuits_dir.canonicalize().unwrap_or(circuits_dir);
        Self { circuits_dir }
    }

    pub fn circuits_dir(&self) -> &Path {
        &self.circuits_dir
    }
}

/// Render an input map as a Prover.toml document
pub fn render_prover_toml(inputs: &InputMap) -> Result<String, ProverError> {
    Ok(toml::to_string_pretty(inputs)?)
}

impl ProvingBackend for NargoBackend {
    type Circuit = NargoCircuit;

    async fn prepare(
        &self,
        circuit: CircuitType,
        artifact: CircuitArtifact,
    ) -> Result<NargoCircuit, ProverError> {
        let dir = self.circuits_dir.join(circuit.name());
        if !dir.exists() {
            return Err(ProverError::CircuitNotFound(dir));
        }

        let prepared = NargoCircuit {
            circuit,
            dir,
            lock: Mutex::new(()),
        };

        for extension in ["ccs", "pk"] {
            let path = prepared.target(extension);
            if !path.exists() {
                return Err(ProverError::ArtifactLoad {
                    circuit,
                    reason: format!(
                        "missing {}; run sunspot compile && sunspot setup",
                        path.display()
                    ),
                });
            }
        }

        let acir = serde_json::to_vec(&artifact).map_err(|e| ProverError::ArtifactLoad {
            circuit,
            reason: format!("re-encode artifact: {}", e),
        })?;
        tokio::fs::write(prepared.target("json"), &acir).await?;

        debug!("Prepared {} circuit at {}", circuit, prepared.dir.display());
        Ok(prepared)
    }

    async fn prove(
        &self,
        circuit: &NargoCircuit,
        inputs: &InputMap,
    ) -> Result<ProofData, ProverError> {
        let _guard = circuit.lock.lock().await;
        let run_id = uuid::Uuid::new_v4().simple().to_string();

        // Step 1: Write a per-run Prover.toml
        let prover_name = format!("Prover_{}", run_id);
        let prover_toml_path = circuit.dir.join(format!("{}.toml", prover_name));
        let toml_content = render_prover_toml(inputs)?;
        debug!("Writing {} ({} bytes)", prover_toml_path.display(), toml_content.len());
        tokio::fs::write(&prover_toml_path, &toml_content).await?;

        let result = run_prover(circuit, &prover_name, &run_id).await;

        let _ = tokio::fs::remove_file(&prover_toml_path).await;
        result
    }
}

async fn run_prover(
    circuit: &NargoCircuit,
    prover_name: &str,
    run_id: &str,
) -> Result<ProofData, ProverError> {
    // Step 2: Execute nargo to generate witness
    let witness_name = format!("{}_witness_{}", circuit.circuit.name(), run_id);
    info!("Executing nargo execute {}...", witness_name);

    let nargo_output = Command::new("nargo")
        .args(["execute", "--prover-name", prover_name, &witness_name])
        .current_dir(&circuit.dir)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !nargo_output.status.success() {
        let stderr = String::from_utf8_lossy(&nargo_output.stderr);
        error!("nargo failed: {}", stderr);
        return Err(ProverError::NargoExecution(stderr.to_string()));
    }

    // Step 3: sunspot prove <acir> <witness> <ccs> <pk>
    let witness_path = circuit.dir.join("target").join(format!("{}.gz", witness_name));

    info!("Executing sunspot prove...");
    let sunspot_output = Command::new("sunspot")
        .arg("prove")
        .arg(circuit.target("json"))
        .arg(&witness_path)
        .arg(circuit.target("ccs"))
        .arg(circuit.target("pk"))
        .current_dir(&circuit.dir)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    let _ = tokio::fs::remove_file(&witness_path).await;

    if !sunspot_output.status.success() {
        let stderr = String::from_utf8_lossy(&sunspot_output.stderr);
        error!("sunspot prove failed: {}", stderr);
        return Err(ProverError::SunspotProving(stderr.to_string()));
    }

    // Step 4: Read proof and public witness files
    let proof_path = circuit.target("proof");
    let pw_path = circuit.target("pw");

    if !proof_path.exists() {
        return Err(ProverError::ProofFileNotFound(proof_path));
    }
    if !pw_path.exists() {
        return Err(ProverError::ProofFileNotFound(pw_path));
    }

    let proof = tokio::fs::read(&proof_path).await?;
    let public_witness = tokio::fs::read(&pw_path).await?;
    let public_inputs = parse_public_witness(&public_witness)?;

    info!(
        "sunspot produced {} bytes proof, {} public inputs",
        proof.len(),
        public_inputs.len()
    );

    Ok(ProofData {
        proof,
        public_witness,
    })
}
