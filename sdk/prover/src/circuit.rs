//! Circuit identities and compiled artifacts

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ProverError;

/// The four circuits the wallet proves against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CircuitType {
    Deposit,
    Transfer,
    Withdraw,
    Ownership,
}

impl CircuitType {
    pub const ALL: [CircuitType; 4] = [
        CircuitType::Deposit,
        CircuitType::Transfer,
        CircuitType::Withdraw,
        CircuitType::Ownership,
    ];

    /// Artifact and circuit directory name
    pub fn name(&self) -> &'static str {
        match self {
            CircuitType::Deposit => "deposit",
            CircuitType::Transfer => "transfer",
            CircuitType::Withdraw => "withdraw",
            CircuitType::Ownership => "ownership",
        }
    }

    pub fn artifact_file(&self) -> String {
        format!("{}.json", self.name())
    }
}

impl fmt::Display for CircuitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CircuitType {
    type Err = ProverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CircuitType::ALL
            .into_iter()
            .find(|c| c.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| ProverError::InvalidInput(format!("unknown circuit type: {}", s)))
    }
}

/// Compiled circuit as emitted by `nargo compile`
///
/// Only `bytecode` is interpreted; every other field is carried through
/// untouched so the artifact can be handed to the backend as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CircuitArtifact {
    pub bytecode: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abi: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub noir_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<serde_json::Value>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl CircuitArtifact {
    /// Parse an artifact document, rejecting missing or empty bytecode
    pub fn from_json(circuit: CircuitType, bytes: &[u8]) -> Result<Self, ProverError> {
        let artifact: CircuitArtifact =
            serde_json::from_slice(bytes).map_err(|e| ProverError::ArtifactLoad {
                circuit,
                reason: format!("invalid artifact JSON: {}", e),
            })?;

        if artifact.bytecode.trim().is_empty() {
            return Err(ProverError::ArtifactLoad {
                circuit,
                reason: "artifact has empty bytecode".to_string(),
            });
        }
        Ok(artifact)
    }
}
