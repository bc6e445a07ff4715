//! Where compiled circuit artifacts come from
//!
//! Each source yields the raw JSON document for a circuit type; parsing
//! and validation happen in the client so every source fails the same way.

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::debug;

use crate::ProverError;
use crate::circuit::CircuitType;

pub trait ArtifactSource: Send + Sync {
    /// Fetch the artifact document for `circuit`
    fn fetch(
        &self,
        circuit: CircuitType,
    ) -> impl Future<Output = Result<Vec<u8>, ProverError>> + Send;
}

/// Reads `<dir>/<type>.json`
#[derive(Debug, Clone)]
pub struct FsArtifacts {
    dir: PathBuf,
}

impl FsArtifacts {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ArtifactSource for FsArtifacts {
    async fn fetch(&self, circuit: CircuitType) -> Result<Vec<u8>, ProverError> {
        let path = self.dir.join(circuit.artifact_file());
        debug!("Reading {} artifact from {}", circuit, path.display());

        tokio::fs::read(&path)
            .await
            .map_err(|e| ProverError::ArtifactLoad {
                circuit,
                reason: format!("read {}: {}", path.display(), e),
            })
    }
}

/// Downloads `<base_url>/<type>.json`, one attempt per load
#[derive(Debug, Clone)]
pub struct HttpArtifacts {
    client: reqwest::Client,
    base_url: String,
}

impl HttpArtifacts {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn url_for(&self, circuit: CircuitType) -> String {
        format!("{}/{}", self.base_url, circuit.artifact_file())
    }
}

impl ArtifactSource for HttpArtifacts {
    async fn fetch(&self, circuit: CircuitType) -> Result<Vec<u8>, ProverError> {
        let url = self.url_for(circuit);
        debug!("Fetching {} artifact from {}", circuit, url);

        let load_err = |e: reqwest::Error| ProverError::ArtifactLoad {
            circuit,
            reason: format!("GET {}: {}", url, e),
        };

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(load_err)?
            .error_for_status()
            .map_err(load_err)?;

        let bytes = response.bytes().await.map_err(load_err)?;
        Ok(bytes.to_vec())
    }
}

/// Artifacts held in memory, mostly for tests and embedded builds
#[derive(Debug, Default)]
pub struct MemoryArtifacts {
    documents: HashMap<CircuitType, Vec<u8>>,
    fetches: AtomicUsize,
}

impl MemoryArtifacts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, circuit: CircuitType, document: impl Into<Vec<u8>>) -> Self {
        self.documents.insert(circuit, document.into());
        self
    }

    /// Number of fetches served so far, including failed ones
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl ArtifactSource for MemoryArtifacts {
    async fn fetch(&self, circuit: CircuitType) -> Result<Vec<u8>, ProverError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.documents
            .get(&circuit)
            .cloned()
            .ok_or_else(|| ProverError::ArtifactLoad {
                circuit,
                reason: "no artifact registered".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fs_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("deposit.json"), br#"{"bytecode":"AA"}"#).unwrap();

        let source = FsArtifacts::new(dir.path());
        assert_eq!(
            source.fetch(CircuitType::Deposit).await.unwrap(),
            br#"{"bytecode":"AA"}"#.to_vec()
        );
        assert!(matches!(
            source.fetch(CircuitType::Withdraw).await,
            Err(ProverError::ArtifactLoad { circuit: CircuitType::Withdraw, .. })
        ));
    }

    #[test]
    fn test_http_url_layout() {
        let source = HttpArtifacts::new("https://cdn.example.org/circuits/");
        assert_eq!(
            source.url_for(CircuitType::Transfer),
            "https://cdn.example.org/circuits/transfer.json"
        );
    }

    #[tokio::test]
    async fn test_http_unreachable_is_artifact_error() {
        // Port 9 (discard) on localhost is not serving HTTP
        let source = HttpArtifacts::new("http://127.0.0.1:9");
        assert!(matches!(
            source.fetch(CircuitType::Deposit).await,
            Err(ProverError::ArtifactLoad { .. })
        ));
    }
}
