//! Builds a wallet from configuration
//!
//! The library types are generic; the CLI picks concrete backends at runtime
//! and wraps them in enums that forward to the selected implementation.

use std::path::Path;

use anyhow::{Context, Result, bail};
use shade_config::{ProverMode, ShadeConfig, StoreBackend};
#[cfg(feature = "rocksdb")]
use shade_notestore::RocksDbStorage;
use shade_notestore::{
    CorruptionPolicy, FileStorage, KdfParams, KeyValueStore, MemoryStorage, NoteStore, StoreError,
};
use shade_prover::backend::MockCircuit;
use shade_prover::nargo::NargoCircuit;
use shade_prover::{
    ArtifactSource, CircuitArtifact, CircuitType, FsArtifacts, HttpArtifacts, InputMap,
    MemoryArtifacts, MockBackend, NargoBackend, ProofClient, ProofData, ProverError,
    ProvingBackend,
};
use shade_wallet::{StaticIdentity, Wallet};
use tracing::{info, warn};

pub type ShadeWallet = Wallet<AnyStorage, AnyArtifacts, AnyBackend, StaticIdentity>;

// ============================================================================
// Storage
// ============================================================================

pub enum AnyStorage {
    File(FileStorage),
    Memory(MemoryStorage),
    #[cfg(feature = "rocksdb")]
    RocksDb(RocksDbStorage),
}

impl KeyValueStore for AnyStorage {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        match self {
            AnyStorage::File(s) => s.get(key),
            AnyStorage::Memory(s) => s.get(key),
            #[cfg(feature = "rocksdb")]
            AnyStorage::RocksDb(s) => s.get(key),
        }
    }

    fn write_batch(&self, entries: &[(&str, &[u8])]) -> Result<(), StoreError> {
        match self {
            AnyStorage::File(s) => s.write_batch(entries),
            AnyStorage::Memory(s) => s.write_batch(entries),
            #[cfg(feature = "rocksdb")]
            AnyStorage::RocksDb(s) => s.write_batch(entries),
        }
    }
}

fn open_storage(backend: StoreBackend, path: &str) -> Result<AnyStorage> {
    match backend {
        StoreBackend::File => Ok(AnyStorage::File(
            FileStorage::open(path).with_context(|| format!("Failed to open {}", path))?,
        )),
        StoreBackend::Memory => {
            warn!("Using in-memory storage; notes are lost on exit");
            Ok(AnyStorage::Memory(MemoryStorage::new()))
        }
        #[cfg(feature = "rocksdb")]
        StoreBackend::Rocksdb => Ok(AnyStorage::RocksDb(
            RocksDbStorage::open(path).with_context(|| format!("Failed to open {}", path))?,
        )),
        #[cfg(not(feature = "rocksdb"))]
        StoreBackend::Rocksdb => {
            bail!("this build has no RocksDB support; rebuild with --features rocksdb")
        }
    }
}

// ============================================================================
// Artifacts
// ============================================================================

pub enum AnyArtifacts {
    Fs(FsArtifacts),
    Http(HttpArtifacts),
    Memory(MemoryArtifacts),
}

impl ArtifactSource for AnyArtifacts {
    async fn fetch(&self, circuit: CircuitType) -> Result<Vec<u8>, ProverError> {
        match self {
            AnyArtifacts::Fs(a) => a.fetch(circuit).await,
            AnyArtifacts::Http(a) => a.fetch(circuit).await,
            AnyArtifacts::Memory(a) => a.fetch(circuit).await,
        }
    }
}

/// Placeholder artifacts for mock proving without any compiled circuits
fn mock_artifacts() -> MemoryArtifacts {
    CircuitType::ALL.into_iter().fold(MemoryArtifacts::new(), |source, circuit| {
        source.with(circuit, format!(r#"{{"bytecode":"mock-{}"}}"#, circuit))
    })
}

// ============================================================================
// Proving backend
// ============================================================================

pub enum AnyBackend {
    Mock(MockBackend),
    Nargo(NargoBackend),
}

pub enum AnyCircuit {
    Mock(MockCircuit),
    Nargo(NargoCircuit),
}

impl ProvingBackend for AnyBackend {
    type Circuit = AnyCircuit;

    async fn prepare(
        &self,
        circuit: CircuitType,
        artifact: CircuitArtifact,
    ) -> Result<AnyCircuit, ProverError> {
        match self {
            AnyBackend::Mock(b) => b.prepare(circuit, artifact).await.map(AnyCircuit::Mock),
            AnyBackend::Nargo(b) => b.prepare(circuit, artifact).await.map(AnyCircuit::Nargo),
        }
    }

    async fn prove(
        &self,
        circuit: &AnyCircuit,
        inputs: &InputMap,
    ) -> Result<ProofData, ProverError> {
        match (self, circuit) {
            (AnyBackend::Mock(b), AnyCircuit::Mock(c)) => b.prove(c, inputs).await,
            (AnyBackend::Nargo(b), AnyCircuit::Nargo(c)) => b.prove(c, inputs).await,
            _ => Err(ProverError::ProofGeneration(
                "circuit was prepared by a different backend".to_string(),
            )),
        }
    }
}

// ============================================================================
// Wallet
// ============================================================================

pub fn build_wallet(config: &ShadeConfig) -> Result<ShadeWallet> {
    let storage = open_storage(config.storage.backend, &config.storage.path)?;
    let policy = if config.storage.strict {
        CorruptionPolicy::Fail
    } else {
        CorruptionPolicy::RecoverEmpty
    };
    let store = NoteStore::new(storage)
        .with_namespace(config.storage.namespace.clone())
        .with_kdf_params(KdfParams {
            memory_kib: config.kdf.memory_kib,
            iterations: config.kdf.iterations,
            parallelism: config.kdf.parallelism,
        })
        .with_corruption_policy(policy);

    let artifacts = match (&config.prover.artifact_url, &config.prover.artifact_dir) {
        (Some(url), _) => AnyArtifacts::Http(HttpArtifacts::new(url.clone())),
        (None, Some(dir)) => AnyArtifacts::Fs(FsArtifacts::new(dir)),
        (None, None) if config.prover.mode == ProverMode::Mock => {
            AnyArtifacts::Memory(mock_artifacts())
        }
        (None, None) => bail!("nargo proving needs prover.artifact_dir or prover.artifact_url"),
    };

    let backend = match config.prover.mode {
        ProverMode::Mock => {
            warn!("Using mock prover; proofs will not verify on-chain");
            AnyBackend::Mock(MockBackend::default())
        }
        ProverMode::Nargo => {
            let dir = Path::new(&config.prover.circuits_dir);
            if !dir.exists() {
                warn!(
                    "Circuits directory {} does not exist - proofs will fail until configured",
                    dir.display()
                );
            }
            AnyBackend::Nargo(NargoBackend::new(dir))
        }
    };

    let address = config
        .wallet
        .address
        .clone()
        .context("no wallet address configured (set wallet.address or SHADE_ADDRESS)")?;

    info!(
        "Wallet {} using {:?} storage at {} and {:?} prover",
        address, config.storage.backend, config.storage.path, config.prover.mode
    );

    Ok(Wallet::new(store, ProofClient::new(artifacts, backend), StaticIdentity::new(address))
        .with_decimals(config.wallet.decimals))
}
