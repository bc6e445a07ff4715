//! Shade Configuration
//!
//! Shared configuration for the Shade wallet tools.
//!
//! Handles loading configuration from:
//! 1. SHADE_CONFIG env var (explicit path)
//! 2. ./config.toml (current directory)
//! 3. ~/.shade/config.toml (user home)
//!
//! Environment variables take precedence over TOML config.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::{env, fs};

const CONFIG_FILE_NAME: &str = "config.toml";
const CONFIG_DIR_NAME: &str = ".shade";

// ============================================================================
// Default Constants
// ============================================================================

const DEFAULT_STORE_PATH: &str = "./shade-notes.json";
const DEFAULT_NAMESPACE: &str = "shade";
const DEFAULT_CIRCUITS_DIR: &str = "./circuits";
const DEFAULT_DECIMALS: u32 = 18;

// Argon2 defaults (argon2::Params::DEFAULT_*)
const DEFAULT_KDF_MEMORY_KIB: u32 = 19 * 1024;
const DEFAULT_KDF_ITERATIONS: u32 = 2;
const DEFAULT_KDF_PARALLELISM: u32 = 1;

// ============================================================================
// Config Structs
// ============================================================================

/// Root configuration structure (matches TOML layout)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShadeConfig {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub prover: ProverConfig,
    #[serde(default)]
    pub kdf: KdfConfig,
    #[serde(default)]
    pub wallet: WalletConfig,
}

/// Which storage backend holds the encrypted notes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    File,
    Memory,
    Rocksdb,
}

impl std::str::FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "file" => Ok(StoreBackend::File),
            "memory" => Ok(StoreBackend::Memory),
            "rocksdb" => Ok(StoreBackend::Rocksdb),
            other => anyhow::bail!("unknown storage backend: {}", other),
        }
    }
}

/// Note storage configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    #[serde(default = "default_store_path")]
    pub path: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// Fail on corrupted storage instead of recovering to an empty wallet
    #[serde(default)]
    pub strict: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::File,
            path: DEFAULT_STORE_PATH.into(),
            namespace: DEFAULT_NAMESPACE.into(),
            strict: false,
        }
    }
}

fn default_store_path() -> String {
    DEFAULT_STORE_PATH.into()
}
fn default_namespace() -> String {
    DEFAULT_NAMESPACE.into()
}

/// Proving backend selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProverMode {
    #[default]
    Mock,
    Nargo,
}

/// Prover configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProverConfig {
    #[serde(default)]
    pub mode: ProverMode,
    /// Directory holding `<type>.json` circuit artifacts
    #[serde(default)]
    pub artifact_dir: Option<String>,
    /// Base URL serving `<type>.json` circuit artifacts
    #[serde(default)]
    pub artifact_url: Option<String>,
    /// Noir project root with one sub-directory per circuit
    #[serde(default = "default_circuits_dir")]
    pub circuits_dir: String,
}

impl Default for ProverConfig {
    fn default() -> Self {
        Self {
            mode: ProverMode::Mock,
            artifact_dir: None,
            artifact_url: None,
            circuits_dir: DEFAULT_CIRCUITS_DIR.into(),
        }
    }
}

fn default_circuits_dir() -> String {
    DEFAULT_CIRCUITS_DIR.into()
}

/// Argon2id cost for new PIN records
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfConfig {
    #[serde(default = "default_kdf_memory")]
    pub memory_kib: u32,
    #[serde(default = "default_kdf_iterations")]
    pub iterations: u32,
    #[serde(default = "default_kdf_parallelism")]
    pub parallelism: u32,
}

impl Default for KdfConfig {
    fn default() -> Self {
        Self {
            memory_kib: DEFAULT_KDF_MEMORY_KIB,
            iterations: DEFAULT_KDF_ITERATIONS,
            parallelism: DEFAULT_KDF_PARALLELISM,
        }
    }
}

fn default_kdf_memory() -> u32 {
    DEFAULT_KDF_MEMORY_KIB
}
fn default_kdf_iterations() -> u32 {
    DEFAULT_KDF_ITERATIONS
}
fn default_kdf_parallelism() -> u32 {
    DEFAULT_KDF_PARALLELISM
}

/// Wallet configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletConfig {
    /// Public address used as the owner of shielded notes
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default = "default_decimals")]
    pub decimals: u32,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            address: None,
            decimals: DEFAULT_DECIMALS,
        }
    }
}

fn default_decimals() -> u32 {
    DEFAULT_DECIMALS
}

// ============================================================================
// Environment Variable Helpers
// ============================================================================

/// Source of environment values; the process environment outside tests
type EnvLookup<'a> = &'a dyn Fn(&str) -> Option<String>;

fn process_env(key: &str) -> Option<String> {
    env::var(key).ok()
}

/// Set field from env var if present
fn env_string(env: EnvLookup, key: &str, field: &mut String) {
    if let Some(v) = env(key) {
        *field = v;
    }
}

/// Set Option<String> from env var if present
fn env_option_string(env: EnvLookup, key: &str, field: &mut Option<String>) {
    if let Some(v) = env(key) {
        *field = Some(v);
    }
}

/// Set field from env var if present and parseable
fn env_parse<T: std::str::FromStr>(env: EnvLookup, key: &str, field: &mut T) {
    if let Some(v) = env(key) {
        match v.parse() {
            Ok(parsed) => *field = parsed,
            Err(_) => log::warn!("Ignoring unparseable {}={}", key, v),
        }
    }
}

/// Check if env var is set to a truthy value ("1" or "true")
fn env_bool(env: EnvLookup, key: &str) -> Option<bool> {
    env(key).map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}

// ============================================================================
// Implementation
// ============================================================================

impl ShadeConfig {
    /// Load configuration from config file with env var overrides
    pub fn load() -> Result<Self> {
        let mut config = match Self::find_config_file() {
            Some(path) => {
                log::info!("Loading config from: {}", path.display());
                Self::parse_file(&path)?
            }
            None => {
                log::info!("No config file found, using defaults and environment variables");
                Self::default()
            }
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Load configuration from a specific file path
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = Self::parse_file(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    fn parse_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Find the config file path
    fn find_config_file() -> Option<PathBuf> {
        // 1. Check SHADE_CONFIG env var
        if let Ok(path) = env::var("SHADE_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
            log::warn!("SHADE_CONFIG points to missing file: {}", path.display());
        }

        // 2. Check ./config.toml (current directory)
        let local_path = PathBuf::from(CONFIG_FILE_NAME);
        if local_path.exists() {
            return Some(local_path);
        }

        // 3. Check ~/.shade/config.toml
        Self::default_config_path().filter(|p| p.exists())
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(&process_env);
    }

    fn apply_overrides_from(&mut self, env: EnvLookup) {
        // Storage
        env_string(env, "SHADE_STORE_PATH", &mut self.storage.path);
        env_parse(env, "SHADE_STORE_BACKEND", &mut self.storage.backend);
        env_string(env, "SHADE_NAMESPACE", &mut self.storage.namespace);
        if let Some(v) = env_bool(env, "SHADE_STRICT_STORAGE") {
            self.storage.strict = v;
        }

        // Prover
        if let Some(v) = env("SHADE_PROVER_MODE") {
            self.prover.mode = match v.to_ascii_lowercase().as_str() {
                "nargo" | "noir" => ProverMode::Nargo,
                _ => ProverMode::Mock,
            };
        }
        env_option_string(env, "SHADE_ARTIFACT_DIR", &mut self.prover.artifact_dir);
        env_option_string(env, "SHADE_ARTIFACT_URL", &mut self.prover.artifact_url);
        env_string(env, "SHADE_CIRCUITS_DIR", &mut self.prover.circuits_dir);

        // Wallet
        env_option_string(env, "SHADE_ADDRESS", &mut self.wallet.address);
        env_parse(env, "SHADE_DECIMALS", &mut self.wallet.decimals);
    }

    /// Get the default config file path
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Generate a sample config file
    pub fn generate_sample() -> String {
        let mut sample = Self::default();
        sample.wallet.address = Some("0xabc123".into());
        sample.prover.artifact_dir = Some("./circuits/artifacts".into());
        toml::to_string_pretty(&sample).unwrap_or_default()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn overrides(pairs: &[(&str, &str)]) -> ShadeConfig {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let mut config = ShadeConfig::default();
        config.apply_overrides_from(&|key: &str| vars.get(key).cloned());
        config
    }

    #[test]
    fn test_default_config() {
        let config = ShadeConfig::default();
        assert_eq!(config.storage.path, DEFAULT_STORE_PATH);
        assert_eq!(config.storage.backend, StoreBackend::File);
        assert_eq!(config.prover.mode, ProverMode::Mock);
        assert_eq!(config.wallet.decimals, 18);
        assert!(!config.storage.strict);
    }

    #[test]
    fn test_generate_sample() {
        let sample = ShadeConfig::generate_sample();
        assert!(sample.contains("[storage]"));
        assert!(sample.contains("[prover]"));
        assert!(sample.contains("[kdf]"));
        assert!(sample.contains("[wallet]"));
    }

    #[test]
    fn test_parse_sample() {
        let sample = ShadeConfig::generate_sample();
        let parsed: ShadeConfig = toml::from_str(&sample).unwrap();
        assert_eq!(parsed.wallet.address.as_deref(), Some("0xabc123"));
        assert_eq!(parsed.kdf, KdfConfig::default());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let parsed: ShadeConfig = toml::from_str(
            r#"
            [storage]
            backend = "rocksdb"
            path = "/var/lib/shade"

            [prover]
            mode = "nargo"
            "#,
        )
        .unwrap();

        assert_eq!(parsed.storage.backend, StoreBackend::Rocksdb);
        assert_eq!(parsed.storage.namespace, DEFAULT_NAMESPACE);
        assert_eq!(parsed.prover.mode, ProverMode::Nargo);
        assert_eq!(parsed.prover.circuits_dir, DEFAULT_CIRCUITS_DIR);
        assert_eq!(parsed.wallet, WalletConfig::default());
    }

    #[test]
    fn test_env_overrides() {
        let config = overrides(&[
            ("SHADE_STORE_PATH", "/tmp/notes.json"),
            ("SHADE_STORE_BACKEND", "memory"),
            ("SHADE_STRICT_STORAGE", "true"),
            ("SHADE_PROVER_MODE", "noir"),
            ("SHADE_ARTIFACT_URL", "https://cdn.example.org/circuits"),
            ("SHADE_DECIMALS", "6"),
        ]);

        assert_eq!(config.storage.path, "/tmp/notes.json");
        assert_eq!(config.storage.backend, StoreBackend::Memory);
        assert!(config.storage.strict);
        assert_eq!(config.prover.mode, ProverMode::Nargo);
        assert_eq!(
            config.prover.artifact_url.as_deref(),
            Some("https://cdn.example.org/circuits")
        );
        assert_eq!(config.wallet.decimals, 6);
    }

    #[test]
    fn test_bad_env_values_ignored() {
        let config = overrides(&[("SHADE_DECIMALS", "many"), ("SHADE_STORE_BACKEND", "s3")]);
        assert_eq!(config.wallet.decimals, DEFAULT_DECIMALS);
        assert_eq!(config.storage.backend, StoreBackend::File);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[wallet]\naddress = \"0xdead\"\n").unwrap();

        let config = ShadeConfig::load_from(&path).unwrap();
        assert_eq!(config.wallet.address.as_deref(), Some("0xdead"));

        assert!(ShadeConfig::load_from(&dir.path().join("missing.toml")).is_err());
    }
}
