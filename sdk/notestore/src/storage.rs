//! Storage backends
//!
//! The note store only needs a tiny slot namespace: one slot for the
//! encrypted collection and one for the PIN record. Backends must apply a
//! batch atomically so a crash never leaves the two slots out of step.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tempfile::NamedTempFile;
use tracing::warn;

use crate::StoreError;

/// Minimal key-value interface used by [`crate::NoteStore`]
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Write every entry, all or nothing
    fn write_batch(&self, entries: &[(&str, &[u8])]) -> Result<(), StoreError>;

    fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.write_batch(&[(key, value)])
    }
}

/// In-memory backend, lost on drop
#[derive(Default)]
pub struct MemoryStorage {
    slots: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let slots = self
            .slots
            .lock()
            .map_err(|_| StoreError::Backend("memory storage lock poisoned".into()))?;
        Ok(slots.get(key).cloned())
    }

    fn write_batch(&self, entries: &[(&str, &[u8])]) -> Result<(), StoreError> {
        let mut slots = self
            .slots
            .lock()
            .map_err(|_| StoreError::Backend("memory storage lock poisoned".into()))?;
        for (key, value) in entries {
            slots.insert((*key).to_string(), value.to_vec());
        }
        Ok(())
    }
}

/// Single-file backend
///
/// All slots live in one JSON object (values hex-encoded). A batch is
/// written to a fresh temp file in the same directory and persisted over the
/// original. A file that no longer parses is reported as
/// [`StoreError::Corrupted`] and is replaced wholesale by the next batch.
pub struct FileStorage {
    path: PathBuf,
    dir: PathBuf,
}

impl FileStorage {
    /// Open (or lazily create) the slot file, creating parent directories
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let dir = match path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(parent) => {
                fs::create_dir_all(parent).map_err(|e| {
                    StoreError::Backend(format!("create {}: {}", parent.display(), e))
                })?;
                parent.to_path_buf()
            }
            None => PathBuf::from("."),
        };
        Ok(Self { path, dir })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_slots(&self) -> Result<BTreeMap<String, String>, StoreError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                return Err(StoreError::Corrupted(format!("{}: {}", self.path.display(), e)));
            }
            Err(e) => {
                return Err(StoreError::Backend(format!("read {}: {}", self.path.display(), e)));
            }
        };
        serde_json::from_str(&contents)
            .map_err(|e| StoreError::Corrupted(format!("{}: {}", self.path.display(), e)))
    }
}

impl KeyValueStore for FileStorage {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let slots = self.read_slots()?;
        slots
            .get(key)
            .map(|v| {
                hex::decode(v).map_err(|e| StoreError::Corrupted(format!("slot {}: {}", key, e)))
            })
            .transpose()
    }

    fn write_batch(&self, entries: &[(&str, &[u8])]) -> Result<(), StoreError> {
        let mut slots = match self.read_slots() {
            Ok(slots) => slots,
            Err(StoreError::Corrupted(reason)) => {
                warn!("Overwriting unreadable slot file ({})", reason);
                BTreeMap::new()
            }
            Err(e) => return Err(e),
        };
        for (key, value) in entries {
            slots.insert((*key).to_string(), hex::encode(value));
        }

        let json = serde_json::to_vec_pretty(&slots)
            .map_err(|e| StoreError::Backend(format!("encode slots: {}", e)))?;

        let path = self.path.display();
        let io_err = |e: std::io::Error| StoreError::Backend(format!("write {}: {}", path, e));
        let mut file = NamedTempFile::new_in(&self.dir).map_err(io_err)?;
        file.write_all(&json).map_err(io_err)?;
        file.as_file().sync_all().map_err(io_err)?;
        file.persist(&self.path).map_err(|e| io_err(e.error))?;
        Ok(())
    }
}

#[cfg(feature = "rocksdb")]
pub use self::rocks::RocksDbStorage;

#[cfg(feature = "rocksdb")]
mod rocks {
    use std::path::Path;
    use std::sync::Arc;

    use rocksdb::{ColumnFamilyDescriptor, DB, Options, WriteBatch};

    use super::KeyValueStore;
    use crate::StoreError;

    const CF_SLOTS: &str = "notestore";

    /// RocksDB backend; batches map onto a `WriteBatch`
    #[derive(Clone)]
    pub struct RocksDbStorage {
        db: Arc<DB>,
    }

    impl RocksDbStorage {
        /// Opens the database at the specified path, creating it if missing.
        pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
            let mut opts = Options::default();
            opts.create_if_missing(true);
            opts.create_missing_column_families(true);

            let families = vec![ColumnFamilyDescriptor::new(CF_SLOTS, Options::default())];
            let db = DB::open_cf_descriptors(&opts, path, families)
                .map_err(|e| StoreError::Backend(format!("Failed to open RocksDB: {}", e)))?;

            Ok(Self { db: Arc::new(db) })
        }
    }

    impl KeyValueStore for RocksDbStorage {
        fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
            let cf = self
                .db
                .cf_handle(CF_SLOTS)
                .ok_or_else(|| StoreError::Backend("column family 'notestore' missing".into()))?;
            self.db
                .get_cf(cf, key.as_bytes())
                .map_err(|e| StoreError::Backend(e.to_string()))
        }

        fn write_batch(&self, entries: &[(&str, &[u8])]) -> Result<(), StoreError> {
            let cf = self
                .db
                .cf_handle(CF_SLOTS)
                .ok_or_else(|| StoreError::Backend("column family 'notestore' missing".into()))?;
            let mut batch = WriteBatch::default();
            for (key, value) in entries {
                batch.put_cf(cf, key.as_bytes(), value);
            }
            self.db
                .write(batch)
                .map_err(|e| StoreError::Backend(e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_batch() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.get("a").unwrap(), None);

        storage.write_batch(&[("a", b"1"), ("b", b"2")]).unwrap();
        assert_eq!(storage.get("a").unwrap(), Some(b"1".to_vec()));
        assert_eq!(storage.get("b").unwrap(), Some(b"2".to_vec()));
    }

    #[test]
    fn test_file_storage_persists_across_handles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wallet").join("notes.json");

        let storage = FileStorage::open(&path).unwrap();
        assert_eq!(storage.get("a").unwrap(), None);
        storage.write_batch(&[("a", b"hello"), ("b", &[0u8, 255])]).unwrap();
        storage.put("a", b"world").unwrap();

        let reopened = FileStorage::open(&path).unwrap();
        assert_eq!(reopened.get("a").unwrap(), Some(b"world".to_vec()));
        assert_eq!(reopened.get("b").unwrap(), Some(vec![0u8, 255]));

        let leftovers = std::fs::read_dir(path.parent().unwrap()).unwrap().count();
        assert_eq!(leftovers, 1, "only the slot file remains");
    }

    #[test]
    fn test_unreadable_file_is_corrupted_and_rewritable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.json");
        let storage = FileStorage::open(&path).unwrap();
        storage.put("a", b"hello").unwrap();

        let contents = std::fs::read(&path).unwrap();
        std::fs::write(&path, &contents[..contents.len() / 2]).unwrap();
        assert!(matches!(storage.get("a"), Err(StoreError::Corrupted(_))));

        storage.put("b", b"fresh").unwrap();
        assert_eq!(storage.get("b").unwrap(), Some(b"fresh".to_vec()));
        assert_eq!(storage.get("a").unwrap(), None);
    }

    #[test]
    fn test_bare_file_name_opens() {
        let storage = FileStorage::open("notes.json").unwrap();
        assert_eq!(storage.dir, PathBuf::from("."));
    }

    #[cfg(feature = "rocksdb")]
    #[test]
    fn test_rocksdb_batch() {
        let dir = tempfile::tempdir().unwrap();
        let storage = RocksDbStorage::open(dir.path()).unwrap();

        storage.write_batch(&[("a", b"1"), ("b", b"2")]).unwrap();
        assert_eq!(storage.get("a").unwrap(), Some(b"1".to_vec()));
        assert_eq!(storage.get("missing").unwrap(), None);
    }
}
