//! Local key/value storage for serialized client state.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;

/// Key the cart snapshot is stored under.
pub const CART_SNAPSHOT_KEY: &str = "cart";

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("Snapshot I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Snapshot is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

pub trait SnapshotStorage: Send + Sync {
    fn read(&self, key: &str) -> Result<Option<String>, SnapshotError>;
    fn write(&mut self, key: &str, value: &str) -> Result<(), SnapshotError>;
}

/// One `<key>.json` file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileSnapshotStorage {
    dir: PathBuf,
}

impl FileSnapshotStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self { Self { dir: dir.into() } }

    fn path(&self, key: &str) -> PathBuf { self.dir.join(format!("{key}.json")) }
}

impl SnapshotStorage for FileSnapshotStorage {
    fn read(&self, key: &str) -> Result<Option<String>, SnapshotError> {
        match fs::read_to_string(self.path(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&mut self, key: &str, value: &str) -> Result<(), SnapshotError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

/// Shared in-process storage. Clones see the same entries.
#[derive(Debug, Clone, Default)]
pub struct MemorySnapshotStorage {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl MemorySnapshotStorage {
    pub fn new() -> Self { Self::default() }

    pub fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).get(key).cloned()
    }
}

impl SnapshotStorage for MemorySnapshotStorage {
    fn read(&self, key: &str) -> Result<Option<String>, SnapshotError> { Ok(self.get(key)) }

    fn write(&mut self, key: &str, value: &str) -> Result<(), SnapshotError> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_storage_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mut storage = FileSnapshotStorage::new(dir.path().join("state"));
        assert!(storage.read(CART_SNAPSHOT_KEY).unwrap().is_none());

        storage.write(CART_SNAPSHOT_KEY, r#"{"cartitems":[]}"#).unwrap();
        storage.write(CART_SNAPSHOT_KEY, r#"{"cartitems":[],"totalquantity":0}"#).unwrap();
        assert_eq!(storage.read(CART_SNAPSHOT_KEY).unwrap().as_deref(), Some(r#"{"cartitems":[],"totalquantity":0}"#));
        assert!(dir.path().join("state/cart.json").exists());
    }

    #[test]
    fn test_memory_storage_is_shared_between_clones() {
        let storage = MemorySnapshotStorage::new();
        let mut writer = storage.clone();
        writer.write("cart", "{}").unwrap();
        assert_eq!(storage.get("cart").as_deref(), Some("{}"));
    }
}
