use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("state file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("state file {path} is not a JSON object of strings: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// String key-value persistence for session state. Values are whole blobs:
/// primitive strings or serialized JSON documents.
pub trait KeyValueStore: Send {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&mut self, key: &str) -> Result<(), StoreError>;
    /// Applies every write in order, `Some` setting and `None` removing a key.
    /// Either the whole batch lands or the store is left as it was.
    fn write_batch(&mut self, batch: &[(&str, Option<String>)]) -> Result<(), StoreError>;
}

fn apply_batch(entries: &mut BTreeMap<String, String>, batch: &[(&str, Option<String>)]) {
    for (key, value) in batch {
        match value {
            Some(value) => {
                entries.insert((*key).to_string(), value.clone());
            }
            None => {
                entries.remove(*key);
            }
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        self.entries.remove(key);
        Ok(())
    }

    fn write_batch(&mut self, batch: &[(&str, Option<String>)]) -> Result<(), StoreError> {
        apply_batch(&mut self.entries, batch);
        Ok(())
    }
}

/// A single JSON object on disk, rewritten in full on every mutation. A
/// missing file reads as empty and is created on first write.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl JsonFileStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let entries = match fs::read_to_string(&path) {
            Ok(content) if content.trim().is_empty() => BTreeMap::new(),
            Ok(content) => serde_json::from_str(&content).map_err(|source| StoreError::Corrupt {
                path: path.clone(),
                source,
            })?,
            Err(err) if err.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes `entries` to disk through a temp file and a rename, so the
    /// file holds either the previous or the new document.
    fn flush(&self, entries: &BTreeMap<String, String>) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let body = serde_json::to_string_pretty(entries).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, body).map_err(io_err)?;
        fs::rename(&tmp, &self.path).map_err(io_err)
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.write_batch(&[(key, Some(value.to_string()))])
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        if !self.entries.contains_key(key) {
            return Ok(());
        }
        self.write_batch(&[(key, None)])
    }

    fn write_batch(&mut self, batch: &[(&str, Option<String>)]) -> Result<(), StoreError> {
        let mut next = self.entries.clone();
        apply_batch(&mut next, batch);
        self.flush(&next)?;
        self.entries = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_round_trips() {
        let mut store = MemoryStore::new();
        assert!(store.is_empty());
        store.set("portfolioSize", "500000").expect("set");
        assert_eq!(
            store.get("portfolioSize").expect("get").as_deref(),
            Some("500000")
        );
        assert_eq!(store.len(), 1);
        store.remove("portfolioSize").expect("remove");
        assert_eq!(store.get("portfolioSize").expect("get"), None);
    }

    #[test]
    fn memory_batch_sets_and_removes() {
        let mut store = MemoryStore::new();
        store.set("customAlternatives", "{}").expect("set");
        store
            .write_batch(&[
                ("hasVisited", Some("true".to_string())),
                ("customAlternatives", None),
            ])
            .expect("batch");
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("hasVisited").expect("get").as_deref(), Some("true"));
    }

    #[test]
    fn failed_flush_leaves_store_unchanged() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("state.json");
        let mut store = JsonFileStore::open(&path).expect("open");
        store.set("selectedStrategy", "income").expect("set");

        // A directory where the temp file goes makes the write fail.
        fs::create_dir(dir.path().join("state.json.tmp")).expect("block temp file");
        let err = store
            .write_batch(&[
                ("selectedStrategy", Some("growth".to_string())),
                ("portfolioSize", Some("2000000".to_string())),
            ])
            .expect_err("temp file is a directory");
        assert!(matches!(err, StoreError::Io { .. }));

        assert_eq!(
            store.get("selectedStrategy").expect("get").as_deref(),
            Some("income")
        );
        assert_eq!(store.get("portfolioSize").expect("get"), None);
        let reopened = JsonFileStore::open(&path).expect("reopen");
        assert_eq!(
            reopened.get("selectedStrategy").expect("get").as_deref(),
            Some("income")
        );
        assert_eq!(reopened.get("portfolioSize").expect("get"), None);
    }

    #[test]
    fn file_store_persists_across_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("state.json");

        let mut store = JsonFileStore::open(&path).expect("open missing file");
        assert_eq!(store.get("selectedStrategy").expect("get"), None);
        store.set("selectedStrategy", "growth").expect("set");
        store.set("hasVisited", "true").expect("set");
        drop(store);

        let reopened = JsonFileStore::open(&path).expect("reopen");
        assert_eq!(
            reopened.get("selectedStrategy").expect("get").as_deref(),
            Some("growth")
        );
        assert_eq!(reopened.get("hasVisited").expect("get").as_deref(), Some("true"));
    }

    #[test]
    fn file_store_rejects_corrupt_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("state.json");
        fs::write(&path, "[1, 2, 3]").expect("write");

        let err = JsonFileStore::open(&path).expect_err("array is not a store");
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }
}
