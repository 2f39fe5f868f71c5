use crate::Result;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// Durable key/value seam backing the local message cache. Implementations
/// must keep `put` safe under concurrent writers for the same key;
/// last-write-wins is acceptable because cached records are immutable.
pub trait StorageAdapter: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn put(&self, key: &str, value: String) -> Result<()>;
    fn del(&self, key: &str) -> Result<()>;

    /// Values of every record whose key starts with `prefix`.
    fn scan(&self, prefix: &str) -> Result<Vec<String>>;
}

#[derive(Clone, Default)]
pub struct MemoryStorage {
    store: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageAdapter for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.store.lock().unwrap().get(key).cloned())
    }

    fn put(&self, key: &str, value: String) -> Result<()> {
        self.store.lock().unwrap().insert(key.to_string(), value);
        Ok(())
    }

    fn del(&self, key: &str) -> Result<()> {
        self.store.lock().unwrap().remove(key);
        Ok(())
    }

    fn scan(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .store
            .lock()
            .unwrap()
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(_, v)| v.clone())
            .collect())
    }
}

/// One file per record under `base_path`, so the cache survives restarts.
pub struct FileStorage {
    base_path: PathBuf,
}

impl FileStorage {
    pub fn new(base_path: PathBuf) -> Result<Self> {
        fs::create_dir_all(&base_path)
            .map_err(|e| crate::Error::Storage(format!("Failed to create directory: {}", e)))?;
        Ok(Self { base_path })
    }

    fn sanitize(key: &str) -> String {
        key.replace(['/', '\\', ':'], "_")
    }

    fn key_to_path(&self, key: &str) -> PathBuf {
        self.base_path.join(format!("{}.json", Self::sanitize(key)))
    }
}

impl StorageAdapter for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        match fs::read_to_string(self.key_to_path(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(crate::Error::Storage(format!("Failed to read file: {}", e))),
        }
    }

    fn put(&self, key: &str, value: String) -> Result<()> {
        fs::write(self.key_to_path(key), value)
            .map_err(|e| crate::Error::Storage(format!("Failed to write file: {}", e)))
    }

    fn del(&self, key: &str) -> Result<()> {
        match fs::remove_file(self.key_to_path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(crate::Error::Storage(format!(
                "Failed to delete file: {}",
                e
            ))),
        }
    }

    fn scan(&self, prefix: &str) -> Result<Vec<String>> {
        // Sanitizing is per-character, so key prefixes stay filename prefixes.
        let sanitized_prefix = Self::sanitize(prefix);
        let entries = fs::read_dir(&self.base_path)
            .map_err(|e| crate::Error::Storage(format!("Failed to read directory: {}", e)))?;

        let mut values = Vec::new();
        for entry in entries {
            let entry = entry
                .map_err(|e| crate::Error::Storage(format!("Failed to read dir entry: {}", e)))?;
            let file_name = entry.file_name();
            let file_name = file_name.to_string_lossy();

            let Some(stem) = file_name.strip_suffix(".json") else {
                continue;
            };
            if !stem.starts_with(&sanitized_prefix) {
                continue;
            }

            match fs::read_to_string(entry.path()) {
                Ok(contents) => values.push(contents),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(crate::Error::Storage(format!("Failed to read file: {}", e)))
                }
            }
        }

        Ok(values)
    }
}
