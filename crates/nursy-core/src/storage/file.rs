use std::io::ErrorKind;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{StorageError, TokenStore};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredValue {
    value: String,
    saved_at: DateTime<Utc>,
}

/// Token store backed by one JSON file per key in a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl TokenStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path(key);
        if !path.exists() {
            return Ok(None);
        }

        let contents = std::fs::read_to_string(&path).map_err(|e| {
            StorageError::Unavailable(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let stored: StoredValue = serde_json::from_str(&contents).map_err(|e| {
            StorageError::Corrupt(format!("Failed to parse {}: {}", path.display(), e))
        })?;

        Ok(Some(stored.value))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| {
            StorageError::Unavailable(format!("Failed to create {}: {}", self.dir.display(), e))
        })?;

        let stored = StoredValue {
            value: value.to_string(),
            saved_at: Utc::now(),
        };
        let contents = serde_json::to_string_pretty(&stored)
            .map_err(|e| StorageError::Corrupt(e.to_string()))?;

        let path = self.path(key);
        std::fs::write(&path, contents).map_err(|e| {
            StorageError::Unavailable(format!("Failed to write {}: {}", path.display(), e))
        })?;
        debug!(path = %path.display(), "Saved token file");
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path(key);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Unavailable(format!(
                "Failed to remove {}: {}",
                path.display(),
                e
            ))),
        }
    }
}
