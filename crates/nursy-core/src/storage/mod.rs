//! Token storage backends.
//!
//! The session keeps exactly one token under a fixed key. Where that key
//! lives is decided by the `TokenStore` implementation handed to the
//! session:
//!
//! - `MemoryStore`: process-local map, used by tests and the `memory` backend
//! - `FileStore`: one JSON file per key in the cache directory
//! - `KeyringStore`: OS-level credential storage via keyring

pub mod credentials;
pub mod file;
pub mod memory;

use thiserror::Error;

pub use credentials::KeyringStore;
pub use file::FileStore;
pub use memory::MemoryStore;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Token storage unavailable: {0}")]
    Unavailable(String),

    #[error("Stored value is corrupt: {0}")]
    Corrupt(String),
}

/// Fallible key/value store holding raw token strings.
pub trait TokenStore: Send + Sync {
    /// Read the value under `key`. `Ok(None)` means the key was never set.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete the value under `key`. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}
