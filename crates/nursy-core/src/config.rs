//! Application configuration management.
//!
//! This module handles loading and saving the client configuration: the
//! API base URL, the login path announced on session invalidation, the
//! token signing secret, and which token store backs the session.
//!
//! Configuration is stored at `~/.config/nursy/config.json`; `NURSY_*`
//! environment variables override the file.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::{ApiClient, DEFAULT_LOGIN_PATH};
use crate::auth::codec::DEFAULT_SIGNING_SECRET;
use crate::auth::{Session, TokenCodec};
use crate::storage::{FileStore, KeyringStore, MemoryStore, TokenStore};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "nursy";

/// Config file name
const CONFIG_FILE: &str = "config.json";

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:3000/api";

const ENV_API_BASE_URL: &str = "NURSY_API_BASE_URL";
const ENV_LOGIN_PATH: &str = "NURSY_LOGIN_PATH";
const ENV_TOKEN_SECRET: &str = "NURSY_TOKEN_SECRET";
const ENV_STORAGE: &str = "NURSY_STORAGE";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    File,
    Keyring,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" => Ok(StorageBackend::File),
            "keyring" => Ok(StorageBackend::Keyring),
            "memory" => Ok(StorageBackend::Memory),
            other => Err(anyhow::anyhow!(
                "Unknown storage backend '{}' (expected file, keyring or memory)",
                other
            )),
        }
    }
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StorageBackend::File => "file",
            StorageBackend::Keyring => "keyring",
            StorageBackend::Memory => "memory",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub api_base_url: Option<String>,
    pub login_path: Option<String>,
    pub token_secret: Option<String>,
    pub storage: StorageBackend,
}

impl Config {
    /// Load the config file (if present) and apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_overrides(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file {}", path.display()))
        } else {
            debug!(path = %path.display(), "No config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Override fields from `lookup`, which maps variable names to values.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_API_BASE_URL) {
            self.api_base_url = Some(url);
        }
        if let Some(path) = lookup(ENV_LOGIN_PATH) {
            self.login_path = Some(path);
        }
        if let Some(secret) = lookup(ENV_TOKEN_SECRET) {
            self.token_secret = Some(secret);
        }
        if let Some(storage) = lookup(ENV_STORAGE) {
            self.storage = storage
                .parse()
                .with_context(|| format!("Invalid {}", ENV_STORAGE))?;
        }
        Ok(())
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    pub fn api_base_url(&self) -> &str {
        self.api_base_url.as_deref().unwrap_or(DEFAULT_API_BASE_URL)
    }

    pub fn login_path(&self) -> &str {
        self.login_path.as_deref().unwrap_or(DEFAULT_LOGIN_PATH)
    }

    pub fn codec(&self) -> TokenCodec {
        TokenCodec::new(self.token_secret.as_deref().unwrap_or(DEFAULT_SIGNING_SECRET))
    }

    pub fn open_store(&self) -> Result<Arc<dyn TokenStore>> {
        let store: Arc<dyn TokenStore> = match self.storage {
            StorageBackend::File => Arc::new(FileStore::new(self.cache_dir()?)),
            StorageBackend::Keyring => Arc::new(KeyringStore::default()),
            StorageBackend::Memory => Arc::new(MemoryStore::new()),
        };
        debug!(backend = %self.storage, "Opened token store");
        Ok(store)
    }

    pub fn session(&self) -> Result<Session> {
        Ok(Session::new(self.open_store()?, self.codec()))
    }

    pub fn api_client(&self) -> Result<ApiClient> {
        let client = ApiClient::new(self.api_base_url(), self.session()?)
            .context("Failed to build HTTP client")?;
        Ok(client.with_login_path(self.login_path()))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.api_base_url(), DEFAULT_API_BASE_URL);
        assert_eq!(config.login_path(), "/login");
        assert_eq!(config.storage, StorageBackend::File);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.json")).unwrap();
        assert!(config.api_base_url.is_none());
        assert_eq!(config.storage, StorageBackend::File);
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nursy").join("config.json");

        let config = Config {
            api_base_url: Some("https://api.nursy.example".to_string()),
            login_path: Some("/signin".to_string()),
            token_secret: None,
            storage: StorageBackend::Keyring,
        };
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.api_base_url(), "https://api.nursy.example");
        assert_eq!(loaded.login_path(), "/signin");
        assert_eq!(loaded.storage, StorageBackend::Keyring);
    }

    #[test]
    fn test_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"storage": "memory"}"#).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.storage, StorageBackend::Memory);
        assert_eq!(config.api_base_url(), DEFAULT_API_BASE_URL);
    }

    #[test]
    fn test_invalid_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("NURSY_API_BASE_URL", "http://127.0.0.1:9000"),
            ("NURSY_STORAGE", "Memory"),
            ("NURSY_TOKEN_SECRET", "s3cret"),
        ]);

        let mut config = Config {
            login_path: Some("/signin".to_string()),
            ..Config::default()
        };
        config
            .apply_overrides(|name| env.get(name).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.api_base_url(), "http://127.0.0.1:9000");
        assert_eq!(config.storage, StorageBackend::Memory);
        assert_eq!(config.token_secret.as_deref(), Some("s3cret"));
        // Untouched when the variable is unset
        assert_eq!(config.login_path(), "/signin");
    }

    #[test]
    fn test_env_invalid_storage() {
        let mut config = Config::default();
        let result = config.apply_overrides(|name| {
            (name == "NURSY_STORAGE").then(|| "floppy".to_string())
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_storage_backend_parse_and_display() {
        assert_eq!("file".parse::<StorageBackend>().unwrap(), StorageBackend::File);
        assert_eq!(" KEYRING ".parse::<StorageBackend>().unwrap(), StorageBackend::Keyring);
        assert_eq!(StorageBackend::Memory.to_string(), "memory");
    }

    #[test]
    fn test_memory_backend_builds_client() {
        let config = Config {
            storage: StorageBackend::Memory,
            login_path: Some("/signin".to_string()),
            ..Config::default()
        };
        let client = config.api_client().unwrap();
        assert_eq!(client.login_path(), "/signin");
        assert_eq!(client.base_url(), DEFAULT_API_BASE_URL);
        assert_eq!(client.session().current().unwrap(), None);
    }
}
