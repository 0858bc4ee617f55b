use keyring::Entry;

use super::{StorageError, TokenStore};

const SERVICE_NAME: &str = "nursy";

/// Token store backed by the OS keychain, one entry per key.
#[derive(Debug, Clone)]
pub struct KeyringStore {
    service: String,
}

impl Default for KeyringStore {
    fn default() -> Self {
        Self::new(SERVICE_NAME)
    }
}

impl KeyringStore {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, key: &str) -> Result<Entry, StorageError> {
        Entry::new(&self.service, key).map_err(|e| {
            StorageError::Unavailable(format!("Failed to create keyring entry: {}", e))
        })
    }
}

impl TokenStore for KeyringStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(StorageError::Unavailable(format!(
                "Failed to retrieve token from keychain: {}",
                e
            ))),
        }
    }

    /// Store `value` and read it back through a fresh entry. A keychain that
    /// accepts the write but cannot return it (keyring's mock store) is
    /// reported as unavailable instead of losing the token.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entry(key)?.set_password(value).map_err(|e| {
            StorageError::Unavailable(format!("Failed to store token in keychain: {}", e))
        })?;

        match self.get(key)? {
            Some(stored) if stored == value => Ok(()),
            _ => Err(StorageError::Unavailable(
                "Keychain did not persist the token (no platform credential store)".to_string(),
            )),
        }
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(StorageError::Unavailable(format!(
                "Failed to delete token from keychain: {}",
                e
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_SERVICE: &str = "nursy-test";

    #[test]
    fn test_keyring_store_roundtrip_or_unavailable() {
        let store = KeyringStore::new(TEST_SERVICE);

        // Headless CI may have no usable keychain; a failed write must then
        // be an explicit error, never a silent success
        match store.set("auth_token_roundtrip", "a.b.c") {
            Ok(()) => {
                assert_eq!(
                    store.get("auth_token_roundtrip").unwrap().as_deref(),
                    Some("a.b.c")
                );
                store.remove("auth_token_roundtrip").unwrap();
                assert_eq!(store.get("auth_token_roundtrip").unwrap(), None);
            }
            Err(e) => assert!(matches!(e, StorageError::Unavailable(_))),
        }
    }

    #[test]
    fn test_keyring_store_session_login_is_never_lost() {
        use crate::auth::{NewClaims, Session, SessionState, TokenCodec};
        use std::sync::Arc;

        let store = KeyringStore::new(TEST_SERVICE);
        let session = Session::new(Arc::new(store.clone()), TokenCodec::default());

        if session.login(&NewClaims::new("42")).is_ok() {
            assert!(matches!(session.state(), Ok(SessionState::Active(_))));
            session.logout();
        }
    }
}
