use std::sync::Arc;

use tracing::{info, warn};

use super::{Claims, NewClaims, SessionError, TokenCodec};
use crate::storage::{StorageError, TokenStore};

/// Storage key holding the raw session token.
pub const TOKEN_STORAGE_KEY: &str = "auth_token";

/// What the token slot currently holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// Nothing stored.
    Absent,
    Active(Claims),
    Expired(Claims),
    /// A value is stored but it does not decode as a token.
    Corrupted,
}

impl SessionState {
    pub fn is_active(&self) -> bool {
        matches!(self, SessionState::Active(_))
    }

    pub fn claims(&self) -> Option<&Claims> {
        match self {
            SessionState::Active(claims) | SessionState::Expired(claims) => Some(claims),
            SessionState::Absent | SessionState::Corrupted => None,
        }
    }
}

/// The single persisted session slot.
/// Clone is cheap - the store is shared behind an Arc.
#[derive(Clone)]
pub struct Session {
    store: Arc<dyn TokenStore>,
    codec: TokenCodec,
}

impl Session {
    pub fn new(store: Arc<dyn TokenStore>, codec: TokenCodec) -> Self {
        Self { store, codec }
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    /// Save a token, replacing any previous one
    pub fn save(&self, token: &str) -> Result<(), StorageError> {
        self.store.set(TOKEN_STORAGE_KEY, token)
    }

    /// Get the stored token, if any
    pub fn current(&self) -> Result<Option<String>, StorageError> {
        self.store.get(TOKEN_STORAGE_KEY)
    }

    /// Clear session data
    pub fn clear(&self) -> Result<(), StorageError> {
        self.store.remove(TOKEN_STORAGE_KEY)
    }

    /// `save`, treating a storage failure as a no-op.
    pub fn save_quietly(&self, token: &str) {
        if let Err(e) = self.save(token) {
            warn!(error = %e, "Failed to save session token");
        }
    }

    /// `current`, treating a storage failure as no session.
    pub fn current_or_none(&self) -> Option<String> {
        self.current().unwrap_or_else(|e| {
            warn!(error = %e, "Failed to read session token");
            None
        })
    }

    /// `clear`, treating a storage failure as a no-op.
    pub fn clear_quietly(&self) {
        if let Err(e) = self.clear() {
            warn!(error = %e, "Failed to clear session token");
        }
    }

    /// Issue a token for `claims` and store it as the current session.
    pub fn login(&self, claims: &NewClaims) -> Result<String, SessionError> {
        let token = self.codec.issue(claims)?;
        self.save(&token)?;
        info!(sub = ?claims.sub, "Session started");
        Ok(token)
    }

    pub fn logout(&self) {
        self.clear_quietly();
        info!("Session ended");
    }

    pub fn state(&self) -> Result<SessionState, StorageError> {
        let Some(token) = self.current()? else {
            return Ok(SessionState::Absent);
        };

        Ok(match self.codec.decode(Some(token.as_str())) {
            Ok(claims) if claims.is_expired_at(self.codec.now()) => SessionState::Expired(claims),
            Ok(claims) => SessionState::Active(claims),
            Err(_) => SessionState::Corrupted,
        })
    }

    /// Get the bearer token if the session is valid (stored and unexpired)
    pub fn valid_token(&self) -> Option<String> {
        self.current_or_none()
            .filter(|token| !self.codec.is_expired(Some(token.as_str())))
    }
}
