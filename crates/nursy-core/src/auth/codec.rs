//! Session token encoding.
//!
//! A token is three segments joined by `.`: a constant header, the JSON
//! claims payload, and the signing secret. Each segment is encoded on its
//! own as URL-safe base64. The signature segment is NOT a MAC over the
//! header and payload, so tokens are trivially forgeable; they only model
//! a demo login.

use std::fmt;
use std::sync::Arc;

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use serde::Serialize;
use tracing::debug;

use super::{Claims, Clock, CodecError, NewClaims, SystemClock};

/// Token lifetime: exactly 24 hours after issue.
pub const SESSION_TTL_SECS: i64 = 86_400;

/// Secret used for the signature segment when none is configured.
pub const DEFAULT_SIGNING_SECRET: &str = "nursy-demo-secret";

const SEGMENT_SEPARATOR: &str = ".";

/// Encodes without padding, accepts padded and unpadded input.
const SEGMENT_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::URL_SAFE,
    GeneralPurposeConfig::new()
        .with_encode_padding(false)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

#[derive(Serialize)]
struct TokenHeader {
    alg: &'static str,
    typ: &'static str,
}

const TOKEN_HEADER: TokenHeader = TokenHeader {
    alg: "HS256",
    typ: "JWT",
};

#[derive(Clone)]
pub struct TokenCodec {
    secret: String,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenCodec")
            .field("secret", &"<redacted>")
            .field("clock", &self.clock)
            .finish()
    }
}

impl Default for TokenCodec {
    fn default() -> Self {
        Self::new(DEFAULT_SIGNING_SECRET)
    }
}

impl TokenCodec {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the time source used for `iat` and expiry checks.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn now(&self) -> i64 {
        self.clock.now()
    }

    /// Issue a token for `claims`, valid for `SESSION_TTL_SECS` from now.
    pub fn issue(&self, claims: &NewClaims) -> Result<String, CodecError> {
        let iat = self.clock.now();
        let payload = Claims::from_new(claims, iat, iat + SESSION_TTL_SECS);

        let header = serde_json::to_vec(&TOKEN_HEADER)
            .map_err(|e| CodecError::Encode(e.to_string()))?;
        let body = serde_json::to_vec(&payload).map_err(|e| CodecError::Encode(e.to_string()))?;

        let token = [
            SEGMENT_ENGINE.encode(header),
            SEGMENT_ENGINE.encode(body),
            SEGMENT_ENGINE.encode(self.secret.as_bytes()),
        ]
        .join(SEGMENT_SEPARATOR);

        debug!(sub = ?payload.sub, exp = payload.exp, "Issued session token");
        Ok(token)
    }

    /// Like `issue`, but an encoding failure yields an empty string.
    pub fn issue_or_empty(&self, claims: &NewClaims) -> String {
        self.issue(claims).unwrap_or_else(|e| {
            debug!(error = %e, "Token issue failed");
            String::new()
        })
    }

    /// Decode the claims of `token`. Only the structure and the payload are
    /// checked; the header and signature segments are not inspected.
    pub fn decode(&self, token: Option<&str>) -> Result<Claims, CodecError> {
        let result = decode_claims(token);
        if let Err(ref e) = result {
            debug!(error = %e, "Failed to decode session token");
        }
        result
    }

    /// True for absent or undecodable tokens and for tokens whose `exp` is
    /// at or before now.
    pub fn is_expired(&self, token: Option<&str>) -> bool {
        match self.decode(token) {
            Ok(claims) => claims.is_expired_at(self.clock.now()),
            Err(_) => true,
        }
    }
}

fn decode_claims(token: Option<&str>) -> Result<Claims, CodecError> {
    let token = token.filter(|t| !t.is_empty()).ok_or(CodecError::Missing)?;

    let segments: Vec<&str> = token.split(SEGMENT_SEPARATOR).collect();
    if segments.len() != 3 {
        return Err(CodecError::Malformed(segments.len()));
    }

    let payload = SEGMENT_ENGINE
        .decode(segments[1])
        .map_err(|e| CodecError::Payload(format!("base64 decode error: {}", e)))?;

    serde_json::from_slice::<Claims>(&payload).map_err(|e| CodecError::Payload(e.to_string()))
}
