//! Authentication module for managing the client session.
//!
//! This module provides:
//! - `TokenCodec`: issues and decodes three-segment session tokens
//! - `Session`: the single persisted token slot with expiry checks
//! - `Clock`: injectable time source used for expiry
//!
//! Tokens expire 24 hours after issue and are never refreshed in place.

pub mod claims;
pub mod clock;
pub mod codec;
pub mod error;
pub mod session;

pub use claims::{Claims, NewClaims};
pub use clock::{Clock, ManualClock, SystemClock};
pub use codec::{TokenCodec, SESSION_TTL_SECS};
pub use error::{CodecError, SessionError};
pub use session::{Session, SessionState, TOKEN_STORAGE_KEY};
