//! Core library for the Nursy client.
//!
//! This crate provides the client-side session layer used by the Nursy
//! front end:
//!
//! - `auth`: session token issue/decode/expiry and the `Session` slot
//! - `storage`: pluggable token stores (memory, file, OS keychain)
//! - `api`: the `ApiClient` request gateway with bearer injection and
//!   uniform 401 handling
//! - `config`: on-disk and environment configuration

pub mod api;
pub mod auth;
pub mod config;
pub mod storage;

pub use api::{ApiClient, ApiError, ApiResponse, RequestOptions, SessionEvent};
pub use auth::{Claims, NewClaims, Session, SessionState, TokenCodec};
pub use config::Config;
pub use storage::{StorageError, TokenStore};
