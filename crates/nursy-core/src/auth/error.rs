use thiserror::Error;

use crate::storage::StorageError;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Failed to encode token: {0}")]
    Encode(String),

    #[error("No token present")]
    Missing,

    #[error("Malformed token: expected 3 segments, found {0}")]
    Malformed(usize),

    #[error("Invalid token payload: {0}")]
    Payload(String),
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}
