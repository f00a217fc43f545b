//! Error types for the prolly-blockstore crate

use cid::Cid;
use thiserror::Error;

/// Result type alias using `BlockStoreError`
pub type Result<T> = std::result::Result<T, BlockStoreError>;

/// Errors that can occur during block storage operations
#[derive(Error, Debug)]
pub enum BlockStoreError {
    /// Block not found
    #[error("block not found: {0}")]
    NotFound(Cid),

    /// Invalid CID
    #[error("invalid CID: {0}")]
    InvalidCid(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization error
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// Block bytes do not hash to the CID they were stored under
    #[error("hash mismatch: expected {expected}, got {actual}")]
    HashMismatch { expected: String, actual: String },

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl<E: std::fmt::Debug> From<serde_ipld_dagcbor::EncodeError<E>> for BlockStoreError {
    fn from(err: serde_ipld_dagcbor::EncodeError<E>) -> Self {
        BlockStoreError::Serialization(format!("{err:?}"))
    }
}

impl<E: std::fmt::Debug> From<serde_ipld_dagcbor::DecodeError<E>> for BlockStoreError {
    fn from(err: serde_ipld_dagcbor::DecodeError<E>) -> Self {
        BlockStoreError::Deserialization(format!("{err:?}"))
    }
}
