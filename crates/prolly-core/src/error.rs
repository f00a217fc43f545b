//! Error types for the prolly-core crate

use cid::Cid;
use thiserror::Error;

/// Result type alias using `CoreError`
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors that can occur in tree operations
#[derive(Error, Debug)]
pub enum CoreError {
    /// Point lookup for a key the tree does not hold
    #[error("key not found")]
    NotFound,

    /// A decoded block is neither a leaf nor a branch
    #[error("malformed node {cid}: {reason}")]
    MalformedNode { cid: Cid, reason: String },

    /// Programmer error caught at the violation site
    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    /// The chunker closed every entry at every height and the tree cannot converge to a root
    #[error("chunker never produced a single root (gave up at height {height})")]
    ChunkerDiverged { height: u32 },

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Block store error
    #[error("block store error: {0}")]
    BlockStore(#[from] prolly_blockstore::BlockStoreError),
}

impl CoreError {
    /// Whether this is the expected "missing key" read error
    pub fn is_not_found(&self) -> bool {
        matches!(self, CoreError::NotFound)
    }

    pub(crate) fn malformed(cid: Cid, reason: impl Into<String>) -> Self {
        CoreError::MalformedNode {
            cid,
            reason: reason.into(),
        }
    }
}

impl From<ipld_core::serde::SerdeError> for CoreError {
    fn from(err: ipld_core::serde::SerdeError) -> Self {
        CoreError::Serialization(err.to_string())
    }
}
