//! Content-defined chunking
//!
//! A chunker decides whether an entry closes the node it sits in. It sees only
//! the entry's identity and the height being built, so boundaries depend on
//! content alone and every batching of the same key set yields the same tree.

use crate::{CoreError, Result};
use serde::{Deserialize, Serialize};

/// Boundary predicate over `(identity, height)`
pub trait Chunker: Send + Sync {
    /// `true` if the entry with this identity ends its node at `height`
    fn is_boundary(&self, identity: u32, height: u32) -> bool;
}

impl<F> Chunker for F
where
    F: Fn(u32, u32) -> bool + Send + Sync,
{
    fn is_boundary(&self, identity: u32, height: u32) -> bool {
        self(identity, height)
    }
}

/// Reference chunker: on average one boundary every `factor` entries
///
/// An entry is a boundary when its identity is at most `u32::MAX / factor`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct BoundaryFactor {
    factor: u32,
    threshold: u32,
}

impl BoundaryFactor {
    /// Create a chunker with the given average fanout
    pub fn new(factor: u32) -> Result<Self> {
        if factor == 0 {
            return Err(CoreError::PreconditionFailed(
                "chunk factor must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            factor,
            threshold: u32::MAX / factor,
        })
    }

    pub fn factor(&self) -> u32 {
        self.factor
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }
}

impl Chunker for BoundaryFactor {
    fn is_boundary(&self, identity: u32, _height: u32) -> bool {
        identity <= self.threshold
    }
}

impl TryFrom<u32> for BoundaryFactor {
    type Error = CoreError;

    fn try_from(factor: u32) -> Result<Self> {
        Self::new(factor)
    }
}

impl From<BoundaryFactor> for u32 {
    fn from(chunker: BoundaryFactor) -> u32 {
        chunker.factor
    }
}
