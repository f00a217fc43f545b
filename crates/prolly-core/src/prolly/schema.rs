//! Engine parameterization
//!
//! A [`TreeSchema`] supplies everything that differs between concrete trees:
//! the key and value types, the key order, how a leaf entry is written into a
//! node block and how entries are reduced to the `u32` identity the chunker
//! sees. The build and transaction algorithms never look past this trait.

use super::entry::{BranchEntry, Entry, LeafEntry};
use crate::{CoreError, Result};
use ipld_core::ipld::Ipld;
use prolly_blockstore::codec;
use serde::{de::DeserializeOwned, Serialize};
use std::cmp::Ordering;
use std::fmt::Debug;

/// Bounds shared by keys and values
pub trait Payload: Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static {}

impl<T> Payload for T where T: Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static {}

/// Policy object for a concrete tree
pub trait TreeSchema: Send + Sync + 'static {
    /// Key type
    type Key: Payload;
    /// Leaf value type
    type Value: Payload;

    /// Total order over keys
    fn compare(&self, a: &Self::Key, b: &Self::Key) -> Ordering;

    /// Chunker identity of a leaf entry
    fn leaf_identity(&self, entry: &LeafEntry<Self::Key, Self::Value>) -> Result<u32> {
        entry_identity(entry)
    }

    /// Chunker identity of a branch entry
    fn branch_identity(&self, entry: &BranchEntry<Self::Key>) -> Result<u32> {
        entry_identity(entry)
    }

    /// Block representation of a leaf entry, `[key, value]` by default
    fn encode_leaf_entry(&self, entry: &LeafEntry<Self::Key, Self::Value>) -> Result<Ipld> {
        Ok(ipld_core::serde::to_ipld(entry)?)
    }

    /// Inverse of [`TreeSchema::encode_leaf_entry`]
    fn decode_leaf_entry(&self, ipld: Ipld) -> Result<LeafEntry<Self::Key, Self::Value>> {
        Ok(ipld_core::serde::from_ipld(ipld)?)
    }
}

/// SHA2-256 over the DAG-CBOR encoding of `[key, payload]`, last four digest bytes little-endian
pub fn entry_identity<K: Serialize, P: Serialize>(entry: &Entry<K, P>) -> Result<u32> {
    codec::identity(entry).map_err(CoreError::from)
}
