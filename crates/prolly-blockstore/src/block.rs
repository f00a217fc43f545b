//! Block types

use crate::cid_utils::{create_cid, verify_cid, CidCodec};
use bytes::Bytes;
use cid::Cid;

/// A block of encoded data with its CID
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Block {
    /// The content identifier
    pub cid: Cid,
    /// The encoded bytes
    pub data: Bytes,
}

impl Block {
    /// Create a new block from a known CID
    pub fn new(cid: Cid, data: Bytes) -> Self {
        Self { cid, data }
    }

    /// Create a block from raw bytes (computes CID)
    pub fn from_data(data: impl Into<Bytes>, codec: CidCodec) -> Self {
        let data = data.into();
        let cid = create_cid(&data, codec);
        Self { cid, data }
    }

    /// Get the size of the block
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Check if the block is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Get the data as a slice
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Check that the data hashes to the CID
    pub fn verify(&self) -> bool {
        verify_cid(&self.data, &self.cid)
    }
}
