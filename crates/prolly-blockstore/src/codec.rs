//! DAG-CBOR block codec
//!
//! `encode` and `decode` are deterministic and mutually inverse: the same value
//! always produces the same bytes and therefore the same CID.

use crate::cid_utils::{create_cid, get_codec, hash_tail_u32, CidCodec};
use crate::{Block, BlockStoreError, Result};
use bytes::Bytes;
use serde::{de::DeserializeOwned, Serialize};

/// Encode a value as DAG-CBOR and address it with a CIDv1 (dag-cbor, sha2-256)
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Block> {
    let data = serde_ipld_dagcbor::to_vec(value)?;
    Ok(Block::from_data(Bytes::from(data), CidCodec::DagCbor))
}

/// Decode DAG-CBOR bytes
pub fn decode<T: DeserializeOwned>(data: &[u8]) -> Result<T> {
    Ok(serde_ipld_dagcbor::from_slice(data)?)
}

/// Decode a block after checking its data against its CID
pub fn verify_block<T: DeserializeOwned>(block: &Block) -> Result<T> {
    if !block.verify() {
        return Err(BlockStoreError::HashMismatch {
            expected: block.cid.to_string(),
            actual: create_cid(&block.data, get_codec(&block.cid).unwrap_or_default()).to_string(),
        });
    }
    decode(&block.data)
}

/// Content identity of a value: SHA2-256 over its DAG-CBOR encoding, last four
/// digest bytes read little-endian.
pub fn identity<T: Serialize + ?Sized>(value: &T) -> Result<u32> {
    let data = serde_ipld_dagcbor::to_vec(value)?;
    Ok(hash_tail_u32(&data))
}
