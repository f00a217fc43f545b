//! CID (Content Identifier) utilities
//!
//! Creates content-addressed identifiers using SHA2-256

use cid::Cid;
use multihash_codetable::{Code, MultihashDigest};

/// Supported IPLD codecs
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CidCodec {
    /// Raw binary data (0x55)
    #[default]
    Raw,
    /// DAG-CBOR (0x71)
    DagCbor,
}

impl CidCodec {
    /// Get the multicodec code
    pub fn code(&self) -> u64 {
        match self {
            CidCodec::Raw => 0x55,
            CidCodec::DagCbor => 0x71,
        }
    }

    /// Parse from multicodec code
    pub fn from_code(code: u64) -> Option<Self> {
        match code {
            0x55 => Some(CidCodec::Raw),
            0x71 => Some(CidCodec::DagCbor),
            _ => None,
        }
    }

    /// Get a human-readable name
    pub fn name(&self) -> &'static str {
        match self {
            CidCodec::Raw => "raw",
            CidCodec::DagCbor => "dag-cbor",
        }
    }
}

/// Create a CIDv1 from data using a SHA2-256 multihash
pub fn create_cid(data: &[u8], codec: CidCodec) -> Cid {
    let multihash = Code::Sha2_256.digest(data);
    Cid::new_v1(codec.code(), multihash)
}

/// Verify that data matches a CID
pub fn verify_cid(data: &[u8], cid: &Cid) -> bool {
    match CidCodec::from_code(cid.codec()) {
        Some(codec) => create_cid(data, codec) == *cid,
        None => false,
    }
}

/// Parse a CID from a string
pub fn parse_cid(s: &str) -> Result<Cid, crate::BlockStoreError> {
    s.parse()
        .map_err(|e: cid::Error| crate::BlockStoreError::InvalidCid(e.to_string()))
}

/// Get the codec of a CID
pub fn get_codec(cid: &Cid) -> Option<CidCodec> {
    CidCodec::from_code(cid.codec())
}

/// Read the last four bytes of a digest as a little-endian `u32`.
///
/// Digests shorter than four bytes are read as far as they go.
pub fn digest_tail_u32(digest: &[u8]) -> u32 {
    let tail = &digest[digest.len().saturating_sub(4)..];
    tail.iter()
        .rev()
        .fold(0u32, |acc, byte| (acc << 8) | u32::from(*byte))
}

/// SHA2-256 over `data`, reduced with [`digest_tail_u32`]
pub fn hash_tail_u32(data: &[u8]) -> u32 {
    let multihash = Code::Sha2_256.digest(data);
    digest_tail_u32(multihash.digest())
}
