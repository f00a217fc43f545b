//! # Prolly Blockstore
//!
//! Content-addressed block storage for prolly trees.
//!
//! This crate provides:
//! - **Block operations**: Put, get, and delete encoded blocks by CID
//! - **Codec**: Deterministic DAG-CBOR encoding addressed with SHA2-256 CIDs
//! - **Identities**: Content-derived `u32` values used by tree chunkers
//! - **Caching**: In-memory LRU cache for hot blocks
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │            Prolly Tree Engine           │
//! ├─────────────────────────────────────────┤
//! │      codec (encode / decode / cid)      │
//! ├─────────────────────────────────────────┤
//! │           BlockStore Trait              │
//! ├────────────────────┬────────────────────┤
//! │  MemoryBlockStore  │  CachedBlockStore  │
//! └────────────────────┴────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use prolly_blockstore::{codec, BlockStore, MemoryBlockStore};
//!
//! let store = MemoryBlockStore::new();
//! let block = codec::encode(&("key", 1))?;
//! store.put_block(&block).await?;
//! let bytes = store.get_block(&block.cid).await?;
//! ```

pub mod block;
pub mod cid_utils;
pub mod codec;
pub mod error;
pub mod memory;

pub use block::Block;
pub use cid_utils::{create_cid, digest_tail_u32, CidCodec};
pub use error::{BlockStoreError, Result};
pub use memory::{CachedBlockStore, MemoryBlockStore};

use async_trait::async_trait;
use bytes::Bytes;
use cid::Cid;

/// Trait for block storage backends
///
/// Implementations must tolerate concurrent `get_block` calls for the same CID.
#[async_trait]
pub trait BlockStore: Send + Sync {
    /// Store a block under its CID
    async fn put_block(&self, block: &Block) -> Result<()>;

    /// Retrieve a block by CID
    async fn get_block(&self, cid: &Cid) -> Result<Bytes>;

    /// Check if a block exists
    async fn has_block(&self, cid: &Cid) -> Result<bool>;

    /// Delete a block
    async fn delete_block(&self, cid: &Cid) -> Result<()>;

    /// Get block size without retrieving content
    async fn block_size(&self, cid: &Cid) -> Result<u64>;

    /// Store every block in order
    async fn put_many(&self, blocks: &[Block]) -> Result<()> {
        for block in blocks {
            self.put_block(block).await?;
        }
        Ok(())
    }
}
