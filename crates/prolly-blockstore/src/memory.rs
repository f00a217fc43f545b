//! In-memory block store for testing and caching

use crate::{Block, BlockStore, BlockStoreError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use cid::Cid;
use dashmap::DashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;

/// An in-memory block store
#[derive(Clone, Default)]
pub struct MemoryBlockStore {
    blocks: Arc<DashMap<Cid, Bytes>>,
}

impl MemoryBlockStore {
    /// Create a new empty memory store
    pub fn new() -> Self {
        Self {
            blocks: Arc::new(DashMap::new()),
        }
    }

    /// Get the number of blocks stored
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Clear all blocks
    pub fn clear(&self) {
        self.blocks.clear();
    }

    /// Get total size of all blocks
    pub fn total_size(&self) -> u64 {
        self.blocks.iter().map(|entry| entry.value().len() as u64).sum()
    }

    /// List all CIDs
    pub fn list_cids(&self) -> Vec<Cid> {
        self.blocks.iter().map(|entry| *entry.key()).collect()
    }
}

#[async_trait]
impl BlockStore for MemoryBlockStore {
    async fn put_block(&self, block: &Block) -> Result<()> {
        if !block.verify() {
            return Err(BlockStoreError::HashMismatch {
                expected: block.cid.to_string(),
                actual: crate::cid_utils::create_cid(
                    &block.data,
                    crate::cid_utils::get_codec(&block.cid).unwrap_or_default(),
                )
                .to_string(),
            });
        }
        self.blocks.insert(block.cid, block.data.clone());
        Ok(())
    }

    async fn get_block(&self, cid: &Cid) -> Result<Bytes> {
        self.blocks
            .get(cid)
            .map(|entry| entry.value().clone())
            .ok_or(BlockStoreError::NotFound(*cid))
    }

    async fn has_block(&self, cid: &Cid) -> Result<bool> {
        Ok(self.blocks.contains_key(cid))
    }

    async fn delete_block(&self, cid: &Cid) -> Result<()> {
        self.blocks.remove(cid);
        Ok(())
    }

    async fn block_size(&self, cid: &Cid) -> Result<u64> {
        self.blocks
            .get(cid)
            .map(|entry| entry.value().len() as u64)
            .ok_or(BlockStoreError::NotFound(*cid))
    }
}

/// LRU-cached wrapper around any block store
pub struct CachedBlockStore<S: BlockStore> {
    inner: S,
    cache: Arc<parking_lot::Mutex<lru::LruCache<Cid, Bytes>>>,
}

impl<S: BlockStore> CachedBlockStore<S> {
    /// Create a new cached store with the given capacity (at least one block)
    pub fn new(inner: S, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner,
            cache: Arc::new(parking_lot::Mutex::new(lru::LruCache::new(capacity))),
        }
    }

    /// Clear the cache
    pub fn clear_cache(&self) {
        self.cache.lock().clear();
    }

    /// Number of cached blocks
    pub fn cache_len(&self) -> usize {
        self.cache.lock().len()
    }

    /// Access the wrapped store
    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: BlockStore> BlockStore for CachedBlockStore<S> {
    async fn put_block(&self, block: &Block) -> Result<()> {
        self.inner.put_block(block).await?;
        self.cache.lock().put(block.cid, block.data.clone());
        Ok(())
    }

    async fn get_block(&self, cid: &Cid) -> Result<Bytes> {
        if let Some(data) = self.cache.lock().get(cid) {
            tracing::trace!(%cid, "block cache hit");
            return Ok(data.clone());
        }

        let data = self.inner.get_block(cid).await?;
        self.cache.lock().put(*cid, data.clone());
        Ok(data)
    }

    async fn has_block(&self, cid: &Cid) -> Result<bool> {
        if self.cache.lock().contains(cid) {
            return Ok(true);
        }
        self.inner.has_block(cid).await
    }

    async fn delete_block(&self, cid: &Cid) -> Result<()> {
        self.cache.lock().pop(cid);
        self.inner.delete_block(cid).await
    }

    async fn block_size(&self, cid: &Cid) -> Result<u64> {
        if let Some(data) = self.cache.lock().get(cid) {
            return Ok(data.len() as u64);
        }
        self.inner.block_size(cid).await
    }
}
