//! Shared tree context: schema, chunker, content store and node cache

use super::cache::{NoCache, NodeCache};
use super::chunker::Chunker;
use super::node::Node;
use super::schema::TreeSchema;
use crate::Result;
use cid::Cid;
use prolly_blockstore::{Block, BlockStore};
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// Everything a tree needs to read, build and persist nodes
///
/// Cheap to clone; all collaborators sit behind `Arc`s.
pub struct TreeContext<S: TreeSchema> {
    schema: Arc<S>,
    chunker: Arc<dyn Chunker>,
    store: Arc<dyn BlockStore>,
    cache: Arc<dyn NodeCache<S>>,
}

impl<S: TreeSchema> TreeContext<S> {
    /// Create a context without a node cache
    pub fn new(schema: S, chunker: impl Chunker + 'static, store: Arc<dyn BlockStore>) -> Self {
        Self {
            schema: Arc::new(schema),
            chunker: Arc::new(chunker),
            store,
            cache: Arc::new(NoCache),
        }
    }

    /// Replace the node cache
    pub fn with_cache(mut self, cache: Arc<dyn NodeCache<S>>) -> Self {
        self.cache = cache;
        self
    }

    /// Replace the chunker
    ///
    /// Trees built with different chunkers do not share structure.
    pub fn with_chunker(mut self, chunker: impl Chunker + 'static) -> Self {
        self.chunker = Arc::new(chunker);
        self
    }

    pub fn schema(&self) -> &S {
        &self.schema
    }

    pub fn chunker(&self) -> &dyn Chunker {
        self.chunker.as_ref()
    }

    pub fn store(&self) -> &Arc<dyn BlockStore> {
        &self.store
    }

    pub fn cache(&self) -> &Arc<dyn NodeCache<S>> {
        &self.cache
    }

    /// Compare two keys with the schema order
    pub fn compare(&self, a: &S::Key, b: &S::Key) -> Ordering {
        self.schema.compare(a, b)
    }

    /// Load a node by address, consulting the cache first
    pub async fn get_node(&self, cid: &Cid) -> Result<Arc<Node<S>>> {
        if let Some(node) = self.cache.get(cid) {
            trace!(%cid, "node cache hit");
            return Ok(node);
        }

        let data = self.store.get_block(cid).await?;
        trace!(%cid, size = data.len(), "loaded node block");
        let node = Arc::new(Node::<S>::decode(&self.schema, Block::new(*cid, data))?);
        self.cache.set(Arc::clone(&node));
        Ok(node)
    }

    /// Persist blocks to the store
    pub async fn put_blocks(&self, blocks: &[Block]) -> Result<()> {
        self.store.put_many(blocks).await?;
        Ok(())
    }
}

impl<S: TreeSchema> Clone for TreeContext<S> {
    fn clone(&self) -> Self {
        Self {
            schema: Arc::clone(&self.schema),
            chunker: Arc::clone(&self.chunker),
            store: Arc::clone(&self.store),
            cache: Arc::clone(&self.cache),
        }
    }
}

impl<S: TreeSchema> fmt::Debug for TreeContext<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TreeContext")
            .field("schema", &std::any::type_name::<S>())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prolly::cache::SharedNodeCache;
    use crate::prolly::entry::Entry;
    use crate::prolly::map::MapSchema;
    use crate::CoreError;
    use prolly_blockstore::{BlockStoreError, MemoryBlockStore};

    type Schema = MapSchema<String, u64>;

    #[tokio::test]
    async fn test_get_node_populates_cache() {
        let store = Arc::new(MemoryBlockStore::new());
        let cache = Arc::new(SharedNodeCache::<Schema>::new());
        let ctx = TreeContext::new(Schema::new(), |_: u32, _: u32| false, store.clone())
            .with_cache(cache.clone());

        let node = Node::leaf(ctx.schema(), vec![Entry::new("a".to_string(), 1)], false).unwrap();
        ctx.put_blocks(&[node.block().clone()]).await.unwrap();

        let loaded = ctx.get_node(node.cid()).await.unwrap();
        assert_eq!(loaded.cid(), node.cid());
        assert!(cache.has(node.cid()));

        // Served from the cache once the block is gone.
        store.clear();
        assert!(ctx.get_node(node.cid()).await.is_ok());
    }

    #[tokio::test]
    async fn test_missing_block_propagates_store_error() {
        let store = Arc::new(MemoryBlockStore::new());
        let ctx = TreeContext::new(Schema::new(), |_: u32, _: u32| false, store);
        let missing = prolly_blockstore::create_cid(b"missing", prolly_blockstore::CidCodec::DagCbor);

        let result = ctx.get_node(&missing).await;
        assert!(matches!(
            result,
            Err(CoreError::BlockStore(BlockStoreError::NotFound(_)))
        ));
    }
}
