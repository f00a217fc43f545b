//! Tree configuration

use super::cache::{LruNodeCache, NoCache, NodeCache};
use super::chunker::BoundaryFactor;
use super::context::TreeContext;
use super::schema::TreeSchema;
use super::DEFAULT_BRANCHING_FACTOR;
use crate::Result;
use prolly_blockstore::BlockStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Configuration for Prolly Tree behavior
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProllyConfig {
    /// Average entries per node; the chunk factor of [`BoundaryFactor`]
    pub branching_factor: u32,
    /// Decoded nodes kept in an LRU cache, 0 disables caching
    pub cache_capacity: usize,
}

impl Default for ProllyConfig {
    fn default() -> Self {
        Self {
            branching_factor: DEFAULT_BRANCHING_FACTOR,
            cache_capacity: 0,
        }
    }
}

impl ProllyConfig {
    /// The reference chunker for this configuration
    pub fn chunker(&self) -> Result<BoundaryFactor> {
        BoundaryFactor::new(self.branching_factor)
    }

    /// Node cache sized by `cache_capacity`
    pub fn cache<S: TreeSchema>(&self) -> Arc<dyn NodeCache<S>> {
        if self.cache_capacity == 0 {
            Arc::new(NoCache)
        } else {
            Arc::new(LruNodeCache::<S>::new(self.cache_capacity))
        }
    }

    /// Assemble a context for `schema` over `store`
    pub fn context<S: TreeSchema>(&self, schema: S, store: Arc<dyn BlockStore>) -> Result<TreeContext<S>> {
        Ok(TreeContext::new(schema, self.chunker()?, store).with_cache(self.cache()))
    }
}
