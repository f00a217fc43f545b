//! Decoded node caches
//!
//! Caches only save decode work and store round trips. Every implementation
//! tolerates concurrent population: two readers racing on the same address
//! may both decode it, and the second `set` simply replaces the first.

use super::node::Node;
use super::schema::TreeSchema;
use cid::Cid;
use dashmap::DashMap;
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::Arc;

/// Address-keyed cache of decoded nodes
pub trait NodeCache<S: TreeSchema>: Send + Sync {
    /// Whether `cid` is cached
    fn has(&self, cid: &Cid) -> bool;

    /// Cached node for `cid`, if any
    fn get(&self, cid: &Cid) -> Option<Arc<Node<S>>>;

    /// Cache a node under its own address
    fn set(&self, node: Arc<Node<S>>);
}

/// Cache that never holds anything
#[derive(Clone, Copy, Debug, Default)]
pub struct NoCache;

impl<S: TreeSchema> NodeCache<S> for NoCache {
    fn has(&self, _cid: &Cid) -> bool {
        false
    }

    fn get(&self, _cid: &Cid) -> Option<Arc<Node<S>>> {
        None
    }

    fn set(&self, _node: Arc<Node<S>>) {}
}

/// Bounded least-recently-used cache
pub struct LruNodeCache<S: TreeSchema> {
    nodes: Mutex<LruCache<Cid, Arc<Node<S>>>>,
}

impl<S: TreeSchema> LruNodeCache<S> {
    /// Create a cache holding at most `capacity` nodes (at least one)
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            nodes: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.lock().is_empty()
    }
}

impl<S: TreeSchema> NodeCache<S> for LruNodeCache<S> {
    fn has(&self, cid: &Cid) -> bool {
        self.nodes.lock().contains(cid)
    }

    fn get(&self, cid: &Cid) -> Option<Arc<Node<S>>> {
        self.nodes.lock().get(cid).cloned()
    }

    fn set(&self, node: Arc<Node<S>>) {
        self.nodes.lock().put(*node.cid(), node);
    }
}

/// Unbounded cache that can be shared between many trees
pub struct SharedNodeCache<S: TreeSchema> {
    nodes: DashMap<Cid, Arc<Node<S>>>,
}

impl<S: TreeSchema> SharedNodeCache<S> {
    pub fn new() -> Self {
        Self {
            nodes: DashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn clear(&self) {
        self.nodes.clear();
    }
}

impl<S: TreeSchema> Default for SharedNodeCache<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: TreeSchema> NodeCache<S> for SharedNodeCache<S> {
    fn has(&self, cid: &Cid) -> bool {
        self.nodes.contains_key(cid)
    }

    fn get(&self, cid: &Cid) -> Option<Arc<Node<S>>> {
        self.nodes.get(cid).map(|node| Arc::clone(node.value()))
    }

    fn set(&self, node: Arc<Node<S>>) {
        self.nodes.insert(*node.cid(), node);
    }
}
