//! Sparse arrays: maps from `u64` index to value

use super::config::ProllyConfig;
use super::entry::Entry;
use super::schema::{Payload, TreeSchema};
use super::transaction::Mutation;
use super::tree::ProllyTree;
use crate::Result;
use cid::Cid;
use prolly_blockstore::BlockStore;
use std::cmp::Ordering;
use std::marker::PhantomData;
use std::sync::Arc;

/// Schema for index-keyed trees
pub struct SparseArraySchema<V> {
    _marker: PhantomData<fn() -> V>,
}

impl<V> SparseArraySchema<V> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<V> Default for SparseArraySchema<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Payload> TreeSchema for SparseArraySchema<V> {
    type Key = u64;
    type Value = V;

    fn compare(&self, a: &u64, b: &u64) -> Ordering {
        a.cmp(b)
    }
}

/// A persistent sparse array
#[derive(Clone, Debug)]
pub struct SparseArray<V: Payload> {
    tree: ProllyTree<SparseArraySchema<V>>,
}

impl<V: Payload> SparseArray<V> {
    /// Build and persist an array from `(index, value)` pairs
    pub async fn create(
        config: &ProllyConfig,
        store: Arc<dyn BlockStore>,
        items: impl IntoIterator<Item = (u64, V)>,
    ) -> Result<Self> {
        let ctx = config.context(SparseArraySchema::new(), store)?;
        let entries = items.into_iter().map(Entry::from).collect();
        Ok(Self {
            tree: ProllyTree::from_entries(ctx, entries).await?,
        })
    }

    /// Open a persisted array
    pub async fn load(config: &ProllyConfig, store: Arc<dyn BlockStore>, root: Cid) -> Result<Self> {
        let ctx = config.context(SparseArraySchema::new(), store)?;
        Ok(Self {
            tree: ProllyTree::load(ctx, root).await?,
        })
    }

    pub fn tree(&self) -> &ProllyTree<SparseArraySchema<V>> {
        &self.tree
    }

    pub fn root_cid(&self) -> &Cid {
        self.tree.root_cid()
    }

    pub async fn get(&self, index: u64) -> Result<Option<V>> {
        self.tree.get(&index).await
    }

    /// Set a slot, returning its previous value
    pub async fn set(&mut self, index: u64, value: V) -> Result<Option<V>> {
        let previous = self.tree.apply(vec![Mutation::put(index, value)]).await?;
        Ok(previous.into_iter().next().map(|entry| entry.value))
    }

    /// Clear a slot, returning its previous value
    pub async fn remove(&mut self, index: u64) -> Result<Option<V>> {
        let previous = self.tree.apply(vec![Mutation::delete(index)]).await?;
        Ok(previous.into_iter().next().map(|entry| entry.value))
    }

    /// Apply a batch of slot changes
    pub async fn apply(&mut self, mutations: Vec<Mutation<u64, V>>) -> Result<Vec<(u64, V)>> {
        let previous = self.tree.apply(mutations).await?;
        Ok(previous.into_iter().map(Entry::into_pair).collect())
    }

    /// Occupied slots with `start <= index <= end`
    pub async fn get_range(&self, start: u64, end: u64) -> Result<Vec<(u64, V)>> {
        let entries = self.tree.get_range_entries(&start, &end).await?;
        Ok(entries.into_iter().map(Entry::into_pair).collect())
    }

    /// One past the highest occupied index, 0 when empty
    ///
    /// Follows the right spine only.
    pub async fn get_length(&self) -> Result<u64> {
        let ctx = self.tree.context();
        let mut node = Arc::clone(self.tree.root());
        loop {
            let last_child = node
                .branch_entries()
                .and_then(|list| list.last())
                .map(|entry| entry.value);
            match last_child {
                Some(cid) => node = ctx.get_node(&cid).await?,
                None => break,
            }
        }
        Ok(node
            .leaf_entries()
            .and_then(|list| list.last())
            .map_or(0, |entry| entry.key + 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prolly_blockstore::MemoryBlockStore;

    fn config() -> ProllyConfig {
        ProllyConfig {
            branching_factor: 3,
            ..Default::default()
        }
    }

    const INDICES: [u64; 10] = [1, 2, 10, 15, 20, 200, 210, 290, 300, 10000];

    async fn array() -> SparseArray<String> {
        let store = Arc::new(MemoryBlockStore::new());
        let items = INDICES.iter().map(|i| (*i, "value".to_string()));
        SparseArray::create(&config(), store, items).await.unwrap()
    }

    #[tokio::test]
    async fn test_get_length() {
        let mut array = array().await;
        assert_eq!(array.get_length().await.unwrap(), 10001);

        array.set(20000, "x".to_string()).await.unwrap();
        assert_eq!(array.get_length().await.unwrap(), 20001);
    }

    #[tokio::test]
    async fn test_empty_length_is_zero() {
        let store = Arc::new(MemoryBlockStore::new());
        let array = SparseArray::<String>::create(&config(), store, []).await.unwrap();
        assert_eq!(array.get_length().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_range() {
        let array = array().await;
        let range = array.get_range(2, 400).await.unwrap();
        let indices: Vec<u64> = range.iter().map(|(i, _)| *i).collect();
        assert_eq!(indices, INDICES[1..9].to_vec());
    }

    #[tokio::test]
    async fn test_set_and_remove() {
        let mut array = array().await;
        assert_eq!(array.get(3).await.unwrap(), None);
        assert_eq!(array.set(3, "three".to_string()).await.unwrap(), None);
        assert_eq!(array.get(3).await.unwrap(), Some("three".to_string()));
        assert_eq!(
            array.remove(10000).await.unwrap(),
            Some("value".to_string())
        );
        assert_eq!(array.get_length().await.unwrap(), 301);
    }
}
