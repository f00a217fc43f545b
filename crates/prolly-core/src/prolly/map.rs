//! Ordered key-value map

use super::config::ProllyConfig;
use super::entry::Entry;
use super::schema::{Payload, TreeSchema};
use super::transaction::Mutation;
use super::tree::ProllyTree;
use crate::{CoreError, Result};
use cid::Cid;
use prolly_blockstore::BlockStore;
use std::cmp::Ordering;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Schema for maps keyed by any `Ord` key; leaf entries are written as `[key, value]`
pub struct MapSchema<K, V> {
    _marker: PhantomData<fn() -> (K, V)>,
}

impl<K, V> MapSchema<K, V> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<K, V> Default for MapSchema<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Clone for MapSchema<K, V> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<K, V> fmt::Debug for MapSchema<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MapSchema")
    }
}

impl<K: Payload + Ord, V: Payload> TreeSchema for MapSchema<K, V> {
    type Key = K;
    type Value = V;

    fn compare(&self, a: &K, b: &K) -> Ordering {
        a.cmp(b)
    }
}

/// A persistent ordered map
///
/// Every write persists its new blocks and moves the map to the new root.
#[derive(Clone, Debug)]
pub struct ProllyMap<K: Payload + Ord, V: Payload> {
    tree: ProllyTree<MapSchema<K, V>>,
}

impl<K: Payload + Ord, V: Payload> ProllyMap<K, V> {
    /// Build and persist a map over `entries`
    pub async fn create(
        config: &ProllyConfig,
        store: Arc<dyn BlockStore>,
        entries: impl IntoIterator<Item = (K, V)>,
    ) -> Result<Self> {
        let ctx = config.context(MapSchema::new(), store)?;
        let entries = entries.into_iter().map(Entry::from).collect();
        let tree = ProllyTree::from_entries(ctx, entries).await?;
        Ok(Self { tree })
    }

    /// Open a persisted map
    pub async fn load(config: &ProllyConfig, store: Arc<dyn BlockStore>, root: Cid) -> Result<Self> {
        let ctx = config.context(MapSchema::new(), store)?;
        Ok(Self {
            tree: ProllyTree::load(ctx, root).await?,
        })
    }

    pub fn from_tree(tree: ProllyTree<MapSchema<K, V>>) -> Self {
        Self { tree }
    }

    pub fn tree(&self) -> &ProllyTree<MapSchema<K, V>> {
        &self.tree
    }

    pub fn root_cid(&self) -> &Cid {
        self.tree.root_cid()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Get a value by key
    pub async fn get(&self, key: &K) -> Result<Option<V>> {
        self.tree.get(key).await
    }

    /// Values for every key, in key order; `NotFound` if any is missing
    pub async fn get_many(&self, keys: &[K]) -> Result<Vec<V>> {
        self.tree.get_many(keys).await
    }

    /// Insert or update, returning the previous value
    pub async fn insert(&mut self, key: K, value: V) -> Result<Option<V>> {
        let previous = self.tree.apply(vec![Mutation::put(key, value)]).await?;
        Ok(previous.into_iter().next().map(|entry| entry.value))
    }

    /// Remove a key, returning its value
    pub async fn remove(&mut self, key: K) -> Result<Option<V>> {
        let previous = self.tree.apply(vec![Mutation::delete(key)]).await?;
        Ok(previous.into_iter().next().map(|entry| entry.value))
    }

    /// Apply a batch, returning the overwritten and deleted entries
    pub async fn apply(&mut self, mutations: Vec<Mutation<K, V>>) -> Result<Vec<(K, V)>> {
        let previous = self.tree.apply(mutations).await?;
        Ok(previous.into_iter().map(Entry::into_pair).collect())
    }

    /// Entries with `start <= key <= end`
    pub async fn range(&self, start: &K, end: &K) -> Result<Vec<(K, V)>> {
        if start > end {
            return Err(CoreError::PreconditionFailed(
                "range start is after range end".to_string(),
            ));
        }
        let entries = self.tree.get_range_entries(start, end).await?;
        Ok(entries.into_iter().map(Entry::into_pair).collect())
    }

    /// All entries in key order
    pub async fn entries(&self) -> Result<Vec<(K, V)>> {
        let entries = self.tree.get_all_entries().await?;
        Ok(entries.into_iter().map(Entry::into_pair).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prolly_blockstore::MemoryBlockStore;

    fn config() -> ProllyConfig {
        ProllyConfig {
            branching_factor: 4,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_map_insert_get_remove() {
        let store = Arc::new(MemoryBlockStore::new());
        let mut map = ProllyMap::<String, u64>::create(&config(), store, []).await.unwrap();

        assert_eq!(map.insert("a".to_string(), 1).await.unwrap(), None);
        assert_eq!(map.insert("a".to_string(), 2).await.unwrap(), Some(1));
        assert_eq!(map.get(&"a".to_string()).await.unwrap(), Some(2));

        assert_eq!(map.remove("a".to_string()).await.unwrap(), Some(2));
        assert_eq!(map.remove("a".to_string()).await.unwrap(), None);
        assert!(map.is_empty());
    }

    #[tokio::test]
    async fn test_map_prefix_listing_by_range() {
        let store = Arc::new(MemoryBlockStore::new());
        let entries = [
            ("photos/2024/a.jpg", 1u64),
            ("photos/2024/b.jpg", 2),
            ("photos/2025/c.jpg", 3),
            ("docs/readme.md", 4),
        ]
        .map(|(k, v)| (k.to_string(), v));
        let map = ProllyMap::create(&config(), store, entries).await.unwrap();

        let photos_2024 = map
            .range(&"photos/2024/".to_string(), &"photos/2024/\u{10ffff}".to_string())
            .await
            .unwrap();
        assert_eq!(photos_2024.len(), 2);

        assert!(map
            .range(&"z".to_string(), &"a".to_string())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_map_get_many_and_reload() {
        let store: Arc<dyn BlockStore> = Arc::new(MemoryBlockStore::new());
        let entries = (0..50u64).map(|i| (i, i * 10));
        let map = ProllyMap::create(&config(), Arc::clone(&store), entries).await.unwrap();

        let reloaded = ProllyMap::<u64, u64>::load(&config(), store, *map.root_cid())
            .await
            .unwrap();
        assert_eq!(reloaded.get_many(&[3, 1, 49]).await.unwrap(), vec![10, 30, 490]);
        assert!(matches!(
            reloaded.get_many(&[1, 1000]).await,
            Err(CoreError::NotFound)
        ));
        assert_eq!(reloaded.entries().await.unwrap().len(), 50);
    }
}
