//! Secondary indexes
//!
//! Keys are `(index_key, row_id)` pairs so one index key can hold many rows.
//! Lookups by index key are range scans over `(key, 0)..=(key, u64::MAX)`.

use super::config::ProllyConfig;
use super::entry::Entry;
use super::schema::{Payload, TreeSchema};
use super::transaction::Mutation;
use super::tree::ProllyTree;
use crate::Result;
use cid::Cid;
use prolly_blockstore::BlockStore;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::marker::PhantomData;
use std::sync::Arc;

/// Schema for `(index_key, row_id) -> row` trees
pub struct DbIndexSchema<K, R> {
    _marker: PhantomData<fn() -> (K, R)>,
}

impl<K, R> DbIndexSchema<K, R> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<K, R> Default for DbIndexSchema<K, R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Payload + Ord, R: Payload> TreeSchema for DbIndexSchema<K, R> {
    type Key = (K, u64);
    type Value = R;

    fn compare(&self, a: &(K, u64), b: &(K, u64)) -> Ordering {
        a.0.cmp(&b.0).then(a.1.cmp(&b.1))
    }
}

/// A row found under one index key
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexRow<R> {
    pub id: u64,
    pub row: R,
}

/// A row found by an index range scan
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexRangeRow<K, R> {
    pub id: u64,
    pub key: K,
    pub row: R,
}

/// A persistent secondary index
#[derive(Clone, Debug)]
pub struct DbIndex<K: Payload + Ord, R: Payload> {
    tree: ProllyTree<DbIndexSchema<K, R>>,
}

impl<K: Payload + Ord, R: Payload> DbIndex<K, R> {
    /// Build and persist an index from `(index_key, row_id, row)` triples
    pub async fn create(
        config: &ProllyConfig,
        store: Arc<dyn BlockStore>,
        rows: impl IntoIterator<Item = (K, u64, R)>,
    ) -> Result<Self> {
        let ctx = config.context(DbIndexSchema::new(), store)?;
        let entries = rows
            .into_iter()
            .map(|(key, id, row)| Entry::new((key, id), row))
            .collect();
        Ok(Self {
            tree: ProllyTree::from_entries(ctx, entries).await?,
        })
    }

    /// Open a persisted index
    pub async fn load(config: &ProllyConfig, store: Arc<dyn BlockStore>, root: Cid) -> Result<Self> {
        let ctx = config.context(DbIndexSchema::new(), store)?;
        Ok(Self {
            tree: ProllyTree::load(ctx, root).await?,
        })
    }

    pub fn tree(&self) -> &ProllyTree<DbIndexSchema<K, R>> {
        &self.tree
    }

    pub fn root_cid(&self) -> &Cid {
        self.tree.root_cid()
    }

    /// Every row indexed under `key`, by row id
    pub async fn get(&self, key: &K) -> Result<Vec<IndexRow<R>>> {
        let start = (key.clone(), 0);
        let end = (key.clone(), u64::MAX);
        let entries = self.tree.get_range_entries(&start, &end).await?;
        Ok(entries
            .into_iter()
            .map(|entry| IndexRow {
                id: entry.key.1,
                row: entry.value,
            })
            .collect())
    }

    /// Every row whose index key lies in `[start, end]`
    pub async fn range(&self, start: &K, end: &K) -> Result<Vec<IndexRangeRow<K, R>>> {
        let start = (start.clone(), 0);
        let end = (end.clone(), u64::MAX);
        let entries = self.tree.get_range_entries(&start, &end).await?;
        Ok(entries
            .into_iter()
            .map(|entry| {
                let (key, id) = entry.key;
                IndexRangeRow {
                    id,
                    key,
                    row: entry.value,
                }
            })
            .collect())
    }

    /// Index `row` under `key`
    pub async fn insert(&mut self, key: K, id: u64, row: R) -> Result<()> {
        self.tree.apply(vec![Mutation::put((key, id), row)]).await?;
        Ok(())
    }

    /// Drop the row `id` from `key`; returns whether it was indexed
    pub async fn remove(&mut self, key: K, id: u64) -> Result<bool> {
        let previous = self.tree.apply(vec![Mutation::delete((key, id))]).await?;
        Ok(!previous.is_empty())
    }

    /// Apply a batch of index changes
    pub async fn apply(&mut self, mutations: Vec<Mutation<(K, u64), R>>) -> Result<()> {
        self.tree.apply(mutations).await?;
        Ok(())
    }
}
