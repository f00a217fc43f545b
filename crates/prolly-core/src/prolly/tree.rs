//! Prolly tree handle

use super::context::TreeContext;
use super::entry::LeafEntry;
use super::node::Node;
use super::schema::TreeSchema;
use super::transaction::{BulkResult, Mutation, Transaction};
use super::visited::VisitedAddresses;
use crate::{CoreError, Result};
use cid::Cid;
use prolly_blockstore::Block;
use std::sync::Arc;
use tracing::{debug, instrument};

/// A tree version: an immutable root plus the context to read and rewrite it
///
/// Cloning is cheap and clones share nothing mutable, so readers can keep an
/// old version while a writer produces a new one.
pub struct ProllyTree<S: TreeSchema> {
    root: Arc<Node<S>>,
    ctx: TreeContext<S>,
}

impl<S: TreeSchema> ProllyTree<S> {
    /// Build a tree over `entries` without persisting it
    ///
    /// Entries are sorted by the schema order; for duplicate keys the last one wins.
    /// Returns the tree and every block it consists of.
    #[instrument(skip(ctx, entries), fields(entries = entries.len()))]
    pub async fn create(
        ctx: TreeContext<S>,
        entries: Vec<LeafEntry<S::Key, S::Value>>,
    ) -> Result<(Self, Vec<Block>)> {
        let (root, blocks) = Transaction::create(&ctx, entries).await?;
        Ok((Self { root, ctx }, blocks))
    }

    /// Build a tree over `entries` and persist its blocks
    pub async fn from_entries(
        ctx: TreeContext<S>,
        entries: Vec<LeafEntry<S::Key, S::Value>>,
    ) -> Result<Self> {
        let (tree, blocks) = Self::create(ctx, entries).await?;
        tree.flush(&blocks).await?;
        Ok(tree)
    }

    /// A persisted empty tree
    pub async fn empty(ctx: TreeContext<S>) -> Result<Self> {
        Self::from_entries(ctx, Vec::new()).await
    }

    /// Load a tree from an existing root CID
    #[instrument(skip(ctx))]
    pub async fn load(ctx: TreeContext<S>, root_cid: Cid) -> Result<Self> {
        let root = ctx.get_node(&root_cid).await?;
        Ok(Self { root, ctx })
    }

    /// Same context, different root
    pub fn with_root(&self, root: Arc<Node<S>>) -> Self {
        Self {
            root,
            ctx: self.ctx.clone(),
        }
    }

    pub fn context(&self) -> &TreeContext<S> {
        &self.ctx
    }

    pub fn root(&self) -> &Arc<Node<S>> {
        &self.root
    }

    /// Get the root CID
    pub fn root_cid(&self) -> &Cid {
        self.root.cid()
    }

    /// Check if the tree is empty
    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// Height of the root, 0 for a single leaf
    pub fn height(&self) -> u32 {
        self.root.height()
    }

    /// Persist blocks to the context's store
    pub async fn flush(&self, blocks: &[Block]) -> Result<()> {
        self.ctx.put_blocks(blocks).await
    }

    /// Apply a mutation batch without touching the store
    #[instrument(skip(self, mutations), fields(root = %self.root.cid(), mutations = mutations.len()))]
    pub async fn bulk(&self, mutations: Vec<Mutation<S::Key, S::Value>>) -> Result<BulkResult<S>> {
        Transaction::bulk(&self.ctx, &self.root, mutations).await
    }

    /// Apply a mutation batch, persist the new blocks and move to the new root
    ///
    /// Returns the entries the batch overwrote or deleted.
    pub async fn apply(
        &mut self,
        mutations: Vec<Mutation<S::Key, S::Value>>,
    ) -> Result<Vec<LeafEntry<S::Key, S::Value>>> {
        let BulkResult {
            root,
            blocks,
            previous,
        } = self.bulk(mutations).await?;
        self.flush(&blocks).await?;
        debug!(from = %self.root.cid(), to = %root.cid(), "root updated");
        self.root = root;
        Ok(previous)
    }

    /// Get a value by key
    #[instrument(skip(self, key))]
    pub async fn get(&self, key: &S::Key) -> Result<Option<S::Value>> {
        match self.get_entry(key).await {
            Ok(entry) => Ok(Some(entry.value)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Values for `keys` in key order; `NotFound` if any is missing
    pub async fn get_many(&self, keys: &[S::Key]) -> Result<Vec<S::Value>> {
        let entries = self.get_entries(keys).await?;
        Ok(entries.into_iter().map(|entry| entry.value).collect())
    }

    /// Entry for `key`, or `NotFound`
    pub async fn get_entry(&self, key: &S::Key) -> Result<LeafEntry<S::Key, S::Value>> {
        self.root.get_entry(&self.ctx, key, None).await
    }

    /// [`ProllyTree::get_entry`], recording every node address read
    pub async fn get_entry_traced(
        &self,
        key: &S::Key,
        visited: &VisitedAddresses,
    ) -> Result<LeafEntry<S::Key, S::Value>> {
        self.root.get_entry(&self.ctx, key, Some(visited)).await
    }

    /// Entries for `keys` in key order; `NotFound` if any is missing
    pub async fn get_entries(&self, keys: &[S::Key]) -> Result<Vec<LeafEntry<S::Key, S::Value>>> {
        self.root.get_entries(&self.ctx, keys, None).await
    }

    pub async fn get_entries_traced(
        &self,
        keys: &[S::Key],
        visited: &VisitedAddresses,
    ) -> Result<Vec<LeafEntry<S::Key, S::Value>>> {
        self.root.get_entries(&self.ctx, keys, Some(visited)).await
    }

    /// Every entry in key order
    #[instrument(skip(self), fields(root = %self.root.cid()))]
    pub async fn get_all_entries(&self) -> Result<Vec<LeafEntry<S::Key, S::Value>>> {
        self.root.get_all_entries(&self.ctx, None).await
    }

    pub async fn get_all_entries_traced(
        &self,
        visited: &VisitedAddresses,
    ) -> Result<Vec<LeafEntry<S::Key, S::Value>>> {
        self.root.get_all_entries(&self.ctx, Some(visited)).await
    }

    /// Entries with `start <= key <= end` in key order
    pub async fn get_range_entries(
        &self,
        start: &S::Key,
        end: &S::Key,
    ) -> Result<Vec<LeafEntry<S::Key, S::Value>>> {
        self.root.get_range_entries(&self.ctx, start, end, None).await
    }

    pub async fn get_range_entries_traced(
        &self,
        start: &S::Key,
        end: &S::Key,
        visited: &VisitedAddresses,
    ) -> Result<Vec<LeafEntry<S::Key, S::Value>>> {
        self.root
            .get_range_entries(&self.ctx, start, end, Some(visited))
            .await
    }

    /// Count entries
    pub async fn len(&self) -> Result<usize> {
        Ok(self.get_all_entries().await?.len())
    }

    /// Get statistics about the tree
    pub fn stats(&self) -> TreeStats {
        TreeStats {
            root_cid: *self.root.cid(),
            height: self.root.height(),
            root_entries: self.root.len(),
            root_closed: self.root.is_closed(),
        }
    }
}

impl<S: TreeSchema> Clone for ProllyTree<S> {
    fn clone(&self) -> Self {
        Self {
            root: Arc::clone(&self.root),
            ctx: self.ctx.clone(),
        }
    }
}

impl<S: TreeSchema> std::fmt::Debug for ProllyTree<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProllyTree").field("root", &self.root).finish()
    }
}

/// Tree statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeStats {
    pub root_cid: Cid,
    pub height: u32,
    pub root_entries: usize,
    pub root_closed: bool,
}
