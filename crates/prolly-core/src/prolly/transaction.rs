//! Bulk mutation engine
//!
//! A [`Transaction`] rewrites only the part of a tree a mutation batch
//! touches. Leaves merge their mutations and are rechunked; branches route
//! mutations to children, rebuild those children concurrently, splice the
//! replacement fragments in place, glue open fragment edges back together and
//! rechunk. Every node built along the way lands in a scratch arena keyed by
//! address. Untouched subtrees are never loaded, and a child whose rebuild
//! reproduces its old address is passed through unchanged.

use super::builder::{build_branches, build_leaves};
use super::context::TreeContext;
use super::entry::{BranchEntry, Entry, LeafEntry};
use super::node::{Node, NodeBody};
use super::schema::TreeSchema;
use super::MAX_TREE_HEIGHT;
use crate::{CoreError, Result};
use cid::Cid;
use dashmap::DashMap;
use futures::future::{try_join_all, BoxFuture, FutureExt};
use parking_lot::Mutex;
use prolly_blockstore::Block;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, trace};

/// One change in a bulk batch
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mutation<K, V> {
    /// Insert or overwrite
    Put { key: K, value: V },
    /// Remove; a no-op when the key is absent
    Delete { key: K },
}

impl<K, V> Mutation<K, V> {
    pub fn put(key: K, value: V) -> Self {
        Mutation::Put { key, value }
    }

    pub fn delete(key: K) -> Self {
        Mutation::Delete { key }
    }

    pub fn key(&self) -> &K {
        match self {
            Mutation::Put { key, .. } | Mutation::Delete { key } => key,
        }
    }

    pub fn is_delete(&self) -> bool {
        matches!(self, Mutation::Delete { .. })
    }
}

impl<K, V> From<LeafEntry<K, V>> for Mutation<K, V> {
    fn from(entry: LeafEntry<K, V>) -> Self {
        Mutation::Put {
            key: entry.key,
            value: entry.value,
        }
    }
}

/// Outcome of a bulk mutation
pub struct BulkResult<S: TreeSchema> {
    /// The new root
    pub root: Arc<Node<S>>,
    /// Newly built nodes reachable from `root`; persist them before loading the root
    pub blocks: Vec<Block>,
    /// Entries that existed before the batch and were overwritten or deleted, in key order
    pub previous: Vec<LeafEntry<S::Key, S::Value>>,
}

impl<S: TreeSchema> std::fmt::Debug for BulkResult<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BulkResult")
            .field("root", self.root.cid())
            .field("blocks", &self.blocks.len())
            .field("previous", &self.previous.len())
            .finish()
    }
}

/// Sort by key keeping the last write for duplicate keys
pub(crate) fn last_write_wins<T, K, F, C>(mut items: Vec<T>, key: F, compare: C) -> Vec<T>
where
    F: Fn(&T) -> &K,
    C: Fn(&K, &K) -> Ordering,
{
    items.sort_by(|a, b| compare(key(a), key(b)));
    let mut out: Vec<T> = Vec::with_capacity(items.len());
    for item in items {
        match out.last_mut() {
            Some(last) if compare(key(last), key(&item)) == Ordering::Equal => *last = item,
            _ => out.push(item),
        }
    }
    out
}

struct Fresh<S: TreeSchema> {
    node: Arc<Node<S>>,
    // The node or its rightmost descendant at any height is still open.
    spine_open: bool,
}

/// State of one bulk or create call
pub struct Transaction<S: TreeSchema> {
    ctx: TreeContext<S>,
    origin: Option<Arc<Node<S>>>,
    scratch: DashMap<Cid, Fresh<S>>,
    previous: Mutex<Vec<LeafEntry<S::Key, S::Value>>>,
}

impl<S: TreeSchema> Transaction<S> {
    pub(crate) fn new(ctx: TreeContext<S>, origin: Option<Arc<Node<S>>>) -> Self {
        Self {
            ctx,
            origin,
            scratch: DashMap::new(),
            previous: Mutex::new(Vec::new()),
        }
    }

    /// Build a tree from entries in one pass
    pub(crate) async fn create(
        ctx: &TreeContext<S>,
        entries: Vec<LeafEntry<S::Key, S::Value>>,
    ) -> Result<(Arc<Node<S>>, Vec<Block>)> {
        let entries = last_write_wins(entries, |entry| &entry.key, |a, b| ctx.compare(a, b));
        debug!(entries = entries.len(), "creating tree");

        let tx = Self::new(ctx.clone(), None);
        let leaves = tx.build_leaves(entries)?;
        let root = tx.wrap(leaves, 0).await?;
        let blocks = tx.reachable_blocks(&root);
        Ok((root, blocks))
    }

    /// Apply a mutation batch to the tree under `root`
    pub(crate) async fn bulk(
        ctx: &TreeContext<S>,
        root: &Arc<Node<S>>,
        mutations: Vec<Mutation<S::Key, S::Value>>,
    ) -> Result<BulkResult<S>> {
        let mutations = last_write_wins(mutations, Mutation::key, |a, b| ctx.compare(a, b));
        if mutations.is_empty() {
            return Ok(BulkResult {
                root: Arc::clone(root),
                blocks: Vec::new(),
                previous: Vec::new(),
            });
        }

        let tx = Self::new(ctx.clone(), Some(Arc::clone(root)));
        let new_root = match root.key().cloned() {
            None => {
                let fragments = tx.apply(Arc::clone(root), &mutations).await?;
                tx.wrap(fragments, 0).await?
            }
            Some(min) => {
                let split = mutations.partition_point(|m| ctx.compare(m.key(), &min) == Ordering::Less);
                let (below, rest) = mutations.split_at(split);
                debug!(below = below.len(), rest = rest.len(), height = root.height(), "bulk");

                let fragments = if rest.is_empty() {
                    vec![root.to_branch_entry()?]
                } else {
                    tx.apply(Arc::clone(root), rest).await?
                };
                let mut new_root = tx.wrap(fragments, root.height()).await?;

                // Deletes below the minimum match nothing.
                let inserts: Vec<_> = below
                    .iter()
                    .filter_map(|m| match m {
                        Mutation::Put { key, value } => Some(Entry::new(key.clone(), value.clone())),
                        Mutation::Delete { .. } => None,
                    })
                    .collect();
                if !inserts.is_empty() {
                    new_root = tx.graft_leftmost(new_root, inserts).await?;
                }
                new_root
            }
        };

        let blocks = tx.reachable_blocks(&new_root);
        let mut previous = std::mem::take(&mut *tx.previous.lock());
        previous.sort_by(|a, b| ctx.compare(&a.key, &b.key));
        debug!(root = %new_root.cid(), blocks = blocks.len(), previous = previous.len(), "bulk complete");

        Ok(BulkResult {
            root: new_root,
            blocks,
            previous,
        })
    }

    /// Rewrite `node` with `mutations`, all of which are `>=` its key.
    ///
    /// Returns the replacement fragments at the node's height: none if it
    /// emptied, the node itself if nothing changed, otherwise new nodes.
    pub(crate) fn apply<'a>(
        &'a self,
        node: Arc<Node<S>>,
        mutations: &'a [Mutation<S::Key, S::Value>],
    ) -> BoxFuture<'a, Result<Vec<BranchEntry<S::Key>>>> {
        async move {
            match node.body() {
                NodeBody::Leaf(_) => self.apply_leaf(&node, mutations),
                NodeBody::Branch { .. } => self.apply_branch(&node, mutations).await,
            }
        }
        .boxed()
    }

    fn apply_leaf(
        &self,
        node: &Arc<Node<S>>,
        mutations: &[Mutation<S::Key, S::Value>],
    ) -> Result<Vec<BranchEntry<S::Key>>> {
        let list = node.leaf_entries().ok_or_else(|| {
            CoreError::PreconditionFailed("leaf transaction on a branch".to_string())
        })?;
        let cmp = |a: &S::Key, b: &S::Key| self.ctx.compare(a, b);

        let mut merged = Vec::with_capacity(list.len() + mutations.len());
        let mut previous = Vec::new();
        let mut changed = false;
        let mut existing = list.iter().peekable();

        for mutation in mutations {
            let key = mutation.key();
            while let Some(entry) = existing.next_if(|e| cmp(&e.key, key) == Ordering::Less) {
                merged.push(entry.clone());
            }
            let matched = existing.next_if(|e| cmp(&e.key, key) == Ordering::Equal);
            if let Some(entry) = matched {
                previous.push(entry.clone());
            }
            match mutation {
                Mutation::Put { key, value } => {
                    merged.push(Entry::new(key.clone(), value.clone()));
                    changed = true;
                }
                Mutation::Delete { .. } => changed |= matched.is_some(),
            }
        }
        merged.extend(existing.cloned());

        if !previous.is_empty() {
            self.previous.lock().extend(previous);
        }
        if !changed {
            return self.unchanged(node);
        }
        trace!(before = list.len(), after = merged.len(), "leaf rewritten");
        if merged.is_empty() {
            return Ok(Vec::new());
        }

        let nodes = build_leaves(self.ctx.schema(), self.ctx.chunker(), merged)?;
        self.replace(node, nodes)
    }

    async fn apply_branch(
        &self,
        node: &Arc<Node<S>>,
        mutations: &[Mutation<S::Key, S::Value>],
    ) -> Result<Vec<BranchEntry<S::Key>>> {
        let list = node.branch_entries().ok_or_else(|| {
            CoreError::PreconditionFailed("branch transaction on a leaf".to_string())
        })?;
        let height = node.height();
        let cmp = |a: &S::Key, b: &S::Key| self.ctx.compare(a, b);

        let groups = list.find_many(mutations.iter().map(Mutation::key), false, cmp);
        if groups.values().map(Vec::len).sum::<usize>() != mutations.len() {
            return Err(CoreError::PreconditionFailed(
                "mutation key below the node's first key".to_string(),
            ));
        }

        // Routed keys are sorted, so each child's share is a contiguous slice.
        let touched: Vec<(usize, &[Mutation<S::Key, S::Value>])> = groups
            .iter()
            .map(|(index, positions)| {
                let (first, last) = (positions[0], positions[positions.len() - 1]);
                (*index, &mutations[first..=last])
            })
            .collect();

        let rebuilt = try_join_all(touched.iter().map(|(index, slice)| async move {
            let child = self.load(&list.entries[*index].value).await?;
            self.apply(child, slice).await
        }))
        .await?;

        let mut replaced: BTreeMap<usize, Vec<BranchEntry<S::Key>>> = touched
            .iter()
            .map(|(index, _)| *index)
            .zip(rebuilt)
            .collect();

        let untouched = replaced.iter().all(|(index, fragments)| {
            fragments.len() == 1 && fragments[0].value == list.entries[*index].value
        });
        if untouched {
            return self.unchanged(node);
        }

        let mut items = Vec::with_capacity(list.len() + replaced.len());
        for (index, entry) in list.iter().enumerate() {
            match replaced.remove(&index) {
                Some(fragments) => items.extend(fragments),
                None => items.push(entry.clone()),
            }
        }

        let items = self.glue(items, height - 1).await?;
        trace!(height, children = items.len(), "branch rewritten");
        if items.is_empty() {
            return Ok(Vec::new());
        }

        let nodes = build_branches(self.ctx.schema(), self.ctx.chunker(), items, height)?;
        self.replace(node, nodes)
    }

    fn unchanged(&self, node: &Node<S>) -> Result<Vec<BranchEntry<S::Key>>> {
        if node.is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![node.to_branch_entry()?])
    }

    fn replace(&self, original: &Node<S>, nodes: Vec<Node<S>>) -> Result<Vec<BranchEntry<S::Key>>> {
        if let [node] = nodes.as_slice() {
            if node.cid() == original.cid() {
                return self.unchanged(original);
            }
        }
        self.register(nodes)
    }

    /// Build leaves and register them as fresh
    pub(crate) fn build_leaves(
        &self,
        entries: Vec<LeafEntry<S::Key, S::Value>>,
    ) -> Result<Vec<BranchEntry<S::Key>>> {
        let nodes = build_leaves(self.ctx.schema(), self.ctx.chunker(), entries)?;
        self.register(nodes)
    }

    /// Build branches at `height` and register them as fresh
    pub(crate) fn build_branches(
        &self,
        entries: Vec<BranchEntry<S::Key>>,
        height: u32,
    ) -> Result<Vec<BranchEntry<S::Key>>> {
        let nodes = build_branches(self.ctx.schema(), self.ctx.chunker(), entries, height)?;
        self.register(nodes)
    }

    /// Move freshly built nodes into the scratch arena
    pub(crate) fn register(&self, nodes: Vec<Node<S>>) -> Result<Vec<BranchEntry<S::Key>>> {
        nodes
            .into_iter()
            .map(|node| {
                let entry = node.to_branch_entry()?;
                self.insert(node);
                Ok(entry)
            })
            .collect()
    }

    fn insert(&self, node: Node<S>) -> Arc<Node<S>> {
        let spine_open = match node.body() {
            NodeBody::Leaf(list) => !list.closed,
            NodeBody::Branch { entries, .. } => {
                !entries.closed || entries.last().is_some_and(|last| self.is_open(&last.value))
            }
        };
        let node = Arc::new(node);
        self.scratch.insert(
            *node.cid(),
            Fresh {
                node: Arc::clone(&node),
                spine_open,
            },
        );
        node
    }

    /// Whether `cid` is a fresh node whose right spine is still open
    pub(crate) fn is_open(&self, cid: &Cid) -> bool {
        self.scratch.get(cid).is_some_and(|fresh| fresh.spine_open)
    }

    /// Load from the scratch arena, the origin root or the context
    pub(crate) async fn load(&self, cid: &Cid) -> Result<Arc<Node<S>>> {
        let fresh = self.scratch.get(cid).map(|fresh| Arc::clone(&fresh.node));
        if let Some(node) = fresh {
            return Ok(node);
        }
        if let Some(origin) = self.origin.as_ref().filter(|origin| origin.cid() == cid) {
            return Ok(Arc::clone(origin));
        }
        self.ctx.get_node(cid).await
    }

    /// Wrap fragments at `height` into branch levels until one root remains
    pub(crate) async fn wrap(
        &self,
        fragments: Vec<BranchEntry<S::Key>>,
        height: u32,
    ) -> Result<Arc<Node<S>>> {
        if fragments.is_empty() {
            return Ok(self.insert(Node::empty(self.ctx.schema())?));
        }

        let mut level = fragments;
        let mut height = height;
        while level.len() > 1 {
            if height >= MAX_TREE_HEIGHT {
                return Err(CoreError::ChunkerDiverged { height });
            }
            height += 1;
            level = self.build_branches(level, height)?;
        }

        let root = level
            .pop()
            .ok_or_else(|| CoreError::PreconditionFailed("wrap produced no root".to_string()))?;
        self.collapse(root.value).await
    }

    /// Replace single-entry branch roots by their child
    async fn collapse(&self, cid: Cid) -> Result<Arc<Node<S>>> {
        let mut node = self.load(&cid).await?;
        loop {
            let child = match node.branch_entries() {
                Some(list) if list.len() == 1 => list.entries[0].value,
                _ => return Ok(node),
            };
            debug!(from = %node.cid(), to = %child, "collapsing root");
            node = self.load(&child).await?;
        }
    }

    /// Blocks of every fresh node reachable from `root`, root first
    pub(crate) fn reachable_blocks(&self, root: &Node<S>) -> Vec<Block> {
        let mut blocks = Vec::new();
        let mut stack = vec![*root.cid()];
        while let Some(cid) = stack.pop() {
            let Some(fresh) = self.scratch.get(&cid) else {
                continue;
            };
            blocks.push(fresh.node.block().clone());
            stack.extend(fresh.node.child_cids().into_iter().rev());
        }
        blocks
    }
}
