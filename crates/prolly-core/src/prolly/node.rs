//! Prolly tree nodes and the read path
//!
//! A node is either a leaf holding `(key, value)` entries or a branch at
//! height >= 1 holding `(key, child address)` entries. Nodes are immutable and
//! carry their encoded block, so the address is known as soon as a node exists.
//!
//! Block layout (DAG-CBOR):
//!
//! ```text
//! leaf:   { "leaf":   [entry, ...],                 "closed": bool }
//! branch: { "branch": [height, [[key, cid], ...]],  "closed": bool }
//! ```

use super::context::TreeContext;
use super::entry::{BranchEntry, EntryList, LeafEntry};
use super::schema::TreeSchema;
use super::visited::{record, VisitedAddresses};
use crate::{CoreError, Result};
use cid::Cid;
use futures::future::try_join_all;
use ipld_core::ipld::Ipld;
use prolly_blockstore::{codec, Block};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// Node contents
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeBody<K, V> {
    /// Height 0, values inline
    Leaf(EntryList<K, V>),
    /// Height >= 1, entries point at children one level down
    Branch {
        height: u32,
        entries: EntryList<K, Cid>,
    },
}

/// An immutable, addressed tree node
pub struct Node<S: TreeSchema> {
    body: NodeBody<S::Key, S::Value>,
    block: Block,
}

#[derive(Serialize)]
struct NodeBlockRef<'a, K> {
    // Field order is the DAG-CBOR canonical key order.
    #[serde(skip_serializing_if = "Option::is_none")]
    leaf: Option<Vec<Ipld>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    branch: Option<(u32, &'a [BranchEntry<K>])>,
    closed: bool,
}

#[derive(Deserialize)]
struct NodeBlock<K> {
    leaf: Option<Vec<Ipld>>,
    branch: Option<(u32, Vec<BranchEntry<K>>)>,
    closed: bool,
}

impl<S: TreeSchema> Node<S> {
    /// Build and encode a leaf
    pub fn leaf(schema: &S, entries: Vec<LeafEntry<S::Key, S::Value>>, closed: bool) -> Result<Self> {
        let encoded = entries
            .iter()
            .map(|entry| schema.encode_leaf_entry(entry))
            .collect::<Result<Vec<_>>>()?;
        let block = codec::encode(&NodeBlockRef::<S::Key> {
            leaf: Some(encoded),
            branch: None,
            closed,
        })?;
        Ok(Self {
            body: NodeBody::Leaf(EntryList::new(entries, closed)),
            block,
        })
    }

    /// Build and encode a branch
    pub fn branch(height: u32, entries: Vec<BranchEntry<S::Key>>, closed: bool) -> Result<Self> {
        if height == 0 {
            return Err(CoreError::PreconditionFailed(
                "branch nodes must have height >= 1".to_string(),
            ));
        }
        if entries.is_empty() {
            return Err(CoreError::PreconditionFailed(
                "branch nodes must have at least one entry".to_string(),
            ));
        }
        let block = codec::encode(&NodeBlockRef {
            leaf: None,
            branch: Some((height, entries.as_slice())),
            closed,
        })?;
        Ok(Self {
            body: NodeBody::Branch {
                height,
                entries: EntryList::new(entries, closed),
            },
            block,
        })
    }

    /// The empty tree: an open leaf without entries
    pub fn empty(schema: &S) -> Result<Self> {
        Self::leaf(schema, Vec::new(), false)
    }

    /// Decode a node block
    pub fn decode(schema: &S, block: Block) -> Result<Self> {
        let cid = block.cid;
        let raw: NodeBlock<S::Key> =
            codec::decode(&block.data).map_err(|err| CoreError::malformed(cid, err.to_string()))?;

        let body = match (raw.leaf, raw.branch) {
            (Some(leaf), None) => {
                let entries = leaf
                    .into_iter()
                    .map(|ipld| schema.decode_leaf_entry(ipld))
                    .collect::<Result<Vec<_>>>()
                    .map_err(|err| CoreError::malformed(cid, err.to_string()))?;
                NodeBody::Leaf(EntryList::new(entries, raw.closed))
            }
            (None, Some((height, entries))) => {
                if height == 0 || entries.is_empty() {
                    return Err(CoreError::malformed(cid, "branch without height or entries"));
                }
                NodeBody::Branch {
                    height,
                    entries: EntryList::new(entries, raw.closed),
                }
            }
            (Some(_), Some(_)) => return Err(CoreError::malformed(cid, "both leaf and branch")),
            (None, None) => {
                return Err(CoreError::malformed(cid, "does not match the node schema"))
            }
        };

        Ok(Self { body, block })
    }

    /// Address of this node
    pub fn cid(&self) -> &Cid {
        &self.block.cid
    }

    /// Encoded block
    pub fn block(&self) -> &Block {
        &self.block
    }

    pub fn body(&self) -> &NodeBody<S::Key, S::Value> {
        &self.body
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self.body, NodeBody::Leaf(_))
    }

    /// 0 for leaves
    pub fn height(&self) -> u32 {
        match &self.body {
            NodeBody::Leaf(_) => 0,
            NodeBody::Branch { height, .. } => *height,
        }
    }

    pub fn is_closed(&self) -> bool {
        match &self.body {
            NodeBody::Leaf(list) => list.closed,
            NodeBody::Branch { entries, .. } => entries.closed,
        }
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        match &self.body {
            NodeBody::Leaf(list) => list.len(),
            NodeBody::Branch { entries, .. } => entries.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The node's key: its first entry's key
    pub fn key(&self) -> Option<&S::Key> {
        match &self.body {
            NodeBody::Leaf(list) => list.start_key(),
            NodeBody::Branch { entries, .. } => entries.start_key(),
        }
    }

    /// The entry a parent branch holds for this node
    pub fn to_branch_entry(&self) -> Result<BranchEntry<S::Key>> {
        let key = self.key().cloned().ok_or_else(|| {
            CoreError::PreconditionFailed("an empty node cannot be referenced".to_string())
        })?;
        Ok(BranchEntry::new(key, *self.cid()))
    }

    pub fn leaf_entries(&self) -> Option<&EntryList<S::Key, S::Value>> {
        match &self.body {
            NodeBody::Leaf(list) => Some(list),
            NodeBody::Branch { .. } => None,
        }
    }

    pub fn branch_entries(&self) -> Option<&EntryList<S::Key, Cid>> {
        match &self.body {
            NodeBody::Leaf(_) => None,
            NodeBody::Branch { entries, .. } => Some(entries),
        }
    }

    /// Child addresses of a branch, empty for leaves
    pub fn child_cids(&self) -> Vec<Cid> {
        self.branch_entries()
            .map(|list| list.iter().map(|entry| entry.value).collect())
            .unwrap_or_default()
    }
}

enum Scan {
    Range,
    All,
}

impl<S: TreeSchema> Node<S> {
    /// Value entry for `key`, or `NotFound`
    pub async fn get_entry(
        self: &Arc<Self>,
        ctx: &TreeContext<S>,
        key: &S::Key,
        visited: Option<&VisitedAddresses>,
    ) -> Result<LeafEntry<S::Key, S::Value>> {
        let cmp = |a: &S::Key, b: &S::Key| ctx.compare(a, b);
        let mut node = Arc::clone(self);
        loop {
            record(visited, node.cid());
            let child = match &node.body {
                NodeBody::Leaf(list) => {
                    return list
                        .find_exact(key, cmp)
                        .map(|index| list.entries[index].clone())
                        .ok_or(CoreError::NotFound);
                }
                NodeBody::Branch { entries, .. } => {
                    let index = entries.find(key, cmp).ok_or(CoreError::NotFound)?;
                    entries.entries[index].value
                }
            };
            node = ctx.get_node(&child).await?;
        }
    }

    /// Value entries for every key, in key order; `NotFound` if any key is missing
    pub async fn get_entries(
        self: &Arc<Self>,
        ctx: &TreeContext<S>,
        keys: &[S::Key],
        visited: Option<&VisitedAddresses>,
    ) -> Result<Vec<LeafEntry<S::Key, S::Value>>> {
        let cmp = |a: &S::Key, b: &S::Key| ctx.compare(a, b);
        let mut keys: Vec<S::Key> = keys.to_vec();
        keys.sort_by(cmp);
        keys.dedup_by(|a, b| cmp(&*a, &*b) == Ordering::Equal);

        let mut results = Vec::with_capacity(keys.len());
        let mut level = vec![(Arc::clone(self), keys)];

        while !level.is_empty() {
            let mut descend = Vec::new();
            for (node, keys) in level {
                record(visited, node.cid());
                match &node.body {
                    NodeBody::Leaf(list) => {
                        let found = list.find_many(keys.iter(), true, cmp);
                        if found.values().map(Vec::len).sum::<usize>() != keys.len() {
                            return Err(CoreError::NotFound);
                        }
                        results.extend(found.keys().map(|index| list.entries[*index].clone()));
                    }
                    NodeBody::Branch { entries, .. } => {
                        let found = entries.find_many(keys.iter(), false, cmp);
                        if found.values().map(Vec::len).sum::<usize>() != keys.len() {
                            return Err(CoreError::NotFound);
                        }
                        for (index, positions) in found {
                            let subset = positions.into_iter().map(|pos| keys[pos].clone()).collect();
                            descend.push((entries.entries[index].value, subset));
                        }
                    }
                }
            }
            let children = try_join_all(descend.iter().map(|(cid, _)| ctx.get_node(cid))).await?;
            level = children
                .into_iter()
                .zip(descend.into_iter().map(|(_, keys)| keys))
                .collect();
        }

        Ok(results)
    }

    /// Every value entry under this node, in key order
    pub async fn get_all_entries(
        self: &Arc<Self>,
        ctx: &TreeContext<S>,
        visited: Option<&VisitedAddresses>,
    ) -> Result<Vec<LeafEntry<S::Key, S::Value>>> {
        let mut results = Vec::new();
        let mut level = vec![Arc::clone(self)];

        while !level.is_empty() {
            let mut descend = Vec::new();
            for node in &level {
                record(visited, node.cid());
                match &node.body {
                    NodeBody::Leaf(list) => results.extend(list.entries.iter().cloned()),
                    NodeBody::Branch { entries, .. } => {
                        descend.extend(entries.iter().map(|entry| entry.value))
                    }
                }
            }
            level = try_join_all(descend.iter().map(|cid| ctx.get_node(cid))).await?;
        }

        Ok(results)
    }

    /// Value entries with `start <= key <= end`, in key order
    ///
    /// Only the first and last intersecting child of each branch are range
    /// filtered; children in between are read whole.
    pub async fn get_range_entries(
        self: &Arc<Self>,
        ctx: &TreeContext<S>,
        start: &S::Key,
        end: &S::Key,
        visited: Option<&VisitedAddresses>,
    ) -> Result<Vec<LeafEntry<S::Key, S::Value>>> {
        let cmp = |a: &S::Key, b: &S::Key| ctx.compare(a, b);
        let mut results = Vec::new();
        let mut level = vec![(Arc::clone(self), Scan::Range)];

        while !level.is_empty() {
            let mut descend: Vec<(Cid, Scan)> = Vec::new();
            for (node, scan) in &level {
                record(visited, node.cid());
                match (&node.body, scan) {
                    (NodeBody::Leaf(list), Scan::All) => results.extend(list.entries.iter().cloned()),
                    (NodeBody::Leaf(list), Scan::Range) => results.extend(
                        list.iter()
                            .filter(|entry| {
                                cmp(&entry.key, start) != Ordering::Less
                                    && cmp(&entry.key, end) != Ordering::Greater
                            })
                            .cloned(),
                    ),
                    (NodeBody::Branch { entries, .. }, Scan::All) => {
                        descend.extend(entries.iter().map(|entry| (entry.value, Scan::All)))
                    }
                    (NodeBody::Branch { entries, .. }, Scan::Range) => {
                        let range = entries.find_range(start, end, cmp);
                        let (first, last) = (range.start, range.end.saturating_sub(1));
                        for index in range {
                            let scan = if index == first || index == last {
                                Scan::Range
                            } else {
                                Scan::All
                            };
                            descend.push((entries.entries[index].value, scan));
                        }
                    }
                }
            }
            let children = try_join_all(descend.iter().map(|(cid, _)| ctx.get_node(cid))).await?;
            level = children
                .into_iter()
                .zip(descend.into_iter().map(|(_, scan)| scan))
                .collect();
        }

        Ok(results)
    }
}

impl<S: TreeSchema> fmt::Debug for Node<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("cid", self.cid())
            .field("height", &self.height())
            .field("entries", &self.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}
