//! Inserts below the current minimum key
//!
//! Ordinary descent routes a key to the rightmost child whose key is not
//! greater, so keys smaller than the whole tree have nowhere to go. They are
//! built into fresh leaves and grafted onto the left spine: at each height,
//! bottom-up, the new nodes are placed in front of the spine node's remaining
//! siblings, glued and rechunked. The result is the tree `create` would build
//! over the combined key set.

use super::entry::{BranchEntry, LeafEntry};
use super::node::Node;
use super::schema::TreeSchema;
use super::transaction::Transaction;
use crate::{CoreError, Result};
use std::sync::Arc;
use tracing::debug;

impl<S: TreeSchema> Transaction<S> {
    /// Graft `inserts`, all smaller than the tree's first key, onto `root`
    pub(crate) async fn graft_leftmost(
        &self,
        root: Arc<Node<S>>,
        inserts: Vec<LeafEntry<S::Key, S::Value>>,
    ) -> Result<Arc<Node<S>>> {
        debug!(inserts = inserts.len(), height = root.height(), "grafting leftmost inserts");
        let leaves = self.build_leaves(inserts)?;
        if root.is_empty() {
            return self.wrap(leaves, 0).await;
        }

        let mut spine = vec![Arc::clone(&root)];
        loop {
            let first_child = spine
                .last()
                .and_then(|node| node.branch_entries())
                .and_then(|list| list.first())
                .map(|entry| entry.value);
            match first_child {
                Some(cid) => spine.push(self.load(&cid).await?),
                None => break,
            }
        }

        let leaf = spine
            .pop()
            .ok_or_else(|| CoreError::PreconditionFailed("empty left spine".to_string()))?;
        let mut items: Vec<BranchEntry<S::Key>> = leaves;
        items.push(leaf.to_branch_entry()?);
        let mut items = self.glue(items, 0).await?;

        while let Some(branch) = spine.pop() {
            let height = branch.height();
            if let Some(list) = branch.branch_entries() {
                items.extend(list.iter().skip(1).cloned());
            }
            items = self.glue(items, height - 1).await?;
            items = self.build_branches(items, height)?;
        }

        self.wrap(items, root.height()).await
    }
}
