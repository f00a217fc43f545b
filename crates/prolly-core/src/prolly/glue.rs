//! Boundary gluing
//!
//! Children of a branch are rebuilt independently, so the right edge of one
//! rebuilt child and the left edge of the next can both be open: together they
//! form one unfinished run that has to be chunked as if it had never been
//! split. Gluing walks a sequence of sibling references left to right, holds
//! any fresh node whose right spine is open, and merges it with whatever comes
//! next before rechunking.
//!
//! Merging two branches means merging their children first, one height down,
//! so the walk keeps an explicit stack of frames (one per height being glued)
//! instead of recursing.

use super::entry::BranchEntry;
use super::node::NodeBody;
use super::schema::TreeSchema;
use super::transaction::Transaction;
use crate::{CoreError, Result};
use std::collections::VecDeque;
use tracing::trace;

struct Frame<K> {
    height: u32,
    pending: VecDeque<BranchEntry<K>>,
    glued: Vec<BranchEntry<K>>,
    prepend: Option<BranchEntry<K>>,
}

impl<K> Frame<K> {
    fn new(height: u32, items: Vec<BranchEntry<K>>) -> Self {
        Self {
            height,
            glued: Vec::with_capacity(items.len()),
            pending: items.into(),
            prepend: None,
        }
    }

    fn finish(mut self) -> Vec<BranchEntry<K>> {
        if let Some(prepend) = self.prepend.take() {
            self.glued.push(prepend);
        }
        self.glued
    }
}

impl<S: TreeSchema> Transaction<S> {
    /// Glue a left-to-right run of sibling nodes at `height`
    pub(crate) async fn glue(
        &self,
        items: Vec<BranchEntry<S::Key>>,
        height: u32,
    ) -> Result<Vec<BranchEntry<S::Key>>> {
        let mut stack = vec![Frame::new(height, items)];

        loop {
            let Some(frame) = stack.last_mut() else {
                return Err(CoreError::PreconditionFailed("glue stack underflow".to_string()));
            };

            let Some(item) = frame.pending.pop_front() else {
                let Some(done) = stack.pop() else {
                    return Err(CoreError::PreconditionFailed("glue stack underflow".to_string()));
                };
                let glued = done.finish();
                let Some(parent) = stack.last_mut() else {
                    return Ok(glued);
                };
                let rebuilt = self.build_branches(glued, parent.height)?;
                self.absorb(parent, rebuilt);
                continue;
            };

            let Some(prepend) = frame.prepend.take() else {
                if self.is_open(&item.value) {
                    frame.prepend = Some(item);
                } else {
                    frame.glued.push(item);
                }
                continue;
            };

            let left = self.load(&prepend.value).await?;
            let right = self.load(&item.value).await?;
            if left.height() != frame.height || right.height() != frame.height {
                return Err(CoreError::PreconditionFailed(format!(
                    "cannot glue heights {} and {} at height {}",
                    left.height(),
                    right.height(),
                    frame.height
                )));
            }
            trace!(height = frame.height, left = %left.cid(), right = %right.cid(), "gluing");

            match (left.body(), right.body()) {
                (NodeBody::Leaf(a), NodeBody::Leaf(b)) => {
                    let merged = a.iter().chain(b.iter()).cloned().collect();
                    let rebuilt = self.build_leaves(merged)?;
                    self.absorb(frame, rebuilt);
                }
                (NodeBody::Branch { entries: a, .. }, NodeBody::Branch { entries: b, .. }) => {
                    let merged = a.iter().chain(b.iter()).cloned().collect();
                    let child = Frame::new(frame.height - 1, merged);
                    stack.push(child);
                }
                _ => {
                    return Err(CoreError::PreconditionFailed(
                        "cannot glue a leaf to a branch".to_string(),
                    ))
                }
            }
        }
    }

    /// Take rebuilt nodes into a frame; an open last node is held for the next merge
    fn absorb(&self, frame: &mut Frame<S::Key>, mut rebuilt: Vec<BranchEntry<S::Key>>) {
        let last = rebuilt.pop();
        frame.glued.extend(rebuilt);
        if let Some(last) = last {
            if self.is_open(&last.value) {
                frame.prepend = Some(last);
            } else {
                frame.glued.push(last);
            }
        }
    }
}
