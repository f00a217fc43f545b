//! Chunked node construction
//!
//! Groups an ordered run of entries into nodes: the chunker is asked about
//! every entry in turn and a `true` answer closes the node being filled. A
//! trailing partial run becomes one open node.

use super::chunker::Chunker;
use super::entry::{BranchEntry, Entry, LeafEntry};
use super::node::Node;
use super::schema::TreeSchema;
use crate::{CoreError, Result};

/// Split `entries` into `(chunk, closed)` runs
pub fn chunk_entries<K, P, F>(
    entries: Vec<Entry<K, P>>,
    height: u32,
    chunker: &dyn Chunker,
    identity: F,
) -> Result<Vec<(Vec<Entry<K, P>>, bool)>>
where
    F: Fn(&Entry<K, P>) -> Result<u32>,
{
    let mut chunks = Vec::new();
    let mut current = Vec::new();

    for entry in entries {
        let boundary = chunker.is_boundary(identity(&entry)?, height);
        current.push(entry);
        if boundary {
            chunks.push((std::mem::take(&mut current), true));
        }
    }
    if !current.is_empty() {
        chunks.push((current, false));
    }

    Ok(chunks)
}

/// Build leaves from ordered leaf entries
pub fn build_leaves<S: TreeSchema>(
    schema: &S,
    chunker: &dyn Chunker,
    entries: Vec<LeafEntry<S::Key, S::Value>>,
) -> Result<Vec<Node<S>>> {
    chunk_entries(entries, 0, chunker, |entry| schema.leaf_identity(entry))?
        .into_iter()
        .map(|(chunk, closed)| Node::leaf(schema, chunk, closed))
        .collect()
}

/// Build branches at `height` from ordered child references
pub fn build_branches<S: TreeSchema>(
    schema: &S,
    chunker: &dyn Chunker,
    entries: Vec<BranchEntry<S::Key>>,
    height: u32,
) -> Result<Vec<Node<S>>> {
    if height == 0 {
        return Err(CoreError::PreconditionFailed(
            "branches cannot be built at height 0".to_string(),
        ));
    }
    chunk_entries(entries, height, chunker, |entry| schema.branch_identity(entry))?
        .into_iter()
        .map(|(chunk, closed)| Node::branch(height, chunk, closed))
        .collect()
}
