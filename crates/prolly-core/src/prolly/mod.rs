//! Prolly tree engine
//!
//! Prolly trees (probabilistic B-trees) combine properties of B-trees and Merkle trees:
//! - Content-defined node boundaries, so a key set always converges to one tree
//! - Structural sharing between versions
//! - O(log n) lookups and batched rewrites
//! - Every node addressed by the hash of its encoding

mod builder;
mod cache;
mod chunker;
mod config;
mod context;
mod entry;
mod glue;
mod leftmost;
mod node;
mod schema;
mod transaction;
mod tree;
mod visited;

pub mod cid_set;
pub mod db_index;
pub mod map;
pub mod sparse_array;

pub use builder::{build_branches, build_leaves, chunk_entries};
pub use cache::{LruNodeCache, NoCache, NodeCache, SharedNodeCache};
pub use chunker::{BoundaryFactor, Chunker};
pub use config::ProllyConfig;
pub use context::TreeContext;
pub use entry::{BranchEntry, Entry, EntryList, LeafEntry};
pub use node::{Node, NodeBody};
pub use schema::{entry_identity, Payload, TreeSchema};
pub use transaction::{BulkResult, Mutation};
pub use tree::{ProllyTree, TreeStats};
pub use visited::VisitedAddresses;

/// Default branching factor (average entries per node)
pub const DEFAULT_BRANCHING_FACTOR: u32 = 32;

/// Height past which a tree that still has several roots is reported as diverged
pub const MAX_TREE_HEIGHT: u32 = 64;
