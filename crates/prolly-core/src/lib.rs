//! # Prolly Core
//!
//! Content-addressed prolly tree engine.
//!
//! This crate provides:
//! - **Prolly Trees**: Immutable, chunked search trees whose shape depends only on their contents
//! - **Bulk Transactions**: Batched mutations that rebuild only the touched paths
//! - **Specializations**: Ordered maps, sparse arrays, CID sets and secondary indexes
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  Map │ SparseArray │ CidSet │ DbIndex   │
//! ├─────────────────────────────────────────┤
//! │     ProllyTree (reads, bulk, create)    │
//! ├─────────────────────────────────────────┤
//! │  Transaction │ Glue │ Leftmost graft    │
//! ├─────────────────────────────────────────┤
//! │  Node │ EntryList │ Chunker │ Builder   │
//! ├─────────────────────────────────────────┤
//! │      BlockStore + NodeCache             │
//! └─────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use prolly_core::prolly::{map::ProllyMap, ProllyConfig};
//!
//! let mut map = ProllyMap::create(&ProllyConfig::default(), store, [("a".to_string(), 1)]).await?;
//! map.insert("b".to_string(), 2).await?;
//! assert_eq!(map.get(&"b".to_string()).await?, Some(2));
//! ```

pub mod error;
pub mod prolly;

pub use error::{CoreError, Result};
pub use prolly::{Mutation, ProllyConfig, ProllyTree, TreeContext, TreeSchema};
