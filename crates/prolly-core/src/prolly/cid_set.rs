//! Sets of CIDs
//!
//! Keys are CIDs ordered by their binary form. Leaf blocks store bare links
//! and identities come straight from multihash digests, so no entry is
//! re-encoded for chunking.

use super::config::ProllyConfig;
use super::entry::{BranchEntry, Entry, LeafEntry};
use super::schema::TreeSchema;
use super::transaction::Mutation;
use super::tree::ProllyTree;
use crate::{CoreError, Result};
use cid::Cid;
use ipld_core::ipld::Ipld;
use prolly_blockstore::{digest_tail_u32, BlockStore};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Byte-wise comparison; a strict prefix sorts first
pub fn binary_compare(a: &[u8], b: &[u8]) -> Ordering {
    a.cmp(b)
}

/// Schema for CID sets
#[derive(Clone, Copy, Debug, Default)]
pub struct CidSetSchema;

impl TreeSchema for CidSetSchema {
    type Key = Cid;
    type Value = ();

    fn compare(&self, a: &Cid, b: &Cid) -> Ordering {
        binary_compare(&a.to_bytes(), &b.to_bytes())
    }

    fn leaf_identity(&self, entry: &LeafEntry<Cid, ()>) -> Result<u32> {
        Ok(digest_tail_u32(entry.key.hash().digest()))
    }

    fn branch_identity(&self, entry: &BranchEntry<Cid>) -> Result<u32> {
        Ok(digest_tail_u32(entry.value.hash().digest()))
    }

    fn encode_leaf_entry(&self, entry: &LeafEntry<Cid, ()>) -> Result<Ipld> {
        Ok(Ipld::Link(entry.key))
    }

    fn decode_leaf_entry(&self, ipld: Ipld) -> Result<LeafEntry<Cid, ()>> {
        match ipld {
            Ipld::Link(cid) => Ok(Entry::new(cid, ())),
            other => Err(CoreError::Serialization(format!(
                "expected a link in a CID set leaf, got {other:?}"
            ))),
        }
    }
}

/// A persistent set of CIDs
#[derive(Clone, Debug)]
pub struct CidSet {
    tree: ProllyTree<CidSetSchema>,
}

impl CidSet {
    /// Build and persist a set
    pub async fn create(
        config: &ProllyConfig,
        store: Arc<dyn BlockStore>,
        cids: impl IntoIterator<Item = Cid>,
    ) -> Result<Self> {
        let ctx = config.context(CidSetSchema, store)?;
        let entries = cids.into_iter().map(|cid| Entry::new(cid, ())).collect();
        Ok(Self {
            tree: ProllyTree::from_entries(ctx, entries).await?,
        })
    }

    /// Open a persisted set
    pub async fn load(config: &ProllyConfig, store: Arc<dyn BlockStore>, root: Cid) -> Result<Self> {
        let ctx = config.context(CidSetSchema, store)?;
        Ok(Self {
            tree: ProllyTree::load(ctx, root).await?,
        })
    }

    pub fn tree(&self) -> &ProllyTree<CidSetSchema> {
        &self.tree
    }

    pub fn root_cid(&self) -> &Cid {
        self.tree.root_cid()
    }

    pub async fn contains(&self, cid: &Cid) -> Result<bool> {
        Ok(self.tree.get(cid).await?.is_some())
    }

    /// Add CIDs; returns how many were new
    pub async fn add(&mut self, cids: impl IntoIterator<Item = Cid>) -> Result<usize> {
        let unique: BTreeSet<Cid> = cids.into_iter().collect();
        let mutations: Vec<_> = unique.into_iter().map(|cid| Mutation::put(cid, ())).collect();
        let total = mutations.len();
        let previous = self.tree.apply(mutations).await?;
        Ok(total - previous.len())
    }

    /// Remove a CID; returns whether it was present
    pub async fn remove(&mut self, cid: Cid) -> Result<bool> {
        let previous = self.tree.apply(vec![Mutation::delete(cid)]).await?;
        Ok(!previous.is_empty())
    }

    /// Members in binary order
    pub async fn cids(&self) -> Result<Vec<Cid>> {
        let entries = self.tree.get_all_entries().await?;
        Ok(entries.into_iter().map(|entry| entry.key).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prolly_blockstore::{create_cid, CidCodec, MemoryBlockStore};

    fn cids(n: usize) -> Vec<Cid> {
        (0..n)
            .map(|i| create_cid(format!("block-{i}").as_bytes(), CidCodec::Raw))
            .collect()
    }

    fn config() -> ProllyConfig {
        ProllyConfig {
            branching_factor: 3,
            ..Default::default()
        }
    }

    #[test]
    fn test_binary_compare() {
        assert_eq!(binary_compare(&[1, 2], &[1, 2]), Ordering::Equal);
        assert_eq!(binary_compare(&[1], &[1, 0]), Ordering::Less);
        assert_eq!(binary_compare(&[2], &[1, 9]), Ordering::Greater);
    }

    #[test]
    fn test_leaf_entries_are_bare_links() {
        let cid = cids(1)[0];
        let ipld = CidSetSchema.encode_leaf_entry(&Entry::new(cid, ())).unwrap();
        assert_eq!(ipld, Ipld::Link(cid));
        assert_eq!(CidSetSchema.decode_leaf_entry(ipld).unwrap().key, cid);
        assert!(CidSetSchema.decode_leaf_entry(Ipld::Null).is_err());
    }

    #[tokio::test]
    async fn test_set_membership() {
        let store = Arc::new(MemoryBlockStore::new());
        let all = cids(40);
        let mut set = CidSet::create(&config(), store, all[..30].to_vec()).await.unwrap();

        assert!(set.contains(&all[5]).await.unwrap());
        assert!(!set.contains(&all[35]).await.unwrap());

        assert_eq!(set.add(all[25..].to_vec()).await.unwrap(), 10);
        assert!(set.contains(&all[35]).await.unwrap());

        assert!(set.remove(all[0]).await.unwrap());
        assert!(!set.remove(all[0]).await.unwrap());
        assert_eq!(set.cids().await.unwrap().len(), 39);
    }

    #[tokio::test]
    async fn test_members_are_binary_ordered() {
        let store = Arc::new(MemoryBlockStore::new());
        let set = CidSet::create(&config(), store, cids(20)).await.unwrap();

        let members = set.cids().await.unwrap();
        let bytes: Vec<Vec<u8>> = members.iter().map(Cid::to_bytes).collect();
        assert!(bytes.windows(2).all(|pair| pair[0] < pair[1]));
    }
}
