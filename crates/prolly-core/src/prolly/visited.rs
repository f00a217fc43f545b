//! Visited address accumulator for reads

use cid::Cid;
use parking_lot::Mutex;
use std::collections::BTreeSet;

/// Records every node address a traced read touches
///
/// Shared by concurrent child loads, so recording goes through a lock.
#[derive(Debug, Default)]
pub struct VisitedAddresses {
    cids: Mutex<BTreeSet<Cid>>,
}

impl VisitedAddresses {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one address
    pub fn record(&self, cid: &Cid) {
        self.cids.lock().insert(*cid);
    }

    pub fn contains(&self, cid: &Cid) -> bool {
        self.cids.lock().contains(cid)
    }

    pub fn len(&self) -> usize {
        self.cids.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cids.lock().is_empty()
    }

    /// Snapshot of the recorded addresses in order
    pub fn cids(&self) -> Vec<Cid> {
        self.cids.lock().iter().copied().collect()
    }

    /// Recorded addresses as strings
    pub fn to_strings(&self) -> Vec<String> {
        self.cids.lock().iter().map(Cid::to_string).collect()
    }
}

pub(crate) fn record(visited: Option<&VisitedAddresses>, cid: &Cid) {
    if let Some(visited) = visited {
        visited.record(cid);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prolly_blockstore::{create_cid, CidCodec};

    #[test]
    fn test_records_unique_addresses() {
        let visited = VisitedAddresses::new();
        let a = create_cid(b"a", CidCodec::DagCbor);
        let b = create_cid(b"b", CidCodec::DagCbor);

        visited.record(&a);
        visited.record(&b);
        visited.record(&a);

        assert_eq!(visited.len(), 2);
        assert!(visited.contains(&a));
        assert_eq!(visited.to_strings().len(), 2);
    }

    #[test]
    fn test_record_helper_ignores_none() {
        let a = create_cid(b"a", CidCodec::DagCbor);
        record(None, &a);

        let visited = VisitedAddresses::new();
        record(Some(&visited), &a);
        assert_eq!(visited.cids(), vec![a]);
    }
}
