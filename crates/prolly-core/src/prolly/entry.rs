//! Entries and entry lists
//!
//! An [`EntryList`] is the ordered content of one node together with its
//! `closed` flag. All searches here assume the list is sorted by the schema
//! comparator and that lookup batches are sorted the same way.

use cid::Cid;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::ops::Range;

/// A `(key, payload)` pair
///
/// Serialized as a two element list, `[key, payload]`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Entry<K, P> {
    /// The key
    pub key: K,
    /// The value (leaf) or child address (branch)
    pub value: P,
}

/// Leaf entry: the payload is the stored value
pub type LeafEntry<K, V> = Entry<K, V>;

/// Branch entry: the payload is a child node address
pub type BranchEntry<K> = Entry<K, Cid>;

impl<K, P> Entry<K, P> {
    /// Create a new entry
    pub fn new(key: K, value: P) -> Self {
        Self { key, value }
    }

    /// Split into `(key, value)`
    pub fn into_pair(self) -> (K, P) {
        (self.key, self.value)
    }
}

impl<K, P> From<(K, P)> for Entry<K, P> {
    fn from((key, value): (K, P)) -> Self {
        Self { key, value }
    }
}

impl<K: Serialize, P: Serialize> Serialize for Entry<K, P> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (&self.key, &self.value).serialize(serializer)
    }
}

impl<'de, K: Deserialize<'de>, P: Deserialize<'de>> Deserialize<'de> for Entry<K, P> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let (key, value) = <(K, P)>::deserialize(deserializer)?;
        Ok(Self { key, value })
    }
}

/// Ordered entries plus the chunk boundary flag
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EntryList<K, P> {
    /// Entries in comparator order
    pub entries: Vec<Entry<K, P>>,
    /// `true` once the chunker closed this list; only the rightmost list of a height may be open
    pub closed: bool,
}

impl<K, P> EntryList<K, P> {
    /// Create a list from already ordered entries
    pub fn new(entries: Vec<Entry<K, P>>, closed: bool) -> Self {
        Self { entries, closed }
    }

    /// An empty, open list
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
            closed: false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Key of the first entry
    pub fn start_key(&self) -> Option<&K> {
        self.entries.first().map(|entry| &entry.key)
    }

    pub fn first(&self) -> Option<&Entry<K, P>> {
        self.entries.first()
    }

    pub fn last(&self) -> Option<&Entry<K, P>> {
        self.entries.last()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Entry<K, P>> {
        self.entries.iter()
    }

    /// Index of the rightmost entry whose key is `<= key`
    pub fn find<F>(&self, key: &K, compare: F) -> Option<usize>
    where
        F: Fn(&K, &K) -> Ordering,
    {
        self.entries
            .iter()
            .rposition(|entry| compare(&entry.key, key) != Ordering::Greater)
    }

    /// Index of the entry whose key equals `key`
    pub fn find_exact<F>(&self, key: &K, compare: F) -> Option<usize>
    where
        F: Fn(&K, &K) -> Ordering,
    {
        self.entries
            .binary_search_by(|entry| compare(&entry.key, key))
            .ok()
    }

    /// Partition a sorted batch of keys by the entry each falls under.
    ///
    /// Returns entry index -> positions in `keys`. In strict mode only exact
    /// matches are reported; otherwise a key goes to the rightmost entry whose
    /// key is `<= key`. Keys that match nothing are left out.
    pub fn find_many<'k, F>(
        &self,
        keys: impl IntoIterator<Item = &'k K>,
        strict: bool,
        compare: F,
    ) -> BTreeMap<usize, Vec<usize>>
    where
        K: 'k,
        F: Fn(&K, &K) -> Ordering,
    {
        let keys: Vec<&K> = keys.into_iter().collect();
        let mut found: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        let mut cursor = self.entries.len();

        // Single sweep from the right; both sequences are sorted.
        for (pos, key) in keys.iter().enumerate().rev() {
            while cursor > 0 && compare(&self.entries[cursor - 1].key, key) == Ordering::Greater {
                cursor -= 1;
            }
            if cursor == 0 {
                break;
            }
            let index = cursor - 1;
            if strict && compare(&self.entries[index].key, key) != Ordering::Equal {
                continue;
            }
            found.entry(index).or_default().push(pos);
        }

        for positions in found.values_mut() {
            positions.reverse();
        }
        found
    }

    /// Contiguous index range of entries whose span may intersect `[start, end]`.
    ///
    /// For branch lists an entry spans from its key up to the next entry's key,
    /// so the range starts at the entry holding `start`.
    pub fn find_range<F>(&self, start: &K, end: &K, compare: F) -> Range<usize>
    where
        F: Fn(&K, &K) -> Ordering,
    {
        if compare(start, end) == Ordering::Greater {
            return 0..0;
        }
        let last = match self.find(end, &compare) {
            Some(last) => last,
            None => return 0..0,
        };
        let first = self.find(start, &compare).unwrap_or(0);
        first..last + 1
    }
}

impl<K, P> Default for EntryList<K, P> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<'a, K, P> IntoIterator for &'a EntryList<K, P> {
    type Item = &'a Entry<K, P>;
    type IntoIter = std::slice::Iter<'a, Entry<K, P>>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
