//! Integration tests for prolly trees
//!
//! These tests pin tree shapes for small fixtures and exercise the
//! specializations end to end against an in-memory block store.

use cid::Cid;
use prolly_blockstore::{BlockStore, MemoryBlockStore};
use prolly_core::prolly::cid_set::CidSet;
use prolly_core::prolly::db_index::DbIndex;
use prolly_core::prolly::map::{MapSchema, ProllyMap};
use prolly_core::prolly::sparse_array::SparseArray;
use prolly_core::prolly::{BoundaryFactor, Entry, VisitedAddresses};
use prolly_core::{CoreError, Mutation, ProllyConfig, ProllyTree, TreeContext, TreeSchema};
use rstest::rstest;
use std::sync::Arc;

const MAP_KEYS: [&str; 10] = ["a", "b", "bb", "c", "cc", "d", "ff", "h", "z", "zz"];
const SPARSE_INDICES: [u64; 10] = [1, 2, 10, 15, 20, 200, 210, 290, 300, 10000];

fn config() -> ProllyConfig {
    ProllyConfig {
        branching_factor: 3,
        ..Default::default()
    }
}

fn store() -> Arc<dyn BlockStore> {
    Arc::new(MemoryBlockStore::new())
}

fn length_entries(keys: &[&str]) -> Vec<(String, u64)> {
    keys.iter().map(|k| (k.to_string(), k.len() as u64)).collect()
}

/// Describe every level top-down as `L|B`, entry count and `T|F` for closed
async fn shape<S: TreeSchema>(tree: &ProllyTree<S>) -> Vec<String> {
    let ctx = tree.context();
    let mut levels = Vec::new();
    let mut level = vec![Arc::clone(tree.root())];
    loop {
        let described: Vec<String> = level
            .iter()
            .map(|node| {
                format!(
                    "{}{}{}",
                    if node.is_leaf() { "L" } else { "B" },
                    node.len(),
                    if node.is_closed() { "T" } else { "F" }
                )
            })
            .collect();
        levels.push(described.join(" "));

        let children: Vec<Cid> = level.iter().flat_map(|node| node.child_cids()).collect();
        if children.is_empty() {
            break;
        }
        let mut next = Vec::with_capacity(children.len());
        for cid in &children {
            next.push(ctx.get_node(cid).await.unwrap());
        }
        level = next;
    }
    levels
}

#[test_log::test(tokio::test)]
async fn test_map_fixture_shape() {
    let map = ProllyMap::create(&config(), store(), length_entries(&MAP_KEYS))
        .await
        .unwrap();

    assert_eq!(
        shape(map.tree()).await,
        vec!["B2F", "B5T B1T", "L1T L3T L1T L2T L2T L1F"]
    );
}

#[test_log::test(tokio::test)]
async fn test_small_map_fixture_shape() {
    let map = ProllyMap::create(&config(), store(), length_entries(&MAP_KEYS[..5]))
        .await
        .unwrap();

    assert_eq!(shape(map.tree()).await, vec!["B3F", "L1T L3T L1T"]);
}

#[test_log::test(tokio::test)]
async fn test_sparse_array_fixture_shape() {
    let items = SPARSE_INDICES.iter().map(|i| (*i, "value".to_string()));
    let array = SparseArray::create(&config(), store(), items).await.unwrap();

    assert_eq!(
        shape(array.tree()).await,
        vec!["B2T", "B4T B1F", "L2T L1T L1T L4T L2F"]
    );
    assert_eq!(array.get_length().await.unwrap(), 10001);
}

#[rstest]
#[case::inner("b", "z", 1..9)]
#[case::exact_edges("a", "zz", 0..10)]
#[case::between_keys("ca", "e", 4..6)]
#[case::past_the_end("zzz", "zzzz", 10..10)]
#[tokio::test]
async fn test_map_range(#[case] start: &str, #[case] end: &str, #[case] expected: std::ops::Range<usize>) {
    let map = ProllyMap::create(&config(), store(), length_entries(&MAP_KEYS))
        .await
        .unwrap();

    let found = map.range(&start.to_string(), &end.to_string()).await.unwrap();
    assert_eq!(found, length_entries(&MAP_KEYS[expected]));
}

#[tokio::test]
async fn test_map_range_rejects_inverted_bounds() {
    let map = ProllyMap::create(&config(), store(), length_entries(&MAP_KEYS))
        .await
        .unwrap();

    let result = map.range(&"z".to_string(), &"b".to_string()).await;
    assert!(matches!(result, Err(CoreError::PreconditionFailed(_))));
}

#[tokio::test]
async fn test_sparse_array_range() {
    let items = SPARSE_INDICES.iter().map(|i| (*i, "value".to_string()));
    let array = SparseArray::create(&config(), store(), items).await.unwrap();

    let found: Vec<u64> = array
        .get_range(2, 400)
        .await
        .unwrap()
        .into_iter()
        .map(|(index, _)| index)
        .collect();
    assert_eq!(found, SPARSE_INDICES[1..9].to_vec());
}

#[test_log::test(tokio::test)]
async fn test_leftmost_insert_matches_create() {
    let store = store();
    let mut map = ProllyMap::create(&config(), Arc::clone(&store), [("b".to_string(), 1u64)])
        .await
        .unwrap();
    map.insert("a".to_string(), 2).await.unwrap();

    let expected = ProllyMap::create(
        &config(),
        store,
        [("a".to_string(), 2u64), ("b".to_string(), 1)],
    )
    .await
    .unwrap();

    assert_eq!(map.root_cid(), expected.root_cid());
    assert_eq!(shape(map.tree()).await, vec!["B2F", "B1T B1F", "L1T L1F"]);
}

#[tokio::test]
async fn test_insert_before_existing_keys() {
    let store = store();
    let mut map = ProllyMap::create(&config(), Arc::clone(&store), length_entries(&["b", "c", "d"]))
        .await
        .unwrap();
    assert_eq!(map.insert("a".to_string(), 1).await.unwrap(), None);

    let expected = ProllyMap::create(&config(), store, length_entries(&["a", "b", "c", "d"]))
        .await
        .unwrap();
    assert_eq!(map.root_cid(), expected.root_cid());
    assert_eq!(map.entries().await.unwrap(), length_entries(&["a", "b", "c", "d"]));
}

#[tokio::test]
async fn test_insert_into_fixture() {
    let store = store();
    let mut map = ProllyMap::create(&config(), Arc::clone(&store), length_entries(&MAP_KEYS))
        .await
        .unwrap();
    map.insert("x".to_string(), 1).await.unwrap();

    let mut keys = MAP_KEYS.to_vec();
    keys.insert(8, "x");
    let expected_entries = length_entries(&keys);
    let expected = ProllyMap::create(&config(), store, expected_entries.clone())
        .await
        .unwrap();

    assert_eq!(map.root_cid(), expected.root_cid());
    assert_eq!(map.entries().await.unwrap(), expected_entries);
}

#[tokio::test]
async fn test_delete_is_idempotent() {
    let store = store();
    let mut map = ProllyMap::create(&config(), Arc::clone(&store), length_entries(&MAP_KEYS))
        .await
        .unwrap();

    assert_eq!(map.remove("cc".to_string()).await.unwrap(), Some(2));
    let after_first = *map.root_cid();
    assert_eq!(map.remove("cc".to_string()).await.unwrap(), None);
    assert_eq!(map.root_cid(), &after_first);

    // Keys below the minimum and past the maximum
    assert_eq!(map.remove("0".to_string()).await.unwrap(), None);
    assert_eq!(map.remove("zzz".to_string()).await.unwrap(), None);
    assert_eq!(map.root_cid(), &after_first);
}

#[tokio::test]
async fn test_delete_everything_yields_empty_tree() {
    let store = store();
    let mut map = ProllyMap::create(&config(), Arc::clone(&store), length_entries(&MAP_KEYS))
        .await
        .unwrap();

    let deletes = MAP_KEYS.iter().map(|k| Mutation::delete(k.to_string())).collect();
    let previous = map.apply(deletes).await.unwrap();
    assert_eq!(previous, length_entries(&MAP_KEYS));

    let empty = ProllyMap::<String, u64>::create(&config(), store, Vec::new())
        .await
        .unwrap();
    assert!(map.is_empty());
    assert_eq!(map.root_cid(), empty.root_cid());
}

#[tokio::test]
async fn test_mixed_batch_reports_previous() {
    let mut map = ProllyMap::create(&config(), store(), length_entries(&MAP_KEYS))
        .await
        .unwrap();

    let previous = map
        .apply(vec![
            Mutation::put("0".to_string(), 9),
            Mutation::put("c".to_string(), 9),
            Mutation::delete("h".to_string()),
            Mutation::put("c".to_string(), 7),
            Mutation::delete("nope".to_string()),
        ])
        .await
        .unwrap();

    assert_eq!(previous, vec![("c".to_string(), 1), ("h".to_string(), 1)]);
    assert_eq!(map.get(&"c".to_string()).await.unwrap(), Some(7));
    assert_eq!(map.get(&"0".to_string()).await.unwrap(), Some(9));
    assert_eq!(map.get(&"h".to_string()).await.unwrap(), None);
}

#[tokio::test]
async fn test_round_trip_through_store() {
    let store = store();
    let config = ProllyConfig {
        branching_factor: 4,
        cache_capacity: 16,
    };
    let entries: Vec<(String, u64)> = (0..500).map(|i| (format!("key-{i:04}"), i)).collect();
    let map = ProllyMap::create(&config, Arc::clone(&store), entries.clone())
        .await
        .unwrap();

    let reloaded = ProllyMap::<String, u64>::load(&config, store, *map.root_cid())
        .await
        .unwrap();
    assert_eq!(reloaded.entries().await.unwrap(), entries);
    assert_eq!(reloaded.tree().height(), map.tree().height());
}

#[tokio::test]
async fn test_bulk_does_not_touch_store_until_flushed() {
    let memory = Arc::new(MemoryBlockStore::new());
    let store: Arc<dyn BlockStore> = memory.clone();
    let ctx = config().context(MapSchema::<String, u64>::new(), store).unwrap();
    let entries = length_entries(&MAP_KEYS).into_iter().map(Entry::from).collect();
    let tree = ProllyTree::from_entries(ctx, entries).await.unwrap();
    let persisted = memory.len();

    let result = tree
        .bulk(vec![Mutation::put("m".to_string(), 1)])
        .await
        .unwrap();
    assert_eq!(memory.len(), persisted);
    assert_eq!(&result.blocks[0].cid, result.root.cid());
    assert!(!memory.has_block(result.root.cid()).await.unwrap());

    tree.flush(&result.blocks).await.unwrap();
    let next = tree.with_root(result.root);
    assert_eq!(next.get(&"m".to_string()).await.unwrap(), Some(1));
    assert_eq!(tree.get(&"m".to_string()).await.unwrap(), None);
}

#[tokio::test]
async fn test_get_many_requires_every_key() {
    let map = ProllyMap::create(&config(), store(), length_entries(&MAP_KEYS))
        .await
        .unwrap();

    let values = map
        .get_many(&["zz".to_string(), "a".to_string(), "ff".to_string()])
        .await
        .unwrap();
    assert_eq!(values, vec![1, 2, 2]);

    let missing = map.get_many(&["a".to_string(), "q".to_string()]).await;
    assert!(matches!(missing, Err(CoreError::NotFound)));
}

#[tokio::test]
async fn test_traced_range_visits_only_touched_nodes() {
    let ctx = TreeContext::new(
        MapSchema::<u64, u64>::new(),
        BoundaryFactor::new(4).unwrap(),
        store(),
    );
    let entries = (0..1000u64).map(|i| Entry::new(i, i)).collect();
    let tree = ProllyTree::from_entries(ctx, entries).await.unwrap();

    let all = VisitedAddresses::new();
    tree.get_all_entries_traced(&all).await.unwrap();

    let narrow = VisitedAddresses::new();
    let found = tree.get_range_entries_traced(&10, &12, &narrow).await.unwrap();
    assert_eq!(found.len(), 3);
    assert!(narrow.len() < all.len());
    assert!(narrow.contains(tree.root_cid()));
}

#[tokio::test]
async fn test_missing_block_surfaces_store_error() {
    let ctx = config().context(MapSchema::<String, u64>::new(), store()).unwrap();
    let entries = length_entries(&MAP_KEYS).into_iter().map(Entry::from).collect();
    // Built but never flushed
    let (tree, _blocks) = ProllyTree::create(ctx.clone(), entries).await.unwrap();

    let result = ProllyTree::load(ctx, *tree.root_cid()).await;
    assert!(matches!(result, Err(CoreError::BlockStore(_))));
}

#[tokio::test]
async fn test_cid_set_and_index_share_a_store() {
    let store = store();
    let cids: Vec<Cid> = (0..25)
        .map(|i| prolly_blockstore::create_cid(format!("{i}").as_bytes(), prolly_blockstore::CidCodec::Raw))
        .collect();
    let set = CidSet::create(&config(), Arc::clone(&store), cids.clone()).await.unwrap();
    let index = DbIndex::create(
        &config(),
        Arc::clone(&store),
        cids.iter().enumerate().map(|(i, _)| (i as u64 % 3, i as u64, i as u64)),
    )
    .await
    .unwrap();

    let reloaded = CidSet::load(&config(), store, *set.root_cid()).await.unwrap();
    for cid in &cids {
        assert!(reloaded.contains(cid).await.unwrap());
    }
    let rows = index.get(&1).await.unwrap();
    assert_eq!(rows.iter().map(|row| row.id).collect::<Vec<_>>(), vec![1, 4, 7, 10, 13, 16, 19, 22]);
}
