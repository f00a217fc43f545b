//! Basic usage example for prolly trees
//!
//! This example demonstrates:
//! - Building a map from a batch of entries
//! - Point lookups and range scans
//! - Applying mutation batches and keeping old versions
//! - Reloading a tree from its root CID
//!
//! Run with: cargo run --example basic_usage

use prolly_blockstore::{BlockStore, MemoryBlockStore};
use prolly_core::prolly::map::ProllyMap;
use prolly_core::prolly::sparse_array::SparseArray;
use prolly_core::{Mutation, ProllyConfig};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "prolly_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    println!("Prolly Trees - Basic Usage Example\n");

    let store: Arc<dyn BlockStore> = Arc::new(MemoryBlockStore::new());
    let config = ProllyConfig::default();

    // ==================== Build ====================

    let fruit = [("apple", 3u64), ("banana", 12), ("cherry", 40), ("damson", 7), ("elder", 1)];
    let mut map = ProllyMap::create(
        &config,
        Arc::clone(&store),
        fruit.iter().map(|(name, count)| (name.to_string(), *count)),
    )
    .await?;
    println!("Built map with root {}", map.root_cid());

    // ==================== Read ====================

    println!("cherry -> {:?}", map.get(&"cherry".to_string()).await?);
    for (name, count) in map.range(&"b".to_string(), &"d".to_string()).await? {
        println!("  in range: {name} = {count}");
    }

    // ==================== Mutate ====================

    let before = map.clone();
    let previous = map
        .apply(vec![
            Mutation::put("apple".to_string(), 4),
            Mutation::put("fig".to_string(), 9),
            Mutation::delete("damson".to_string()),
        ])
        .await?;
    println!("\nBatch replaced {} entries, new root {}", previous.len(), map.root_cid());
    println!("Old version still reads apple = {:?}", before.get(&"apple".to_string()).await?);

    // ==================== Reload ====================

    let reloaded = ProllyMap::<String, u64>::load(&config, Arc::clone(&store), *map.root_cid()).await?;
    println!("\nReloaded map has {} entries", reloaded.entries().await?.len());

    // ==================== Sparse arrays ====================

    let mut array = SparseArray::create(&config, store, [(0u64, "zero".to_string()), (1000, "k".to_string())]).await?;
    array.set(42, "answer".to_string()).await?;
    println!("Sparse array length: {}", array.get_length().await?);

    Ok(())
}
