//! Lock-sharded hash map.
//!
//! Keys hash to one of [`SHARD_COUNT`] independently locked maps, so updates
//! for unrelated keys never wait on each other.

use parking_lot::Mutex;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

/// Number of shards.
pub const SHARD_COUNT: usize = 16;

/// A `HashMap` split across [`SHARD_COUNT`] mutexes.
pub struct ShardedMap<K, V> {
    shards: Vec<Mutex<HashMap<K, V>>>,
}

impl<K: Hash + Eq, V> ShardedMap<K, V> {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self {
            shards: (0..SHARD_COUNT).map(|_| Mutex::new(HashMap::new())).collect(),
        }
    }

    fn shard(&self, key: &K) -> &Mutex<HashMap<K, V>> {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        // Modulo keeps the value below SHARD_COUNT
        #[allow(clippy::cast_possible_truncation)]
        let index = (hasher.finish() % SHARD_COUNT as u64) as usize;
        &self.shards[index]
    }

    /// Runs `f` on the entry for `key`, creating it with `init` first.
    pub fn update<R>(&self, key: K, init: impl FnOnce() -> V, f: impl FnOnce(&mut V) -> R) -> R {
        let mut shard = self.shard(&key).lock();
        f(shard.entry(key).or_insert_with(init))
    }

    /// Runs `f` on the entry for `key` only if it exists.
    pub fn update_existing<R>(&self, key: &K, f: impl FnOnce(&mut V) -> R) -> Option<R> {
        self.shard(key).lock().get_mut(key).map(f)
    }

    /// Copies out the value for `key`.
    pub fn get(&self, key: &K) -> Option<V>
    where
        V: Clone,
    {
        self.shard(key).lock().get(key).cloned()
    }

    /// Inserts, returning the previous value.
    pub fn insert(&self, key: K, value: V) -> Option<V> {
        self.shard(&key).lock().insert(key, value)
    }

    /// Removes and returns the value for `key`.
    pub fn remove(&self, key: &K) -> Option<V> {
        self.shard(key).lock().remove(key)
    }

    /// Keeps only entries matching `keep`, shard by shard.
    pub fn retain(&self, mut keep: impl FnMut(&K, &mut V) -> bool) {
        for shard in &self.shards {
            shard.lock().retain(|k, v| keep(k, v));
        }
    }

    /// Total entries across shards.
    pub fn len(&self) -> usize {
        self.shards.iter().map(|shard| shard.lock().len()).sum()
    }

    /// Whether every shard is empty.
    pub fn is_empty(&self) -> bool {
        self.shards.iter().all(|shard| shard.lock().is_empty())
    }
}

impl<K: Hash + Eq, V> Default for ShardedMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_update_creates_then_mutates() {
        let map: ShardedMap<u32, u32> = ShardedMap::new();
        map.update(7, || 0, |v| *v += 2);
        map.update(7, || 0, |v| *v += 3);
        assert_eq!(map.get(&7), Some(5));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_retain_spans_all_shards() {
        let map: ShardedMap<u32, u32> = ShardedMap::new();
        for key in 0..100 {
            map.insert(key, key);
        }
        map.retain(|k, _| k % 2 == 0);
        assert_eq!(map.len(), 50);
        assert!(map.get(&3).is_none());
    }

    #[test]
    fn test_concurrent_updates_are_not_lost() {
        let map: Arc<ShardedMap<u32, u64>> = Arc::new(ShardedMap::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let map = Arc::clone(&map);
                thread::spawn(move || {
                    for i in 0..1_000u32 {
                        map.update(i % 32, || 0, |v| *v += 1);
                        map.update(100 + t, || 0, |v| *v += 1);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let shared: u64 = (0..32).filter_map(|k| map.get(&k)).sum();
        assert_eq!(shared, 8_000);
        assert_eq!(map.get(&100), Some(1_000));
    }
}
