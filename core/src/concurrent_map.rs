use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::hash::{BuildHasher, Hash};
use std::ops::AddAssign;

/// A key-value map split into independently locked shards.
///
/// Every key lives in exactly one shard, chosen from its hash. Mutations lock only that shard, so
/// threads working on different shards never wait on each other. A single `accumulate` or `erase`
/// is atomic; nothing spans more than one key.
pub struct ConcurrentMap<K, V, S = ahash::RandomState> {
    shards: Vec<Mutex<BTreeMap<K, V>>>,
    hasher: S,
}

impl<K, V> ConcurrentMap<K, V>
where
    K: Ord + Hash,
{
    /// Creates a map with `shard_count` shards (at least one).
    pub fn new(shard_count: usize) -> Self {
        Self::with_hasher(shard_count, ahash::RandomState::new())
    }
}

impl<K, V, S> ConcurrentMap<K, V, S>
where
    K: Ord + Hash,
    S: BuildHasher,
{
    pub fn with_hasher(shard_count: usize, hasher: S) -> Self {
        let shards = (0..shard_count.max(1)).map(|_| Mutex::new(BTreeMap::new())).collect();
        Self { shards, hasher }
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    fn shard_for(&self, key: &K) -> &Mutex<BTreeMap<K, V>> {
        let idx = (self.hasher.hash_one(key) % self.shards.len() as u64) as usize;
        &self.shards[idx]
    }

    /// Adds `delta` to the value stored under `key`, starting from `V::default()`.
    pub fn accumulate<D>(&self, key: K, delta: D)
    where
        V: Default + AddAssign<D>,
    {
        self.update(key, |value| *value += delta);
    }

    /// Runs `f` on the value under `key` while its shard is locked.
    pub fn update<F>(&self, key: K, f: F)
    where
        V: Default,
        F: FnOnce(&mut V),
    {
        let mut shard = self.shard_for(&key).lock();
        f(shard.entry(key).or_default());
    }

    pub fn erase(&self, key: &K) -> Option<V> {
        self.shard_for(key).lock().remove(key)
    }

    /// Merges all shards into one ordered map.
    ///
    /// Shard locks are taken in index order and held until the copy is complete, so the result is
    /// a consistent snapshot even if other threads are still mutating.
    pub fn build_ordinary_map(&self) -> BTreeMap<K, V>
    where
        K: Clone,
        V: Clone,
    {
        let guards: Vec<_> = self.shards.iter().map(|shard| shard.lock()).collect();
        let mut result = BTreeMap::new();
        for guard in &guards {
            result.extend(guard.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        result
    }

    /// Consumes the map, merging every shard without copying entries.
    pub fn into_ordinary_map(self) -> BTreeMap<K, V> {
        let mut result = BTreeMap::new();
        for shard in self.shards {
            result.append(&mut shard.into_inner());
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_across_threads() {
        let map: ConcurrentMap<i32, i64> = ConcurrentMap::new(4);
        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    for key in 0..100 {
                        map.accumulate(key, 1i64);
                    }
                });
            }
        });
        let merged = map.build_ordinary_map();
        assert_eq!(merged.len(), 100);
        assert!(merged.values().all(|&v| v == 8));
    }

    #[test]
    fn erase_removes_only_that_key() {
        let map: ConcurrentMap<i32, f64> = ConcurrentMap::new(3);
        map.accumulate(1, 0.5);
        map.accumulate(2, 0.25);
        map.accumulate(1, 0.5);
        assert_eq!(map.erase(&1), Some(1.0));
        assert_eq!(map.erase(&7), None);
        let merged = map.into_ordinary_map();
        assert_eq!(merged.into_iter().collect::<Vec<_>>(), vec![(2, 0.25)]);
    }

    #[test]
    fn zero_shards_becomes_one() {
        let map: ConcurrentMap<String, u32> = ConcurrentMap::new(0);
        assert_eq!(map.shard_count(), 1);
        map.accumulate("a".to_string(), 2u32);
        assert_eq!(map.build_ordinary_map()["a"], 2);
    }

    #[test]
    fn snapshot_is_ordered_by_key() {
        let map: ConcurrentMap<i32, i32> = ConcurrentMap::new(5);
        for key in [9, 3, 7, 1, 5] {
            map.accumulate(key, key);
        }
        let keys: Vec<_> = map.build_ordinary_map().into_keys().collect();
        assert_eq!(keys, vec![1, 3, 5, 7, 9]);
    }
}
