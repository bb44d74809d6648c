use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

/// Memoisation table keyed by call arguments. Entries expire `ttl` after insertion
/// and can be dropped explicitly with [`TtlCache::clear`].
pub struct TtlCache<K, V> {
    entries: HashMap<K, (V, Instant)>,
    ttl: Duration,
}

impl<K: Eq + Hash, V> TtlCache<K, V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Fresh value for `key`, if any
    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries
            .get(key)
            .filter(|(_, inserted)| inserted.elapsed() < self.ttl)
            .map(|(value, _)| value)
    }

    pub fn insert(&mut self, key: K, value: V) {
        self.entries.insert(key, (value, Instant::now()));
    }

    /// Return the cached value or compute, store and return it.
    /// A failed computation leaves the cache untouched.
    pub fn get_or_try_insert_with<E, F>(&mut self, key: K, compute: F) -> Result<&V, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        let ttl = self.ttl;
        match self.entries.entry(key) {
            Entry::Occupied(mut slot) => {
                if slot.get().1.elapsed() >= ttl {
                    let value = compute()?;
                    slot.insert((value, Instant::now()));
                }
                Ok(&slot.into_mut().0)
            }
            Entry::Vacant(slot) => {
                let value = compute()?;
                Ok(&slot.insert((value, Instant::now())).0)
            }
        }
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.entries.remove(key).map(|(value, _)| value)
    }

    /// Drop expired entries
    pub fn purge_expired(&mut self) {
        let ttl = self.ttl;
        self.entries.retain(|_, (_, inserted)| inserted.elapsed() < ttl);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_within_ttl() {
        let mut cache = TtlCache::new(Duration::from_secs(3600));
        cache.insert("a", 1);
        assert_eq!(cache.get(&"a"), Some(&1));
        assert_eq!(cache.get(&"b"), None);
    }

    #[test]
    fn test_expired_entries_are_misses() {
        let mut cache = TtlCache::new(Duration::ZERO);
        cache.insert("a", 1);
        assert_eq!(cache.get(&"a"), None);
        cache.purge_expired();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_get_or_try_insert_computes_once() {
        let mut cache = TtlCache::new(Duration::from_secs(3600));
        let mut calls = 0;
        for _ in 0..3 {
            let value = cache
                .get_or_try_insert_with(7u32, || {
                    calls += 1;
                    Ok::<_, ()>(calls * 10)
                })
                .unwrap();
            assert_eq!(*value, 10);
        }
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_get_or_try_insert_recomputes_after_expiry() {
        let mut cache = TtlCache::new(Duration::ZERO);
        let mut calls = 0;
        for _ in 0..2 {
            cache
                .get_or_try_insert_with("k", || {
                    calls += 1;
                    Ok::<_, ()>(calls)
                })
                .unwrap();
        }
        assert_eq!(calls, 2);
    }

    #[test]
    fn test_failed_compute_is_not_cached() {
        let mut cache: TtlCache<&str, i32> = TtlCache::new(Duration::from_secs(3600));
        assert!(cache.get_or_try_insert_with("k", || Err("boom")).is_err());
        assert!(cache.is_empty());
        assert_eq!(cache.get_or_try_insert_with("k", || Ok::<_, &str>(5)), Ok(&5));
    }

    #[test]
    fn test_clear_and_remove() {
        let mut cache = TtlCache::new(Duration::from_secs(3600));
        cache.insert(1, "one");
        cache.insert(2, "two");
        assert_eq!(cache.remove(&1), Some("one"));
        assert_eq!(cache.len(), 1);
        cache.clear();
        assert!(cache.is_empty());
    }
}
