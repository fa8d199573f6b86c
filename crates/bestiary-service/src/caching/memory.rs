use std::num::NonZeroUsize;
use std::sync::Mutex;

use super::CacheKey;

/// A bounded key→value store with least-recently-used eviction.
///
/// Capacity is fixed at construction. `get` and `insert` both promote the
/// touched key to most-recently-used; inserting a new key at full capacity
/// evicts the least-recently-used one first. No operation suspends or fails,
/// and nothing here performs I/O.
///
/// The store is used with cheap-to-clone values (`Arc`s and small summaries),
/// so `get` hands out clones instead of guarded references.
pub struct BoundedCache<T> {
    name: &'static str,
    inner: Mutex<lru::LruCache<CacheKey, T>>,
}

impl<T> std::fmt::Debug for BoundedCache<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock().unwrap();
        f.debug_struct("BoundedCache")
            .field("name", &self.name)
            .field("len", &inner.len())
            .field("capacity", &inner.cap())
            .finish()
    }
}

impl<T: Clone> BoundedCache<T> {
    /// Creates a cache holding at most `capacity` values.
    pub fn new(name: &'static str, capacity: NonZeroUsize) -> Self {
        Self {
            name,
            inner: Mutex::new(lru::LruCache::new(capacity)),
        }
    }

    /// Looks up a value, promoting the key to most-recently-used on a hit.
    pub fn get(&self, key: &CacheKey) -> Option<T> {
        self.inner.lock().unwrap().get(key).cloned()
    }

    /// Inserts a value, evicting the least-recently-used entry at capacity.
    ///
    /// Re-inserting an existing key replaces its value and promotes it.
    pub fn insert(&self, key: CacheKey, value: T) {
        let mut inner = self.inner.lock().unwrap();
        if let Some((evicted, _)) = inner.push(key, value) {
            // `push` returns the displaced pair; only log actual evictions,
            // not value replacements for the same key.
            if !inner.contains(&evicted) {
                tracing::trace!(cache = self.name, key = %evicted, "evicted lru entry");
            }
        }
    }

    /// Whether the key is present. Does not affect recency order.
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.inner.lock().unwrap().contains(key)
    }

    /// Drops all entries.
    pub fn clear(&self) {
        self.inner.lock().unwrap().clear();
    }

    /// The number of currently cached values.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
