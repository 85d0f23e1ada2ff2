use std::cell::RefCell;
use std::hash::{BuildHasher, Hash};
use std::sync::Arc;

use parking_lot::ReentrantMutex;
use rustc_hash::FxBuildHasher;

use doublemap::DoubleHashMap as SingleThreadedMap;

mod guard;

pub use doublemap::{MapError, Result};
pub use guard::TableGuard;

/// A hash map shared between threads behind a single reentrant lock.
///
/// Every handle produced by `clone` points at the same backing table; the
/// lock lives next to the table inside the shared allocation, and every
/// operation holds it for its full duration, reads included. Iteration and
/// resizing happen entirely inside the lock, so no thread ever observes a
/// partially-updated table.
///
/// The lock is reentrant: a thread composing a multi-step sequence through
/// [`lock`](DoubleHashMap::lock) may keep calling these methods without
/// deadlocking against itself.
pub struct DoubleHashMap<K, V, S = FxBuildHasher> {
    shared: Arc<ReentrantMutex<RefCell<SingleThreadedMap<K, V, S>>>>,
}

impl<K, V, S> Clone for DoubleHashMap<K, V, S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<K, V> Default for DoubleHashMap<K, V, FxBuildHasher> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> DoubleHashMap<K, V, FxBuildHasher> {
    /// Creates a shared map with the default capacity and load factor.
    pub fn new() -> Self {
        Self::from_table(SingleThreadedMap::new())
    }

    /// Creates a shared map with the given capacity and load factor.
    pub fn with_options(capacity: usize, load_factor: f64) -> Result<Self> {
        Ok(Self::from_table(SingleThreadedMap::with_options(
            capacity,
            load_factor,
        )?))
    }
}

impl<K, V, S> DoubleHashMap<K, V, S> {
    pub fn with_hasher(hasher: S) -> Self {
        Self::from_table(SingleThreadedMap::with_hasher(hasher))
    }

    pub fn with_options_and_hasher(capacity: usize, load_factor: f64, hasher: S) -> Result<Self> {
        Ok(Self::from_table(SingleThreadedMap::with_options_and_hasher(
            capacity,
            load_factor,
            hasher,
        )?))
    }

    fn from_table(table: SingleThreadedMap<K, V, S>) -> Self {
        Self {
            shared: Arc::new(ReentrantMutex::new(RefCell::new(table))),
        }
    }

    /// Acquires the shared lock for a composed sequence of operations.
    ///
    /// All other handles block until the guard is dropped, so a read
    /// followed by a write through the same guard is observed as one atomic
    /// step.
    pub fn lock(&self) -> TableGuard<'_, K, V, S> {
        TableGuard::new(self.shared.lock())
    }

    pub fn len(&self) -> usize {
        self.shared.lock().borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.lock().borrow().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.shared.lock().borrow().capacity()
    }

    pub fn load_factor(&self) -> f64 {
        self.shared.lock().borrow().load_factor()
    }

    pub fn clear(&self) {
        self.shared.lock().borrow_mut().clear();
    }
}

impl<K, V, S> DoubleHashMap<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    /// Inserts a key-value pair, returning the previous value if the key
    /// was already present.
    pub fn insert(&self, key: K, value: V) -> Option<V> {
        self.shared.lock().borrow_mut().insert(key, value)
    }

    /// Returns a clone of the value for `key`, or
    /// [`MapError::KeyNotFound`]. The clone is taken while the lock is
    /// held; references cannot escape the critical section.
    pub fn get(&self, key: &K) -> Result<V>
    where
        V: Clone,
    {
        self.shared.lock().borrow().get(key).map(|v| v.clone())
    }

    pub fn remove(&self, key: &K) -> Result<V> {
        self.shared.lock().borrow_mut().remove(key)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.shared.lock().borrow().contains_key(key)
    }

    /// Snapshot of all keys, taken under the lock.
    pub fn keys(&self) -> Vec<K>
    where
        K: Clone,
    {
        self.shared.lock().borrow().keys().cloned().collect()
    }

    /// Snapshot of all values, taken under the lock.
    pub fn values(&self) -> Vec<V>
    where
        V: Clone,
    {
        self.shared.lock().borrow().values().cloned().collect()
    }

    /// Snapshot of all key-value pairs, taken under the lock.
    pub fn entries(&self) -> Vec<(K, V)>
    where
        K: Clone,
        V: Clone,
    {
        self.shared
            .lock()
            .borrow()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn handles_are_send_and_sync() {
        assert_send_sync::<DoubleHashMap<String, u64>>();
    }

    #[test]
    fn test_basic_operations() {
        let map: DoubleHashMap<String, u64> = DoubleHashMap::new();

        assert_eq!(map.insert("a".to_string(), 1), None);
        assert_eq!(map.insert("a".to_string(), 2), Some(1));
        map.insert("b".to_string(), 3);

        assert_eq!(map.len(), 2);
        assert_eq!(map.get(&"a".to_string()), Ok(2));
        assert!(map.contains_key(&"b".to_string()));
        assert_eq!(
            map.get(&"missing".to_string()),
            Err(MapError::KeyNotFound)
        );

        assert_eq!(map.remove(&"a".to_string()), Ok(2));
        assert_eq!(map.remove(&"a".to_string()), Err(MapError::KeyNotFound));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_invalid_configuration_propagates() {
        assert!(matches!(
            DoubleHashMap::<String, u64>::with_options(0, 0.75),
            Err(MapError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            DoubleHashMap::<String, u64>::with_options(13, 1.5),
            Err(MapError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_clone_shares_backing_store() {
        let map: DoubleHashMap<u32, u32> = DoubleHashMap::new();
        let other = map.clone();

        map.insert(1, 10);
        other.insert(2, 20);

        assert_eq!(map.len(), 2);
        assert_eq!(other.get(&1), Ok(10));
        assert_eq!(map.get(&2), Ok(20));

        other.clear();
        assert!(map.is_empty());
    }

    #[test]
    fn test_snapshots() {
        let map: DoubleHashMap<u32, u32> = DoubleHashMap::new();
        for i in 0..5 {
            map.insert(i, i * 10);
        }
        map.remove(&2).unwrap();

        let mut keys = map.keys();
        keys.sort_unstable();
        assert_eq!(keys, vec![0, 1, 3, 4]);

        let mut values = map.values();
        values.sort_unstable();
        assert_eq!(values, vec![0, 10, 30, 40]);

        let mut entries = map.entries();
        entries.sort_unstable();
        assert_eq!(entries, vec![(0, 0), (1, 10), (3, 30), (4, 40)]);
    }

    #[test]
    fn test_guard_composes_read_modify_write() {
        let map: DoubleHashMap<String, u64> = DoubleHashMap::new();
        map.insert("hits".to_string(), 1);

        {
            let guard = map.lock();
            let current = guard.get(&"hits".to_string()).unwrap();
            guard.insert("hits".to_string(), current + 1);
        }

        assert_eq!(map.get(&"hits".to_string()), Ok(2));
    }

    #[test]
    fn test_lock_is_reentrant() {
        let map: DoubleHashMap<String, u64> = DoubleHashMap::new();
        map.insert("k".to_string(), 7);

        let guard = map.lock();
        // the same thread may keep using the map while holding the guard
        assert_eq!(map.get(&"k".to_string()), Ok(7));
        assert_eq!(map.len(), 1);
        map.insert("k2".to_string(), 8);
        assert_eq!(guard.len(), 2);
    }

    #[test]
    fn test_guard_for_each() {
        let map: DoubleHashMap<u32, u32> = DoubleHashMap::new();
        for i in 0..4 {
            map.insert(i, i + 100);
        }

        let guard = map.lock();
        let mut seen = Vec::new();
        guard.for_each(|k, v| seen.push((*k, *v)));
        seen.sort_unstable();
        assert_eq!(seen, vec![(0, 100), (1, 101), (2, 102), (3, 103)]);
    }
}
