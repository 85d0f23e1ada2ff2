use std::cell::RefCell;
use std::hash::{BuildHasher, Hash};

use parking_lot::ReentrantMutexGuard;

use doublemap::{DoubleHashMap as SingleThreadedMap, Result};

/// Holds the table lock for a composed sequence of operations.
///
/// Acquired through [`DoubleHashMap::lock`](crate::DoubleHashMap::lock).
/// While the guard is alive every other handle blocks, so a get followed
/// by an insert through the same guard is one atomic step from every other
/// thread's point of view. The owning thread may also keep calling the
/// map's own methods; the underlying lock is reentrant.
pub struct TableGuard<'a, K, V, S> {
    table: ReentrantMutexGuard<'a, RefCell<SingleThreadedMap<K, V, S>>>,
}

impl<'a, K, V, S> TableGuard<'a, K, V, S> {
    pub(crate) fn new(
        table: ReentrantMutexGuard<'a, RefCell<SingleThreadedMap<K, V, S>>>,
    ) -> Self {
        Self { table }
    }

    pub fn len(&self) -> usize {
        self.table.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.borrow().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.table.borrow().capacity()
    }

    pub fn clear(&self) {
        self.table.borrow_mut().clear();
    }

    /// Visits every live entry in slot order without leaving the critical
    /// section.
    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&K, &V),
    {
        let table = self.table.borrow();
        for (key, value) in table.iter() {
            f(key, value);
        }
    }
}

impl<K, V, S> TableGuard<'_, K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    pub fn get(&self, key: &K) -> Result<V>
    where
        V: Clone,
    {
        self.table.borrow().get(key).map(|v| v.clone())
    }

    pub fn insert(&self, key: K, value: V) -> Option<V> {
        self.table.borrow_mut().insert(key, value)
    }

    pub fn remove(&self, key: &K) -> Result<V> {
        self.table.borrow_mut().remove(key)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.table.borrow().contains_key(key)
    }
}
