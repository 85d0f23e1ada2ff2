use std::fmt;
use std::hash::{BuildHasher, Hash};

use rustc_hash::FxBuildHasher;

use crate::error::{MapError, Result};
use crate::iter::{Iter, Keys, Values};
use crate::probe::{next_prime, ProbeSeq};
use crate::slot::{empty_store, Slot};

pub const DEFAULT_CAPACITY: usize = 13;
pub const DEFAULT_LOAD_FACTOR: f64 = 0.75;

/// An open-addressing hash map using double hashing for collision
/// resolution.
///
/// All entries live directly in the slot array. Deletes leave tombstones
/// behind so existing probe sequences stay intact; tombstones are dropped
/// when the table grows. Growth is triggered before an insert whenever
/// `(len + 1) / capacity` reaches the load factor, and the new capacity is
/// `2 * capacity + 1` rounded up to the next prime.
pub struct DoubleHashMap<K, V, S = FxBuildHasher> {
    slots: Box<[Slot<K, V>]>,
    capacity: usize,
    load_factor: f64,
    size: usize,
    hasher: S,
}

impl<K, V> Default for DoubleHashMap<K, V, FxBuildHasher> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> DoubleHashMap<K, V, FxBuildHasher> {
    /// Creates a map with the default capacity and load factor.
    pub fn new() -> Self {
        Self::with_hasher(FxBuildHasher)
    }

    /// Creates a map with the given capacity and load factor.
    ///
    /// Fails with [`MapError::InvalidConfiguration`] when `capacity` is zero
    /// or `load_factor` is outside the open interval `(0, 1)`.
    pub fn with_options(capacity: usize, load_factor: f64) -> Result<Self> {
        Self::with_options_and_hasher(capacity, load_factor, FxBuildHasher)
    }
}

impl<K, V, S> DoubleHashMap<K, V, S> {
    /// Creates a map with the default capacity and load factor and a custom
    /// hasher.
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            slots: empty_store(DEFAULT_CAPACITY),
            capacity: DEFAULT_CAPACITY,
            load_factor: DEFAULT_LOAD_FACTOR,
            size: 0,
            hasher,
        }
    }

    pub fn with_options_and_hasher(capacity: usize, load_factor: f64, hasher: S) -> Result<Self> {
        if capacity == 0 {
            return Err(MapError::InvalidConfiguration(
                "capacity must be positive".to_string(),
            ));
        }
        if !(load_factor > 0.0 && load_factor < 1.0) {
            return Err(MapError::InvalidConfiguration(format!(
                "load factor must be in (0, 1), got {load_factor}"
            )));
        }

        Ok(Self {
            slots: empty_store(capacity),
            capacity,
            load_factor,
            size: 0,
            hasher,
        })
    }

    /// Returns the number of key-value pairs in the map
    pub fn len(&self) -> usize {
        self.size
    }

    /// Returns true if the map contains no elements
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Returns the current capacity of the map
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the load factor threshold that triggers growth
    pub fn load_factor(&self) -> f64 {
        self.load_factor
    }

    /// Iterates over key-value pairs in slot-array order, skipping free
    /// slots. The order is an artifact of hashing and growth history.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter::new(&self.slots, self.size)
    }

    pub fn keys(&self) -> Keys<'_, K, V> {
        Keys::new(&self.slots, self.size)
    }

    pub fn values(&self) -> Values<'_, K, V> {
        Values::new(&self.slots, self.size)
    }

    /// Removes all entries, keeping the current capacity.
    pub fn clear(&mut self) {
        self.slots = empty_store(self.capacity);
        self.size = 0;
    }
}

impl<K, V, S> DoubleHashMap<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    fn hash_key(&self, key: &K) -> u64 {
        self.hasher.hash_one(key)
    }

    /// Walk the probe sequence for `key`.
    ///
    /// `Ok(idx)` is the occupied slot holding `key`. `Err(idx)` is the
    /// insertion point: the first tombstone seen along the sequence if any,
    /// otherwise the empty slot that terminated the scan. `Err(capacity)`
    /// means the sequence was exhausted with neither a match nor a free
    /// slot.
    fn find_slot(&self, key: &K) -> std::result::Result<usize, usize> {
        let hash = self.hash_key(key);
        let mut first_tombstone = None;

        for index in ProbeSeq::new(hash, self.capacity) {
            match &self.slots[index] {
                Slot::Empty => return Err(first_tombstone.unwrap_or(index)),
                Slot::Tombstone => {
                    if first_tombstone.is_none() {
                        first_tombstone = Some(index);
                    }
                }
                Slot::Occupied { key: stored, .. } => {
                    if stored == key {
                        return Ok(index);
                    }
                }
            }
        }

        Err(first_tombstone.unwrap_or(self.capacity))
    }

    fn should_resize(&self) -> bool {
        (self.size + 1) as f64 / self.capacity as f64 >= self.load_factor
    }

    fn grow(&mut self) {
        self.resize_to(next_prime(self.capacity * 2 + 1));
    }

    /// Replace the store and re-insert every live entry through the regular
    /// insert path. Tombstones are dropped here; this is the only place
    /// they are reclaimed.
    fn resize_to(&mut self, new_capacity: usize) {
        let old = std::mem::replace(&mut self.slots, empty_store(new_capacity));
        self.capacity = new_capacity;
        self.size = 0;

        for slot in old.into_vec() {
            if let Slot::Occupied { key, value } = slot {
                self.insert(key, value);
            }
        }
    }

    /// Inserts a key-value pair, returning the previous value if the key
    /// was already present.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        if self.should_resize() {
            self.grow();
        }

        let mut grown = false;
        loop {
            match self.find_slot(&key) {
                Ok(index) => return self.slots[index].fill(key, value),
                Err(index) if index < self.capacity && self.slots[index].is_free() => {
                    self.slots[index] = Slot::Occupied { key, value };
                    self.size += 1;
                    return None;
                }
                Err(_) => {
                    // Probe sequence exhausted, or the located slot is no
                    // longer free. Grow once and re-locate; a grown table
                    // has prime capacity and spare slots, so a second
                    // failure means the probe math is broken.
                    assert!(!grown, "no free slot after growth");
                    grown = true;
                    self.grow();
                }
            }
        }
    }

    /// Returns a reference to the value for `key`, or
    /// [`MapError::KeyNotFound`].
    pub fn get(&self, key: &K) -> Result<&V> {
        match self.find_slot(key) {
            Ok(index) => self.slots[index]
                .entry()
                .map(|(_, value)| value)
                .ok_or(MapError::KeyNotFound),
            Err(_) => Err(MapError::KeyNotFound),
        }
    }

    pub fn get_mut(&mut self, key: &K) -> Result<&mut V> {
        match self.find_slot(key) {
            Ok(index) => self.slots[index].value_mut().ok_or(MapError::KeyNotFound),
            Err(_) => Err(MapError::KeyNotFound),
        }
    }

    /// Removes `key`, returning its value. The slot becomes a tombstone and
    /// stays one until the next growth.
    pub fn remove(&mut self, key: &K) -> Result<V> {
        match self.find_slot(key) {
            Ok(index) => {
                let value = self.slots[index].evict().ok_or(MapError::KeyNotFound)?;
                self.size -= 1;
                Ok(value)
            }
            Err(_) => Err(MapError::KeyNotFound),
        }
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.find_slot(key).is_ok()
    }
}

impl<K, V, S> fmt::Debug for DoubleHashMap<K, V, S>
where
    K: fmt::Debug,
    V: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}
