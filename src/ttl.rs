//! Expiring key/value store.
//!
//! DESIGN
//! ======
//! Every entry carries the `Instant` it was last written or touched. Reads
//! never evict; the periodic sweep is the only removal path besides an
//! explicit `delete`. Each store owns its own mutex, so sweeping one category
//! (snapshots, prompts, ...) never stalls another.
//!
//! TRADE-OFFS
//! ==========
//! Sweep is a full scan. Fine at party-game scale; an expiry index would be
//! needed if room counts grow into the tens of thousands.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

struct Entry<V> {
    value: V,
    touched_at: Instant,
}

/// Shared, clonable TTL map. Clones refer to the same underlying entries.
pub struct TtlStore<K, V> {
    inner: Arc<Mutex<HashMap<K, Entry<V>>>>,
}

impl<K, V> Clone for TtlStore<K, V> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<K, V> Default for TtlStore<K, V> {
    fn default() -> Self {
        Self { inner: Arc::new(Mutex::new(HashMap::new())) }
    }
}

impl<K, V> TtlStore<K, V>
where
    K: Eq + Hash,
{
    #[cfg(test)]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<K, Entry<V>>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert or overwrite, refreshing the entry's timestamp.
    pub fn put(&self, key: K, value: V) {
        self.put_at(key, value, Instant::now());
    }

    pub(crate) fn put_at(&self, key: K, value: V, now: Instant) {
        self.lock().insert(key, Entry { value, touched_at: now });
    }

    /// Insert only when `key` is vacant. Returns `false` if an entry was already present.
    pub fn insert_if_absent(&self, key: K, value: V) -> bool {
        let mut map = self.lock();
        if map.contains_key(&key) {
            return false;
        }
        map.insert(key, Entry { value, touched_at: Instant::now() });
        true
    }

    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
        V: Clone,
    {
        self.lock().get(key).map(|e| e.value.clone())
    }

    #[cfg(test)]
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.lock().contains_key(key)
    }

    pub fn delete<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.lock().remove(key).map(|e| e.value)
    }

    /// Mutate an entry in place and refresh its timestamp. Returns `None` if absent.
    pub fn update<Q, R>(&self, key: &Q, f: impl FnOnce(&mut V) -> R) -> Option<R>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        let mut map = self.lock();
        let entry = map.get_mut(key)?;
        entry.touched_at = Instant::now();
        Some(f(&mut entry.value))
    }

    /// Refresh an entry's timestamp without changing it.
    pub fn touch<Q>(&self, key: &Q)
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        if let Some(entry) = self.lock().get_mut(key) {
            entry.touched_at = Instant::now();
        }
    }

    /// Remove every entry whose age exceeds `max_age`. An entry exactly
    /// `max_age` old survives. Returns the number of evicted entries.
    pub fn sweep(&self, now: Instant, max_age: Duration) -> usize {
        let mut map = self.lock();
        let before = map.len();
        map.retain(|_, e| now.saturating_duration_since(e.touched_at) <= max_age);
        before - map.len()
    }

    #[cfg(test)]
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[cfg(test)]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[cfg(test)]
#[path = "ttl_test.rs"]
mod tests;
