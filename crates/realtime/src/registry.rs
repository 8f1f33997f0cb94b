//! Key-indexed observer registry.
//!
//! Observers register against one key and are only called when the bucket
//! for that key is republished. Notification snapshots the observer list and
//! releases the lock first, so callbacks may subscribe or unsubscribe.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

/// Identifier handed out by [`KeyedObservers::add`].
pub type ObserverId = u64;

/// Observer callback. `None` means the bucket was removed.
pub type ObserverFn<V> = dyn Fn(Option<&Arc<V>>) + Send + Sync;

pub struct KeyedObservers<K, V> {
    observers: Mutex<HashMap<K, Vec<(ObserverId, Arc<ObserverFn<V>>)>>>,
    next_id: AtomicU64,
}

impl<K: Eq + Hash + Clone, V> KeyedObservers<K, V> {
    pub fn new() -> Self {
        Self {
            observers: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn add(
        &self,
        key: K,
        callback: impl Fn(Option<&Arc<V>>) + Send + Sync + 'static,
    ) -> ObserverId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let callback: Arc<ObserverFn<V>> = Arc::new(callback);
        self.observers.lock().entry(key).or_default().push((id, callback));
        id
    }

    /// Remove one observer. Unknown ids are ignored.
    pub fn remove(&self, key: &K, id: ObserverId) {
        let mut observers = self.observers.lock();
        if let Some(list) = observers.get_mut(key) {
            list.retain(|(oid, _)| *oid != id);
            if list.is_empty() {
                observers.remove(key);
            }
        }
    }

    /// Call every observer of `key` with the new bucket value.
    pub fn notify(&self, key: &K, value: Option<&Arc<V>>) {
        let snapshot: Vec<Arc<ObserverFn<V>>> = match self.observers.lock().get(key) {
            Some(list) => list.iter().map(|(_, cb)| Arc::clone(cb)).collect(),
            None => return,
        };
        for cb in snapshot {
            cb(value);
        }
    }

    pub fn count(&self, key: &K) -> usize {
        self.observers.lock().get(key).map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.observers.lock().is_empty()
    }
}

impl<K: Eq + Hash + Clone, V> Default for KeyedObservers<K, V> {
    fn default() -> Self {
        Self::new()
    }
}
