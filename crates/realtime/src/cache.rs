//! DiffCache: keyed buckets over a change feed.
//!
//! Each row maps to at most one lookup key. A batch is applied in two phases:
//! first every event updates bucket membership, then every touched key is
//! rebuilt once and compared with the previous bucket. Equal buckets keep
//! their previous `Arc`, so observers and identity-based memoization only see
//! keys whose content really changed.
//!
//! Batch application is synchronous and holds the state lock for the whole
//! batch; observers are called after the lock is released.

use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::{Arc, Weak};

use log::{debug, trace, warn};
use parking_lot::Mutex;
use tokio::task::JoinHandle;

use crate::feed::ChangeFeed;
use crate::message::{ChangeBatch, ChangeKind, Row};
use crate::registry::{KeyedObservers, ObserverId};

/// How rows are grouped into buckets and how buckets are compared.
pub trait BucketSpec: Send + Sync + 'static {
    type Row: Row;
    type Key: Eq + Hash + Clone + Debug + Send + Sync + 'static;
    type Value: Send + Sync + 'static;

    /// Lookup key for a row, or `None` if the row must not be cached.
    fn key_of(&self, row: &Self::Row) -> Option<Self::Key>;

    /// Build the bucket for `key` from its rows, given in creation order.
    fn build(&self, key: &Self::Key, rows: Vec<&Self::Row>) -> Self::Value;

    /// Value equality between the previous and the rebuilt bucket.
    fn same(&self, previous: &Self::Value, next: &Self::Value) -> bool;
}

/// DiffCache options
#[derive(Debug, Clone)]
pub struct DiffCacheOptions {
    /// Name used in log lines
    pub name: String,
}

impl Default for DiffCacheOptions {
    fn default() -> Self {
        Self {
            name: "cache".to_string(),
        }
    }
}

impl DiffCacheOptions {
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }
}

struct Tracked<R, K> {
    row: R,
    key: Option<K>,
    seq: u64,
}

struct CacheState<S: BucketSpec> {
    rows: HashMap<String, Tracked<S::Row, S::Key>>,
    members: HashMap<S::Key, Vec<String>>,
    buckets: HashMap<S::Key, Arc<S::Value>>,
    next_seq: u64,
}

impl<S: BucketSpec> CacheState<S> {
    fn new() -> Self {
        Self {
            rows: HashMap::new(),
            members: HashMap::new(),
            buckets: HashMap::new(),
            next_seq: 0,
        }
    }

    fn detach(&mut self, key: &S::Key, row_id: &str) {
        if let Some(ids) = self.members.get_mut(key) {
            ids.retain(|id| id != row_id);
        }
    }

    fn attach(&mut self, key: &S::Key, row_id: &str) {
        let ids = self.members.entry(key.clone()).or_default();
        if !ids.iter().any(|id| id == row_id) {
            ids.push(row_id.to_string());
        }
    }
}

/// Records which keys a batch touched, in first-touch order.
struct Touched<K> {
    order: Vec<K>,
    seen: HashSet<K>,
}

impl<K: Eq + Hash + Clone> Touched<K> {
    fn new() -> Self {
        Self {
            order: Vec::new(),
            seen: HashSet::new(),
        }
    }

    fn mark(&mut self, key: &K) {
        if self.seen.insert(key.clone()) {
            self.order.push(key.clone());
        }
    }
}

/// Fine-grained reactive cache over a change feed
pub struct DiffCache<S: BucketSpec> {
    grouping: S,
    options: DiffCacheOptions,
    state: Mutex<CacheState<S>>,
    observers: Arc<KeyedObservers<S::Key, S::Value>>,
}

impl<S: BucketSpec> DiffCache<S> {
    pub fn new(grouping: S) -> Self {
        Self::new_with_options(grouping, DiffCacheOptions::default())
    }

    pub fn new_with_options(grouping: S, options: DiffCacheOptions) -> Self {
        Self {
            grouping,
            options,
            state: Mutex::new(CacheState::new()),
            observers: Arc::new(KeyedObservers::new()),
        }
    }

    pub fn grouping(&self) -> &S {
        &self.grouping
    }

    /// Current bucket for `key`.
    pub fn get(&self, key: &S::Key) -> Option<Arc<S::Value>> {
        self.state.lock().buckets.get(key).cloned()
    }

    /// All live keys, in no particular order.
    pub fn keys(&self) -> Vec<S::Key> {
        self.state.lock().buckets.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.state.lock().buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of rows currently tracked, including rows without a key.
    pub fn row_count(&self) -> usize {
        self.state.lock().rows.len()
    }

    /// Observe the bucket for one key.
    ///
    /// The callback receives the new bucket, or `None` when the bucket was
    /// removed. Dropping the returned subscription unsubscribes.
    pub fn subscribe<F>(&self, key: S::Key, callback: F) -> CacheSubscription<S::Key, S::Value>
    where
        F: Fn(Option<&Arc<S::Value>>) + Send + Sync + 'static,
    {
        let id = self.observers.add(key.clone(), callback);
        CacheSubscription {
            key,
            id,
            observers: Arc::downgrade(&self.observers),
        }
    }

    /// Apply one batch and return the keys whose bucket changed.
    pub fn apply_batch(&self, batch: ChangeBatch<S::Row>) -> Vec<S::Key> {
        let changes = {
            let mut state = self.state.lock();
            let touched = self.apply_membership(&mut state, batch);
            self.rebuild(&mut state, touched)
        };

        debug!(
            "{}: batch changed {} bucket(s)",
            self.options.name,
            changes.len()
        );
        for (key, value) in &changes {
            self.observers.notify(key, value.as_ref());
        }
        changes.into_iter().map(|(key, _)| key).collect()
    }

    fn apply_membership(
        &self,
        state: &mut CacheState<S>,
        batch: ChangeBatch<S::Row>,
    ) -> Touched<S::Key> {
        let mut touched = Touched::new();

        for event in batch {
            match event.kind {
                ChangeKind::Delete => {
                    if let Some(tracked) = state.rows.remove(&event.row_id) {
                        if let Some(key) = tracked.key {
                            state.detach(&key, &event.row_id);
                            touched.mark(&key);
                        }
                    } else {
                        trace!(
                            "{}: delete for untracked row {}",
                            self.options.name,
                            event.row_id
                        );
                    }
                }
                ChangeKind::Insert | ChangeKind::Update => {
                    let Some(row) = event.row else {
                        warn!(
                            "{}: {} for row {} without payload ignored",
                            self.options.name, event.kind, event.row_id
                        );
                        continue;
                    };
                    let new_key = self.grouping.key_of(&row);
                    if new_key.is_none() {
                        debug!(
                            "{}: row {} has no lookup key, not cached",
                            self.options.name, event.row_id
                        );
                    }

                    let (old_key, seq) = match state.rows.get(&event.row_id) {
                        Some(previous) => (previous.key.clone(), previous.seq),
                        None => {
                            let seq = state.next_seq;
                            state.next_seq += 1;
                            (None, seq)
                        }
                    };

                    if let Some(old_key) = &old_key {
                        if new_key.as_ref() != Some(old_key) {
                            state.detach(old_key, &event.row_id);
                            touched.mark(old_key);
                        }
                    }
                    if let Some(new_key) = &new_key {
                        state.attach(new_key, &event.row_id);
                        touched.mark(new_key);
                    }

                    state.rows.insert(
                        event.row_id,
                        Tracked {
                            row,
                            key: new_key,
                            seq,
                        },
                    );
                }
            }
        }

        touched
    }

    fn rebuild(
        &self,
        state: &mut CacheState<S>,
        touched: Touched<S::Key>,
    ) -> Vec<(S::Key, Option<Arc<S::Value>>)> {
        let mut changes = Vec::new();

        for key in touched.order {
            let ids = state.members.get(&key).cloned().unwrap_or_default();
            if ids.is_empty() {
                state.members.remove(&key);
                if state.buckets.remove(&key).is_some() {
                    changes.push((key, None));
                }
                continue;
            }

            let mut rows: Vec<&Tracked<S::Row, S::Key>> =
                ids.iter().filter_map(|id| state.rows.get(id)).collect();
            rows.sort_by_key(|tracked| tracked.seq);
            let next = self
                .grouping
                .build(&key, rows.into_iter().map(|tracked| &tracked.row).collect());

            let unchanged = state
                .buckets
                .get(&key)
                .is_some_and(|previous| self.grouping.same(previous, &next));
            if unchanged {
                trace!("{}: bucket {:?} unchanged", self.options.name, key);
                continue;
            }

            let next = Arc::new(next);
            state.buckets.insert(key.clone(), Arc::clone(&next));
            changes.push((key, Some(next)));
        }

        changes
    }
}

impl<S: BucketSpec> DiffCache<S> {
    /// Feed this cache from `feed`, starting with its current rows.
    ///
    /// The returned task ends when the feed closes.
    pub fn attach<F>(self: &Arc<Self>, feed: &F) -> JoinHandle<()>
    where
        F: ChangeFeed<S::Row> + ?Sized,
    {
        let mut stream = feed.subscribe(true);
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(batch) = stream.recv().await {
                cache.apply_batch(batch);
            }
            debug!("{}: change feed closed", cache.options.name);
        })
    }
}

/// Active per-key subscription. Unsubscribes on drop.
pub struct CacheSubscription<K: Eq + Hash + Clone, V> {
    key: K,
    id: ObserverId,
    observers: Weak<KeyedObservers<K, V>>,
}

impl<K: Eq + Hash + Clone, V> CacheSubscription<K, V> {
    pub fn key(&self) -> &K {
        &self.key
    }

    pub fn unsubscribe(self) {}
}

impl<K: Eq + Hash + Clone, V> Drop for CacheSubscription<K, V> {
    fn drop(&mut self) {
        if let Some(observers) = self.observers.upgrade() {
            observers.remove(&self.key, self.id);
        }
    }
}
