use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracker_sync_realtime::{
    BucketSpec, CacheSubscription, ChangeBatch, ChangeFeed, DiffCache, DiffCacheOptions,
};

use crate::flags::{self, FlagKey, FlagValue};
use crate::types::FlagRow;

/// One flag of one owner
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FlagSlot {
    pub owner_id: String,
    pub key: FlagKey,
}

impl FlagSlot {
    pub fn new(owner_id: &str, key: FlagKey) -> Self {
        Self {
            owner_id: owner_id.to_string(),
            key,
        }
    }
}

impl fmt::Display for FlagSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.owner_id, self.key)
    }
}

/// Decodes flag rows. Rows with unknown keys are not cached.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlagBuckets;

impl BucketSpec for FlagBuckets {
    type Row = FlagRow;
    type Key = FlagSlot;
    type Value = FlagValue;

    fn key_of(&self, row: &FlagRow) -> Option<FlagSlot> {
        let key = row.key.parse::<FlagKey>().ok()?;
        Some(FlagSlot {
            owner_id: row.owner_id.clone(),
            key,
        })
    }

    fn build(&self, slot: &FlagSlot, rows: Vec<&FlagRow>) -> FlagValue {
        // The newest row wins.
        match rows.last() {
            Some(row) => flags::parse(&row.value, slot.key),
            None => flags::default_for(slot.key),
        }
    }

    fn same(&self, previous: &FlagValue, next: &FlagValue) -> bool {
        previous == next
    }
}

/// Typed flag values that always answer, with defaults for unset flags
pub struct FlagCache {
    inner: Arc<DiffCache<FlagBuckets>>,
    defaults: HashMap<FlagKey, Arc<FlagValue>>,
}

impl Default for FlagCache {
    fn default() -> Self {
        Self::new()
    }
}

impl FlagCache {
    pub fn new() -> Self {
        let defaults = FlagKey::ALL
            .into_iter()
            .map(|key| (key, Arc::new(flags::default_for(key))))
            .collect();
        Self {
            inner: Arc::new(DiffCache::new_with_options(
                FlagBuckets,
                DiffCacheOptions::default().with_name("flags"),
            )),
            defaults,
        }
    }

    /// Value of `key` for `owner_id`, or the shared default.
    pub fn get(&self, owner_id: &str, key: FlagKey) -> Arc<FlagValue> {
        self.inner
            .get(&FlagSlot::new(owner_id, key))
            .unwrap_or_else(|| self.default_value(key))
    }

    /// Observe one flag. A removed flag is reported as its default.
    pub fn subscribe<F>(
        &self,
        owner_id: &str,
        key: FlagKey,
        callback: F,
    ) -> CacheSubscription<FlagSlot, FlagValue>
    where
        F: Fn(&Arc<FlagValue>) + Send + Sync + 'static,
    {
        let fallback = self.default_value(key);
        self.inner
            .subscribe(FlagSlot::new(owner_id, key), move |value| match value {
                Some(value) => callback(value),
                None => callback(&fallback),
            })
    }

    pub fn apply_batch(&self, batch: ChangeBatch<FlagRow>) -> Vec<FlagSlot> {
        self.inner.apply_batch(batch)
    }

    /// Follow `feed`, starting with its current rows.
    pub fn attach<F>(&self, feed: &F) -> JoinHandle<()>
    where
        F: ChangeFeed<FlagRow> + ?Sized,
    {
        self.inner.attach(feed)
    }

    pub fn inner(&self) -> &Arc<DiffCache<FlagBuckets>> {
        &self.inner
    }

    fn default_value(&self, key: FlagKey) -> Arc<FlagValue> {
        match self.defaults.get(&key) {
            Some(value) => Arc::clone(value),
            None => Arc::new(flags::default_for(key)),
        }
    }
}
