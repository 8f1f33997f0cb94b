use std::fmt;
use std::sync::Arc;

use chrono::{FixedOffset, NaiveDate};
use tokio::task::JoinHandle;
use tracker_sync_realtime::{
    BucketSpec, CacheSubscription, ChangeBatch, ChangeFeed, DiffCache, DiffCacheOptions,
};

use crate::types::Record;

/// Records of one trackable on one local day
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DayKey {
    pub trackable_id: String,
    pub day: NaiveDate,
}

impl DayKey {
    pub fn new(trackable_id: &str, day: NaiveDate) -> Self {
        Self {
            trackable_id: trackable_id.to_string(),
            day,
        }
    }
}

impl fmt::Display for DayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.trackable_id, self.day.format("%Y-%m-%d"))
    }
}

/// Groups records by trackable and local day, ordered by timestamp
#[derive(Debug, Clone)]
pub struct RecordBuckets {
    offset: FixedOffset,
}

impl RecordBuckets {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }
}

impl BucketSpec for RecordBuckets {
    type Row = Record;
    type Key = DayKey;
    type Value = Vec<Record>;

    fn key_of(&self, record: &Record) -> Option<DayKey> {
        Some(DayKey {
            trackable_id: record.trackable_id.clone(),
            day: record.day(self.offset),
        })
    }

    fn build(&self, _key: &DayKey, rows: Vec<&Record>) -> Vec<Record> {
        let mut records: Vec<Record> = rows.into_iter().cloned().collect();
        // Stable, so equal timestamps keep creation order.
        records.sort_by_key(|record| record.timestamp);
        records
    }

    fn same(&self, previous: &Vec<Record>, next: &Vec<Record>) -> bool {
        previous.len() == next.len()
            && previous.iter().zip(next).all(|(a, b)| {
                a.id == b.id
                    && a.value == b.value
                    && a.updated_at == b.updated_at
                    && a.timestamp == b.timestamp
            })
    }
}

/// Per-day record lists
pub struct RecordCache {
    inner: Arc<DiffCache<RecordBuckets>>,
    empty: Arc<Vec<Record>>,
}

impl RecordCache {
    pub fn new(offset: FixedOffset) -> Self {
        Self {
            inner: Arc::new(DiffCache::new_with_options(
                RecordBuckets::new(offset),
                DiffCacheOptions::default().with_name("records"),
            )),
            empty: Arc::new(Vec::new()),
        }
    }

    /// Records of `trackable_id` on `day`. Days without records share one empty list.
    pub fn day(&self, trackable_id: &str, day: NaiveDate) -> Arc<Vec<Record>> {
        self.inner
            .get(&DayKey::new(trackable_id, day))
            .unwrap_or_else(|| Arc::clone(&self.empty))
    }

    pub fn subscribe<F>(
        &self,
        key: DayKey,
        callback: F,
    ) -> CacheSubscription<DayKey, Vec<Record>>
    where
        F: Fn(Option<&Arc<Vec<Record>>>) + Send + Sync + 'static,
    {
        self.inner.subscribe(key, callback)
    }

    pub fn apply_batch(&self, batch: ChangeBatch<Record>) -> Vec<DayKey> {
        self.inner.apply_batch(batch)
    }

    /// Follow `feed`, starting with its current rows.
    pub fn attach<F>(&self, feed: &F) -> JoinHandle<()>
    where
        F: ChangeFeed<Record> + ?Sized,
    {
        self.inner.attach(feed)
    }

    pub fn inner(&self) -> &Arc<DiffCache<RecordBuckets>> {
        &self.inner
    }
}
