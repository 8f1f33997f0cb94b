//! Record persistence behind the importer

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::debug;
use tracker_sync_realtime::{MemoryTable, TableWrite};

use super::error::StoreError;
use crate::types::{Record, TrackableKind};

/// Rows written by one import, applied all-or-nothing
#[derive(Debug, Clone, Default)]
pub struct WriteSet {
    pub inserts: Vec<Record>,
    pub updates: Vec<Record>,
}

impl WriteSet {
    pub fn is_empty(&self) -> bool {
        self.inserts.is_empty() && self.updates.is_empty()
    }

    pub fn len(&self) -> usize {
        self.inserts.len() + self.updates.len()
    }
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Storage tag of the trackable's kind, or `None` if it does not exist.
    async fn trackable_kind(&self, trackable_id: &str) -> Result<Option<String>, StoreError>;

    /// Records of `trackable_id` with `from <= timestamp <= to`.
    async fn records_between(
        &self,
        trackable_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Record>, StoreError>;

    /// Apply every write or none.
    async fn write_transaction(&self, writes: WriteSet) -> Result<(), StoreError>;
}

/// Record store over a [`MemoryTable`], whose change feed drives record caches
pub struct MemoryRecordStore {
    trackables: RwLock<HashMap<String, String>>,
    table: Arc<MemoryTable<Record>>,
}

impl Default for MemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::with_table(Arc::new(MemoryTable::new("records")))
    }

    pub fn with_table(table: Arc<MemoryTable<Record>>) -> Self {
        Self {
            trackables: RwLock::new(HashMap::new()),
            table,
        }
    }

    /// Register a trackable with its kind.
    pub fn add_trackable(&self, trackable_id: &str, kind: TrackableKind) {
        self.add_trackable_tag(trackable_id, kind.as_str());
    }

    /// Register a trackable with a raw kind tag.
    pub fn add_trackable_tag(&self, trackable_id: &str, tag: &str) {
        self.trackables
            .write()
            .insert(trackable_id.to_string(), tag.to_string());
    }

    pub fn table(&self) -> &Arc<MemoryTable<Record>> {
        &self.table
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn trackable_kind(&self, trackable_id: &str) -> Result<Option<String>, StoreError> {
        Ok(self.trackables.read().get(trackable_id).cloned())
    }

    async fn records_between(
        &self,
        trackable_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Record>, StoreError> {
        Ok(self
            .table
            .rows()
            .into_iter()
            .filter(|record| {
                record.trackable_id == trackable_id
                    && record.timestamp >= from
                    && record.timestamp <= to
            })
            .collect())
    }

    async fn write_transaction(&self, writes: WriteSet) -> Result<(), StoreError> {
        let count = writes.len();
        let table_writes = writes
            .inserts
            .into_iter()
            .map(TableWrite::Insert)
            .chain(writes.updates.into_iter().map(TableWrite::Update))
            .collect();
        self.table.apply(table_writes)?;
        debug!(count, table = self.table.name(), "record transaction committed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(id: &str, trackable_id: &str, day: u32) -> Record {
        Record {
            id: id.to_string(),
            trackable_id: trackable_id.to_string(),
            user_id: "u".to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 1, day, 12, 0, 0).unwrap(),
            value: "1".to_string(),
            external_key: None,
            updated_at: None,
        }
    }

    #[test]
    fn records_between_is_inclusive_and_scoped() {
        let store = MemoryRecordStore::new();
        tokio_test::block_on(async {
            store
                .write_transaction(WriteSet {
                    inserts: vec![
                        record("a", "t1", 1),
                        record("b", "t1", 2),
                        record("c", "t1", 3),
                        record("d", "t2", 2),
                    ],
                    updates: vec![],
                })
                .await
                .unwrap();

            let from = Utc.with_ymd_and_hms(2024, 1, 2, 12, 0, 0).unwrap();
            let to = Utc.with_ymd_and_hms(2024, 1, 3, 12, 0, 0).unwrap();
            let found = store.records_between("t1", from, to).await.unwrap();
            let ids: Vec<&str> = found.iter().map(|r| r.id.as_str()).collect();
            assert_eq!(ids, vec!["b", "c"]);
        });
    }

    #[test]
    fn failed_transaction_leaves_table_untouched() {
        let store = MemoryRecordStore::new();
        tokio_test::block_on(async {
            let result = store
                .write_transaction(WriteSet {
                    inserts: vec![record("a", "t1", 1)],
                    updates: vec![record("missing", "t1", 1)],
                })
                .await;
            assert!(matches!(result, Err(StoreError::Table(_))));
            assert!(store.table().is_empty());
            assert_eq!(store.trackable_kind("t1").await.unwrap(), None);
        });
    }
}
