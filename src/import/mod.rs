//! Bulk import of external records.
//!
//! Keyed imports are merged into existing records by `(local day, external
//! key)` with last-write-wins on `updatedAt`; ties keep what is stored.
//! Supplied `updatedAt` values are clamped to the current time before they
//! are compared or persisted. Everything an import writes goes through one
//! transaction.

mod error;
mod store;

pub use error::{ImportError, StoreError};
pub use store::{MemoryRecordStore, RecordStore, WriteSet};

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::clock::TimeSource;
use crate::config::SyncOptions;
use crate::types::{day_bounds, local_day, Record, TrackableKind};

/// One item of an import batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportRecord {
    pub date: DateTime<Utc>,
    pub value: String,
    /// Authoritative write time in epoch milliseconds
    #[serde(default)]
    pub updated_at: Option<i64>,
    #[serde(default)]
    pub external_key: Option<String>,
}

impl ImportRecord {
    pub fn new(date: DateTime<Utc>, value: &str) -> Self {
        Self {
            date,
            value: value.to_string(),
            updated_at: None,
            external_key: None,
        }
    }

    pub fn with_external_key(mut self, key: &str) -> Self {
        self.external_key = Some(key.to_string());
        self
    }

    pub fn with_updated_at(mut self, updated_at: i64) -> Self {
        self.updated_at = Some(updated_at);
        self
    }
}

/// What an import wrote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ImportSummary {
    pub inserted: usize,
    pub updated: usize,
}

type MatchKey = (NaiveDate, String);

/// Current winner for one match key
struct Planned {
    record: Record,
    existing: bool,
}

/// Merges import batches into a [`RecordStore`]
pub struct ImportReconciler<S: RecordStore + ?Sized> {
    store: Arc<S>,
    time: Arc<dyn TimeSource>,
    options: SyncOptions,
}

impl<S: RecordStore + ?Sized> ImportReconciler<S> {
    pub fn new(store: Arc<S>, time: Arc<dyn TimeSource>, options: SyncOptions) -> Self {
        Self {
            store,
            time,
            options,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Validate `batch` and merge it into the records of `trackable_id`.
    pub async fn import(
        &self,
        trackable_id: &str,
        user_id: &str,
        batch: Vec<ImportRecord>,
    ) -> Result<ImportSummary, ImportError> {
        if batch.is_empty() {
            return Err(ImportError::EmptyBatch);
        }

        let kind = self.resolve_kind(trackable_id).await?;
        self.check_values(kind, &batch)?;

        let keyed = batch.iter().filter(|item| item.external_key.is_some()).count();
        if keyed > 0 && keyed < batch.len() {
            return Err(ImportError::MixedKeys {
                keyed,
                unkeyed: batch.len() - keyed,
            });
        }

        let now = self.time.now().timestamp_millis();
        let batch: Vec<ImportRecord> = batch
            .into_iter()
            .map(|mut item| {
                item.updated_at = item.updated_at.map(|at| at.min(now));
                item
            })
            .collect();

        let writes = if keyed == 0 {
            WriteSet {
                inserts: batch
                    .into_iter()
                    .map(|item| self.new_record(trackable_id, user_id, item))
                    .collect(),
                updates: Vec::new(),
            }
        } else {
            self.merge(trackable_id, user_id, batch).await?
        };

        let summary = ImportSummary {
            inserted: writes.inserts.len(),
            updated: writes.updates.len(),
        };
        if writes.is_empty() {
            debug!(trackable_id, "import changed nothing");
        } else {
            self.store.write_transaction(writes).await?;
        }
        info!(
            trackable_id,
            inserted = summary.inserted,
            updated = summary.updated,
            "import committed"
        );
        Ok(summary)
    }

    async fn resolve_kind(&self, trackable_id: &str) -> Result<TrackableKind, ImportError> {
        let tag = self
            .store
            .trackable_kind(trackable_id)
            .await?
            .ok_or_else(|| ImportError::UnknownTrackable(trackable_id.to_string()))?;
        tag.parse::<TrackableKind>()
            .map_err(ImportError::UnsupportedKind)
    }

    fn check_values(&self, kind: TrackableKind, batch: &[ImportRecord]) -> Result<(), ImportError> {
        let invalid: Vec<&ImportRecord> = batch
            .iter()
            .filter(|item| !kind.accepts(&item.value))
            .collect();
        if invalid.is_empty() {
            return Ok(());
        }
        let examples = invalid
            .iter()
            .take(self.options.max_error_examples)
            .map(|item| format!("{:?} at {}", item.value, item.date.to_rfc3339()))
            .collect();
        warn!(%kind, count = invalid.len(), "import rejected, values do not match kind");
        Err(ImportError::TypeMismatch {
            kind,
            count: invalid.len(),
            examples,
        })
    }

    async fn merge(
        &self,
        trackable_id: &str,
        user_id: &str,
        batch: Vec<ImportRecord>,
    ) -> Result<WriteSet, ImportError> {
        let offset = self.options.utc_offset;
        let (first, last) = batch
            .iter()
            .fold((batch[0].date, batch[0].date), |(lo, hi), item| {
                (lo.min(item.date), hi.max(item.date))
            });
        let (from, to) = day_bounds(first, last, offset);

        let mut existing: HashMap<MatchKey, Record> = HashMap::new();
        for record in self.store.records_between(trackable_id, from, to).await? {
            let Some(external_key) = record.external_key.clone() else {
                continue;
            };
            let key = (record.day(offset), external_key);
            let shadowed = existing
                .get(&key)
                .is_some_and(|kept| !newer(record.updated_at, kept.updated_at));
            if shadowed {
                warn!(record = %record.id, "duplicate external key on one day, ignoring record");
            } else {
                existing.insert(key, record);
            }
        }
        debug!(
            trackable_id,
            existing = existing.len(),
            "matching import against stored records"
        );

        let mut planned: HashMap<MatchKey, Planned> = HashMap::new();
        let mut order: Vec<MatchKey> = Vec::new();
        for item in batch {
            let Some(external_key) = item.external_key.clone() else {
                continue;
            };
            let key = (local_day(item.date, offset), external_key);

            let current = planned
                .get(&key)
                .map(|plan| &plan.record)
                .or_else(|| existing.get(&key));
            let next = match current {
                None => Planned {
                    record: self.new_record(trackable_id, user_id, item),
                    existing: false,
                },
                Some(current) => {
                    let Some(incoming) = item.updated_at else {
                        continue;
                    };
                    if !newer(Some(incoming), current.updated_at) {
                        continue;
                    }
                    let mut record = current.clone();
                    record.value = item.value;
                    record.timestamp = item.date;
                    record.updated_at = Some(incoming);
                    Planned {
                        record,
                        existing: existing.contains_key(&key),
                    }
                }
            };
            if !planned.contains_key(&key) {
                order.push(key.clone());
            }
            planned.insert(key, next);
        }

        let mut writes = WriteSet::default();
        for key in order {
            if let Some(plan) = planned.remove(&key) {
                if plan.existing {
                    writes.updates.push(plan.record);
                } else {
                    writes.inserts.push(plan.record);
                }
            }
        }
        Ok(writes)
    }

    fn new_record(&self, trackable_id: &str, user_id: &str, item: ImportRecord) -> Record {
        Record {
            id: Uuid::new_v4().to_string(),
            trackable_id: trackable_id.to_string(),
            user_id: user_id.to_string(),
            timestamp: item.date,
            value: item.value,
            external_key: item.external_key,
            updated_at: item.updated_at,
        }
    }
}

/// Strictly newer; anything beats a missing time.
fn newer(incoming: Option<i64>, current: Option<i64>) -> bool {
    match (incoming, current) {
        (Some(incoming), Some(current)) => incoming > current,
        (Some(_), None) => true,
        (None, _) => false,
    }
}
