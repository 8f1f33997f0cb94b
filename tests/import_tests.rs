use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use tracker_sync::clock::ManualTime;
use tracker_sync::config::SyncOptions;
use tracker_sync::import::{
    ImportError, ImportRecord, ImportReconciler, MemoryRecordStore, RecordStore, StoreError,
    WriteSet,
};
use tracker_sync::types::{Record, TrackableKind};
use tracker_sync::realtime::TableWrite;

fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, day, hour, 0, 0).unwrap()
}

fn now() -> DateTime<Utc> {
    at(20, 12)
}

fn setup(kind: TrackableKind) -> (Arc<MemoryRecordStore>, ImportReconciler<MemoryRecordStore>) {
    let store = Arc::new(MemoryRecordStore::new());
    store.add_trackable("steps", kind);
    let importer = ImportReconciler::new(
        Arc::clone(&store),
        Arc::new(ManualTime::new(now())),
        SyncOptions::default(),
    );
    (store, importer)
}

fn stored(id: &str, day: u32, key: &str, value: &str, updated_at: Option<i64>) -> Record {
    Record {
        id: id.to_string(),
        trackable_id: "steps".to_string(),
        user_id: "user-1".to_string(),
        timestamp: at(day, 8),
        value: value.to_string(),
        external_key: Some(key.to_string()),
        updated_at,
    }
}

fn seed(store: &MemoryRecordStore, records: Vec<Record>) {
    store
        .table()
        .apply(records.into_iter().map(TableWrite::Insert).collect())
        .unwrap();
}

#[tokio::test]
async fn test_older_update_is_ignored() {
    let (store, importer) = setup(TrackableKind::Number);
    seed(&store, vec![stored("r1", 3, "k1", "10", Some(100))]);

    let batch = vec![ImportRecord::new(at(3, 18), "99")
        .with_external_key("k1")
        .with_updated_at(50)];
    let summary = importer.import("steps", "user-1", batch).await.unwrap();

    assert_eq!(summary.inserted, 0);
    assert_eq!(summary.updated, 0);
    assert_eq!(store.table().get("r1").unwrap().value, "10");
}

#[tokio::test]
async fn test_newer_update_wins() {
    let (store, importer) = setup(TrackableKind::Number);
    seed(&store, vec![stored("r1", 3, "k1", "10", Some(100))]);

    let batch = vec![ImportRecord::new(at(3, 18), "99")
        .with_external_key("k1")
        .with_updated_at(150)];
    let summary = importer.import("steps", "user-1", batch).await.unwrap();

    assert_eq!(summary.updated, 1);
    let record = store.table().get("r1").unwrap();
    assert_eq!(record.value, "99");
    assert_eq!(record.updated_at, Some(150));
    assert_eq!(record.timestamp, at(3, 18));
    assert_eq!(store.table().len(), 1);
}

#[tokio::test]
async fn test_tie_keeps_existing() {
    let (store, importer) = setup(TrackableKind::Number);
    seed(&store, vec![stored("r1", 3, "k1", "10", Some(100))]);

    let batch = vec![ImportRecord::new(at(3, 9), "11")
        .with_external_key("k1")
        .with_updated_at(100)];
    let summary = importer.import("steps", "user-1", batch).await.unwrap();

    assert_eq!(summary.updated, 0);
    assert_eq!(store.table().get("r1").unwrap().value, "10");
}

#[tokio::test]
async fn test_missing_updated_at_never_overwrites() {
    let (store, importer) = setup(TrackableKind::Number);
    seed(&store, vec![stored("r1", 3, "k1", "10", None)]);

    let batch = vec![ImportRecord::new(at(3, 9), "11").with_external_key("k1")];
    let summary = importer.import("steps", "user-1", batch).await.unwrap();

    assert_eq!(summary, Default::default());
    assert_eq!(store.table().get("r1").unwrap().value, "10");
}

#[tokio::test]
async fn test_any_time_beats_missing_time() {
    let (store, importer) = setup(TrackableKind::Number);
    seed(&store, vec![stored("r1", 3, "k1", "10", None)]);

    let batch = vec![ImportRecord::new(at(3, 9), "11")
        .with_external_key("k1")
        .with_updated_at(1)];
    let summary = importer.import("steps", "user-1", batch).await.unwrap();

    assert_eq!(summary.updated, 1);
    assert_eq!(store.table().get("r1").unwrap().value, "11");
}

#[tokio::test]
async fn test_same_key_on_another_day_inserts() {
    let (store, importer) = setup(TrackableKind::Number);
    seed(&store, vec![stored("r1", 3, "k1", "10", Some(100))]);

    let batch = vec![
        ImportRecord::new(at(4, 9), "20")
            .with_external_key("k1")
            .with_updated_at(50),
        ImportRecord::new(at(3, 23), "30")
            .with_external_key("k1")
            .with_updated_at(200),
    ];
    let summary = importer.import("steps", "user-1", batch).await.unwrap();

    assert_eq!(summary.inserted, 1);
    assert_eq!(summary.updated, 1);
    assert_eq!(store.table().len(), 2);
    assert_eq!(store.table().get("r1").unwrap().value, "30");
}

#[tokio::test]
async fn test_future_updated_at_is_clamped() {
    let (store, importer) = setup(TrackableKind::Text);
    let future = now().timestamp_millis() + 86_400_000;

    let batch = vec![ImportRecord::new(at(5, 9), "note")
        .with_external_key("k1")
        .with_updated_at(future)];
    importer.import("steps", "user-1", batch).await.unwrap();

    let record = store.table().rows().pop().unwrap();
    assert_eq!(record.updated_at, Some(now().timestamp_millis()));
    assert_eq!(record.user_id, "user-1");
    assert_eq!(record.external_key.as_deref(), Some("k1"));
}

#[tokio::test]
async fn test_duplicates_in_batch_collapse() {
    let (store, importer) = setup(TrackableKind::Number);

    let batch = vec![
        ImportRecord::new(at(6, 8), "1")
            .with_external_key("k1")
            .with_updated_at(300),
        ImportRecord::new(at(6, 9), "2")
            .with_external_key("k1")
            .with_updated_at(200),
        ImportRecord::new(at(6, 10), "3")
            .with_external_key("k1")
            .with_updated_at(400),
    ];
    let summary = importer.import("steps", "user-1", batch).await.unwrap();

    assert_eq!(summary.inserted, 1);
    let rows = store.table().rows();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].value, "3");
}

#[tokio::test]
async fn test_unkeyed_batch_inserts_everything() {
    let (store, importer) = setup(TrackableKind::Boolean);

    let batch = vec![
        ImportRecord::new(at(1, 8), "true"),
        ImportRecord::new(at(1, 8), "true"),
        ImportRecord::new(at(2, 8), ""),
    ];
    let summary = importer.import("steps", "user-1", batch).await.unwrap();

    assert_eq!(summary.inserted, 3);
    assert_eq!(store.table().len(), 3);
}

#[tokio::test]
async fn test_boolean_false_is_accepted() {
    let (store, importer) = setup(TrackableKind::Boolean);

    let batch = vec![
        ImportRecord::new(at(1, 8), "false"),
        ImportRecord::new(at(2, 8), "true"),
    ];
    let summary = importer.import("steps", "user-1", batch).await.unwrap();

    assert_eq!(summary.inserted, 2);
    let mut values: Vec<String> = store.table().rows().into_iter().map(|r| r.value).collect();
    values.sort();
    assert_eq!(values, vec!["false".to_string(), "true".to_string()]);
}

#[tokio::test]
async fn test_validation_errors() {
    let (store, importer) = setup(TrackableKind::Number);

    let result = importer.import("steps", "user-1", vec![]).await;
    assert!(matches!(result, Err(ImportError::EmptyBatch)));

    let result = importer
        .import("missing", "user-1", vec![ImportRecord::new(at(1, 8), "1")])
        .await;
    assert!(matches!(result, Err(ImportError::UnknownTrackable(id)) if id == "missing"));

    store.add_trackable_tag("mood", "emoji");
    let result = importer
        .import("mood", "user-1", vec![ImportRecord::new(at(1, 8), "1")])
        .await;
    assert!(matches!(result, Err(ImportError::UnsupportedKind(tag)) if tag == "emoji"));

    let batch = vec![
        ImportRecord::new(at(1, 8), "1").with_external_key("a"),
        ImportRecord::new(at(1, 9), "2"),
    ];
    let result = importer.import("steps", "user-1", batch).await;
    assert!(matches!(
        result,
        Err(ImportError::MixedKeys {
            keyed: 1,
            unkeyed: 1
        })
    ));

    assert!(store.table().is_empty());
}

#[tokio::test]
async fn test_type_mismatch_reports_examples() {
    let (store, importer) = setup(TrackableKind::Number);

    let batch = vec![
        ImportRecord::new(at(1, 8), "a"),
        ImportRecord::new(at(1, 9), "1"),
        ImportRecord::new(at(1, 10), "b"),
        ImportRecord::new(at(1, 11), "c"),
        ImportRecord::new(at(1, 12), "d"),
    ];
    let err = importer.import("steps", "user-1", batch).await.unwrap_err();

    match err {
        ImportError::TypeMismatch {
            kind,
            count,
            examples,
        } => {
            assert_eq!(kind, TrackableKind::Number);
            assert_eq!(count, 4);
            assert_eq!(examples.len(), 3);
            assert!(examples[0].contains("\"a\""));
        }
        other => panic!("unexpected error: {}", other),
    }
    assert!(store.table().is_empty());
}

/// Reports a stored record that the table no longer holds.
struct VanishingStore {
    inner: MemoryRecordStore,
}

#[async_trait]
impl RecordStore for VanishingStore {
    async fn trackable_kind(&self, trackable_id: &str) -> Result<Option<String>, StoreError> {
        self.inner.trackable_kind(trackable_id).await
    }

    async fn records_between(
        &self,
        _trackable_id: &str,
        _from: DateTime<Utc>,
        _to: DateTime<Utc>,
    ) -> Result<Vec<Record>, StoreError> {
        Ok(vec![stored("gone", 3, "k1", "10", Some(100))])
    }

    async fn write_transaction(&self, writes: WriteSet) -> Result<(), StoreError> {
        self.inner.write_transaction(writes).await
    }
}

#[tokio::test]
async fn test_failed_write_applies_nothing() {
    let inner = MemoryRecordStore::new();
    inner.add_trackable("steps", TrackableKind::Number);
    let store = Arc::new(VanishingStore { inner });
    let importer = ImportReconciler::new(
        Arc::clone(&store),
        Arc::new(ManualTime::new(now())),
        SyncOptions::default(),
    );

    let batch = vec![
        ImportRecord::new(at(3, 9), "11")
            .with_external_key("k1")
            .with_updated_at(200),
        ImportRecord::new(at(3, 10), "12")
            .with_external_key("k2")
            .with_updated_at(200),
    ];
    let result = importer.import("steps", "user-1", batch).await;

    assert!(matches!(result, Err(ImportError::Store(_))));
    assert!(store.inner.table().is_empty());
}
