//! Tracker Sync
//!
//! A local-first data consistency layer for personal tracking apps: fine
//! grained caches over a replicated store, typed flag settings, bulk import
//! with last-write-wins reconciliation, an offline-capable session cache and
//! a shared day/hour/minute clock.

pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod flags;
pub mod import;
pub mod types;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;
use tracker_sync_auth::{AuthClock, AuthOptions, OfflineAuth, SessionEndpoint, SessionStore};
use tracker_sync_realtime::{MemoryTable, TableWrite};

use crate::cache::{FlagCache, FlagSlot, RecordCache};
use crate::clock::{ClockStore, TimeSource, WallClock};
use crate::config::SyncOptions;
use crate::error::Error;
use crate::flags::FlagValue;
use crate::import::{ImportReconciler, RecordStore};
use crate::types::FlagRow;

pub use tracker_sync_auth as auth;
pub use tracker_sync_realtime as realtime;

/// Entry point owning the shared clock and caches
pub struct TrackerSync {
    /// Sync options
    pub options: SyncOptions,
    time: Arc<dyn TimeSource>,
    clock: ClockStore,
    records: RecordCache,
    flags: FlagCache,
}

impl TrackerSync {
    /// Create a new instance on the system clock
    ///
    /// # Example
    ///
    /// ```
    /// use tracker_sync::TrackerSync;
    /// use tracker_sync::flags::FlagKey;
    ///
    /// let sync = TrackerSync::new();
    /// let favorite = sync.flags().get("trackable-1", FlagKey::Favorite);
    /// assert_eq!(favorite.as_bool(), Some(false));
    /// ```
    pub fn new() -> Self {
        Self::new_with_options(SyncOptions::default())
    }

    /// Create a new instance with custom options
    pub fn new_with_options(options: SyncOptions) -> Self {
        Self::with_time_source(Arc::new(WallClock), options)
    }

    /// Create a new instance on the given time source
    pub fn with_time_source(time: Arc<dyn TimeSource>, options: SyncOptions) -> Self {
        debug!(offset = %options.utc_offset, "creating tracker sync");
        Self {
            clock: ClockStore::new(Arc::clone(&time), &options),
            records: RecordCache::new(options.utc_offset),
            flags: FlagCache::new(),
            time,
            options,
        }
    }

    pub fn clock(&self) -> &ClockStore {
        &self.clock
    }

    pub fn records(&self) -> &RecordCache {
        &self.records
    }

    pub fn flags(&self) -> &FlagCache {
        &self.flags
    }

    /// An importer writing to `store`
    pub fn importer<S: RecordStore + ?Sized>(&self, store: Arc<S>) -> ImportReconciler<S> {
        ImportReconciler::new(store, Arc::clone(&self.time), self.options.clone())
    }

    /// An offline session cache for `server_url`, on this instance's time source
    pub fn auth(
        &self,
        server_url: &str,
        endpoint: Arc<dyn SessionEndpoint>,
        store: Arc<dyn SessionStore>,
    ) -> Result<OfflineAuth, Error> {
        let options = AuthOptions::default().with_storage_prefix(&self.options.storage_prefix);
        let auth = OfflineAuth::new(server_url, endpoint, store, options)?;
        Ok(auth.with_clock(Arc::new(TimeSourceClock(Arc::clone(&self.time)))))
    }

    /// Persist `value` as the flag of `owner_id` in `table`.
    ///
    /// The row id is derived from the owner and key, so each flag has one row.
    pub fn set_flag(
        &self,
        table: &MemoryTable<FlagRow>,
        owner_id: &str,
        value: &FlagValue,
    ) -> Result<(), Error> {
        let slot = FlagSlot::new(owner_id, value.key());
        let row = FlagRow {
            id: slot.to_string(),
            owner_id: owner_id.to_string(),
            key: value.key().as_str().to_string(),
            value: flags::serialize(value)?,
        };
        table.apply(vec![TableWrite::Upsert(row)])?;
        Ok(())
    }
}

impl Default for TrackerSync {
    fn default() -> Self {
        Self::new()
    }
}

struct TimeSourceClock(Arc<dyn TimeSource>);

impl AuthClock for TimeSourceClock {
    fn now(&self) -> DateTime<Utc> {
        self.0.now()
    }
}

/// Commonly used items
pub mod prelude {
    pub use crate::cache::{DayKey, FlagCache, FlagSlot, RecordCache};
    pub use crate::clock::{ClockStore, Granularity, ManualTime, TimeSource, WallClock};
    pub use crate::config::SyncOptions;
    pub use crate::error::Error;
    pub use crate::flags::{FlagKey, FlagValue};
    pub use crate::import::{ImportRecord, ImportReconciler, ImportSummary, MemoryRecordStore};
    pub use crate::types::{FlagRow, Record, TrackableKind};
    pub use crate::TrackerSync;
    pub use tracker_sync_auth::{AuthSnapshot, OfflineAuth, SessionSource};
    pub use tracker_sync_realtime::{ChangeFeed, MemoryTable};
}
