//! Configuration options for the sync layer

use std::time::Duration;

use chrono::{FixedOffset, Offset, Utc};

/// Configuration options for [`crate::TrackerSync`]
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// Offset used to bucket timestamps into local days and hours
    pub utc_offset: FixedOffset,

    /// How far past each minute boundary the clock fires
    pub tick_offset: Duration,

    /// Number of offending values quoted in an import type error
    pub max_error_examples: usize,

    /// Prefix of the session cache key
    pub storage_prefix: String,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            utc_offset: Utc.fix(),
            tick_offset: Duration::from_millis(10),
            max_error_examples: 3,
            storage_prefix: "tracker".to_string(),
        }
    }
}

impl SyncOptions {
    /// Set the local UTC offset
    pub fn with_utc_offset(mut self, value: FixedOffset) -> Self {
        self.utc_offset = value;
        self
    }

    /// Set the local UTC offset in seconds east of UTC.
    ///
    /// Out-of-range values leave the offset unchanged.
    pub fn with_utc_offset_seconds(mut self, seconds: i32) -> Self {
        if let Some(offset) = FixedOffset::east_opt(seconds) {
            self.utc_offset = offset;
        }
        self
    }

    /// Set the tick offset
    pub fn with_tick_offset(mut self, value: Duration) -> Self {
        self.tick_offset = value;
        self
    }

    /// Set the number of examples quoted in import errors
    pub fn with_max_error_examples(mut self, value: usize) -> Self {
        self.max_error_examples = value;
        self
    }

    /// Set the session cache key prefix
    pub fn with_storage_prefix(mut self, value: &str) -> Self {
        self.storage_prefix = value.to_string();
        self
    }
}
