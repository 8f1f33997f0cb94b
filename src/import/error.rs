use thiserror::Error;
use tracker_sync_realtime::RealtimeError;

use crate::types::TrackableKind;

/// Errors from a record store
#[derive(Error, Debug)]
pub enum StoreError {
    /// The write set was rejected as a whole
    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Table error: {0}")]
    Table(#[from] RealtimeError),

    #[error("Storage error: {0}")]
    Backend(String),
}

/// Errors from an import
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Import batch is empty")]
    EmptyBatch,

    #[error("Unknown trackable: {0}")]
    UnknownTrackable(String),

    #[error("Unsupported trackable kind: {0}")]
    UnsupportedKind(String),

    #[error("{count} value(s) do not match trackable kind {kind}: {}", .examples.join(", "))]
    TypeMismatch {
        kind: TrackableKind,
        count: usize,
        examples: Vec<String>,
    },

    #[error("Batch mixes keyed and unkeyed items ({keyed} keyed, {unkeyed} unkeyed)")]
    MixedKeys { keyed: usize, unkeyed: usize },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}
