//! Error handling for tracker-sync

use std::fmt;
use thiserror::Error;
use tracker_sync_auth::AuthError;
use tracker_sync_realtime::RealtimeError;

use crate::flags::FlagError;
use crate::import::{ImportError, StoreError};

/// Unified error type for tracker-sync
#[derive(Error, Debug)]
pub enum Error {
    /// Change feed and table errors
    #[error("Realtime error: {0}")]
    Realtime(#[from] RealtimeError),

    /// Session errors
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    /// Import validation and merge errors
    #[error("Import error: {0}")]
    Import(#[from] ImportError),

    /// Record store errors
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    /// Flag encoding errors
    #[error("Flag error: {0}")]
    Flag(#[from] FlagError),

    /// JSON serialization or deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// General errors
    #[error("{0}")]
    General(String),
}

impl Error {
    /// Create a new general error
    pub fn general<T: fmt::Display>(msg: T) -> Self {
        Error::General(msg.to_string())
    }

    /// Whether retrying later may succeed.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::Auth(err) => err.class() == tracker_sync_auth::ErrorClass::Recoverable,
            _ => false,
        }
    }
}
