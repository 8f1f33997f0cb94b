use thiserror::Error;

/// Error type for change feeds and tables
#[derive(Error, Debug)]
pub enum RealtimeError {
    #[error("JSON serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Row not found: {0}")]
    RowNotFound(String),

    #[error("Duplicate row: {0}")]
    DuplicateRow(String),

    #[error("Invalid change event: {0}")]
    InvalidEvent(String),
}
