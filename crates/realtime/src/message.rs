use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::RealtimeError;

/// A row that can travel through a change feed.
pub trait Row: Clone + Send + Sync + 'static {
    /// Stable identifier of the row within its table.
    fn row_id(&self) -> &str;
}

/// Kind of change carried by a feed event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ChangeKind::Insert => "insert",
            ChangeKind::Update => "update",
            ChangeKind::Delete => "delete",
        };
        write!(f, "{}", s)
    }
}

/// One change to one row. Deletes carry no row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent<R> {
    #[serde(rename = "type")]
    pub kind: ChangeKind,
    #[serde(rename = "rowId")]
    pub row_id: String,
    pub row: Option<R>,
}

impl<R: Row> ChangeEvent<R> {
    pub fn insert(row: R) -> Self {
        Self {
            kind: ChangeKind::Insert,
            row_id: row.row_id().to_string(),
            row: Some(row),
        }
    }

    pub fn update(row: R) -> Self {
        Self {
            kind: ChangeKind::Update,
            row_id: row.row_id().to_string(),
            row: Some(row),
        }
    }

    pub fn delete(row_id: &str) -> Self {
        Self {
            kind: ChangeKind::Delete,
            row_id: row_id.to_string(),
            row: None,
        }
    }
}

/// Ordered changes delivered together by a feed.
pub type ChangeBatch<R> = Vec<ChangeEvent<R>>;

/// Parse a JSON array of change events.
///
/// Inserts and updates must carry a row whose id matches `rowId`.
pub fn parse_batch<R: Row + DeserializeOwned>(json: &str) -> Result<ChangeBatch<R>, RealtimeError> {
    let batch: ChangeBatch<R> = serde_json::from_str(json)?;
    for event in &batch {
        match (&event.kind, &event.row) {
            (ChangeKind::Delete, _) => {}
            (kind, None) => {
                return Err(RealtimeError::InvalidEvent(format!(
                    "{} for row {} has no row payload",
                    kind, event.row_id
                )));
            }
            (kind, Some(row)) if row.row_id() != event.row_id => {
                return Err(RealtimeError::InvalidEvent(format!(
                    "{} for row {} carries row {}",
                    kind,
                    event.row_id,
                    row.row_id()
                )));
            }
            _ => {}
        }
    }
    Ok(batch)
}
