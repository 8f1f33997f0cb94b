//! Change feeds and an in-memory replicated table.

use log::{debug, trace};
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::error::RealtimeError;
use crate::message::{ChangeBatch, ChangeEvent, Row};

/// Stream of change batches from a feed.
pub type ChangeStream<R> = mpsc::UnboundedReceiver<ChangeBatch<R>>;

/// A push-based source of row changes.
pub trait ChangeFeed<R: Row>: Send + Sync {
    /// Subscribe to live changes.
    ///
    /// With `include_initial_state`, the first batch holds one insert per
    /// existing row, delivered before any live change.
    fn subscribe(&self, include_initial_state: bool) -> ChangeStream<R>;
}

/// One write inside an atomic write set
#[derive(Debug, Clone)]
pub enum TableWrite<R> {
    /// Insert a new row; fails if the id exists.
    Insert(R),
    /// Replace an existing row; fails if the id is missing.
    Update(R),
    /// Insert or replace.
    Upsert(R),
    /// Remove an existing row; fails if the id is missing.
    Delete(String),
}

struct TableState<R> {
    rows: Vec<R>,
    subscribers: Vec<mpsc::UnboundedSender<ChangeBatch<R>>>,
}

/// In-memory table that publishes its writes as change batches.
///
/// Rows keep creation order. Write sets are all-or-nothing.
pub struct MemoryTable<R: Row> {
    name: String,
    state: Mutex<TableState<R>>,
}

impl<R: Row> MemoryTable<R> {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            state: Mutex::new(TableState {
                rows: Vec::new(),
                subscribers: Vec::new(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// All rows in creation order.
    pub fn rows(&self) -> Vec<R> {
        self.state.lock().rows.clone()
    }

    pub fn get(&self, row_id: &str) -> Option<R> {
        self.state
            .lock()
            .rows
            .iter()
            .find(|row| row.row_id() == row_id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.state.lock().rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Apply a write set atomically and publish it as one batch.
    ///
    /// On error no row is changed and nothing is published.
    pub fn apply(&self, writes: Vec<TableWrite<R>>) -> Result<ChangeBatch<R>, RealtimeError> {
        let mut state = self.state.lock();
        let mut rows = state.rows.clone();
        let mut batch = Vec::with_capacity(writes.len());

        for write in writes {
            match write {
                TableWrite::Insert(row) => {
                    if position(&rows, row.row_id()).is_some() {
                        return Err(RealtimeError::DuplicateRow(row.row_id().to_string()));
                    }
                    batch.push(ChangeEvent::insert(row.clone()));
                    rows.push(row);
                }
                TableWrite::Update(row) => {
                    let index = position(&rows, row.row_id())
                        .ok_or_else(|| RealtimeError::RowNotFound(row.row_id().to_string()))?;
                    batch.push(ChangeEvent::update(row.clone()));
                    rows[index] = row;
                }
                TableWrite::Upsert(row) => match position(&rows, row.row_id()) {
                    Some(index) => {
                        batch.push(ChangeEvent::update(row.clone()));
                        rows[index] = row;
                    }
                    None => {
                        batch.push(ChangeEvent::insert(row.clone()));
                        rows.push(row);
                    }
                },
                TableWrite::Delete(row_id) => {
                    let index = position(&rows, &row_id)
                        .ok_or_else(|| RealtimeError::RowNotFound(row_id.clone()))?;
                    rows.remove(index);
                    batch.push(ChangeEvent::delete(&row_id));
                }
            }
        }

        state.rows = rows;
        if !batch.is_empty() {
            state
                .subscribers
                .retain(|subscriber| subscriber.send(batch.clone()).is_ok());
        }
        debug!(
            "{}: committed {} change(s) to {} subscriber(s)",
            self.name,
            batch.len(),
            state.subscribers.len()
        );
        Ok(batch)
    }
}

fn position<R: Row>(rows: &[R], row_id: &str) -> Option<usize> {
    rows.iter().position(|row| row.row_id() == row_id)
}

impl<R: Row> ChangeFeed<R> for MemoryTable<R> {
    fn subscribe(&self, include_initial_state: bool) -> ChangeStream<R> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.state.lock();
        if include_initial_state && !state.rows.is_empty() {
            let initial: ChangeBatch<R> = state.rows.iter().cloned().map(ChangeEvent::insert).collect();
            trace!("{}: sending {} initial row(s)", self.name, initial.len());
            // The receiver is still in scope, so this send cannot fail.
            let _ = tx.send(initial);
        }
        state.subscribers.push(tx);
        rx
    }
}
