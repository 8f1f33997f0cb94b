//! Change feeds and fine-grained diff caches for tracker-sync
//!
//! This crate turns raw insert/update/delete feeds from a replicated store
//! into keyed buckets, and notifies observers only for the buckets whose
//! content actually changed.

mod cache;
mod error;
mod feed;
mod message;
mod registry;

pub use cache::{BucketSpec, CacheSubscription, DiffCache, DiffCacheOptions};
pub use error::RealtimeError;
pub use feed::{ChangeFeed, ChangeStream, MemoryTable, TableWrite};
pub use message::{parse_batch, ChangeBatch, ChangeEvent, ChangeKind, Row};
pub use registry::{KeyedObservers, ObserverFn, ObserverId};
