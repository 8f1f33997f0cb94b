//! The record and flag instances of the diff cache.

mod flags;
mod records;

pub use flags::{FlagBuckets, FlagCache, FlagSlot};
pub use records::{DayKey, RecordBuckets, RecordCache};
