//! Shared "now" values for day, hour and minute observers.
//!
//! All subscribers share one timer task. It sleeps until just past the next
//! minute boundary, recomputed from the time source on every round, and only
//! runs while at least one listener is registered.

mod time;

pub use time::{ManualTime, TimeSource, WallClock};

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::FixedOffset;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::config::SyncOptions;
use crate::types::floor_ms;

const MINUTE_MS: i64 = 60_000;
const HOUR_MS: i64 = 3_600_000;
const DAY_MS: i64 = 86_400_000;

/// Rounding granularity of a clock bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Granularity {
    Day,
    Hour,
    Minute,
}

impl Granularity {
    /// Coarsest first, which is also the notification order.
    pub const ALL: [Granularity; 3] = [Granularity::Day, Granularity::Hour, Granularity::Minute];

    fn unit_ms(&self) -> i64 {
        match self {
            Granularity::Day => DAY_MS,
            Granularity::Hour => HOUR_MS,
            Granularity::Minute => MINUTE_MS,
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Granularity::Day => f.write_str("day"),
            Granularity::Hour => f.write_str("hour"),
            Granularity::Minute => f.write_str("minute"),
        }
    }
}

/// Current bucket values, in epoch milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockBuckets {
    pub day: i64,
    pub hour: i64,
    pub minute: i64,
}

impl ClockBuckets {
    /// Buckets containing `epoch_ms`, rounded in local time.
    pub fn at(epoch_ms: i64, offset: FixedOffset) -> Self {
        Self {
            day: floor_ms(epoch_ms, Granularity::Day.unit_ms(), offset),
            hour: floor_ms(epoch_ms, Granularity::Hour.unit_ms(), offset),
            minute: floor_ms(epoch_ms, Granularity::Minute.unit_ms(), offset),
        }
    }

    pub fn get(&self, granularity: Granularity) -> i64 {
        match granularity {
            Granularity::Day => self.day,
            Granularity::Hour => self.hour,
            Granularity::Minute => self.minute,
        }
    }
}

type Listener = Arc<dyn Fn(i64) + Send + Sync>;

struct ClockState {
    buckets: ClockBuckets,
    listeners: HashMap<Granularity, Vec<(u64, Listener)>>,
    timer: Option<JoinHandle<()>>,
}

impl ClockState {
    fn has_listeners(&self) -> bool {
        self.listeners.values().any(|list| !list.is_empty())
    }
}

struct ClockInner {
    time: Arc<dyn TimeSource>,
    offset: FixedOffset,
    tick_offset: Duration,
    next_id: AtomicU64,
    state: Mutex<ClockState>,
}

impl ClockInner {
    fn now_buckets(&self) -> ClockBuckets {
        ClockBuckets::at(self.time.now().timestamp_millis(), self.offset)
    }

    /// Time until `tick_offset` past the next minute boundary.
    fn delay_until_next_tick(&self) -> Duration {
        let now = self.time.now().timestamp_millis();
        let next_minute = floor_ms(now, MINUTE_MS, self.offset) + MINUTE_MS;
        let wait = u64::try_from(next_minute - now).unwrap_or(0);
        Duration::from_millis(wait) + self.tick_offset
    }

    fn tick(&self) -> Vec<Granularity> {
        let next = self.now_buckets();
        let (changed, pending) = {
            let mut state = self.state.lock();
            let previous = state.buckets;
            state.buckets = next;

            let changed: Vec<Granularity> = Granularity::ALL
                .into_iter()
                .filter(|granularity| previous.get(*granularity) != next.get(*granularity))
                .collect();
            let pending: Vec<(Granularity, Vec<Listener>)> = changed
                .iter()
                .map(|granularity| {
                    let listeners = state
                        .listeners
                        .get(granularity)
                        .map(|list| list.iter().map(|(_, listener)| Arc::clone(listener)).collect())
                        .unwrap_or_default();
                    (*granularity, listeners)
                })
                .collect();
            (changed, pending)
        };

        if changed.is_empty() {
            trace!("clock tick without bucket change");
        } else {
            debug!(?changed, "clock buckets changed");
        }
        for (granularity, listeners) in pending {
            let value = next.get(granularity);
            for listener in listeners {
                listener(value);
            }
        }
        changed
    }

    fn unsubscribe(&self, granularity: Granularity, id: u64) {
        let timer = {
            let mut state = self.state.lock();
            if let Some(list) = state.listeners.get_mut(&granularity) {
                list.retain(|(listener_id, _)| *listener_id != id);
                if list.is_empty() {
                    state.listeners.remove(&granularity);
                }
            }
            if state.has_listeners() {
                None
            } else {
                state.timer.take()
            }
        };
        if let Some(timer) = timer {
            debug!("last clock listener gone, stopping timer");
            timer.abort();
        }
    }
}

fn spawn_timer(inner: &Arc<ClockInner>) -> Option<JoinHandle<()>> {
    let handle = match tokio::runtime::Handle::try_current() {
        Ok(handle) => handle,
        Err(err) => {
            warn!("clock timer not started, no tokio runtime: {}", err);
            return None;
        }
    };
    let weak = Arc::downgrade(inner);
    Some(handle.spawn(async move {
        loop {
            let delay = match weak.upgrade() {
                Some(inner) => inner.delay_until_next_tick(),
                None => break,
            };
            tokio::time::sleep(delay).await;
            match weak.upgrade() {
                Some(inner) => {
                    inner.tick();
                }
                None => break,
            }
        }
    }))
}

/// Day, hour and minute buckets shared by many observers
#[derive(Clone)]
pub struct ClockStore {
    inner: Arc<ClockInner>,
}

impl ClockStore {
    pub fn new(time: Arc<dyn TimeSource>, options: &SyncOptions) -> Self {
        let offset = options.utc_offset;
        let buckets = ClockBuckets::at(time.now().timestamp_millis(), offset);
        Self {
            inner: Arc::new(ClockInner {
                time,
                offset,
                tick_offset: options.tick_offset,
                next_id: AtomicU64::new(1),
                state: Mutex::new(ClockState {
                    buckets,
                    listeners: HashMap::new(),
                    timer: None,
                }),
            }),
        }
    }

    /// Current bucket value.
    ///
    /// Without a running timer the value is computed from the time source.
    pub fn current(&self, granularity: Granularity) -> i64 {
        self.buckets().get(granularity)
    }

    /// All three current bucket values.
    pub fn buckets(&self) -> ClockBuckets {
        let state = self.inner.state.lock();
        if state.timer.is_some() {
            state.buckets
        } else {
            drop(state);
            self.inner.now_buckets()
        }
    }

    /// Whether the shared timer task is scheduled.
    pub fn is_running(&self) -> bool {
        self.inner.state.lock().timer.is_some()
    }

    /// Listen for changes of one bucket.
    ///
    /// Starts the shared timer if it is not running. Dropping the returned
    /// subscription unsubscribes and stops the timer once nobody listens.
    pub fn subscribe<F>(&self, granularity: Granularity, listener: F) -> ClockSubscription
    where
        F: Fn(i64) + Send + Sync + 'static,
    {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let listener: Listener = Arc::new(listener);
        let start = {
            let mut state = self.inner.state.lock();
            state
                .listeners
                .entry(granularity)
                .or_default()
                .push((id, listener));
            if state.timer.is_none() {
                state.buckets = self.inner.now_buckets();
                true
            } else {
                false
            }
        };

        if start {
            if let Some(timer) = spawn_timer(&self.inner) {
                debug!(%granularity, "clock timer started");
                let mut state = self.inner.state.lock();
                if state.timer.is_none() && state.has_listeners() {
                    state.timer = Some(timer);
                } else {
                    // Another subscriber won the race, or everyone left.
                    timer.abort();
                }
            }
        }

        ClockSubscription {
            granularity,
            id,
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Recompute the buckets now and notify listeners of changed ones.
    ///
    /// Returns the changed granularities, coarsest first.
    pub fn tick(&self) -> Vec<Granularity> {
        self.inner.tick()
    }

    /// Number of listeners for `granularity`.
    pub fn listener_count(&self, granularity: Granularity) -> usize {
        self.inner
            .state
            .lock()
            .listeners
            .get(&granularity)
            .map_or(0, Vec::len)
    }
}

impl fmt::Debug for ClockStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("ClockStore")
            .field("buckets", &state.buckets)
            .field("running", &state.timer.is_some())
            .finish()
    }
}

/// Active clock listener. Unsubscribes on drop.
pub struct ClockSubscription {
    granularity: Granularity,
    id: u64,
    inner: Weak<ClockInner>,
}

impl ClockSubscription {
    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    pub fn unsubscribe(self) {}
}

impl Drop for ClockSubscription {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.upgrade() {
            inner.unsubscribe(self.granularity, self.id);
        }
    }
}
