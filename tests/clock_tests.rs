use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{Offset, TimeZone, Utc};
use parking_lot::Mutex;
use tracker_sync::clock::{ClockBuckets, ClockStore, Granularity, ManualTime, TimeSource};
use tracker_sync::config::SyncOptions;

fn recorder() -> (Arc<Mutex<Vec<i64>>>, impl Fn(i64) + Send + Sync + 'static) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    (seen, move |value| sink.lock().push(value))
}

async fn settle() {
    for _ in 0..5 {
        tokio::task::yield_now().await;
    }
}

#[test]
fn test_bucket_rounding() {
    let time = Utc.with_ymd_and_hms(2024, 5, 1, 13, 45, 30).unwrap();
    let buckets = ClockBuckets::at(time.timestamp_millis(), Utc.fix());
    assert_eq!(
        buckets.day,
        Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap().timestamp_millis()
    );
    assert_eq!(
        buckets.hour,
        Utc.with_ymd_and_hms(2024, 5, 1, 13, 0, 0).unwrap().timestamp_millis()
    );
    assert_eq!(
        buckets.minute,
        Utc.with_ymd_and_hms(2024, 5, 1, 13, 45, 0).unwrap().timestamp_millis()
    );

    // 01:15 UTC is still the previous day at -05:00.
    let offset = chrono::FixedOffset::west_opt(5 * 3600).unwrap();
    let early = Utc.with_ymd_and_hms(2024, 5, 2, 1, 15, 0).unwrap();
    let local = ClockBuckets::at(early.timestamp_millis(), offset);
    assert_eq!(
        local.day,
        Utc.with_ymd_and_hms(2024, 5, 1, 5, 0, 0).unwrap().timestamp_millis()
    );
}

#[test]
fn test_tick_notifies_only_changed_granularities() {
    let time = Arc::new(ManualTime::new(
        Utc.with_ymd_and_hms(2024, 5, 1, 13, 45, 30).unwrap(),
    ));
    let clock = ClockStore::new(time.clone(), &SyncOptions::default());

    let (days, on_day) = recorder();
    let (minutes, on_minute) = recorder();
    let _day = clock.subscribe(Granularity::Day, on_day);
    let _minute = clock.subscribe(Granularity::Minute, on_minute);

    assert!(clock.tick().is_empty());

    time.set(Utc.with_ymd_and_hms(2024, 5, 1, 13, 46, 0).unwrap());
    assert_eq!(clock.tick(), vec![Granularity::Minute]);
    assert!(days.lock().is_empty());
    assert_eq!(minutes.lock().len(), 1);
    assert_eq!(clock.current(Granularity::Minute), time.now().timestamp_millis());
}

#[test]
fn test_day_boundary_notifies_everyone() {
    let time = Arc::new(ManualTime::new(
        Utc.with_ymd_and_hms(2024, 5, 1, 23, 59, 30).unwrap(),
    ));
    let clock = ClockStore::new(time.clone(), &SyncOptions::default());

    let (days, on_day) = recorder();
    let (hours, on_hour) = recorder();
    let (minutes, on_minute) = recorder();
    let _subs = vec![
        clock.subscribe(Granularity::Day, on_day),
        clock.subscribe(Granularity::Hour, on_hour),
        clock.subscribe(Granularity::Minute, on_minute),
    ];

    let midnight = Utc.with_ymd_and_hms(2024, 5, 2, 0, 0, 0).unwrap();
    time.set(midnight);
    assert_eq!(clock.tick(), Granularity::ALL.to_vec());

    let expected = midnight.timestamp_millis();
    assert_eq!(*days.lock(), vec![expected]);
    assert_eq!(*hours.lock(), vec![expected]);
    assert_eq!(*minutes.lock(), vec![expected]);
}

#[tokio::test(start_paused = true)]
async fn test_timer_fires_after_minute_boundary() {
    let time = Arc::new(ManualTime::new(
        Utc.with_ymd_and_hms(2024, 5, 1, 13, 45, 30).unwrap(),
    ));
    let clock = ClockStore::new(time.clone(), &SyncOptions::default());
    let (minutes, on_minute) = recorder();
    let _sub = clock.subscribe(Granularity::Minute, on_minute);
    assert!(clock.is_running());
    settle().await;

    // Just short of boundary + tick offset.
    time.set(Utc.with_ymd_and_hms(2024, 5, 1, 13, 45, 59).unwrap());
    tokio::time::advance(Duration::from_millis(29_000)).await;
    settle().await;
    assert!(minutes.lock().is_empty());

    let boundary = Utc.with_ymd_and_hms(2024, 5, 1, 13, 46, 0).unwrap();
    time.set(boundary + chrono::Duration::milliseconds(10));
    tokio::time::advance(Duration::from_millis(1_010)).await;
    settle().await;

    assert_eq!(*minutes.lock(), vec![boundary.timestamp_millis()]);
}

#[tokio::test(start_paused = true)]
async fn test_timer_stops_without_listeners() {
    let time = Arc::new(ManualTime::new(
        Utc.with_ymd_and_hms(2024, 5, 1, 13, 45, 30).unwrap(),
    ));
    let clock = ClockStore::new(time.clone(), &SyncOptions::default());
    assert!(!clock.is_running());

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let hour = clock.subscribe(Granularity::Hour, move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    let day = clock.subscribe(Granularity::Day, |_| {});
    assert!(clock.is_running());
    assert_eq!(clock.listener_count(Granularity::Hour), 1);

    drop(hour);
    assert!(clock.is_running());
    day.unsubscribe();
    assert!(!clock.is_running());
    assert_eq!(clock.listener_count(Granularity::Day), 0);

    time.advance(chrono::Duration::hours(3));
    tokio::time::advance(Duration::from_secs(120)).await;
    settle().await;
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    // Without a timer, reads come straight from the time source.
    let expected = Utc.with_ymd_and_hms(2024, 5, 1, 16, 0, 0).unwrap().timestamp_millis();
    assert_eq!(clock.current(Granularity::Hour), expected);
}
