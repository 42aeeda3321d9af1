//! Integration tests against a live Redis instance.
//!
//! Ignored by default; run with a local Redis (or set `REDIS_URL`):
//!
//! ```text
//! cargo test -p turnstile-redis -- --ignored
//! ```

use std::time::Duration;
use turnstile::{BackgroundQueue, CounterStore};
use turnstile_redis::{connect, LockConfig, RedisCounterStore, RedisLockGuard};
use uuid::Uuid;

fn redis_url() -> String {
    std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1/".to_string())
}

fn unique_key(label: &str) -> String {
    format!("turnstile:test:{label}:{}", Uuid::new_v4())
}

#[tokio::test]
#[ignore]
async fn fixed_window_admits_up_to_limit_then_denies() {
    let conn = connect(&redis_url()).await.unwrap();
    let store = RedisCounterStore::fixed_window(conn);
    let key = unique_key("fixed");
    let period = Duration::from_secs(60);

    for _ in 0..3 {
        assert!(store.check_and_record(&key, period, 3).await.unwrap());
    }
    assert!(!store.check_and_record(&key, period, 3).await.unwrap());
}

#[tokio::test]
#[ignore]
async fn fixed_window_keys_do_not_share_quota() {
    let conn = connect(&redis_url()).await.unwrap();
    let store = RedisCounterStore::fixed_window(conn);
    let period = Duration::from_secs(60);
    let first = unique_key("iso");
    let second = unique_key("iso");

    assert!(store.check_and_record(&first, period, 1).await.unwrap());
    assert!(!store.check_and_record(&first, period, 1).await.unwrap());
    assert!(store.check_and_record(&second, period, 1).await.unwrap());
}

#[tokio::test]
#[ignore]
async fn fixed_window_resets_after_expiry() {
    let conn = connect(&redis_url()).await.unwrap();
    let store = RedisCounterStore::fixed_window(conn);
    let key = unique_key("expiry");
    let period = Duration::from_secs(1);

    assert!(store.check_and_record(&key, period, 1).await.unwrap());
    assert!(!store.check_and_record(&key, period, 1).await.unwrap());

    tokio::time::sleep(Duration::from_millis(1100)).await;
    assert!(store.check_and_record(&key, period, 1).await.unwrap());
}

#[tokio::test]
#[ignore]
async fn zero_limit_denies_before_touching_redis() {
    let conn = connect(&redis_url()).await.unwrap();
    let store = RedisCounterStore::fixed_window(conn);
    let key = unique_key("zero");

    assert!(!store
        .check_and_record(&key, Duration::from_secs(60), 0)
        .await
        .unwrap());
}

#[tokio::test]
#[ignore]
async fn sliding_window_denies_once_recorded_events_reach_limit() {
    let conn = connect(&redis_url()).await.unwrap();
    let (queue, worker) = BackgroundQueue::bounded(32);
    worker.spawn();
    let store = RedisCounterStore::sliding_window(conn, queue);
    let key = unique_key("sliding");
    let period = Duration::from_secs(60);

    for _ in 0..2 {
        assert!(store.check_and_record(&key, period, 2).await.unwrap());
        // Recording is deferred; give the worker a beat before re-reading.
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert!(!store.check_and_record(&key, period, 2).await.unwrap());
}

#[tokio::test]
#[ignore]
async fn locked_sliding_window_still_decides() {
    let conn = connect(&redis_url()).await.unwrap();
    let (queue, worker) = BackgroundQueue::bounded(32);
    worker.spawn();
    let store = RedisCounterStore::sliding_window_locked(conn, queue, LockConfig::default());
    let key = unique_key("locked");
    let period = Duration::from_secs(60);

    assert!(store.check_and_record(&key, period, 1).await.unwrap());
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!store.check_and_record(&key, period, 1).await.unwrap());
}

#[tokio::test]
#[ignore]
async fn sliding_window_records_one_event_and_a_ttl_per_admit() {
    let conn = connect(&redis_url()).await.unwrap();
    let (queue, worker) = BackgroundQueue::bounded(32);
    worker.spawn();
    let store = RedisCounterStore::sliding_window(conn.clone(), queue);
    let key = unique_key("events");
    let period = Duration::from_secs(60);

    for _ in 0..3 {
        assert!(store.check_and_record(&key, period, 10).await.unwrap());
    }
    // Recording runs on the worker after each decision.
    tokio::time::sleep(Duration::from_millis(100)).await;

    let mut check = conn.clone();
    let events: u64 = redis::cmd("ZCARD")
        .arg(&key)
        .query_async(&mut check)
        .await
        .unwrap();
    assert_eq!(events, 3, "each admit records exactly one event");

    let ttl: i64 = redis::cmd("TTL")
        .arg(&key)
        .query_async(&mut check)
        .await
        .unwrap();
    assert!(ttl > 0 && ttl <= 60, "expiry job refreshed the window ttl, got {ttl}");
}

#[tokio::test]
#[ignore]
async fn lock_is_exclusive_until_released() {
    let conn = connect(&redis_url()).await.unwrap();
    let key = unique_key("lock");
    let config = LockConfig {
        expiry: Duration::from_secs(10),
        wait: Duration::from_millis(200),
        retry: Duration::from_millis(50),
    };

    let guard = RedisLockGuard::acquire(conn.clone(), &key, &config)
        .await
        .unwrap();

    // A second claimant exhausts its wait budget while the lock is held.
    let contender = RedisLockGuard::acquire(conn.clone(), &key, &config).await;
    assert!(contender.is_err());

    guard.release().await;
    let reacquired = RedisLockGuard::acquire(conn, &key, &config).await;
    assert!(reacquired.is_ok());
}

#[tokio::test]
#[ignore]
async fn expired_guard_cannot_release_a_newer_lease() {
    let conn = connect(&redis_url()).await.unwrap();
    let key = unique_key("stale");
    let lock_key = format!("{key}:lock");
    let short = LockConfig {
        expiry: Duration::from_millis(100),
        wait: Duration::from_millis(200),
        retry: Duration::from_millis(50),
    };
    let long = LockConfig {
        expiry: Duration::from_secs(10),
        ..short.clone()
    };

    let stale = RedisLockGuard::acquire(conn.clone(), &key, &short)
        .await
        .unwrap();
    // Outlive the first lease, then hand the lock to a second claimant.
    tokio::time::sleep(Duration::from_millis(150)).await;
    let fresh = RedisLockGuard::acquire(conn.clone(), &key, &long)
        .await
        .unwrap();

    let mut check = conn.clone();
    let fresh_token: Option<String> = redis::cmd("GET")
        .arg(&lock_key)
        .query_async(&mut check)
        .await
        .unwrap();
    assert!(fresh_token.is_some());

    // Releasing the expired guard compares tokens and must leave the newer
    // lease untouched.
    stale.release().await;
    let after_stale: Option<String> = redis::cmd("GET")
        .arg(&lock_key)
        .query_async(&mut check)
        .await
        .unwrap();
    assert_eq!(after_stale, fresh_token);

    fresh.release().await;
    let after_fresh: Option<String> = redis::cmd("GET")
        .arg(&lock_key)
        .query_async(&mut check)
        .await
        .unwrap();
    assert!(after_fresh.is_none());
}
