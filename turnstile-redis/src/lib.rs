#![forbid(unsafe_code)]
#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::all))]

//! Redis-backed counting store for turnstile (bring your own connection).
//!
//! Two strategies share one [`CounterStore`] implementation:
//!
//! - **Fixed window** (default): a Lua script increments the key and sets its
//!   expiry on first touch, so count-and-expire is one atomic round trip.
//! - **Sliding window**: a sorted set of request events is counted on the hot
//!   path; recording the new event and refreshing the set's expiry are
//!   deferred to a [`BackgroundQueue`] and never block the decision.
//!
//! The sliding strategy can optionally serialize its read-decide-record
//! sequence under a per-key distributed lock ([`LockConfig`]). Without the
//! lock, concurrent checks near the limit boundary may both observe the same
//! count and over-admit by a small margin; the fixed-window script has no
//! such race.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use turnstile::{RateLimitCoordinator, RateLimitOptions};
//! use turnstile_redis::RedisCounterStore;
//!
//! # async fn demo() -> Result<(), turnstile_redis::StoreError> {
//! let conn = turnstile_redis::connect("redis://127.0.0.1/").await?;
//! let store = Arc::new(RedisCounterStore::fixed_window(conn));
//! let coordinator = RateLimitCoordinator::new(RateLimitOptions::default(), store);
//! # let _ = coordinator;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Script};
use std::fmt;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::warn;
use turnstile::{BackgroundQueue, CounterStore};
use uuid::Uuid;

/// Failures talking to Redis.
///
/// The coordinator treats any store error as fail-open, so every variant here
/// results in the request being admitted and the error logged.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("redis command failed: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("distributed lock not acquired within {waited:?}")]
    LockTimeout { waited: Duration },
}

/// Open a multiplexed connection to the given Redis URL.
pub async fn connect(url: &str) -> Result<MultiplexedConnection, StoreError> {
    let client = redis::Client::open(url)?;
    Ok(client.get_multiplexed_async_connection().await?)
}

/// Distributed lock tuning for the sliding-window strategy.
#[derive(Debug, Clone)]
pub struct LockConfig {
    /// Lease length; the lock self-expires after this even if never released.
    pub expiry: Duration,
    /// Total budget for acquisition attempts before giving up.
    pub wait: Duration,
    /// Pause between acquisition attempts.
    pub retry: Duration,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            expiry: Duration::from_secs(300),
            wait: Duration::from_secs(120),
            retry: Duration::from_millis(500),
        }
    }
}

#[derive(Debug)]
enum Strategy {
    FixedWindow,
    SlidingWindow {
        queue: BackgroundQueue,
        lock: Option<LockConfig>,
    },
}

/// [`CounterStore`] backed by a shared Redis instance.
pub struct RedisCounterStore {
    conn: MultiplexedConnection,
    strategy: Strategy,
}

impl fmt::Debug for RedisCounterStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisCounterStore")
            .field("strategy", &self.strategy)
            .finish_non_exhaustive()
    }
}

// INCR creates the key at 1, so the expiry is set exactly once per window.
const FIXED_WINDOW_SCRIPT: &str = r#"
local count = redis.call('INCR', KEYS[1])
if count == 1 then
  redis.call('EXPIRE', KEYS[1], ARGV[1])
end
return count
"#;

const RELEASE_SCRIPT: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
  return redis.call('DEL', KEYS[1])
else
  return 0
end
"#;

impl RedisCounterStore {
    /// Atomic fixed-window counting. One round trip per decision, no races.
    pub fn fixed_window(conn: MultiplexedConnection) -> Self {
        Self {
            conn,
            strategy: Strategy::FixedWindow,
        }
    }

    /// Sliding-window counting over a sorted set of request events. Recording
    /// runs on `queue` after the decision is returned.
    pub fn sliding_window(conn: MultiplexedConnection, queue: BackgroundQueue) -> Self {
        Self {
            conn,
            strategy: Strategy::SlidingWindow { queue, lock: None },
        }
    }

    /// Sliding-window counting with the read-decide-record sequence held
    /// under a per-key distributed lock.
    pub fn sliding_window_locked(
        conn: MultiplexedConnection,
        queue: BackgroundQueue,
        lock: LockConfig,
    ) -> Self {
        Self {
            conn,
            strategy: Strategy::SlidingWindow {
                queue,
                lock: Some(lock),
            },
        }
    }

    async fn fixed_window_check(
        &self,
        key: &str,
        period: Duration,
        limit: u32,
    ) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let count: i64 = Script::new(FIXED_WINDOW_SCRIPT)
            .key(key)
            .arg(period.as_secs().max(1))
            .invoke_async(&mut conn)
            .await?;
        Ok(count <= i64::from(limit))
    }

    async fn sliding_window_check(
        &self,
        key: &str,
        period: Duration,
        limit: u32,
        queue: &BackgroundQueue,
    ) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let now = epoch_millis();
        let (window_start, window_end) = window_bounds(now, period);
        let count: u64 = conn.zcount(key, window_start, window_end).await?;
        if count >= u64::from(limit) {
            return Ok(false);
        }

        let record_key = key.to_string();
        let mut record_conn = self.conn.clone();
        queue.enqueue(async move {
            let member = format!("{}:{}", now, Uuid::new_v4());
            if let Err(e) = record_conn
                .zadd::<_, _, _, ()>(&record_key, member, now)
                .await
            {
                warn!(
                    target: "turnstile::redis",
                    key = %record_key,
                    error = %e,
                    "failed to record request event"
                );
            }
        });

        let expire_key = key.to_string();
        let mut expire_conn = self.conn.clone();
        let ttl = i64::try_from(period.as_secs().max(1)).unwrap_or(i64::MAX);
        queue.enqueue(async move {
            if let Err(e) = expire_conn.expire::<_, ()>(&expire_key, ttl).await {
                warn!(
                    target: "turnstile::redis",
                    key = %expire_key,
                    error = %e,
                    "failed to refresh window expiry"
                );
            }
        });

        Ok(true)
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    type Error = StoreError;

    async fn check_and_record(
        &self,
        key: &str,
        period: Duration,
        limit: u32,
    ) -> Result<bool, Self::Error> {
        if limit == 0 {
            return Ok(false);
        }
        match &self.strategy {
            Strategy::FixedWindow => self.fixed_window_check(key, period, limit).await,
            Strategy::SlidingWindow { queue, lock } => {
                let guard = match lock {
                    Some(config) => {
                        Some(RedisLockGuard::acquire(self.conn.clone(), key, config).await?)
                    }
                    None => None,
                };
                let decision = self.sliding_window_check(key, period, limit, queue).await;
                if let Some(guard) = guard {
                    guard.release().await;
                }
                decision
            }
        }
    }
}

/// A held per-key distributed lock.
///
/// Acquisition is `SET NX PX` with a random token; release is a
/// compare-and-delete script, so an expired-and-reclaimed lock is never
/// deleted out from under its new holder.
pub struct RedisLockGuard {
    conn: MultiplexedConnection,
    key: String,
    token: String,
}

impl fmt::Debug for RedisLockGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisLockGuard")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

impl RedisLockGuard {
    /// Poll for the lock on `{key}:lock` until acquired or the wait budget is
    /// spent.
    pub async fn acquire(
        mut conn: MultiplexedConnection,
        key: &str,
        config: &LockConfig,
    ) -> Result<Self, StoreError> {
        let lock_key = format!("{key}:lock");
        let token = Uuid::new_v4().to_string();
        let started = Instant::now();
        loop {
            let claimed: Option<String> = redis::cmd("SET")
                .arg(&lock_key)
                .arg(&token)
                .arg("NX")
                .arg("PX")
                .arg(u64::try_from(config.expiry.as_millis()).unwrap_or(u64::MAX))
                .query_async(&mut conn)
                .await?;
            if claimed.is_some() {
                return Ok(Self {
                    conn,
                    key: lock_key,
                    token,
                });
            }
            let waited = started.elapsed();
            if waited + config.retry > config.wait {
                return Err(StoreError::LockTimeout { waited });
            }
            tokio::time::sleep(config.retry).await;
        }
    }

    /// Release the lock if this guard still holds it. A failed release is
    /// logged; the lease expiry reclaims the lock either way.
    pub async fn release(mut self) {
        let result: Result<i64, redis::RedisError> = Script::new(RELEASE_SCRIPT)
            .key(&self.key)
            .arg(&self.token)
            .invoke_async(&mut self.conn)
            .await;
        if let Err(e) = result {
            warn!(
                target: "turnstile::redis",
                key = %self.key,
                error = %e,
                "failed to release distributed lock"
            );
        }
    }
}

fn epoch_millis() -> u64 {
    let since_epoch = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    u64::try_from(since_epoch.as_millis()).unwrap_or(u64::MAX)
}

/// Sorted-set score range counted as "inside the window around `now`".
fn window_bounds(now: u64, period: Duration) -> (u64, u64) {
    let period_ms = u64::try_from(period.as_millis()).unwrap_or(u64::MAX);
    (now.saturating_sub(period_ms), now.saturating_add(period_ms))
}
