//! In-process counting store: fixed windows under a per-key lock.
//!
//! Semantics:
//! - The per-key lock is taken before any shared state is read, closing the
//!   check-then-act race between concurrent requests for one key.
//! - First observation of a key (or an expired window) starts a fresh window
//!   of `period` with count 1 and admits.
//! - A live window increments; a post-increment count above `limit` denies.
//!   Later hits never extend the window.
//! - `limit == 0` denies without touching the map.
//!
//! Expired entries are replaced lazily on their next hit; one-shot keys are
//! reclaimed by [`InMemoryCounterStore::purge_expired`] or the periodic
//! sweeper.

use crate::clock::{Clock, MonotonicClock};
use crate::lock::KeyedLock;
use crate::store::CounterStore;
use async_trait::async_trait;
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, Copy)]
struct CounterEntry {
    expires_at_millis: u64,
    count: u64,
}

/// Single-process, time-windowed counter keyed by string.
#[derive(Debug)]
pub struct InMemoryCounterStore {
    entries: Mutex<HashMap<String, CounterEntry>>,
    locks: KeyedLock,
    clock: Arc<dyn Clock>,
}

impl Default for InMemoryCounterStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryCounterStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(MonotonicClock::default()))
    }

    /// Inject a clock; tests use [`crate::ManualClock`] to cross window
    /// boundaries without sleeping.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self { entries: Mutex::new(HashMap::new()), locks: KeyedLock::new(), clock }
    }

    /// Drop every entry whose window has ended.
    pub fn purge_expired(&self) {
        let now = self.clock.now_millis();
        self.entries.lock().unwrap().retain(|_, entry| entry.expires_at_millis > now);
    }

    /// Spawn a task purging expired entries every `interval`.
    pub fn spawn_sweeper(self: &Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                store.purge_expired();
            }
        })
    }

    /// Number of live counter entries (expired ones included until purged).
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().unwrap().is_empty()
    }
}

#[async_trait]
impl CounterStore for InMemoryCounterStore {
    type Error = Infallible;

    async fn check_and_record(
        &self,
        key: &str,
        period: Duration,
        limit: u32,
    ) -> Result<bool, Self::Error> {
        let _guard = self.locks.acquire(key).await;

        // Non-positive limit means "never allow".
        if limit == 0 {
            return Ok(false);
        }

        let now = self.clock.now_millis();
        let mut entries = self.entries.lock().unwrap();

        let admitted = match entries.get_mut(key) {
            Some(entry) if entry.expires_at_millis > now => {
                entry.count += 1;
                if entry.count > u64::from(limit) {
                    warn!(
                        target: "turnstile::memory",
                        key = %key,
                        count = entry.count,
                        limit,
                        "rate limit exceeded"
                    );
                    false
                } else {
                    true
                }
            }
            _ => {
                let period_millis = u64::try_from(period.as_millis()).unwrap_or(u64::MAX);
                entries.insert(
                    key.to_string(),
                    CounterEntry {
                        expires_at_millis: now.saturating_add(period_millis),
                        count: 1,
                    },
                );
                true
            }
        };

        Ok(admitted)
    }
}
