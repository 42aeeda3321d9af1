//! Per-key asynchronous mutual exclusion.
//!
//! A concurrent map from key to a reference-counted lock slot. Holding the
//! guard serializes all check-and-increment sequences for one key; distinct
//! keys never contend. Slots are evicted once their waiter count returns to
//! zero so one-shot keys do not grow the table without bound. Eviction
//! re-checks the count under the table lock: a waiter arriving between "count
//! became zero" and "entry removed" keeps the slot alive.
//!
//! Invariants:
//! - A slot's waiter count includes the current holder.
//! - Waiter counts are only mutated while the slot is reachable from the
//!   table (increments happen under the table lock).
//! - The guard releases the key mutex before attempting eviction.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

#[derive(Debug)]
struct LockSlot {
    mutex: Arc<AsyncMutex<()>>,
    waiters: AtomicUsize,
}

/// Table of per-key async locks with automatic slot reclamation.
#[derive(Debug, Default)]
pub struct KeyedLock {
    slots: StdMutex<HashMap<String, Arc<LockSlot>>>,
}

impl KeyedLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `key`. The returned guard releases the
    /// key unconditionally on drop, including on panic unwind.
    pub async fn acquire(&self, key: &str) -> KeyedLockGuard<'_> {
        let slot = {
            let mut slots = self.slots.lock().unwrap();
            let slot = slots.entry(key.to_string()).or_insert_with(|| {
                Arc::new(LockSlot {
                    mutex: Arc::new(AsyncMutex::new(())),
                    waiters: AtomicUsize::new(0),
                })
            });
            slot.waiters.fetch_add(1, Ordering::SeqCst);
            Arc::clone(slot)
        };

        let held = Arc::clone(&slot.mutex).lock_owned().await;

        KeyedLockGuard { table: self, key: key.to_string(), slot, held: Some(held) }
    }

    /// Number of live slots; used to verify reclamation.
    pub fn slot_count(&self) -> usize {
        self.slots.lock().unwrap().len()
    }
}

/// Exclusive access to one key. Dropping releases the key and reclaims the
/// slot when no other waiter remains.
#[derive(Debug)]
pub struct KeyedLockGuard<'a> {
    table: &'a KeyedLock,
    key: String,
    slot: Arc<LockSlot>,
    held: Option<OwnedMutexGuard<()>>,
}

impl Drop for KeyedLockGuard<'_> {
    fn drop(&mut self) {
        // Release the key before touching the table so the next waiter is
        // never blocked on eviction bookkeeping.
        drop(self.held.take());

        if self.slot.waiters.fetch_sub(1, Ordering::SeqCst) == 1 {
            let mut slots = self.table.slots.lock().unwrap();
            if let Some(current) = slots.get(&self.key) {
                // A new waiter may have registered since the decrement;
                // removal only proceeds for our slot at zero waiters.
                if Arc::ptr_eq(current, &self.slot)
                    && current.waiters.load(Ordering::SeqCst) == 0
                {
                    slots.remove(&self.key);
                }
            }
        }
    }
}
