//! Keyed async mutual exclusion

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::OwnedMutexGuard;

/// One key's lock plus everyone holding or waiting for it
struct Slot {
    mutex: Arc<tokio::sync::Mutex<()>>,
    users: usize,
}

type Slots<K> = Arc<Mutex<HashMap<K, Slot>>>;

/// Serializes async operations by key without keeping a lock per key forever.
///
/// Holders of the same key run one at a time, in arrival order; different
/// keys never wait on each other. A key's slot is dropped as soon as its last
/// holder releases with nobody else waiting.
///
/// Cancel-safe: a waiter dropped before it gets the lock gives up its claim
/// on the slot. Not meant for use across runtimes.
pub struct AsyncExclusive<K> {
    slots: Slots<K>,
}

impl<K: Eq + Hash + Clone> AsyncExclusive<K> {
    pub fn new() -> Self {
        Self { slots: Arc::new(Mutex::new(HashMap::new())) }
    }

    /// Wait for exclusive access to `key`; released when the guard drops
    pub async fn lock(&self, key: K) -> ExclusiveGuard<K> {
        let mutex = {
            let mut slots = lock_slots(&self.slots);
            let slot = slots.entry(key.clone()).or_insert_with(|| Slot {
                mutex: Arc::default(),
                users: 0,
            });
            slot.users += 1;
            Arc::clone(&slot.mutex)
        };

        // Claimed from here on, even if the wait below is cancelled.
        let mut claim = ExclusiveGuard {
            slots: Arc::clone(&self.slots),
            key,
            guard: None,
        };
        claim.guard = Some(mutex.lock_owned().await);
        claim
    }

    /// True while anyone holds or waits for `key`
    pub fn is_locked(&self, key: &K) -> bool {
        lock_slots(&self.slots).get(key).is_some_and(|slot| slot.users > 0)
    }

    /// Number of keys with a live slot
    pub fn active_keys(&self) -> usize {
        lock_slots(&self.slots).len()
    }
}

impl<K: Eq + Hash + Clone> Default for AsyncExclusive<K> {
    fn default() -> Self {
        Self::new()
    }
}

/// Exclusive access to one key of an `AsyncExclusive`
pub struct ExclusiveGuard<K: Eq + Hash> {
    slots: Slots<K>,
    key: K,
    guard: Option<OwnedMutexGuard<()>>,
}

impl<K: Eq + Hash> Drop for ExclusiveGuard<K> {
    fn drop(&mut self) {
        let mut slots = lock_slots(&self.slots);
        self.guard.take();

        if let Some(slot) = slots.get_mut(&self.key) {
            slot.users = slot.users.saturating_sub(1);
            if slot.users == 0 {
                slots.remove(&self.key);
            }
        }
    }
}

fn lock_slots<K>(slots: &Mutex<HashMap<K, Slot>>) -> MutexGuard<'_, HashMap<K, Slot>> {
    slots.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::time::Duration;

    #[tokio::test]
    async fn test_exclusive_running() {
        let exclusive = AsyncExclusive::new();
        let running = Mutex::new(HashSet::new());

        let use_exclusive = |id: u32, fail: bool| {
            let exclusive = &exclusive;
            let running = &running;
            async move {
                let _guard = exclusive.lock(id).await;
                assert!(running.lock().unwrap().insert(id), "{} entered twice", id);
                tokio::time::sleep(Duration::from_millis(20)).await;
                running.lock().unwrap().remove(&id);
                if fail {
                    Err(format!("failed {}", id))
                } else {
                    Ok(id)
                }
            }
        };

        let results = tokio::join!(
            use_exclusive(0, false),
            use_exclusive(1, true),
            use_exclusive(0, true),
            use_exclusive(1, false),
        );

        assert_eq!(results.0, Ok(0));
        assert_eq!(results.1, Err("failed 1".to_string()));
        assert_eq!(results.2, Err("failed 0".to_string()));
        assert_eq!(results.3, Ok(1));
        assert_eq!(exclusive.active_keys(), 0);
    }

    #[tokio::test]
    async fn test_is_locked_tracks_holders() {
        let exclusive = AsyncExclusive::new();
        assert!(!exclusive.is_locked(&"a"));

        let guard = exclusive.lock("a").await;
        assert!(exclusive.is_locked(&"a"));
        assert!(!exclusive.is_locked(&"b"));

        drop(guard);
        assert!(!exclusive.is_locked(&"a"));
        assert_eq!(exclusive.active_keys(), 0);
    }

    #[tokio::test]
    async fn test_waiters_run_in_order() {
        let exclusive = Arc::new(AsyncExclusive::new());
        let order = Arc::new(Mutex::new(Vec::new()));

        let first = exclusive.lock(7u64).await;
        let mut handles = Vec::new();
        for i in 0..3 {
            let exclusive = Arc::clone(&exclusive);
            let order = Arc::clone(&order);
            handles.push(tokio::spawn(async move {
                let _guard = exclusive.lock(7).await;
                order.lock().unwrap().push(i);
            }));
            // Let each task queue up before spawning the next.
            tokio::task::yield_now().await;
        }

        assert!(order.lock().unwrap().is_empty());
        drop(first);
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
        assert_eq!(exclusive.active_keys(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_waiter_releases_slot() {
        let exclusive = AsyncExclusive::new();
        let held = exclusive.lock(1u64).await;

        let waited = tokio::time::timeout(Duration::from_millis(10), exclusive.lock(1)).await;
        assert!(waited.is_err());
        assert!(exclusive.is_locked(&1));

        drop(held);
        assert!(!exclusive.is_locked(&1));
        assert_eq!(exclusive.active_keys(), 0);

        // Same again, with the waiter abandoned after the holder is gone.
        let held = exclusive.lock(2u64).await;
        let mut waiter = Box::pin(exclusive.lock(2));
        let acquired = tokio::select! {
            biased;
            _ = &mut waiter => true,
            _ = std::future::ready(()) => false,
        };
        assert!(!acquired);
        drop(held);
        drop(waiter);
        assert_eq!(exclusive.active_keys(), 0);
    }
}
