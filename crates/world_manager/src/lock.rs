//! Mutual exclusion for mutations of the worlds root
//!
//! Lock order: the pointer lock is always taken before any world lock.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard, OwnedMutexGuard};

/// A global lock serialising pointer changes plus one lock per world id.
#[derive(Debug, Default)]
pub struct WorldLocks {
    pointer: Mutex<()>,
    worlds: DashMap<String, Arc<Mutex<()>>>,
}

impl WorldLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serialises everything that reads-then-changes the active pointer.
    pub async fn pointer(&self) -> MutexGuard<'_, ()> {
        self.pointer.lock().await
    }

    /// Serialises mutations of a single world directory.
    pub async fn world(&self, world_id: &str) -> WorldGuard<'_> {
        let lock = self
            .worlds
            .entry(world_id.to_string())
            .or_default()
            .clone();
        let guard = lock.lock_owned().await;
        WorldGuard {
            locks: self,
            world_id: world_id.to_string(),
            guard: Some(guard),
        }
    }

    /// Number of world ids with a lock currently held or awaited.
    pub fn tracked_worlds(&self) -> usize {
        self.worlds.len()
    }
}

/// Held lock on one world. Dropping it forgets the id's mutex once nobody
/// else holds or waits for it.
#[derive(Debug)]
pub struct WorldGuard<'a> {
    locks: &'a WorldLocks,
    world_id: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for WorldGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();
        // Waiters hold a clone of the Arc, so a count of one means only the map does.
        self.locks
            .worlds
            .remove_if(&self.world_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_same_world_is_exclusive() {
        let locks = WorldLocks::new();
        let _held = locks.world("main").await;

        let second = timeout(Duration::from_millis(50), locks.world("main")).await;
        assert!(second.is_err(), "second lock on the same id should wait");
    }

    #[tokio::test]
    async fn test_different_worlds_do_not_block() {
        let locks = WorldLocks::new();
        let _main = locks.world("main").await;

        let other = timeout(Duration::from_millis(50), locks.world("lobby")).await;
        assert!(other.is_ok());
    }

    #[tokio::test]
    async fn test_world_lock_released_on_drop() {
        let locks = WorldLocks::new();
        drop(locks.world("main").await);

        let again = timeout(Duration::from_millis(50), locks.world("main")).await;
        assert!(again.is_ok());
    }

    #[tokio::test]
    async fn test_released_ids_are_forgotten() {
        let locks = WorldLocks::new();
        for id in ["a", "b", "c"] {
            drop(locks.world(id).await);
        }
        assert_eq!(locks.tracked_worlds(), 0);

        let held = locks.world("main").await;
        assert_eq!(locks.tracked_worlds(), 1);
        drop(held);
        assert_eq!(locks.tracked_worlds(), 0);
    }

    #[tokio::test]
    async fn test_waiter_keeps_entry_alive() {
        let locks = Arc::new(WorldLocks::new());
        let held = locks.world("main").await;

        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.world("main").await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        drop(held);
        assert_eq!(locks.tracked_worlds(), 1, "the waiter still needs the mutex");

        waiter.await.unwrap();
        assert_eq!(locks.tracked_worlds(), 0);
    }
}
