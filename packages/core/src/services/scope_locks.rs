//! Per-scope serialization
//!
//! Create and Move read coordinates, compute new ones and write them back.
//! Two of those sequences on the same scope must not interleave, while
//! sequences on different scopes never wait on each other. `ScopeLocks`
//! hands out one async mutex per scope and keeps it held until the guard
//! is dropped.

use crate::models::Scope;
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug)]
struct LockEntry {
    lock: Arc<Mutex<()>>,
    /// Tasks holding or waiting on `lock`
    users: usize,
}

type LockMap = Arc<StdMutex<HashMap<Scope, LockEntry>>>;

fn lock_map(locks: &LockMap) -> std::sync::MutexGuard<'_, HashMap<Scope, LockEntry>> {
    locks.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One task's claim on a scope entry, released on drop even if the wait
/// for the lock is cancelled
#[derive(Debug)]
struct Registration {
    locks: LockMap,
    scope: Scope,
}

impl Drop for Registration {
    fn drop(&mut self) {
        let mut locks = lock_map(&self.locks);
        if let Some(entry) = locks.get_mut(&self.scope) {
            entry.users -= 1;
            if entry.users == 0 {
                locks.remove(&self.scope);
            }
        }
    }
}

/// Held for the whole of one tree operation
///
/// Dropping the guard releases the scope; the last user of a scope also
/// removes its entry.
#[derive(Debug)]
pub struct ScopeGuard {
    _guard: OwnedMutexGuard<()>,
    _registration: Registration,
}

/// One async mutex per scope, created on first use
///
/// The map itself sits behind a std mutex that is never held across an
/// await, so entries can be released from `Drop`.
#[derive(Debug, Default)]
pub struct ScopeLocks {
    locks: LockMap,
}

impl ScopeLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until no other operation holds `scope`, then hold it
    pub async fn acquire(&self, scope: &Scope) -> ScopeGuard {
        let (lock, registration) = {
            let mut locks = lock_map(&self.locks);
            let entry = locks.entry(scope.clone()).or_insert_with(|| LockEntry {
                lock: Arc::default(),
                users: 0,
            });
            entry.users += 1;
            let registration = Registration {
                locks: self.locks.clone(),
                scope: scope.clone(),
            };
            (entry.lock.clone(), registration)
        };

        ScopeGuard {
            _guard: lock.lock_owned().await,
            _registration: registration,
        }
    }

    /// Number of scopes currently held or waited on
    pub fn len(&self) -> usize {
        lock_map(&self.locks).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_scope_waits() {
        let locks = Arc::new(ScopeLocks::new());
        let guard = locks.acquire(&Scope::keyed(1)).await;

        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire(&Scope::keyed(1)).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        contender.await.unwrap();
    }

    #[tokio::test]
    async fn test_different_scopes_do_not_block() {
        let locks = ScopeLocks::new();
        let _a = locks.acquire(&Scope::keyed(1)).await;

        let b = tokio::time::timeout(Duration::from_secs(1), locks.acquire(&Scope::keyed(2))).await;
        assert!(b.is_ok());

        let global =
            tokio::time::timeout(Duration::from_secs(1), locks.acquire(&Scope::Global)).await;
        assert!(global.is_ok());
    }

    #[tokio::test]
    async fn test_released_scopes_are_forgotten() {
        let locks = ScopeLocks::new();
        let held = locks.acquire(&Scope::keyed("a")).await;
        drop(locks.acquire(&Scope::keyed("b")).await);
        assert_eq!(locks.len(), 1);

        drop(held);
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_entry_survives_while_a_waiter_is_queued() {
        let locks = Arc::new(ScopeLocks::new());
        let first = locks.acquire(&Scope::keyed(1)).await;

        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire(&Scope::keyed(1)).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        // The waiter still references the lock, so it must stay in the map
        drop(first);
        assert_eq!(locks.len(), 1);

        waiter.await.unwrap();
        assert!(locks.is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_waiter_does_not_leak_entry() {
        let locks = Arc::new(ScopeLocks::new());
        let held = locks.acquire(&Scope::keyed(1)).await;

        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire(&Scope::keyed(1)).await;
                std::future::pending::<()>().await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        // Holder leaves first, then the queued waiter is cancelled
        drop(held);
        waiter.abort();
        assert!(waiter.await.unwrap_err().is_cancelled());
        assert!(locks.is_empty());
    }
}
