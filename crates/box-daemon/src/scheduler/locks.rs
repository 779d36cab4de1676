//! Per-key mutual exclusion for reconcile passes

use box_types::ObjectKey;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// One async mutex per parent key.
///
/// Passes for the same key run one at a time; passes for different keys
/// never wait on each other.
#[derive(Debug, Default)]
pub struct KeyLocks {
    locks: Mutex<HashMap<ObjectKey, Arc<Mutex<()>>>>,
}

impl KeyLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until no other pass holds `key`
    pub async fn acquire(&self, key: &ObjectKey) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks.entry(key.clone()).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// Drop the entry for `key` unless someone is holding or waiting on it
    pub async fn prune(&self, key: &ObjectKey) {
        let mut locks = self.locks.lock().await;
        if locks
            .get(key)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(key);
        }
    }

    pub async fn len(&self) -> usize {
        self.locks.lock().await.len()
    }
}
