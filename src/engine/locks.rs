use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

type LockMap = DashMap<Uuid, Arc<Mutex<()>>>;

/// One async mutex per resource. Holding the guard serializes the
/// validate-then-persist sequence for that resource within this process.
///
/// An entry lives only while someone holds or waits for it; the last guard
/// to drop removes it.
#[derive(Default)]
pub struct ResourceLocks {
    locks: Arc<LockMap>,
}

/// Held lock on one resource.
pub struct ResourceGuard {
    guard: Option<OwnedMutexGuard<()>>,
    locks: Arc<LockMap>,
    resource_id: Uuid,
}

impl ResourceLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, resource_id: Uuid) -> ResourceGuard {
        // Clone the Arc out so the DashMap shard is not held across the await.
        let mutex = self.locks.entry(resource_id).or_default().value().clone();
        let guard = mutex.lock_owned().await;
        ResourceGuard {
            guard: Some(guard),
            locks: self.locks.clone(),
            resource_id,
        }
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

impl Drop for ResourceGuard {
    fn drop(&mut self) {
        // Release the mutex first so its Arc no longer counts.
        self.guard.take();
        // Waiters hold a clone, so a count of 1 means only the map refers to it.
        // `remove_if` runs under the shard lock, the same lock `lock` clones under.
        self.locks
            .remove_if(&self.resource_id, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}
