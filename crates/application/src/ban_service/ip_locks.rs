use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Table of per-address async locks.
///
/// Entries exist only while some task holds or waits for the lock, so the
/// table stays proportional to the number of addresses under evaluation.
#[derive(Debug, Default)]
pub(super) struct IpLockTable {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl IpLockTable {
    /// Waits for exclusive access to `key`.
    pub(super) async fn acquire(self: &Arc<Self>, key: &str) -> IpLockGuard {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(
                locks
                    .entry(key.to_owned())
                    .or_insert_with(|| Arc::new(AsyncMutex::new(()))),
            )
        };

        let guard = lock.lock_owned().await;

        IpLockGuard {
            table: Arc::clone(self),
            key: key.to_owned(),
            guard: Some(guard),
        }
    }

    #[cfg(test)]
    pub(super) fn len(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Exclusive access to one address. Released on drop.
pub(super) struct IpLockGuard {
    table: Arc<IpLockTable>,
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for IpLockGuard {
    fn drop(&mut self) {
        let mut locks = self
            .table
            .locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        // The table's own handle plus ours: nobody else is waiting.
        let idle = locks
            .get(self.key.as_str())
            .is_some_and(|lock| Arc::strong_count(lock) == 2);

        self.guard = None;
        if idle {
            locks.remove(self.key.as_str());
        }
    }
}
