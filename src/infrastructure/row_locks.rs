use crate::domain::ids::{OrderId, PaymentId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as RowMutex, OwnedMutexGuard};

/// Identifies one lockable row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RowKey {
    Order(OrderId),
    Payment(PaymentId),
}

type Table = Arc<Mutex<HashMap<RowKey, Arc<RowMutex<()>>>>>;

/// Process-wide table of exclusive row locks.
///
/// Cloning shares the table. A lock is waited on asynchronously, so a blocked transaction does not
/// hold up the runtime. An entry lives only while some transaction holds or waits for its row.
#[derive(Default, Clone)]
pub struct RowLocks {
    rows: Table,
}

impl RowLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until the row is free and returns a guard that owns it.
    pub async fn acquire(&self, key: RowKey) -> RowGuard {
        let row = {
            let mut rows = self.rows.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(rows.entry(key).or_default())
        };
        let guard = row.lock_owned().await;
        RowGuard {
            rows: Arc::clone(&self.rows),
            key,
            guard: Some(guard),
        }
    }

    /// Number of rows currently held or waited on.
    pub fn len(&self) -> usize {
        self.rows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Exclusive hold on one row. Dropping it frees the row and forgets it once nobody else wants it.
pub struct RowGuard {
    rows: Table,
    key: RowKey,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for RowGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut rows = self.rows.lock().unwrap_or_else(PoisonError::into_inner);
        // Handles are only cloned under the table lock, so a count of one is the table's own.
        if rows
            .get(&self.key)
            .is_some_and(|row| Arc::strong_count(row) == 1)
        {
            rows.remove(&self.key);
        }
    }
}

/// The row locks owned by a single transaction. Dropping it releases every lock.
#[derive(Default)]
pub struct HeldLocks {
    guards: HashMap<RowKey, RowGuard>,
}

impl HeldLocks {
    /// Takes the lock on `key` unless this transaction already holds it.
    pub async fn ensure(&mut self, locks: &RowLocks, key: RowKey) {
        if !self.guards.contains_key(&key) {
            let guard = locks.acquire(key).await;
            self.guards.insert(key, guard);
        }
    }

    pub fn holds(&self, key: RowKey) -> bool {
        self.guards.contains_key(&key)
    }

    pub fn release_all(&mut self) {
        self.guards.clear();
    }
}
