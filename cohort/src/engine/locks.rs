//! Per-category async locks.
//!
//! Serializes read-modify-write sequences on one category inside one engine
//! instance. Writers in other processes are caught by version tokens instead.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::model::CategoryId;

#[derive(Default)]
pub struct CategoryLocks {
    locks: DashMap<CategoryId, Arc<Mutex<()>>>,
}

impl CategoryLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `category_id`.
    pub async fn acquire(&self, category_id: &str) -> OwnedMutexGuard<()> {
        // The map entry guard must be released before awaiting.
        let lock = self
            .locks
            .entry(category_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }

    /// Drop the lock entry of a deleted category.
    pub fn forget(&self, category_id: &str) {
        self.locks.remove(category_id);
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
