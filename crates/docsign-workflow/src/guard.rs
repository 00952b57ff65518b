//! Per-collection update serialization
//!
//! Status writes for one collection go through a keyed async mutex, so a
//! signer callback and an outbound dispatch never interleave their
//! read-modify-write cycles. Different collections never contend.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

#[derive(Default)]
pub struct DocumentUpdateGuard {
    locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl DocumentUpdateGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until no one else holds `collection_id`
    pub async fn lock(&self, collection_id: Uuid) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            // Entries nobody is holding or waiting on can go
            locks.retain(|_, l| Arc::strong_count(l) > 1);
            locks
                .entry(collection_id)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    /// Keys currently held or awaited
    pub async fn active(&self) -> usize {
        let locks = self.locks.lock().await;
        locks.values().filter(|l| Arc::strong_count(l) > 1).count()
    }
}
