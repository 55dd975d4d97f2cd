//! Per-record write serialization.
//!
//! Every read-modify-write of a stored record takes the mutex for its key
//! first, so two requests touching the same quote or lead run one after the
//! other.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

const PRUNE_THRESHOLD: usize = 1024;

#[derive(Default)]
pub struct RecordLocks {
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

/// Held for the duration of one serialized update.
pub struct RecordGuard {
    key: String,
    _guard: OwnedMutexGuard<()>,
}

impl RecordGuard {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl RecordLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_key(collection: &str, id: &str) -> String {
        format!("{}:{}", collection, id)
    }

    pub async fn lock(&self, key: impl Into<String>) -> RecordGuard {
        let key = key.into();
        let mutex = {
            let mut locks = self.locks.lock();
            if locks.len() > PRUNE_THRESHOLD {
                // Only the map holds an idle mutex.
                locks.retain(|_, m| Arc::strong_count(m) > 1);
            }
            locks
                .entry(key.clone())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };

        let guard = mutex.lock_owned().await;
        log::trace!("Acquired record lock {}", key);
        RecordGuard { key, _guard: guard }
    }

    pub fn len(&self) -> usize {
        self.locks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
