//! Per-PR mutual exclusion

use crate::types::PullRequestRef;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// One async mutex per PR, so cycles for the same PR run one at a time while
/// different PRs proceed independently.
///
/// Idle entries (no holder, no waiter) are pruned on each acquisition.
#[derive(Debug, Default)]
pub struct KeyedLocks {
    inner: Mutex<HashMap<PullRequestRef, Arc<AsyncMutex<()>>>>,
}

impl KeyedLocks {
    /// Create an empty lock table
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `key`
    pub async fn lock(&self, key: &PullRequestRef) -> OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            // The map holds one reference; any other means a holder or waiter
            map.retain(|k, m| k == key || Arc::strong_count(m) > 1);
            Arc::clone(map.entry(key.clone()).or_default())
        };
        lock.lock_owned().await
    }

    /// Number of tracked keys
    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether no keys are tracked
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
