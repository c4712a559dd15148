//! Per-slot and per-player serialization of allocation writes.
//!
//! Keys are always taken in one global order (every slot key before every
//! player key, each group sorted), which keeps acquisition deadlock-free even
//! when an operation takes a second batch of keys later. Waiting is bounded;
//! running out of time is reported as retryable contention.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::application::error::AllocationError;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LockKey {
    Slot(String),
    Player(String),
}

pub struct LockManager {
    locks: Mutex<HashMap<LockKey, Arc<AsyncMutex<()>>>>,
    timeout: Duration,
}

/// Held locks; released on drop
#[must_use]
pub struct LockSet {
    guards: Vec<OwnedMutexGuard<()>>,
}

impl LockSet {
    pub fn merge(&mut self, other: LockSet) {
        self.guards.extend(other.guards);
    }

    pub fn len(&self) -> usize {
        self.guards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.guards.is_empty()
    }
}

impl LockManager {
    pub fn new(timeout: Duration) -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
            timeout,
        }
    }

    /// Acquire every key, waiting at most the configured timeout overall
    pub async fn acquire(
        &self,
        keys: impl IntoIterator<Item = LockKey>,
    ) -> Result<LockSet, AllocationError> {
        let mut keys: Vec<LockKey> = keys.into_iter().collect();
        keys.sort();
        keys.dedup();

        let mutexes: Vec<Arc<AsyncMutex<()>>> = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            // Forget keys nobody holds or waits on
            locks.retain(|_, m| Arc::strong_count(m) > 1);
            keys.iter()
                .map(|key| locks.entry(key.clone()).or_default().clone())
                .collect()
        };

        let deadline = tokio::time::Instant::now() + self.timeout;
        let mut guards = Vec::with_capacity(mutexes.len());
        for (key, mutex) in keys.iter().zip(mutexes) {
            match tokio::time::timeout_at(deadline, mutex.lock_owned()).await {
                Ok(guard) => guards.push(guard),
                Err(_) => {
                    return Err(AllocationError::busy(format!(
                        "timed out waiting for lock on {:?}",
                        key
                    )))
                }
            }
        }

        Ok(LockSet { guards })
    }
}
