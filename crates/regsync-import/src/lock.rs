//! Named locks serializing imports within one process.
//!
//! Every importer holding a clone of the same [`LockRegistry`] contends on the
//! same set of names. The lock is released when the [`LockGuard`] drops.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::OwnedMutexGuard;

use crate::error::{Result, SyncError};

#[derive(Clone, Default)]
pub struct LockRegistry {
    locks: Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>,
}

/// Proof of holding a named lock.
pub struct LockGuard {
    name: String,
    _held: OwnedMutexGuard<()>,
}

impl LockGuard {
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        tracing::debug!(lock = %self.name, "Lock released");
    }
}

impl LockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn handle(&self, name: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(name.to_string()).or_default())
    }

    /// Wait up to `timeout` for the lock called `name`.
    pub async fn acquire(&self, name: &str, timeout: Duration) -> Result<LockGuard> {
        let handle = self.handle(name);
        match tokio::time::timeout(timeout, handle.lock_owned()).await {
            Ok(held) => {
                tracing::debug!(lock = name, "Lock acquired");
                Ok(LockGuard {
                    name: name.to_string(),
                    _held: held,
                })
            }
            Err(_) => Err(SyncError::LockTimeout {
                name: name.to_string(),
                timeout_secs: timeout.as_secs(),
            }),
        }
    }
}
