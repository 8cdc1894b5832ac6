use crate::error::IdempotencyError;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Guard over one key; the key is serialized for as long as this lives.
pub struct KeyGuard {
    _guard: OwnedMutexGuard<()>,
    key: String,
}

impl KeyGuard {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl std::fmt::Debug for KeyGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyGuard").field("key", &self.key).finish()
    }
}

/// Single-flight lock registry keyed by opaque strings (payment ids, webhook
/// dedupe keys).
///
/// Acquisition is bounded: a holder that stalls cannot wedge other requests
/// forever, they time out and surface an error instead. Guards release on
/// every exit path by construction (RAII).
#[derive(Debug, Clone, Default)]
pub struct LockRegistry {
    locks: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl LockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(
        &self,
        key: impl Into<String>,
        timeout: Duration,
    ) -> Result<KeyGuard, IdempotencyError> {
        let key = key.into();
        let lock = {
            let mut locks = self.locks.lock().await;
            locks
                .entry(key.clone())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };

        let guard = tokio::time::timeout(timeout, lock.lock_owned())
            .await
            .map_err(|_| IdempotencyError::LockTimeout(key.clone()))?;

        Ok(KeyGuard { _guard: guard, key })
    }

    /// Drop lock slots nobody currently holds or waits on.
    pub async fn prune(&self) -> usize {
        let mut locks = self.locks.lock().await;
        let before = locks.len();
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        before - locks.len()
    }
}
