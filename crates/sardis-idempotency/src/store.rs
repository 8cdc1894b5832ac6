use crate::error::IdempotencyError;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Lifecycle of one recorded operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdempotencyState {
    InFlight,
    Completed,
    Failed,
}

/// Remembered outcome for a `(scope, key)` pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdempotencyRecord {
    pub scope: String,
    pub key: String,
    pub state: IdempotencyState,
    /// Digest of the request body; a replay with a different digest is a
    /// conflict, not a replay.
    pub request_digest: String,
    pub result_digest: Option<String>,
    pub result: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// What `begin` observed for the key.
#[derive(Debug, Clone)]
pub enum BeginOutcome {
    /// First sighting; an in-flight record now exists and the caller owns the
    /// operation.
    Fresh,
    /// Another attempt with the same digest is still running.
    InFlight,
    /// A prior attempt finished; the stored record is the outcome to replay.
    Completed(IdempotencyRecord),
    /// A prior attempt failed terminally; retry requires a new key.
    Failed(IdempotencyRecord),
}

/// In-process idempotency store with TTL expiry.
///
/// Deployments without the persistent variant must opt in explicitly at
/// startup; in-flight keys never migrate between backends.
#[derive(Debug, Clone, Default)]
pub struct IdempotencyStore {
    records: Arc<Mutex<HashMap<(String, String), IdempotencyRecord>>>,
}

impl IdempotencyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn begin(
        &self,
        scope: &str,
        key: &str,
        request_digest: &str,
        ttl: Duration,
    ) -> Result<BeginOutcome, IdempotencyError> {
        let mut records = self.records.lock().await;
        let now = Utc::now();
        let map_key = (scope.to_string(), key.to_string());

        if let Some(existing) = records.get(&map_key) {
            if existing.expires_at > now {
                if existing.request_digest != request_digest {
                    return Err(IdempotencyError::DigestConflict {
                        scope: scope.to_string(),
                        key: key.to_string(),
                    });
                }
                return Ok(match existing.state {
                    IdempotencyState::InFlight => BeginOutcome::InFlight,
                    IdempotencyState::Completed => BeginOutcome::Completed(existing.clone()),
                    IdempotencyState::Failed => BeginOutcome::Failed(existing.clone()),
                });
            }
            debug!(scope, key, "expired idempotency record replaced");
        }

        records.insert(
            map_key,
            IdempotencyRecord {
                scope: scope.to_string(),
                key: key.to_string(),
                state: IdempotencyState::InFlight,
                request_digest: request_digest.to_string(),
                result_digest: None,
                result: None,
                created_at: now,
                expires_at: now + ttl,
            },
        );
        Ok(BeginOutcome::Fresh)
    }

    pub async fn complete(
        &self,
        scope: &str,
        key: &str,
        result_digest: String,
        result: Value,
    ) -> Result<(), IdempotencyError> {
        self.finish(scope, key, IdempotencyState::Completed, result_digest, result)
            .await
    }

    pub async fn fail(
        &self,
        scope: &str,
        key: &str,
        result_digest: String,
        result: Value,
    ) -> Result<(), IdempotencyError> {
        self.finish(scope, key, IdempotencyState::Failed, result_digest, result)
            .await
    }

    /// Drop the in-flight marker without recording an outcome, so a later
    /// attempt with the same key starts fresh. Used when an operation is
    /// parked rather than finished (e.g. awaiting approval).
    pub async fn release(&self, scope: &str, key: &str) {
        let mut records = self.records.lock().await;
        let map_key = (scope.to_string(), key.to_string());
        if matches!(
            records.get(&map_key).map(|r| r.state),
            Some(IdempotencyState::InFlight)
        ) {
            records.remove(&map_key);
        }
    }

    async fn finish(
        &self,
        scope: &str,
        key: &str,
        state: IdempotencyState,
        result_digest: String,
        result: Value,
    ) -> Result<(), IdempotencyError> {
        let mut records = self.records.lock().await;
        let map_key = (scope.to_string(), key.to_string());
        let record = records
            .get_mut(&map_key)
            .filter(|r| r.state == IdempotencyState::InFlight)
            .ok_or_else(|| IdempotencyError::NotInFlight {
                scope: scope.to_string(),
                key: key.to_string(),
            })?;
        record.state = state;
        record.result_digest = Some(result_digest);
        record.result = Some(result);
        Ok(())
    }

    /// Remove expired records; returns how many were dropped.
    pub async fn sweep_expired(&self) -> usize {
        let mut records = self.records.lock().await;
        let now = Utc::now();
        let before = records.len();
        records.retain(|_, record| record.expires_at > now);
        before - records.len()
    }

    pub async fn get(&self, scope: &str, key: &str) -> Option<IdempotencyRecord> {
        let records = self.records.lock().await;
        records.get(&(scope.to_string(), key.to_string())).cloned()
    }
}
