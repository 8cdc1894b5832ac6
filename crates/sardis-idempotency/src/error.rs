use thiserror::Error;

#[derive(Debug, Error)]
pub enum IdempotencyError {
    #[error("idempotency key '{key}' in scope '{scope}' reused with a different request digest")]
    DigestConflict { scope: String, key: String },

    #[error("no in-flight record for key '{key}' in scope '{scope}'")]
    NotInFlight { scope: String, key: String },

    #[error("lock acquisition for '{0}' timed out")]
    LockTimeout(String),
}
