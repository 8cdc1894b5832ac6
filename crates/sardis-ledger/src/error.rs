use thiserror::Error;

/// Audit ledger failures.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger entry '{0}' not found")]
    EntryNotFound(String),

    #[error("ledger sequence gap for org '{org}': expected {expected}, found {found}")]
    SequenceGap {
        org: String,
        expected: u64,
        found: u64,
    },

    #[error("hash chain verification failed for org '{0}'")]
    ChainBroken(String),

    #[error("commit mismatch: {0}")]
    CommitMismatch(String),

    #[error("merkle batch '{0}' not found")]
    BatchNotFound(String),

    #[error("export cursor is malformed")]
    MalformedCursor,

    #[error("storage backend error: {0}")]
    Storage(String),

    #[error("audit spool write failed: {0}")]
    Spool(String),

    #[error("serialization failed: {0}")]
    Serialization(String),
}
