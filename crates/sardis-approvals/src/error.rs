use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApprovalError {
    #[error("approval '{0}' not found")]
    NotFound(String),

    #[error("approval '{0}' is no longer pending")]
    NotPending(String),

    #[error("reviewer '{0}' has already voted")]
    DuplicateReviewer(String),

    #[error("sensitive action '{action}' requires at least two reviewers, got {got}")]
    QuorumTooSmall { action: String, got: u8 },

    #[error("min_reviewers must be at least 1")]
    ZeroQuorum,

    #[error("trust relation between '{0}' and '{1}' already exists")]
    TrustExists(String, String),

    #[error("approval '{approval}' does not authorize action '{action}'")]
    WrongApproval { approval: String, action: String },

    #[error("ledger error: {0}")]
    Ledger(#[from] sardis_ledger::LedgerError),
}
