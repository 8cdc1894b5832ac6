use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("payment '{0}' not found")]
    PaymentNotFound(String),

    #[error("no policy snapshot for org '{0}'")]
    NoPolicySnapshot(String),

    #[error("hold '{0}' not found")]
    HoldNotFound(String),

    #[error("hold '{0}' is not active")]
    HoldNotActive(String),

    #[error("capture amount exceeds hold amount")]
    CaptureExceedsHold,

    #[error(transparent)]
    Idempotency(#[from] sardis_idempotency::IdempotencyError),

    #[error(transparent)]
    Ledger(#[from] sardis_ledger::LedgerError),

    #[error(transparent)]
    Approval(#[from] sardis_approvals::ApprovalError),

    #[error(transparent)]
    Adapter(#[from] sardis_adapters::AdapterError),

    #[error(transparent)]
    Lifecycle(#[from] sardis_lifecycle::LifecycleError),

    #[error(transparent)]
    Recon(#[from] sardis_recon::ReconError),

    #[error("type error: {0}")]
    Types(#[from] sardis_types::TypeError),

    #[error("serialization failed: {0}")]
    Serialization(String),
}
