use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconError {
    #[error("journey for payment '{0}' not found")]
    JourneyNotFound(String),

    #[error("terminal observation for payment '{0}' carries no ledger entry")]
    MissingLedgerAnchor(String),

    #[error("journey rail mismatch for payment '{0}'")]
    RailMismatch(String),
}
