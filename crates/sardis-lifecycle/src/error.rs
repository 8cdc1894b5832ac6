use thiserror::Error;

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("event rail does not match payment rail")]
    RailMismatch,

    #[error("invalid transition from '{from}' on '{event}'")]
    InvalidTransition { from: String, event: String },

    #[error("amount invariant violated: {0}")]
    AmountInvariant(String),
}
