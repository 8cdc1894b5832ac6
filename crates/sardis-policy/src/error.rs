use thiserror::Error;

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("policy snapshot invalid: {0}")]
    InvalidSnapshot(String),

    #[error("goal-drift thresholds must be set explicitly (review < block)")]
    MissingDriftThresholds,

    #[error("evaluation context incomplete: {0}")]
    IncompleteContext(String),

    #[error("rule evaluation failed: {0}")]
    CheckFailed(String),
}
