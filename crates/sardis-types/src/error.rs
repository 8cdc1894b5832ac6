use thiserror::Error;

/// Errors produced by the primitive layer.
#[derive(Debug, Error)]
pub enum TypeError {
    #[error("identifier '{value}' does not carry expected prefix '{prefix}_'")]
    InvalidIdPrefix { prefix: &'static str, value: String },

    #[error("identifier '{0}' is malformed")]
    MalformedId(String),

    #[error("currency code '{0}' is not a three-letter ISO 4217 code")]
    InvalidCurrency(String),

    #[error("currency mismatch: {left} vs {right}")]
    CurrencyMismatch { left: String, right: String },

    #[error("amount arithmetic overflow")]
    AmountOverflow,

    #[error("amount must be non-negative, got {0}")]
    NegativeAmount(i64),

    #[error("unknown rail '{0}'")]
    UnknownRail(String),

    #[error("serialization failed: {0}")]
    Serialization(String),
}
