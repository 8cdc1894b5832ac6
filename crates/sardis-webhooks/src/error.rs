use thiserror::Error;

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("no webhook subscription for provider '{0}'")]
    UnknownProvider(String),

    #[error("signature header is malformed")]
    MalformedSignatureHeader,

    #[error("signature mismatch")]
    SignatureMismatch,

    #[error("timestamp outside tolerance window ({age_secs}s)")]
    StaleTimestamp { age_secs: i64 },

    #[error("webhook body malformed: {0}")]
    MalformedBody(String),

    #[error("unknown event type '{event_type}' for rail '{rail}'")]
    UnknownEventType { rail: String, event_type: String },

    #[error("event '{0}' replayed with a different body")]
    SuspiciousReplay(String),

    #[error("ingress lock busy for '{0}'")]
    LockBusy(String),

    #[error("admission window exhausted for provider '{0}'")]
    AdmissionExceeded(String),
}
