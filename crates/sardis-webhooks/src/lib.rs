//! Webhook ingress for provider callbacks.
//!
//! Every delivery is authenticated (HMAC-SHA256 over `"<unix>.<raw_body>"`
//! with a bounded timestamp window), deduplicated on
//! `(provider, provider_event_id)` with a body-hash replay defense, and
//! normalized into a tagged rail event before it reaches a state machine.
//! Processing is single-flight per dedupe key; redelivery after a crash is
//! safe because lifecycle transitions are idempotent.

#![deny(unsafe_code)]

pub mod dedupe;
pub mod error;
pub mod ingress;
pub mod normalize;
pub mod signature;

pub use dedupe::{AdmitOutcome, DedupeStore, EventState, WebhookEventRecord};
pub use error::WebhookError;
pub use ingress::{IngressOutcome, RotationRecord, WebhookIngress};
pub use normalize::NormalizedEvent;
pub use signature::{SignatureVerifier, SubscriptionSecrets, SIGNATURE_TOLERANCE_SECS};
