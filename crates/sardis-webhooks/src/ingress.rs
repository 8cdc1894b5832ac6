use crate::dedupe::{AdmitOutcome, DedupeStore, EventState};
use crate::error::WebhookError;
use crate::normalize::{decode_body, NormalizedEvent};
use crate::signature::{SignatureVerifier, SubscriptionSecrets};
use chrono::{DateTime, Utc};
use sardis_idempotency::{KeyGuard, LockRegistry};
use sardis_observability::MetricsRegistry;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{info, warn};

const LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Default per-provider admission ceiling per minute.
const DEFAULT_ADMISSION_PER_MINUTE: u32 = 600;

/// Secret rotation receipt; the service layer appends it to the audit
/// ledger as `webhook.secret_rotated`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RotationRecord {
    pub provider: String,
    pub rotated_at: DateTime<Utc>,
    pub previous_revoked: bool,
}

/// Outcome of ingesting one delivery.
#[derive(Debug)]
pub enum IngressOutcome {
    /// Apply `normalized` to the state machine, then call `mark_processed`.
    /// The guard serializes the dedupe key until the caller is done.
    Admitted {
        normalized: NormalizedEvent,
        /// True when this is a crash replay of a persisted-but-unmarked
        /// event; transitions are idempotent so applying again is safe.
        replay: bool,
        guard: KeyGuard,
    },
    /// Already fully processed; acknowledge with 2xx and change nothing.
    DuplicateSuppressed,
    /// Same event id with a substituted body; recorded, never applied.
    Suspicious {
        external_id: String,
        payment_id: sardis_types::PaymentId,
    },
}

/// Webhook ingress pipeline: authenticate, admit, dedupe, decode, hand off.
pub struct WebhookIngress {
    verifier: SignatureVerifier,
    subscriptions: Arc<Mutex<HashMap<String, SubscriptionSecrets>>>,
    dedupe: DedupeStore,
    locks: LockRegistry,
    metrics: MetricsRegistry,
    admission_per_minute: u32,
    admissions: Arc<Mutex<HashMap<String, Vec<DateTime<Utc>>>>>,
}

impl WebhookIngress {
    pub fn new(metrics: MetricsRegistry) -> Self {
        Self::with_admission_limit(metrics, DEFAULT_ADMISSION_PER_MINUTE)
    }

    pub fn with_admission_limit(metrics: MetricsRegistry, admission_per_minute: u32) -> Self {
        Self {
            verifier: SignatureVerifier::default(),
            subscriptions: Arc::new(Mutex::new(HashMap::new())),
            dedupe: DedupeStore::new(),
            locks: LockRegistry::new(),
            metrics,
            admission_per_minute,
            admissions: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Per-provider sliding-window admission, applied before signature work
    /// so a flooding provider cannot monopolize HMAC verification.
    async fn admit_provider(&self, provider: &str, now: DateTime<Utc>) -> bool {
        let mut admissions = self.admissions.lock().await;
        let window = admissions.entry(provider.to_string()).or_default();
        let horizon = now - chrono::Duration::minutes(1);
        window.retain(|ts| *ts > horizon);
        if window.len() as u32 >= self.admission_per_minute {
            return false;
        }
        window.push(now);
        true
    }

    pub async fn subscribe(&self, provider: &str, secret: &str) {
        let mut subscriptions = self.subscriptions.lock().await;
        subscriptions.insert(provider.to_string(), SubscriptionSecrets::new(secret));
    }

    /// Begin a rotation overlap window for a provider subscription.
    pub async fn rotate_secret(
        &self,
        provider: &str,
        new_secret: &str,
    ) -> Result<RotationRecord, WebhookError> {
        let mut subscriptions = self.subscriptions.lock().await;
        let secrets = subscriptions
            .get_mut(provider)
            .ok_or_else(|| WebhookError::UnknownProvider(provider.to_string()))?;
        secrets.rotate(new_secret);
        info!(provider, "webhook secret rotated; overlap window open");
        Ok(RotationRecord {
            provider: provider.to_string(),
            rotated_at: Utc::now(),
            previous_revoked: false,
        })
    }

    /// Close the overlap window, revoking the previous secret.
    pub async fn revoke_previous_secret(
        &self,
        provider: &str,
    ) -> Result<RotationRecord, WebhookError> {
        let mut subscriptions = self.subscriptions.lock().await;
        let secrets = subscriptions
            .get_mut(provider)
            .ok_or_else(|| WebhookError::UnknownProvider(provider.to_string()))?;
        let previous_revoked = secrets.revoke_previous();
        Ok(RotationRecord {
            provider: provider.to_string(),
            rotated_at: Utc::now(),
            previous_revoked,
        })
    }

    /// Authenticate and admit one delivery.
    pub async fn ingest(
        &self,
        provider: &str,
        signature_header: &str,
        raw_body: &[u8],
        now: DateTime<Utc>,
    ) -> Result<IngressOutcome, WebhookError> {
        if !self.admit_provider(provider, now).await {
            self.metrics.incr("webhook.admission_rejected");
            return Err(WebhookError::AdmissionExceeded(provider.to_string()));
        }

        {
            let subscriptions = self.subscriptions.lock().await;
            let secrets = subscriptions
                .get(provider)
                .ok_or_else(|| WebhookError::UnknownProvider(provider.to_string()))?;
            self.verifier
                .verify(secrets, signature_header, raw_body, now)?;
        }

        let (external_id, payment_id, event) = decode_body(raw_body)?;
        let body_hash = blake3::hash(raw_body).to_hex().to_string();

        let guard = self
            .locks
            .acquire(format!("{provider}:{external_id}"), LOCK_TIMEOUT)
            .await
            .map_err(|_| WebhookError::LockBusy(external_id.clone()))?;

        match self.dedupe.admit(provider, &external_id, &body_hash) {
            AdmitOutcome::Fresh(record) => Ok(IngressOutcome::Admitted {
                normalized: NormalizedEvent {
                    event_id: record.event_id,
                    provider: provider.to_string(),
                    external_id,
                    payment_id,
                    event,
                    received_at: record.received_at,
                },
                replay: false,
                guard,
            }),
            AdmitOutcome::Duplicate(record) => {
                if record.state == EventState::New {
                    // Persisted but never marked processed: a crash replay.
                    warn!(provider, external_id, "replaying unfinished webhook event");
                    return Ok(IngressOutcome::Admitted {
                        normalized: NormalizedEvent {
                            event_id: record.event_id,
                            provider: provider.to_string(),
                            external_id,
                            payment_id,
                            event,
                            received_at: record.received_at,
                        },
                        replay: true,
                        guard,
                    });
                }
                self.metrics.incr("webhook.duplicate_suppressed");
                Ok(IngressOutcome::DuplicateSuppressed)
            }
            AdmitOutcome::Suspicious(record) => {
                self.metrics.incr("webhook.suspicious");
                warn!(
                    provider,
                    external_id = record.external_id,
                    "webhook replay with substituted body"
                );
                Ok(IngressOutcome::Suspicious {
                    external_id: record.external_id,
                    payment_id,
                })
            }
        }
    }

    pub fn mark_processed(&self, provider: &str, external_id: &str) -> bool {
        self.dedupe.mark_processed(provider, external_id)
    }

    pub fn event_record(
        &self,
        provider: &str,
        external_id: &str,
    ) -> Option<crate::dedupe::WebhookEventRecord> {
        self.dedupe.get(provider, external_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::sign;
    use sardis_lifecycle::{AchEvent, RailEvent};

    fn body(event_id: &str, event_type: &str) -> Vec<u8> {
        format!(
            r#"{{"event_id":"{event_id}","payment_id":"pay_abc123","rail":"ach","type":"{event_type}"}}"#
        )
        .into_bytes()
    }

    async fn ingress() -> WebhookIngress {
        let ingress = WebhookIngress::new(MetricsRegistry::new());
        ingress.subscribe("issuer", "whsec_test").await;
        ingress
    }

    #[tokio::test]
    async fn fresh_event_is_admitted_and_marked() {
        let ingress = ingress().await;
        let now = Utc::now();
        let raw = body("ev-1", "SETTLED");
        let header = sign("whsec_test", &raw, now);

        match ingress.ingest("issuer", &header, &raw, now).await.unwrap() {
            IngressOutcome::Admitted {
                normalized,
                replay,
                guard,
            } => {
                assert!(!replay);
                assert_eq!(normalized.event, RailEvent::Ach(AchEvent::Settled));
                drop(guard);
                assert!(ingress.mark_processed("issuer", "ev-1"));
            }
            other => panic!("expected admitted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn duplicate_after_processing_is_suppressed() {
        let ingress = ingress().await;
        let now = Utc::now();
        let raw = body("ev-1", "SETTLED");
        let header = sign("whsec_test", &raw, now);

        if let IngressOutcome::Admitted { guard, .. } =
            ingress.ingest("issuer", &header, &raw, now).await.unwrap()
        {
            drop(guard);
            ingress.mark_processed("issuer", "ev-1");
        }

        let outcome = ingress.ingest("issuer", &header, &raw, now).await.unwrap();
        assert!(matches!(outcome, IngressOutcome::DuplicateSuppressed));
    }

    #[tokio::test]
    async fn crash_replay_is_readmitted() {
        let ingress = ingress().await;
        let now = Utc::now();
        let raw = body("ev-1", "SETTLED");
        let header = sign("whsec_test", &raw, now);

        if let IngressOutcome::Admitted { guard, .. } =
            ingress.ingest("issuer", &header, &raw, now).await.unwrap()
        {
            // Crash: guard dropped without mark_processed.
            drop(guard);
        }

        match ingress.ingest("issuer", &header, &raw, now).await.unwrap() {
            IngressOutcome::Admitted { replay, guard, .. } => {
                assert!(replay);
                drop(guard);
            }
            other => panic!("expected replay admission, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn substituted_body_is_suspicious() {
        let ingress = ingress().await;
        let now = Utc::now();
        let raw = body("ev-1", "SETTLED");
        let header = sign("whsec_test", &raw, now);
        if let IngressOutcome::Admitted { guard, .. } =
            ingress.ingest("issuer", &header, &raw, now).await.unwrap()
        {
            drop(guard);
            ingress.mark_processed("issuer", "ev-1");
        }

        // Same event id, different (validly signed) body.
        let forged = body("ev-1", "RELEASED");
        let forged_header = sign("whsec_test", &forged, now);
        match ingress
            .ingest("issuer", &forged_header, &forged, now)
            .await
            .unwrap()
        {
            IngressOutcome::Suspicious { external_id, .. } => assert_eq!(external_id, "ev-1"),
            other => panic!("expected suspicious, got {other:?}"),
        }

        let record = ingress.event_record("issuer", "ev-1").unwrap();
        assert_eq!(record.state, EventState::Suspicious);
    }

    #[tokio::test]
    async fn bad_signature_is_rejected_before_dedupe() {
        let ingress = ingress().await;
        let now = Utc::now();
        let raw = body("ev-1", "SETTLED");
        let header = sign("whsec_wrong", &raw, now);

        assert!(matches!(
            ingress.ingest("issuer", &header, &raw, now).await,
            Err(WebhookError::SignatureMismatch)
        ));
        assert!(ingress.event_record("issuer", "ev-1").is_none());
    }

    #[tokio::test]
    async fn unknown_provider_is_rejected() {
        let ingress = ingress().await;
        let now = Utc::now();
        let raw = body("ev-1", "SETTLED");
        let header = sign("whsec_test", &raw, now);
        assert!(matches!(
            ingress.ingest("acquirer", &header, &raw, now).await,
            Err(WebhookError::UnknownProvider(_))
        ));
    }

    #[tokio::test]
    async fn admission_control_caps_a_flooding_provider() {
        let ingress = WebhookIngress::with_admission_limit(MetricsRegistry::new(), 2);
        ingress.subscribe("issuer", "whsec_test").await;
        let now = Utc::now();

        for n in 0..2 {
            let raw = body(&format!("ev-{n}"), "SETTLED");
            let header = sign("whsec_test", &raw, now);
            assert!(ingress.ingest("issuer", &header, &raw, now).await.is_ok());
        }

        let raw = body("ev-flood", "SETTLED");
        let header = sign("whsec_test", &raw, now);
        assert!(matches!(
            ingress.ingest("issuer", &header, &raw, now).await,
            Err(WebhookError::AdmissionExceeded(_))
        ));
    }

    #[tokio::test]
    async fn rotation_keeps_deliveries_flowing() {
        let ingress = ingress().await;
        let now = Utc::now();

        ingress.rotate_secret("issuer", "whsec_next").await.unwrap();

        let raw_old = body("ev-old", "SETTLED");
        let header_old = sign("whsec_test", &raw_old, now);
        assert!(ingress
            .ingest("issuer", &header_old, &raw_old, now)
            .await
            .is_ok());

        let record = ingress
            .revoke_previous_secret("issuer")
            .await
            .unwrap();
        assert!(record.previous_revoked);

        let raw_stale = body("ev-stale", "SETTLED");
        let header_stale = sign("whsec_test", &raw_stale, now);
        assert!(matches!(
            ingress.ingest("issuer", &header_stale, &raw_stale, now).await,
            Err(WebhookError::SignatureMismatch)
        ));

        let raw_new = body("ev-new", "SETTLED");
        let header_new = sign("whsec_next", &raw_new, now);
        assert!(ingress
            .ingest("issuer", &header_new, &raw_new, now)
            .await
            .is_ok());
    }
}
