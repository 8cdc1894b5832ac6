use crate::error::WebhookError;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Default acceptance window for the signed timestamp, seconds either side.
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// Parsed `X-Signature: t=<unix>,v1=<hex_hmac_sha256>` header.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedSignature {
    pub timestamp: i64,
    pub v1: Vec<u8>,
}

pub fn parse_signature_header(header: &str) -> Result<ParsedSignature, WebhookError> {
    let mut timestamp = None;
    let mut v1 = None;
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => {
                timestamp = value.parse::<i64>().ok();
            }
            Some(("v1", value)) => {
                v1 = hex::decode(value).ok();
            }
            _ => {}
        }
    }
    match (timestamp, v1) {
        (Some(timestamp), Some(v1)) if !v1.is_empty() => Ok(ParsedSignature { timestamp, v1 }),
        _ => Err(WebhookError::MalformedSignatureHeader),
    }
}

/// Per-subscription secret material. During a rotation overlap either secret
/// verifies; `revoke_previous` ends the window.
#[derive(Debug, Clone)]
pub struct SubscriptionSecrets {
    current: String,
    previous: Option<String>,
}

impl SubscriptionSecrets {
    pub fn new(current: impl Into<String>) -> Self {
        Self {
            current: current.into(),
            previous: None,
        }
    }

    pub fn rotate(&mut self, new_secret: impl Into<String>) {
        self.previous = Some(std::mem::replace(&mut self.current, new_secret.into()));
    }

    pub fn revoke_previous(&mut self) -> bool {
        self.previous.take().is_some()
    }

    fn candidates(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.current.as_str()).chain(self.previous.as_deref())
    }
}

/// HMAC verifier for the webhook signature contract.
#[derive(Debug, Clone)]
pub struct SignatureVerifier {
    pub tolerance_secs: i64,
}

impl Default for SignatureVerifier {
    fn default() -> Self {
        Self {
            tolerance_secs: SIGNATURE_TOLERANCE_SECS,
        }
    }
}

impl SignatureVerifier {
    /// Verify header + body against the subscription secrets at `now`.
    ///
    /// The MAC comparison is constant-time (`Mac::verify_slice`); the
    /// timestamp check runs first so stale deliveries are cheap to refuse.
    pub fn verify(
        &self,
        secrets: &SubscriptionSecrets,
        header: &str,
        raw_body: &[u8],
        now: DateTime<Utc>,
    ) -> Result<(), WebhookError> {
        let parsed = parse_signature_header(header)?;

        let age_secs = (now.timestamp() - parsed.timestamp).abs();
        if age_secs > self.tolerance_secs {
            return Err(WebhookError::StaleTimestamp { age_secs });
        }

        for secret in secrets.candidates() {
            let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
                .map_err(|_| WebhookError::SignatureMismatch)?;
            mac.update(parsed.timestamp.to_string().as_bytes());
            mac.update(b".");
            mac.update(raw_body);
            if mac.verify_slice(&parsed.v1).is_ok() {
                return Ok(());
            }
        }
        Err(WebhookError::SignatureMismatch)
    }
}

/// Produce a valid header for a body, used by tests and the fixture
/// providers.
pub fn sign(secret: &str, raw_body: &[u8], at: DateTime<Utc>) -> String {
    let timestamp = at.timestamp();
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("hmac accepts any key size");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(raw_body);
    format!("t={timestamp},v1={}", hex::encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn valid_signature_verifies() {
        let secrets = SubscriptionSecrets::new("whsec_a");
        let verifier = SignatureVerifier::default();
        let now = Utc::now();
        let body = br#"{"event_id":"e1"}"#;

        let header = sign("whsec_a", body, now);
        assert!(verifier.verify(&secrets, &header, body, now).is_ok());
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let secrets = SubscriptionSecrets::new("whsec_a");
        let verifier = SignatureVerifier::default();
        let now = Utc::now();
        let body = b"payload";

        let header = sign("whsec_other", body, now);
        assert!(matches!(
            verifier.verify(&secrets, &header, body, now),
            Err(WebhookError::SignatureMismatch)
        ));
    }

    #[test]
    fn tampered_body_is_rejected() {
        let secrets = SubscriptionSecrets::new("whsec_a");
        let verifier = SignatureVerifier::default();
        let now = Utc::now();

        let header = sign("whsec_a", b"original", now);
        assert!(verifier.verify(&secrets, &header, b"tampered", now).is_err());
    }

    #[test]
    fn stale_timestamp_is_rejected_either_direction() {
        let secrets = SubscriptionSecrets::new("whsec_a");
        let verifier = SignatureVerifier::default();
        let now = Utc::now();
        let body = b"payload";

        let old = sign("whsec_a", body, now - Duration::seconds(301));
        assert!(matches!(
            verifier.verify(&secrets, &old, body, now),
            Err(WebhookError::StaleTimestamp { .. })
        ));

        let future = sign("whsec_a", body, now + Duration::seconds(301));
        assert!(matches!(
            verifier.verify(&secrets, &future, body, now),
            Err(WebhookError::StaleTimestamp { .. })
        ));

        let in_window = sign("whsec_a", body, now - Duration::seconds(299));
        assert!(verifier.verify(&secrets, &in_window, body, now).is_ok());
    }

    #[test]
    fn rotation_overlap_accepts_both_secrets() {
        let mut secrets = SubscriptionSecrets::new("whsec_old");
        secrets.rotate("whsec_new");
        let verifier = SignatureVerifier::default();
        let now = Utc::now();
        let body = b"payload";

        assert!(verifier
            .verify(&secrets, &sign("whsec_new", body, now), body, now)
            .is_ok());
        assert!(verifier
            .verify(&secrets, &sign("whsec_old", body, now), body, now)
            .is_ok());

        assert!(secrets.revoke_previous());
        assert!(verifier
            .verify(&secrets, &sign("whsec_old", body, now), body, now)
            .is_err());
        assert!(verifier
            .verify(&secrets, &sign("whsec_new", body, now), body, now)
            .is_ok());
    }

    #[test]
    fn malformed_headers_are_rejected() {
        for header in ["", "t=abc,v1=00", "v1=00", "t=123", "t=123,v1=zz"] {
            assert!(matches!(
                parse_signature_header(header),
                Err(WebhookError::MalformedSignatureHeader)
            ));
        }
    }
}
