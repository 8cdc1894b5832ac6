use chrono::{DateTime, Utc};
use sardis_types::{rfc3339_ms, LedgerEntryId, OrgId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Closed set of audit record kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryKind {
    #[serde(rename = "payment.blocked")]
    PaymentBlocked,
    #[serde(rename = "payment.awaiting_approval")]
    PaymentAwaitingApproval,
    #[serde(rename = "payment.submitted")]
    PaymentSubmitted,
    #[serde(rename = "payment.transition")]
    PaymentTransition,
    #[serde(rename = "payment.timeout")]
    PaymentTimeout,
    #[serde(rename = "payment.failed")]
    PaymentFailed,
    #[serde(rename = "payment.cancelled")]
    PaymentCancelled,
    #[serde(rename = "hold.created")]
    HoldCreated,
    #[serde(rename = "hold.captured")]
    HoldCaptured,
    #[serde(rename = "hold.voided")]
    HoldVoided,
    #[serde(rename = "hold.expired")]
    HoldExpired,
    #[serde(rename = "approval.created")]
    ApprovalCreated,
    #[serde(rename = "approval.decided")]
    ApprovalDecided,
    #[serde(rename = "approval.expired")]
    ApprovalExpired,
    #[serde(rename = "approval.cancelled")]
    ApprovalCancelled,
    #[serde(rename = "trust.granted")]
    TrustGranted,
    #[serde(rename = "policy.decision")]
    PolicyDecision,
    #[serde(rename = "policy.nl_overreach")]
    PolicyNlOverreach,
    #[serde(rename = "policy.invalid_transition")]
    PolicyInvalidTransition,
    #[serde(rename = "webhook.suspicious")]
    WebhookSuspicious,
    #[serde(rename = "webhook.secret_rotated")]
    WebhookSecretRotated,
    #[serde(rename = "recon.break")]
    ReconBreak,
    #[serde(rename = "wallet.kill_switch")]
    WalletKillSwitch,
    #[serde(rename = "ops.failover_mode")]
    OpsFailoverMode,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::PaymentBlocked => "payment.blocked",
            EntryKind::PaymentAwaitingApproval => "payment.awaiting_approval",
            EntryKind::PaymentSubmitted => "payment.submitted",
            EntryKind::PaymentTransition => "payment.transition",
            EntryKind::PaymentTimeout => "payment.timeout",
            EntryKind::PaymentFailed => "payment.failed",
            EntryKind::PaymentCancelled => "payment.cancelled",
            EntryKind::HoldCreated => "hold.created",
            EntryKind::HoldCaptured => "hold.captured",
            EntryKind::HoldVoided => "hold.voided",
            EntryKind::HoldExpired => "hold.expired",
            EntryKind::ApprovalCreated => "approval.created",
            EntryKind::ApprovalDecided => "approval.decided",
            EntryKind::ApprovalExpired => "approval.expired",
            EntryKind::ApprovalCancelled => "approval.cancelled",
            EntryKind::TrustGranted => "trust.granted",
            EntryKind::PolicyDecision => "policy.decision",
            EntryKind::PolicyNlOverreach => "policy.nl_overreach",
            EntryKind::PolicyInvalidTransition => "policy.invalid_transition",
            EntryKind::WebhookSuspicious => "webhook.suspicious",
            EntryKind::WebhookSecretRotated => "webhook.secret_rotated",
            EntryKind::ReconBreak => "recon.break",
            EntryKind::WalletKillSwitch => "wallet.kill_switch",
            EntryKind::OpsFailoverMode => "ops.failover_mode",
        }
    }
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hash-chained ledger entry. Immutable once committed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub ltx_id: LedgerEntryId,
    pub org_id: OrgId,
    /// Strict per-org sequence; (org_id, seq) is unique.
    pub seq: u64,
    pub prev_hash: Option<String>,
    pub entry_hash: String,
    pub payload_digest: String,
    pub created_at: DateTime<Utc>,
    pub kind: EntryKind,
    pub payload: Value,
}

impl LedgerEntry {
    /// Recompute this entry's hash from its own fields.
    pub fn expected_hash(&self) -> String {
        compute_entry_hash(
            self.prev_hash.as_deref(),
            &self.payload_digest,
            self.created_at,
            self.kind,
        )
    }

    pub fn is_intact(&self) -> bool {
        self.entry_hash == self.expected_hash()
            && self.payload_digest == payload_digest(&self.payload)
    }
}

/// `entry_hash = H(prev_hash || payload_digest || created_at || kind)`.
pub fn compute_entry_hash(
    prev_hash: Option<&str>,
    payload_digest: &str,
    created_at: DateTime<Utc>,
    kind: EntryKind,
) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(prev_hash.unwrap_or("").as_bytes());
    hasher.update(payload_digest.as_bytes());
    hasher.update(rfc3339_ms(created_at).as_bytes());
    hasher.update(kind.as_str().as_bytes());
    hasher.finalize().to_hex().to_string()
}

pub fn payload_digest(payload: &Value) -> String {
    let bytes = serde_json::to_vec(payload).unwrap_or_default();
    blake3::hash(&bytes).to_hex().to_string()
}
