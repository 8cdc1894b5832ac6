use serde::{Deserialize, Serialize};

/// Closed enumeration of machine-readable refusal and outcome codes.
///
/// Every user-visible denial, timeout, or rejection on the money path maps
/// onto exactly one of these. Presentation strings may vary; the code is the
/// source of truth and is what ledger entries and tests assert on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReasonCode {
    #[serde(rename = "POLICY.LIMIT_EXCEEDED")]
    PolicyLimitExceeded,
    #[serde(rename = "POLICY.VENDOR_BLOCKED")]
    PolicyVendorBlocked,
    #[serde(rename = "POLICY.VENDOR_REQUIRES_APPROVAL")]
    PolicyVendorRequiresApproval,
    #[serde(rename = "POLICY.CATEGORY_BLOCKED")]
    PolicyCategoryBlocked,
    #[serde(rename = "POLICY.VELOCITY_EXCEEDED")]
    PolicyVelocityExceeded,
    #[serde(rename = "POLICY.COMPLIANCE_FAIL")]
    PolicyComplianceFail,
    #[serde(rename = "POLICY.DRIFT_BLOCKED")]
    PolicyDriftBlocked,
    #[serde(rename = "POLICY.WALLET_HALTED")]
    PolicyWalletHalted,
    #[serde(rename = "POLICY.NL_OVERREACH")]
    PolicyNlOverreach,
    #[serde(rename = "POLICY.CHECK_FAILED")]
    PolicyCheckFailed,
    #[serde(rename = "POLICY.APPROVAL_REQUIRED")]
    PolicyApprovalRequired,
    #[serde(rename = "PAYMENT.TIMEOUT")]
    PaymentTimeout,
    #[serde(rename = "PAYMENT.TERMINAL_INFLIGHT")]
    PaymentTerminalInflight,
    #[serde(rename = "PAYMENT.RATE_LIMITED")]
    PaymentRateLimited,
    #[serde(rename = "PAYMENT.CONTAINMENT")]
    PaymentContainment,
    #[serde(rename = "PROVIDER.ALL_FAILED")]
    ProviderAllFailed,
    #[serde(rename = "PROVIDER.FATAL")]
    ProviderFatal,
    #[serde(rename = "IDEMPOTENCY.CONFLICT")]
    IdempotencyConflict,
    #[serde(rename = "IDEMPOTENCY.DUPLICATE_IN_FLIGHT")]
    IdempotencyDuplicateInFlight,
    #[serde(rename = "WEBHOOK.SIGNATURE_INVALID")]
    WebhookSignatureInvalid,
    #[serde(rename = "WEBHOOK.STALE_TIMESTAMP")]
    WebhookStaleTimestamp,
    #[serde(rename = "WEBHOOK.REPLAY_SUSPICIOUS")]
    WebhookReplaySuspicious,
    #[serde(rename = "LEDGER.INTEGRITY")]
    LedgerIntegrity,
    #[serde(rename = "INTERNAL")]
    Internal,
}

impl ReasonCode {
    pub fn code(&self) -> &'static str {
        match self {
            ReasonCode::PolicyLimitExceeded => "POLICY.LIMIT_EXCEEDED",
            ReasonCode::PolicyVendorBlocked => "POLICY.VENDOR_BLOCKED",
            ReasonCode::PolicyVendorRequiresApproval => "POLICY.VENDOR_REQUIRES_APPROVAL",
            ReasonCode::PolicyCategoryBlocked => "POLICY.CATEGORY_BLOCKED",
            ReasonCode::PolicyVelocityExceeded => "POLICY.VELOCITY_EXCEEDED",
            ReasonCode::PolicyComplianceFail => "POLICY.COMPLIANCE_FAIL",
            ReasonCode::PolicyDriftBlocked => "POLICY.DRIFT_BLOCKED",
            ReasonCode::PolicyWalletHalted => "POLICY.WALLET_HALTED",
            ReasonCode::PolicyNlOverreach => "POLICY.NL_OVERREACH",
            ReasonCode::PolicyCheckFailed => "POLICY.CHECK_FAILED",
            ReasonCode::PolicyApprovalRequired => "POLICY.APPROVAL_REQUIRED",
            ReasonCode::PaymentTimeout => "PAYMENT.TIMEOUT",
            ReasonCode::PaymentTerminalInflight => "PAYMENT.TERMINAL_INFLIGHT",
            ReasonCode::PaymentRateLimited => "PAYMENT.RATE_LIMITED",
            ReasonCode::PaymentContainment => "PAYMENT.CONTAINMENT",
            ReasonCode::ProviderAllFailed => "PROVIDER.ALL_FAILED",
            ReasonCode::ProviderFatal => "PROVIDER.FATAL",
            ReasonCode::IdempotencyConflict => "IDEMPOTENCY.CONFLICT",
            ReasonCode::IdempotencyDuplicateInFlight => "IDEMPOTENCY.DUPLICATE_IN_FLIGHT",
            ReasonCode::WebhookSignatureInvalid => "WEBHOOK.SIGNATURE_INVALID",
            ReasonCode::WebhookStaleTimestamp => "WEBHOOK.STALE_TIMESTAMP",
            ReasonCode::WebhookReplaySuspicious => "WEBHOOK.REPLAY_SUSPICIOUS",
            ReasonCode::LedgerIntegrity => "LEDGER.INTEGRITY",
            ReasonCode::Internal => "INTERNAL",
        }
    }
}

impl std::fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_to_dotted_code() {
        let json = serde_json::to_string(&ReasonCode::PolicyLimitExceeded).unwrap();
        assert_eq!(json, "\"POLICY.LIMIT_EXCEEDED\"");
    }

    #[test]
    fn roundtrips_through_serde() {
        for code in [
            ReasonCode::PolicyVendorBlocked,
            ReasonCode::PaymentTimeout,
            ReasonCode::ProviderAllFailed,
            ReasonCode::WebhookReplaySuspicious,
        ] {
            let json = serde_json::to_string(&code).unwrap();
            let back: ReasonCode = serde_json::from_str(&json).unwrap();
            assert_eq!(code, back);
        }
    }

    #[test]
    fn display_matches_code() {
        assert_eq!(
            ReasonCode::PolicyCheckFailed.to_string(),
            "POLICY.CHECK_FAILED"
        );
    }
}
