use sardis_types::{DecisionId, ReasonCode};
use serde::{Deserialize, Serialize};

/// Tri-state policy verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyOutcome {
    Approved,
    Blocked,
    RequiresApproval,
}

/// One evaluated check, in evaluation order, for explainability and replay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyCheck {
    pub name: String,
    pub passed: bool,
    pub detail: String,
}

impl PolicyCheck {
    pub fn passed(name: &str, detail: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            passed: true,
            detail: detail.into(),
        }
    }

    pub fn failed(name: &str, detail: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            passed: false,
            detail: detail.into(),
        }
    }
}

/// The ApprovalRequest shape the caller must create when the outcome is
/// `RequiresApproval`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalTemplate {
    pub action: String,
    pub subject_digest: String,
    pub min_reviewers: u8,
    pub ttl_secs: u64,
}

/// Result of one policy evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyDecision {
    pub decision_id: DecisionId,
    pub outcome: PolicyOutcome,
    /// Absent only when the outcome is `Approved`.
    pub reason_code: Option<ReasonCode>,
    pub reason: String,
    /// Deterministic 0..100 composite, for dashboards and drift review.
    pub risk_score: u8,
    pub checks: Vec<PolicyCheck>,
    pub approval_template: Option<ApprovalTemplate>,
    /// Snapshot revision the decision was made against.
    pub policy_revision: String,
}

impl PolicyDecision {
    pub fn is_blocked(&self) -> bool {
        self.outcome == PolicyOutcome::Blocked
    }

    pub fn requires_approval(&self) -> bool {
        self.outcome == PolicyOutcome::RequiresApproval
    }
}
