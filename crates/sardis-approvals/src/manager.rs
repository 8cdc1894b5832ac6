use crate::error::ApprovalError;
use chrono::{DateTime, Duration, Utc};
use sardis_ledger::{EntryKind, PersistentAuditLedger};
use sardis_types::{ApprovalId, OrgId};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

/// Actions whose mutation is sensitive enough to demand 4-eyes.
const SENSITIVE_ACTIONS: &[&str] = &["trust.grant", "policy.revise", "killswitch.release"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Denied,
    Expired,
    Cancelled,
}

impl ApprovalStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ApprovalStatus::Pending)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewOutcome {
    Approve,
    Deny,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewerVote {
    pub reviewer_id: String,
    pub outcome: ReviewOutcome,
    pub decided_at: DateTime<Utc>,
}

/// One approval request with its vote trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub approval_id: ApprovalId,
    pub org_id: OrgId,
    pub action: String,
    /// Content address of the thing under review (e.g. a mandate audit hash).
    pub subject_digest: String,
    pub status: ApprovalStatus,
    pub reviewers: Vec<ReviewerVote>,
    pub min_reviewers: u8,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub cancel_reason: Option<String>,
}

impl ApprovalRequest {
    fn positive_votes(&self) -> usize {
        self.reviewers
            .iter()
            .filter(|vote| vote.outcome == ReviewOutcome::Approve)
            .count()
    }

    fn has_reviewer(&self, reviewer_id: &str) -> bool {
        self.reviewers
            .iter()
            .any(|vote| vote.reviewer_id == reviewer_id)
    }
}

/// Approval lifecycle owner.
///
/// Invariants: one vote per reviewer identity; any deny is sticky; approval
/// requires `min_reviewers` distinct positive votes; pending requests expire
/// at `expires_at`. Sensitive actions refuse quorums below two.
#[derive(Clone)]
pub struct ApprovalManager {
    requests: Arc<Mutex<HashMap<ApprovalId, ApprovalRequest>>>,
    ledger: Arc<Mutex<PersistentAuditLedger>>,
}

impl ApprovalManager {
    pub fn new(ledger: Arc<Mutex<PersistentAuditLedger>>) -> Self {
        Self {
            requests: Arc::new(Mutex::new(HashMap::new())),
            ledger,
        }
    }

    pub async fn create(
        &self,
        org_id: OrgId,
        action: &str,
        subject_digest: &str,
        min_reviewers: u8,
        ttl: Duration,
    ) -> Result<ApprovalRequest, ApprovalError> {
        if min_reviewers == 0 {
            return Err(ApprovalError::ZeroQuorum);
        }
        if SENSITIVE_ACTIONS.contains(&action) && min_reviewers < 2 {
            return Err(ApprovalError::QuorumTooSmall {
                action: action.to_string(),
                got: min_reviewers,
            });
        }

        let now = Utc::now();
        let request = ApprovalRequest {
            approval_id: ApprovalId::generate(),
            org_id: org_id.clone(),
            action: action.to_string(),
            subject_digest: subject_digest.to_string(),
            status: ApprovalStatus::Pending,
            reviewers: Vec::new(),
            min_reviewers,
            created_at: now,
            expires_at: now + ttl,
            cancel_reason: None,
        };

        self.ledger
            .lock()
            .await
            .append(
                &org_id,
                EntryKind::ApprovalCreated,
                json!({
                    "approval_id": request.approval_id,
                    "action": request.action,
                    "subject_digest": request.subject_digest,
                    "min_reviewers": request.min_reviewers,
                    "expires_at": request.expires_at,
                }),
            )
            .await?;

        let mut requests = self.requests.lock().await;
        requests.insert(request.approval_id.clone(), request.clone());
        info!(approval = %request.approval_id, action, "approval request created");
        Ok(request)
    }

    pub async fn decide(
        &self,
        approval_id: &ApprovalId,
        reviewer_id: &str,
        outcome: ReviewOutcome,
    ) -> Result<ApprovalRequest, ApprovalError> {
        let updated = {
            let mut requests = self.requests.lock().await;
            let request = requests
                .get_mut(approval_id)
                .ok_or_else(|| ApprovalError::NotFound(approval_id.to_string()))?;

            expire_if_due(request);
            if request.status != ApprovalStatus::Pending {
                return Err(ApprovalError::NotPending(approval_id.to_string()));
            }
            if request.has_reviewer(reviewer_id) {
                return Err(ApprovalError::DuplicateReviewer(reviewer_id.to_string()));
            }

            request.reviewers.push(ReviewerVote {
                reviewer_id: reviewer_id.to_string(),
                outcome,
                decided_at: Utc::now(),
            });

            // A deny is sticky regardless of other votes.
            if outcome == ReviewOutcome::Deny {
                request.status = ApprovalStatus::Denied;
            } else if request.positive_votes() >= request.min_reviewers as usize {
                request.status = ApprovalStatus::Approved;
            }
            request.clone()
        };

        self.ledger
            .lock()
            .await
            .append(
                &updated.org_id,
                EntryKind::ApprovalDecided,
                json!({
                    "approval_id": updated.approval_id,
                    "reviewer_id": reviewer_id,
                    "outcome": outcome,
                    "status": updated.status,
                    "votes": updated.reviewers.len(),
                }),
            )
            .await?;

        Ok(updated)
    }

    /// Current state, applying lazy expiry first. Callers re-read; approval
    /// state is never pushed.
    pub async fn status(&self, approval_id: &ApprovalId) -> Result<ApprovalRequest, ApprovalError> {
        let expired = {
            let mut requests = self.requests.lock().await;
            let request = requests
                .get_mut(approval_id)
                .ok_or_else(|| ApprovalError::NotFound(approval_id.to_string()))?;
            let was_pending = request.status == ApprovalStatus::Pending;
            expire_if_due(request);
            if was_pending && request.status == ApprovalStatus::Expired {
                Some(request.clone())
            } else {
                None
            }
        };

        if let Some(request) = &expired {
            self.append_expiry(request).await?;
            return Ok(request.clone());
        }

        let requests = self.requests.lock().await;
        requests
            .get(approval_id)
            .cloned()
            .ok_or_else(|| ApprovalError::NotFound(approval_id.to_string()))
    }

    pub async fn cancel(
        &self,
        approval_id: &ApprovalId,
        reason: &str,
    ) -> Result<ApprovalRequest, ApprovalError> {
        let updated = {
            let mut requests = self.requests.lock().await;
            let request = requests
                .get_mut(approval_id)
                .ok_or_else(|| ApprovalError::NotFound(approval_id.to_string()))?;
            expire_if_due(request);
            if request.status != ApprovalStatus::Pending {
                return Err(ApprovalError::NotPending(approval_id.to_string()));
            }
            request.status = ApprovalStatus::Cancelled;
            request.cancel_reason = Some(reason.to_string());
            request.clone()
        };

        self.ledger
            .lock()
            .await
            .append(
                &updated.org_id,
                EntryKind::ApprovalCancelled,
                json!({
                    "approval_id": updated.approval_id,
                    "reason": reason,
                }),
            )
            .await?;

        Ok(updated)
    }

    /// Transition every overdue pending request to expired; returns how many.
    pub async fn expire_sweep(&self) -> Result<usize, ApprovalError> {
        let expired: Vec<ApprovalRequest> = {
            let mut requests = self.requests.lock().await;
            requests
                .values_mut()
                .filter(|request| {
                    request.status == ApprovalStatus::Pending && request.expires_at <= Utc::now()
                })
                .map(|request| {
                    request.status = ApprovalStatus::Expired;
                    request.clone()
                })
                .collect()
        };

        for request in &expired {
            self.append_expiry(request).await?;
        }
        Ok(expired.len())
    }

    /// Find the newest approval for a subject digest, regardless of state.
    pub async fn find_by_subject(
        &self,
        org_id: &OrgId,
        subject_digest: &str,
    ) -> Option<ApprovalRequest> {
        let requests = self.requests.lock().await;
        requests
            .values()
            .filter(|r| r.org_id == *org_id && r.subject_digest == subject_digest)
            .max_by_key(|r| r.created_at)
            .cloned()
    }

    async fn append_expiry(&self, request: &ApprovalRequest) -> Result<(), ApprovalError> {
        self.ledger
            .lock()
            .await
            .append(
                &request.org_id,
                EntryKind::ApprovalExpired,
                json!({ "approval_id": request.approval_id }),
            )
            .await?;
        Ok(())
    }
}

fn expire_if_due(request: &mut ApprovalRequest) {
    if request.status == ApprovalStatus::Pending && request.expires_at <= Utc::now() {
        request.status = ApprovalStatus::Expired;
    }
}
