use crate::error::ApprovalError;
use crate::manager::{ApprovalRequest, ApprovalStatus};
use chrono::{DateTime, Utc};
use sardis_ledger::{EntryKind, PersistentAuditLedger};
use sardis_types::{canonical_digest, AgentId, ApprovalId, OrgId};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Directed permission for one agent to pay another.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustRelation {
    pub org_id: OrgId,
    pub sender_agent: AgentId,
    pub recipient_agent: AgentId,
    pub created_by: String,
    pub approval_ref: ApprovalId,
    pub created_at: DateTime<Utc>,
}

/// Content address for the relation under approval.
pub fn trust_subject_digest(sender: &AgentId, recipient: &AgentId) -> String {
    canonical_digest(&("trust.grant", sender, recipient))
}

/// Agent-to-agent trust table. Mutations are sensitive: they only land with
/// an approved 4-eyes request whose subject digest matches the relation.
#[derive(Clone)]
pub struct TrustRegistry {
    relations: Arc<Mutex<HashMap<(AgentId, AgentId), TrustRelation>>>,
    ledger: Arc<Mutex<PersistentAuditLedger>>,
}

impl TrustRegistry {
    pub fn new(ledger: Arc<Mutex<PersistentAuditLedger>>) -> Self {
        Self {
            relations: Arc::new(Mutex::new(HashMap::new())),
            ledger,
        }
    }

    pub async fn grant(
        &self,
        org_id: OrgId,
        sender: AgentId,
        recipient: AgentId,
        created_by: &str,
        approval: &ApprovalRequest,
    ) -> Result<TrustRelation, ApprovalError> {
        if approval.action != "trust.grant"
            || approval.status != ApprovalStatus::Approved
            || approval.subject_digest != trust_subject_digest(&sender, &recipient)
        {
            return Err(ApprovalError::WrongApproval {
                approval: approval.approval_id.to_string(),
                action: "trust.grant".to_string(),
            });
        }

        let mut relations = self.relations.lock().await;
        let key = (sender.clone(), recipient.clone());
        if relations.contains_key(&key) {
            return Err(ApprovalError::TrustExists(
                sender.to_string(),
                recipient.to_string(),
            ));
        }

        let relation = TrustRelation {
            org_id: org_id.clone(),
            sender_agent: sender,
            recipient_agent: recipient,
            created_by: created_by.to_string(),
            approval_ref: approval.approval_id.clone(),
            created_at: Utc::now(),
        };

        self.ledger
            .lock()
            .await
            .append(
                &org_id,
                EntryKind::TrustGranted,
                json!({
                    "sender_agent": relation.sender_agent,
                    "recipient_agent": relation.recipient_agent,
                    "created_by": relation.created_by,
                    "approval_ref": relation.approval_ref,
                }),
            )
            .await?;

        relations.insert(key, relation.clone());
        Ok(relation)
    }

    pub async fn is_trusted(&self, sender: &AgentId, recipient: &AgentId) -> bool {
        let relations = self.relations.lock().await;
        relations.contains_key(&(sender.clone(), recipient.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::{ApprovalManager, ReviewOutcome};
    use chrono::Duration;
    use sardis_ledger::LedgerStorageConfig;

    fn org() -> OrgId {
        OrgId::parse("org_trust1").unwrap()
    }

    fn agents() -> (AgentId, AgentId) {
        (
            AgentId::parse("agt_sender1").unwrap(),
            AgentId::parse("agt_recip1").unwrap(),
        )
    }

    async fn shared_ledger() -> Arc<Mutex<PersistentAuditLedger>> {
        Arc::new(Mutex::new(
            PersistentAuditLedger::bootstrap(LedgerStorageConfig::memory())
                .await
                .unwrap(),
        ))
    }

    #[tokio::test]
    async fn grant_requires_matching_approved_request() {
        let ledger = shared_ledger().await;
        let manager = ApprovalManager::new(ledger.clone());
        let registry = TrustRegistry::new(ledger);
        let (sender, recipient) = agents();

        let approval = manager
            .create(
                org(),
                "trust.grant",
                &trust_subject_digest(&sender, &recipient),
                2,
                Duration::hours(1),
            )
            .await
            .unwrap();

        // Pending approval is not enough.
        let err = registry
            .grant(org(), sender.clone(), recipient.clone(), "ops-1", &approval)
            .await
            .unwrap_err();
        assert!(matches!(err, ApprovalError::WrongApproval { .. }));

        manager
            .decide(&approval.approval_id, "reviewer-a", ReviewOutcome::Approve)
            .await
            .unwrap();
        let approved = manager
            .decide(&approval.approval_id, "reviewer-b", ReviewOutcome::Approve)
            .await
            .unwrap();

        let relation = registry
            .grant(org(), sender.clone(), recipient.clone(), "ops-1", &approved)
            .await
            .unwrap();
        assert_eq!(relation.approval_ref, approved.approval_id);
        assert!(registry.is_trusted(&sender, &recipient).await);
        // Direction matters.
        assert!(!registry.is_trusted(&recipient, &sender).await);
    }

    #[tokio::test]
    async fn mismatched_subject_digest_is_refused() {
        let ledger = shared_ledger().await;
        let manager = ApprovalManager::new(ledger.clone());
        let registry = TrustRegistry::new(ledger);
        let (sender, recipient) = agents();

        let approval = manager
            .create(org(), "trust.grant", "digest-for-someone-else", 2, Duration::hours(1))
            .await
            .unwrap();
        manager
            .decide(&approval.approval_id, "reviewer-a", ReviewOutcome::Approve)
            .await
            .unwrap();
        let approved = manager
            .decide(&approval.approval_id, "reviewer-b", ReviewOutcome::Approve)
            .await
            .unwrap();

        let err = registry
            .grant(org(), sender, recipient, "ops-1", &approved)
            .await
            .unwrap_err();
        assert!(matches!(err, ApprovalError::WrongApproval { .. }));
    }
}
