use crate::error::TypeError;
use crate::hash::rfc3339_ms;
use crate::ids::{AgentId, MandateId, OrgId, WalletId};
use crate::money::Money;
use crate::Rail;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Immutable, content-addressed authorization record produced by an agent.
///
/// The mandate is the unit the policy engine evaluates. `audit_hash` is a
/// digest over the canonical serialization of every other field, so two
/// mandates with identical content share an address and any mutation is
/// detectable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mandate {
    pub mandate_id: MandateId,
    pub agent_id: AgentId,
    pub org_id: OrgId,
    pub subject_wallet: WalletId,
    pub destination: String,
    pub amount: Money,
    pub rail: Rail,
    pub purpose: String,
    pub timestamp: DateTime<Utc>,
    pub audit_hash: String,
}

impl Mandate {
    /// Recompute the content address and compare against the stored one.
    pub fn verify_hash(&self) -> bool {
        self.audit_hash == canonical_mandate_hash(self)
    }
}

/// Mandate under construction, before it is sealed with its content address.
#[derive(Debug, Clone)]
pub struct MandateDraft {
    pub agent_id: AgentId,
    pub org_id: OrgId,
    pub subject_wallet: WalletId,
    pub destination: String,
    pub amount: Money,
    pub rail: Rail,
    pub purpose: String,
}

impl MandateDraft {
    pub fn new(
        agent_id: AgentId,
        org_id: OrgId,
        subject_wallet: WalletId,
        destination: impl Into<String>,
        amount: Money,
        rail: Rail,
        purpose: impl Into<String>,
    ) -> Self {
        Self {
            agent_id,
            org_id,
            subject_wallet,
            destination: destination.into(),
            amount,
            rail,
            purpose: purpose.into(),
        }
    }

    /// Seal the draft into an immutable mandate stamped at `timestamp`.
    pub fn seal(self, timestamp: DateTime<Utc>) -> Result<Mandate, TypeError> {
        let mut mandate = Mandate {
            mandate_id: MandateId::generate(),
            agent_id: self.agent_id,
            org_id: self.org_id,
            subject_wallet: self.subject_wallet,
            destination: self.destination,
            amount: self.amount,
            rail: self.rail,
            purpose: self.purpose,
            timestamp,
            audit_hash: String::new(),
        };
        mandate.audit_hash = canonical_mandate_hash(&mandate);
        Ok(mandate)
    }
}

/// Canonical serialization: newline-free JSON with lexicographic key order,
/// amounts as integer minor units, timestamp as RFC 3339 UTC at millisecond
/// precision.
fn canonical_mandate_hash(mandate: &Mandate) -> String {
    let material = serde_json::json!({
        "mandate_id": mandate.mandate_id,
        "agent_id": mandate.agent_id,
        "org_id": mandate.org_id,
        "subject_wallet": mandate.subject_wallet,
        "destination": mandate.destination,
        "amount_minor": mandate.amount.amount_minor,
        "currency": mandate.amount.currency,
        "rail": mandate.rail,
        "purpose": mandate.purpose,
        "timestamp": rfc3339_ms(mandate.timestamp),
    });
    let bytes = serde_json::to_vec(&material).unwrap_or_default();
    blake3::hash(&bytes).to_hex().to_string()
}
