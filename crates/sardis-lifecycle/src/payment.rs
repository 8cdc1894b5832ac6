use crate::error::LifecycleError;
use crate::machine::RailState;
use chrono::{DateTime, Utc};
use sardis_types::{
    Direction, ExternalBankAccountId, MandateId, Money, OrgId, PaymentId, ProviderEventId, Rail,
    WalletId,
};
use serde::{Deserialize, Serialize};

/// Payment lifecycle entity.
///
/// Payments and their events reference each other by id only: the record
/// keeps a list of applied event ids, never the events themselves, so there
/// are no cycles in memory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub payment_id: PaymentId,
    pub org_id: OrgId,
    pub mandate_id: MandateId,
    pub wallet_id: WalletId,
    pub rail: Rail,
    pub direction: Direction,
    pub status: RailState,
    pub amount_pending: Money,
    pub amount_settled: Money,
    pub retry_count: u8,
    pub last_return_reason: Option<String>,
    /// Adapter name + provider reference once submitted.
    pub provider_key: Option<String>,
    pub provider_ref: Option<String>,
    pub idempotency_key: String,
    pub external_account: Option<ExternalBankAccountId>,
    pub applied_events: Vec<ProviderEventId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentRecord {
    pub fn new(
        org_id: OrgId,
        mandate_id: MandateId,
        wallet_id: WalletId,
        rail: Rail,
        direction: Direction,
        amount: Money,
        idempotency_key: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        let currency = amount.currency.clone();
        Self {
            payment_id: PaymentId::generate(),
            org_id,
            mandate_id,
            wallet_id,
            rail,
            direction,
            status: RailState::initial(rail),
            amount_pending: amount,
            amount_settled: Money::zero(currency),
            retry_count: 0,
            last_return_reason: None,
            provider_key: None,
            provider_ref: None,
            idempotency_key: idempotency_key.into(),
            external_account: None,
            applied_events: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Move the full pending amount into settled.
    pub fn settle_pending(&mut self) -> Result<(), LifecycleError> {
        let settled = self
            .amount_settled
            .checked_add(&self.amount_pending)
            .map_err(|e| LifecycleError::AmountInvariant(e.to_string()))?;
        self.amount_settled = settled;
        self.amount_pending = Money::zero(self.amount_pending.currency.clone());
        Ok(())
    }

    /// Terminal invariant: nothing can remain pending.
    pub fn zero_pending(&mut self) {
        self.amount_pending = Money::zero(self.amount_pending.currency.clone());
    }

    pub fn record_event(&mut self, event_id: ProviderEventId) {
        self.applied_events.push(event_id);
        self.updated_at = Utc::now();
    }
}
