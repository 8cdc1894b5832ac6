use crate::engine::{ExecuteResponse, PaymentOrchestrator};
use crate::error::OrchestratorError;
use chrono::Utc;
use sardis_types::{
    AgentId, CurrencyCode, ExternalBankAccountId, Mandate, MandateDraft, Money, OrgId, Rail,
    WalletId,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Wallet balance view assembled from settled payments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreasuryBalances {
    pub wallet_id: WalletId,
    pub available_minor: i64,
    pub currency: CurrencyCode,
}

/// Treasury operations expressed as orchestrated payments: funding and
/// withdrawal run the same decision-and-settlement pipeline as any other
/// disbursement, under their own idempotency scopes. The funding strategy
/// selects the rail treasury moves ride on.
#[derive(Clone)]
pub struct TreasuryService {
    orchestrator: Arc<PaymentOrchestrator>,
    treasury_agent: AgentId,
    funding_rail: Rail,
}

impl TreasuryService {
    pub fn new(orchestrator: Arc<PaymentOrchestrator>, treasury_agent: AgentId) -> Self {
        Self::with_funding_rail(orchestrator, treasury_agent, Rail::Ach)
    }

    pub fn with_funding_rail(
        orchestrator: Arc<PaymentOrchestrator>,
        treasury_agent: AgentId,
        funding_rail: Rail,
    ) -> Self {
        Self {
            orchestrator,
            treasury_agent,
            funding_rail,
        }
    }

    /// Pull funds from an external bank account into a wallet.
    pub async fn fund(
        &self,
        org_id: OrgId,
        wallet_id: WalletId,
        source: &ExternalBankAccountId,
        amount: Money,
        idempotency_key: &str,
    ) -> Result<ExecuteResponse, OrchestratorError> {
        let mandate = self.treasury_mandate(
            org_id,
            wallet_id,
            source.as_str(),
            amount,
            "treasury funding",
        )?;
        let scope = format!("{}.fund", self.funding_rail);
        let response = self
            .orchestrator
            .execute_scoped(&scope, &mandate, idempotency_key, None)
            .await?;
        self.link_account(&response, source).await?;
        Ok(response)
    }

    /// Push funds from a wallet out to an external bank account.
    pub async fn withdraw(
        &self,
        org_id: OrgId,
        wallet_id: WalletId,
        destination: &ExternalBankAccountId,
        amount: Money,
        idempotency_key: &str,
    ) -> Result<ExecuteResponse, OrchestratorError> {
        let mandate = self.treasury_mandate(
            org_id,
            wallet_id,
            destination.as_str(),
            amount,
            "treasury withdrawal",
        )?;
        let scope = format!("{}.withdraw", self.funding_rail);
        let response = self
            .orchestrator
            .execute_scoped(&scope, &mandate, idempotency_key, None)
            .await?;
        self.link_account(&response, destination).await?;
        Ok(response)
    }

    pub async fn balances(&self, wallet_id: &WalletId) -> TreasuryBalances {
        TreasuryBalances {
            wallet_id: wallet_id.clone(),
            available_minor: self.orchestrator.wallet_balance_minor(wallet_id).await,
            currency: CurrencyCode::usd(),
        }
    }

    fn treasury_mandate(
        &self,
        org_id: OrgId,
        wallet_id: WalletId,
        destination: &str,
        amount: Money,
        purpose: &str,
    ) -> Result<Mandate, OrchestratorError> {
        MandateDraft::new(
            self.treasury_agent.clone(),
            org_id,
            wallet_id,
            destination,
            amount,
            self.funding_rail,
            purpose,
        )
        .seal(Utc::now())
        .map_err(OrchestratorError::Types)
    }

    async fn link_account(
        &self,
        response: &ExecuteResponse,
        account: &ExternalBankAccountId,
    ) -> Result<(), OrchestratorError> {
        if let Some(payment_id) = &response.payment_id {
            self.orchestrator
                .set_external_account(payment_id, account.clone())
                .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::StaticContextSource;
    use crate::engine::{ComponentRegistry, ExecuteStatus, OrchestratorConfig};
    use sardis_adapters::{
        AdapterFleet, BreakerConfig, CapabilityMatrix, MockAchAdapter, RoutePlan,
    };
    use sardis_approvals::ApprovalManager;
    use sardis_idempotency::IdempotencyStore;
    use sardis_ledger::{LedgerStorageConfig, PersistentAuditLedger};
    use sardis_lifecycle::AchEvent;
    use sardis_observability::{
        FailoverState, GuardrailRegistry, KillSwitchRegistry, MetricsRegistry, RateLimitConfig,
        SlidingWindowRateLimiter,
    };
    use sardis_policy::{DriftThresholds, HardCaps, PolicyEngine, PolicySnapshot, RuleSet};
    use sardis_recon::ReconStore;
    use sardis_types::ProviderEventId;
    use sardis_webhooks::NormalizedEvent;
    use std::collections::BTreeMap;
    use tokio::sync::Mutex;

    async fn service() -> (TreasuryService, Arc<PaymentOrchestrator>) {
        let metrics = MetricsRegistry::new();
        let mut fleet = AdapterFleet::new(
            metrics.clone(),
            BreakerConfig::default(),
            std::time::Duration::from_millis(500),
        );
        fleet.register(Arc::new(MockAchAdapter::new("ach_treasury")));
        let mut matrix = CapabilityMatrix::new();
        matrix.set_default(
            Rail::Ach,
            CurrencyCode::usd(),
            RoutePlan::new("ach_treasury", vec![]),
        );

        let ledger = Arc::new(Mutex::new(
            PersistentAuditLedger::bootstrap(LedgerStorageConfig::memory())
                .await
                .unwrap(),
        ));
        let registry = ComponentRegistry {
            policy: PolicyEngine::new(),
            context_source: StaticContextSource::new(),
            ledger: ledger.clone(),
            idempotency: IdempotencyStore::new(),
            approvals: ApprovalManager::new(ledger.clone()),
            fleet: Arc::new(fleet),
            matrix,
            recon: Arc::new(Mutex::new(ReconStore::new(Default::default()))),
            killswitch: KillSwitchRegistry::new(),
            limiter: SlidingWindowRateLimiter::new(RateLimitConfig::default()),
            failover: FailoverState::new(),
            guardrails: GuardrailRegistry::new(),
            metrics,
        };
        let orchestrator = Arc::new(PaymentOrchestrator::new(
            OrchestratorConfig::default(),
            registry,
        ));
        let snapshot = PolicySnapshot::build(
            "pol-treasury",
            OrgId::parse("org_trsy1").unwrap(),
            1,
            RuleSet::default(),
            HardCaps {
                per_tx_minor: 50_000_000,
                per_day_minor: 500_000_000,
                per_month_minor: 900_000_000,
                per_rail_minor: BTreeMap::new(),
            },
            DriftThresholds::validated(0.6, 1.5).unwrap(),
        )
        .unwrap();
        orchestrator.set_policy(snapshot).await;

        (
            TreasuryService::new(
                orchestrator.clone(),
                AgentId::parse("agt_treasury1").unwrap(),
            ),
            orchestrator,
        )
    }

    fn usd(amount: i64) -> Money {
        Money::new(amount, CurrencyCode::usd()).unwrap()
    }

    #[tokio::test]
    async fn funding_settles_into_wallet_balance() {
        let (treasury, orchestrator) = service().await;
        let org = OrgId::parse("org_trsy1").unwrap();
        let wallet = WalletId::parse("wlt_trsy1").unwrap();
        let source = ExternalBankAccountId::parse("eba_operating1").unwrap();

        let response = treasury
            .fund(org, wallet.clone(), &source, usd(5_000_000), "fund-1")
            .await
            .unwrap();
        assert_eq!(response.status, ExecuteStatus::Submitted);
        let payment_id = response.payment_id.clone().unwrap();

        for (n, event) in [
            AchEvent::Reviewed,
            AchEvent::Processed,
            AchEvent::Settled,
        ]
        .into_iter()
        .enumerate()
        {
            orchestrator
                .apply_provider_event(&NormalizedEvent {
                    event_id: ProviderEventId::generate(),
                    provider: "treasury".to_string(),
                    external_id: format!("fund-ev-{n}"),
                    payment_id: payment_id.clone(),
                    event: sardis_lifecycle::RailEvent::Ach(event),
                    received_at: Utc::now(),
                })
                .await
                .unwrap();
        }

        let balances = treasury.balances(&wallet).await;
        assert_eq!(balances.available_minor, 5_000_000);
    }

    #[tokio::test]
    async fn fund_and_withdraw_use_distinct_scopes() {
        let (treasury, _) = service().await;
        let org = OrgId::parse("org_trsy1").unwrap();
        let wallet = WalletId::parse("wlt_trsy1").unwrap();
        let account = ExternalBankAccountId::parse("eba_operating1").unwrap();

        // The same idempotency key in different scopes is two operations.
        let fund = treasury
            .fund(org.clone(), wallet.clone(), &account, usd(1_000_000), "k1")
            .await
            .unwrap();
        let withdraw = treasury
            .withdraw(org, wallet, &account, usd(1_000_000), "k1")
            .await
            .unwrap();
        assert_eq!(fund.status, ExecuteStatus::Submitted);
        assert_eq!(withdraw.status, ExecuteStatus::Submitted);
        assert_ne!(fund.payment_id, withdraw.payment_id);
    }

    #[tokio::test]
    async fn funded_payment_records_external_account() {
        let (treasury, orchestrator) = service().await;
        let org = OrgId::parse("org_trsy1").unwrap();
        let wallet = WalletId::parse("wlt_trsy1").unwrap();
        let source = ExternalBankAccountId::parse("eba_operating1").unwrap();

        let response = treasury
            .fund(org, wallet, &source, usd(1_000_000), "fund-1")
            .await
            .unwrap();
        let payment = orchestrator
            .payment(&response.payment_id.clone().unwrap())
            .await
            .unwrap();
        assert_eq!(payment.external_account, Some(source));
        assert_eq!(payment.direction, sardis_types::Direction::Credit);
    }
}
