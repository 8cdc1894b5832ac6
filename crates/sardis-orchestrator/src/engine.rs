use crate::context::ContextSource;
use crate::error::OrchestratorError;
use chrono::Utc;
use sardis_adapters::{
    AdapterFleet, CapabilityMatrix, FleetOutcome, RiskTier, SubmitRequest, VoidOutcome,
};
use sardis_approvals::{ApprovalManager, ApprovalStatus};
use sardis_idempotency::{BeginOutcome, IdempotencyError, IdempotencyStore, LockRegistry};
use sardis_ledger::{EntryKind, PersistentAuditLedger};
use sardis_lifecycle::{
    apply_event, AchEvent, CardEvent, ChainEvent, LifecycleError, PaymentRecord, RailEvent,
};
use sardis_observability::{
    FailoverState, GuardrailRegistry, KillSwitchRegistry, MetricsRegistry, ModePermit,
    SlidingWindowRateLimiter,
};
use sardis_policy::{
    ApprovalTemplate, PolicyDecision, PolicyEngine, PolicyOutcome, PolicySnapshot, SpendHint,
};
use sardis_recon::{ReconStore, ViewSource};
use sardis_types::{
    canonical_digest, ApprovalId, ExternalBankAccountId, Mandate, OrgId, PaymentId, ReasonCode,
    WalletId,
};
use sardis_webhooks::NormalizedEvent;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Idempotency scope for the primary execution pipeline.
pub const EXECUTE_SCOPE: &str = "payment.execute";

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Outer deadline for one `execute` call.
    pub total_deadline: std::time::Duration,
    /// Bound on per-payment lock acquisition.
    pub lock_timeout: std::time::Duration,
    /// TTL for idempotency records.
    pub idempotency_ttl: chrono::Duration,
    /// Default TTL for approvals the orchestrator creates.
    pub approval_ttl: chrono::Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            total_deadline: std::time::Duration::from_secs(30),
            lock_timeout: std::time::Duration::from_secs(5),
            idempotency_ttl: chrono::Duration::hours(24),
            approval_ttl: chrono::Duration::hours(1),
        }
    }
}

/// Explicit component registry handed to the orchestrator at construction.
/// Nothing here is a process-wide singleton; the service wires one registry
/// at bootstrap and tears it down on drain.
pub struct ComponentRegistry {
    pub policy: PolicyEngine,
    pub context_source: Arc<dyn ContextSource>,
    pub ledger: Arc<Mutex<PersistentAuditLedger>>,
    pub idempotency: IdempotencyStore,
    pub approvals: ApprovalManager,
    pub fleet: Arc<AdapterFleet>,
    pub matrix: CapabilityMatrix,
    pub recon: Arc<Mutex<ReconStore>>,
    pub killswitch: KillSwitchRegistry,
    pub limiter: SlidingWindowRateLimiter,
    pub failover: FailoverState,
    pub guardrails: GuardrailRegistry,
    pub metrics: MetricsRegistry,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecuteStatus {
    Submitted,
    Blocked,
    AwaitingApproval,
    DuplicateInFlight,
    Refused,
    Failed,
}

/// Outcome of one `execute` call; also the replayed body for idempotent
/// retries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteResponse {
    pub status: ExecuteStatus,
    pub payment_id: Option<PaymentId>,
    pub tx_ref: Option<String>,
    pub reason_code: Option<ReasonCode>,
    pub reason: Option<String>,
    pub decision: Option<PolicyDecision>,
    pub approval_id: Option<ApprovalId>,
}

impl ExecuteResponse {
    fn refused(reason_code: ReasonCode, reason: impl Into<String>) -> Self {
        Self {
            status: ExecuteStatus::Refused,
            payment_id: None,
            tx_ref: None,
            reason_code: Some(reason_code),
            reason: Some(reason.into()),
            decision: None,
            approval_id: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CancelOutcome {
    Cancelled { payment_id: PaymentId },
    Refused { reason_code: ReasonCode, reason: String },
}

/// The decision-and-settlement pipeline owner.
pub struct PaymentOrchestrator {
    config: OrchestratorConfig,
    registry: ComponentRegistry,
    snapshots: Mutex<HashMap<OrgId, PolicySnapshot>>,
    payments: Mutex<HashMap<PaymentId, PaymentRecord>>,
    payment_locks: LockRegistry,
    paused_accounts: Mutex<HashSet<ExternalBankAccountId>>,
    balances: Mutex<HashMap<WalletId, i64>>,
}

impl PaymentOrchestrator {
    pub fn new(config: OrchestratorConfig, registry: ComponentRegistry) -> Self {
        Self {
            config,
            registry,
            snapshots: Mutex::new(HashMap::new()),
            payments: Mutex::new(HashMap::new()),
            payment_locks: LockRegistry::new(),
            paused_accounts: Mutex::new(HashSet::new()),
            balances: Mutex::new(HashMap::new()),
        }
    }

    pub async fn set_policy(&self, snapshot: PolicySnapshot) {
        let mut snapshots = self.snapshots.lock().await;
        snapshots.insert(snapshot.org_id.clone(), snapshot);
    }

    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    pub async fn payment(&self, payment_id: &PaymentId) -> Option<PaymentRecord> {
        let payments = self.payments.lock().await;
        payments.get(payment_id).cloned()
    }

    pub async fn is_account_paused(&self, account: &ExternalBankAccountId) -> bool {
        let paused = self.paused_accounts.lock().await;
        paused.contains(account)
    }

    pub async fn wallet_balance_minor(&self, wallet: &WalletId) -> i64 {
        let balances = self.balances.lock().await;
        balances.get(wallet).copied().unwrap_or(0)
    }

    /// Synchronous pipeline entry point.
    pub async fn execute(
        &self,
        mandate: &Mandate,
        idempotency_key: &str,
        hint: Option<&SpendHint>,
    ) -> Result<ExecuteResponse, OrchestratorError> {
        self.execute_scoped(EXECUTE_SCOPE, mandate, idempotency_key, hint)
            .await
    }

    pub(crate) async fn execute_scoped(
        &self,
        scope: &str,
        mandate: &Mandate,
        idempotency_key: &str,
        hint: Option<&SpendHint>,
    ) -> Result<ExecuteResponse, OrchestratorError> {
        // Step 1: idempotency admission.
        let request_digest = canonical_digest(&(&mandate.audit_hash, idempotency_key));
        match self
            .registry
            .idempotency
            .begin(
                scope,
                idempotency_key,
                &request_digest,
                self.config.idempotency_ttl,
            )
            .await
        {
            Ok(BeginOutcome::Fresh) => {}
            Ok(BeginOutcome::InFlight) => {
                return Ok(ExecuteResponse {
                    status: ExecuteStatus::DuplicateInFlight,
                    payment_id: None,
                    tx_ref: None,
                    reason_code: Some(ReasonCode::IdempotencyDuplicateInFlight),
                    reason: Some("an identical request is in flight".to_string()),
                    decision: None,
                    approval_id: None,
                })
            }
            Ok(BeginOutcome::Completed(record)) | Ok(BeginOutcome::Failed(record)) => {
                let replay = record
                    .result
                    .ok_or_else(|| {
                        OrchestratorError::Serialization("prior result missing".to_string())
                    })
                    .and_then(|value| {
                        serde_json::from_value::<ExecuteResponse>(value)
                            .map_err(|e| OrchestratorError::Serialization(e.to_string()))
                    })?;
                return Ok(replay);
            }
            Err(IdempotencyError::DigestConflict { .. }) => {
                return Ok(ExecuteResponse::refused(
                    ReasonCode::IdempotencyConflict,
                    "idempotency key reused with a different request",
                ))
            }
            Err(err) => return Err(err.into()),
        }

        // Everything past admission runs under the total deadline; on
        // expiry the in-flight record converts to a timeout outcome.
        match tokio::time::timeout(
            self.config.total_deadline,
            self.execute_admitted(scope, mandate, idempotency_key, hint),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => {
                let response = ExecuteResponse::refused(
                    ReasonCode::PaymentTimeout,
                    "orchestrator deadline exceeded",
                );
                self.append_ledger(
                    &mandate.org_id,
                    EntryKind::PaymentTimeout,
                    json!({ "mandate_id": mandate.mandate_id, "idempotency_key": idempotency_key }),
                )
                .await?;
                self.finish_idempotency(scope, idempotency_key, &response, true)
                    .await?;
                Ok(response)
            }
        }
    }

    async fn execute_admitted(
        &self,
        scope: &str,
        mandate: &Mandate,
        idempotency_key: &str,
        hint: Option<&SpendHint>,
    ) -> Result<ExecuteResponse, OrchestratorError> {
        // Backpressure precedes policy; a refused request does not burn the
        // idempotency key.
        if !self.registry.limiter.admit(&mandate.agent_id) {
            self.registry.idempotency.release(scope, idempotency_key).await;
            self.registry.metrics.incr("orchestrator.rate_limited");
            return Ok(ExecuteResponse::refused(
                ReasonCode::PaymentRateLimited,
                "agent request rate exceeded",
            ));
        }

        // Operator guardrail over the whole pipeline.
        if !self.registry.guardrails.is_enabled("payments.execute") {
            self.registry.idempotency.release(scope, idempotency_key).await;
            return Ok(ExecuteResponse::refused(
                ReasonCode::PaymentContainment,
                "payments.execute guardrail is disabled",
            ));
        }

        // Operational failover gate.
        let permit = self.registry.failover.permit(mandate.rail);
        if permit == ModePermit::Denied {
            self.registry.idempotency.release(scope, idempotency_key).await;
            return Ok(ExecuteResponse::refused(
                ReasonCode::PaymentContainment,
                "new executions are disabled in the current operating mode",
            ));
        }

        // Audit must be durable before any money moves.
        {
            let ledger = self.registry.ledger.lock().await;
            if ledger.is_degraded() {
                drop(ledger);
                self.registry.idempotency.release(scope, idempotency_key).await;
                return Ok(ExecuteResponse::refused(
                    ReasonCode::Internal,
                    "audit store degraded; refusing new payments",
                ));
            }
        }

        // Step 2: the mandate must verify against its content address.
        if !mandate.verify_hash() {
            self.registry.idempotency.release(scope, idempotency_key).await;
            return Ok(ExecuteResponse::refused(
                ReasonCode::PolicyCheckFailed,
                "mandate audit hash does not verify",
            ));
        }

        // Step 3: policy decision against the pinned snapshot.
        let snapshot = {
            let snapshots = self.snapshots.lock().await;
            snapshots
                .get(&mandate.org_id)
                .cloned()
                .ok_or_else(|| OrchestratorError::NoPolicySnapshot(mandate.org_id.to_string()))?
        };
        let mut ctx = self.registry.context_source.eval_context(mandate);
        ctx.wallet.kill_switched = ctx.wallet.kill_switched
            || self.registry.killswitch.is_halted(&mandate.subject_wallet);

        let decision = self.registry.policy.evaluate(mandate, &snapshot, &ctx, hint);
        self.append_ledger(
            &mandate.org_id,
            EntryKind::PolicyDecision,
            json!({
                "mandate_id": mandate.mandate_id,
                "decision_id": decision.decision_id,
                "outcome": decision.outcome,
                "reason_code": decision.reason_code,
                "risk_score": decision.risk_score,
                "policy_revision": decision.policy_revision,
            }),
        )
        .await?;
        if decision
            .checks
            .iter()
            .any(|check| check.name == "policy.nl_overreach")
        {
            self.append_ledger(
                &mandate.org_id,
                EntryKind::PolicyNlOverreach,
                json!({ "mandate_id": mandate.mandate_id, "decision_id": decision.decision_id }),
            )
            .await?;
        }

        match decision.outcome {
            PolicyOutcome::Blocked => {
                self.append_ledger(
                    &mandate.org_id,
                    EntryKind::PaymentBlocked,
                    json!({
                        "mandate_id": mandate.mandate_id,
                        "decision_id": decision.decision_id,
                        "reason_code": decision.reason_code,
                    }),
                )
                .await?;
                let response = ExecuteResponse {
                    status: ExecuteStatus::Blocked,
                    payment_id: None,
                    tx_ref: None,
                    reason_code: decision.reason_code,
                    reason: Some(decision.reason.clone()),
                    decision: Some(decision),
                    approval_id: None,
                };
                self.finish_idempotency(scope, idempotency_key, &response, false)
                    .await?;
                Ok(response)
            }
            PolicyOutcome::RequiresApproval => {
                self.gate_on_approval(
                    scope,
                    mandate,
                    idempotency_key,
                    decision.approval_template.clone(),
                    decision,
                )
                .await
            }
            PolicyOutcome::Approved => {
                // Degraded mode forces approval even for policy-clean
                // payments.
                if permit == ModePermit::AllowedWithApproval {
                    return self
                        .gate_on_approval(scope, mandate, idempotency_key, None, decision)
                        .await;
                }
                self.dispatch(scope, mandate, idempotency_key, decision).await
            }
        }
    }

    /// Steps 4/5 boundary: park the execution on an approval, or resume past
    /// it when the approval has resolved positively.
    async fn gate_on_approval(
        &self,
        scope: &str,
        mandate: &Mandate,
        idempotency_key: &str,
        template: Option<ApprovalTemplate>,
        decision: PolicyDecision,
    ) -> Result<ExecuteResponse, OrchestratorError> {
        let existing = self
            .registry
            .approvals
            .find_by_subject(&mandate.org_id, &mandate.audit_hash)
            .await;

        if let Some(approval) = &existing {
            match approval.status {
                ApprovalStatus::Approved => {
                    return self.dispatch(scope, mandate, idempotency_key, decision).await;
                }
                ApprovalStatus::Pending => {
                    self.registry.idempotency.release(scope, idempotency_key).await;
                    return Ok(ExecuteResponse {
                        status: ExecuteStatus::AwaitingApproval,
                        payment_id: None,
                        tx_ref: None,
                        reason_code: Some(ReasonCode::PolicyApprovalRequired),
                        reason: Some("approval pending".to_string()),
                        decision: Some(decision),
                        approval_id: Some(approval.approval_id.clone()),
                    });
                }
                ApprovalStatus::Denied => {
                    self.append_ledger(
                        &mandate.org_id,
                        EntryKind::PaymentBlocked,
                        json!({
                            "mandate_id": mandate.mandate_id,
                            "approval_id": approval.approval_id,
                            "reason_code": ReasonCode::PolicyApprovalRequired,
                        }),
                    )
                    .await?;
                    let response = ExecuteResponse {
                        status: ExecuteStatus::Blocked,
                        payment_id: None,
                        tx_ref: None,
                        reason_code: Some(ReasonCode::PolicyApprovalRequired),
                        reason: Some("approval was denied".to_string()),
                        decision: Some(decision),
                        approval_id: Some(approval.approval_id.clone()),
                    };
                    self.finish_idempotency(scope, idempotency_key, &response, false)
                        .await?;
                    return Ok(response);
                }
                ApprovalStatus::Expired | ApprovalStatus::Cancelled => {
                    // Fall through and open a fresh request.
                }
            }
        }

        let template = template.unwrap_or(ApprovalTemplate {
            action: "payment.execute".to_string(),
            subject_digest: mandate.audit_hash.clone(),
            min_reviewers: 1,
            ttl_secs: self.config.approval_ttl.num_seconds().max(60) as u64,
        });
        let approval = self
            .registry
            .approvals
            .create(
                mandate.org_id.clone(),
                &template.action,
                &template.subject_digest,
                template.min_reviewers,
                chrono::Duration::seconds(template.ttl_secs as i64),
            )
            .await?;
        self.append_ledger(
            &mandate.org_id,
            EntryKind::PaymentAwaitingApproval,
            json!({
                "mandate_id": mandate.mandate_id,
                "approval_id": approval.approval_id,
                "min_reviewers": template.min_reviewers,
            }),
        )
        .await?;
        self.registry.idempotency.release(scope, idempotency_key).await;
        Ok(ExecuteResponse {
            status: ExecuteStatus::AwaitingApproval,
            payment_id: None,
            tx_ref: None,
            reason_code: Some(ReasonCode::PolicyApprovalRequired),
            reason: Some("approval required".to_string()),
            decision: Some(decision),
            approval_id: Some(approval.approval_id),
        })
    }

    /// Steps 5-7: resolve a route, walk it once, anchor the outcome.
    async fn dispatch(
        &self,
        scope: &str,
        mandate: &Mandate,
        idempotency_key: &str,
        decision: PolicyDecision,
    ) -> Result<ExecuteResponse, OrchestratorError> {
        let tier = risk_tier(decision.risk_score);
        let plan = match self.registry.matrix.resolve(
            &mandate.org_id,
            mandate.rail,
            &mandate.amount.currency,
            tier,
        ) {
            Ok(plan) => plan,
            Err(err) => {
                let response = ExecuteResponse {
                    status: ExecuteStatus::Failed,
                    payment_id: None,
                    tx_ref: None,
                    reason_code: Some(ReasonCode::ProviderAllFailed),
                    reason: Some(err.to_string()),
                    decision: Some(decision),
                    approval_id: None,
                };
                self.finish_idempotency(scope, idempotency_key, &response, true)
                    .await?;
                return Ok(response);
            }
        };

        let mut payment = PaymentRecord::new(
            mandate.org_id.clone(),
            mandate.mandate_id.clone(),
            mandate.subject_wallet.clone(),
            mandate.rail,
            direction_for_scope(scope),
            mandate.amount.clone(),
            idempotency_key,
        );
        let payment_id = payment.payment_id.clone();

        let request = SubmitRequest {
            payment_id: payment_id.clone(),
            org_id: mandate.org_id.clone(),
            mandate_id: mandate.mandate_id.clone(),
            rail: mandate.rail,
            direction: payment.direction,
            amount: mandate.amount.clone(),
            destination: mandate.destination.clone(),
            metadata: Default::default(),
        };

        match self.registry.fleet.submit_with_failover(&plan, &request).await {
            FleetOutcome::Accepted {
                adapter,
                provider_ref,
                after_failover,
                attempts,
            } => {
                payment.provider_key = Some(adapter.clone());
                payment.provider_ref = Some(provider_ref.clone());
                let entry = self
                    .append_ledger(
                        &mandate.org_id,
                        EntryKind::PaymentSubmitted,
                        json!({
                            "payment_id": payment_id,
                            "mandate_id": mandate.mandate_id,
                            "adapter": adapter,
                            "provider_ref": provider_ref,
                            "after_failover": after_failover,
                            "attempts": attempts,
                        }),
                    )
                    .await?;
                {
                    let mut recon = self.registry.recon.lock().await;
                    recon.observe(
                        &payment_id,
                        mandate.rail,
                        ViewSource::Orchestrator,
                        &payment.status.label(),
                        false,
                        Some(entry.ltx_id.clone()),
                        Utc::now(),
                    )?;
                }
                {
                    let mut payments = self.payments.lock().await;
                    payments.insert(payment_id.clone(), payment);
                }
                info!(payment = %payment_id, adapter, "payment submitted");
                let response = ExecuteResponse {
                    status: ExecuteStatus::Submitted,
                    payment_id: Some(payment_id),
                    tx_ref: Some(provider_ref),
                    reason_code: None,
                    reason: None,
                    decision: Some(decision),
                    approval_id: None,
                };
                self.finish_idempotency(scope, idempotency_key, &response, false)
                    .await?;
                Ok(response)
            }
            FleetOutcome::Fatal {
                adapter,
                message,
                attempts,
            } => {
                apply_event(&mut payment, &declined_event(mandate.rail))?;
                let entry = self
                    .append_ledger(
                        &mandate.org_id,
                        EntryKind::PaymentFailed,
                        json!({
                            "payment_id": payment_id,
                            "adapter": adapter,
                            "reason_code": ReasonCode::ProviderFatal,
                            "message": message,
                            "attempts": attempts,
                        }),
                    )
                    .await?;
                {
                    let mut recon = self.registry.recon.lock().await;
                    recon.observe(
                        &payment_id,
                        mandate.rail,
                        ViewSource::Orchestrator,
                        &payment.status.label(),
                        true,
                        Some(entry.ltx_id.clone()),
                        Utc::now(),
                    )?;
                }
                {
                    let mut payments = self.payments.lock().await;
                    payments.insert(payment_id.clone(), payment);
                }
                let response = ExecuteResponse {
                    status: ExecuteStatus::Failed,
                    payment_id: Some(payment_id),
                    tx_ref: None,
                    reason_code: Some(ReasonCode::ProviderFatal),
                    reason: Some(message),
                    decision: Some(decision),
                    approval_id: None,
                };
                self.finish_idempotency(scope, idempotency_key, &response, false)
                    .await?;
                Ok(response)
            }
            FleetOutcome::AllFailed { attempts } => {
                warn!(payment = %payment_id, "all providers failed");
                self.append_ledger(
                    &mandate.org_id,
                    EntryKind::PaymentFailed,
                    json!({
                        "payment_id": payment_id,
                        "reason_code": ReasonCode::ProviderAllFailed,
                        "attempts": attempts,
                    }),
                )
                .await?;
                // The payment stays in its pre-submit state; a retry needs a
                // fresh idempotency key.
                {
                    let mut payments = self.payments.lock().await;
                    payments.insert(payment_id.clone(), payment);
                }
                let response = ExecuteResponse {
                    status: ExecuteStatus::Failed,
                    payment_id: Some(payment_id),
                    tx_ref: None,
                    reason_code: Some(ReasonCode::ProviderAllFailed),
                    reason: Some("every adapter on the route failed".to_string()),
                    decision: Some(decision),
                    approval_id: None,
                };
                self.finish_idempotency(scope, idempotency_key, &response, true)
                    .await?;
                Ok(response)
            }
        }
    }

    /// Cancellation after dispatch: provider-specific voiding where
    /// supported, otherwise refused.
    pub async fn cancel(&self, payment_id: &PaymentId) -> Result<CancelOutcome, OrchestratorError> {
        let _guard = self
            .payment_locks
            .acquire(payment_id.to_string(), self.config.lock_timeout)
            .await?;

        let mut payments = self.payments.lock().await;
        let payment = payments
            .get_mut(payment_id)
            .ok_or_else(|| OrchestratorError::PaymentNotFound(payment_id.to_string()))?;

        if payment.is_terminal() {
            return Ok(CancelOutcome::Refused {
                reason_code: ReasonCode::PaymentTerminalInflight,
                reason: "payment already terminal".to_string(),
            });
        }

        if let (Some(adapter), Some(provider_ref)) =
            (payment.provider_key.clone(), payment.provider_ref.clone())
        {
            match self.registry.fleet.void(&adapter, &provider_ref).await? {
                VoidOutcome::Voided => {}
                VoidOutcome::Unsupported => {
                    return Ok(CancelOutcome::Refused {
                        reason_code: ReasonCode::PaymentTerminalInflight,
                        reason: "provider cannot void this payment".to_string(),
                    });
                }
            }
        }

        let rail = payment.rail;
        apply_event(payment, &voided_event(rail))?;
        let org_id = payment.org_id.clone();
        let status_label = payment.status.label();
        drop(payments);

        let entry = self
            .append_ledger(
                &org_id,
                EntryKind::PaymentCancelled,
                json!({ "payment_id": payment_id }),
            )
            .await?;
        let mut recon = self.registry.recon.lock().await;
        recon.observe(
            payment_id,
            rail,
            ViewSource::Orchestrator,
            &status_label,
            true,
            Some(entry.ltx_id),
            Utc::now(),
        )?;
        Ok(CancelOutcome::Cancelled {
            payment_id: payment_id.clone(),
        })
    }

    /// Asynchronous path: apply one normalized provider event under the
    /// per-payment lock. Duplicate terminal deliveries acknowledge without
    /// state change; invalid transitions are audited and rejected.
    pub async fn apply_provider_event(
        &self,
        normalized: &NormalizedEvent,
    ) -> Result<sardis_lifecycle::TransitionOutcome, OrchestratorError> {
        let _guard = self
            .payment_locks
            .acquire(normalized.payment_id.to_string(), self.config.lock_timeout)
            .await?;

        let mut payments = self.payments.lock().await;
        let payment = payments
            .get_mut(&normalized.payment_id)
            .ok_or_else(|| OrchestratorError::PaymentNotFound(normalized.payment_id.to_string()))?;
        let from = payment.status.label();
        let settled_before = payment.amount_settled.amount_minor;

        let outcome = match apply_event(payment, &normalized.event) {
            Ok(outcome) => outcome,
            Err(err @ LifecycleError::InvalidTransition { .. }) => {
                let org_id = payment.org_id.clone();
                drop(payments);
                self.append_ledger(
                    &org_id,
                    EntryKind::PolicyInvalidTransition,
                    json!({
                        "payment_id": normalized.payment_id,
                        "from": from,
                        "event": normalized.event.name(),
                        "provider": normalized.provider,
                        "external_id": normalized.external_id,
                    }),
                )
                .await?;
                return Err(err.into());
            }
            Err(err) => return Err(err.into()),
        };

        if !outcome.changed {
            return Ok(outcome);
        }

        payment.record_event(normalized.event_id.clone());
        let org_id = payment.org_id.clone();
        let rail = payment.rail;
        let wallet = payment.wallet_id.clone();
        let direction = payment.direction;
        let status_label = payment.status.label();
        let terminal = payment.is_terminal();
        let settled_delta = payment.amount_settled.amount_minor - settled_before;
        let external_account = payment.external_account.clone();
        drop(payments);

        let entry = self
            .append_ledger(
                &org_id,
                EntryKind::PaymentTransition,
                json!({
                    "payment_id": normalized.payment_id,
                    "from": from,
                    "to": status_label,
                    "event": normalized.event.name(),
                    "provider": normalized.provider,
                    "external_id": normalized.external_id,
                    "retry_scheduled": outcome.retry_scheduled,
                    "pause_external_account": outcome.pause_external_account,
                    "manual_review": outcome.manual_review,
                }),
            )
            .await?;

        {
            let mut recon = self.registry.recon.lock().await;
            recon.observe(
                &normalized.payment_id,
                rail,
                ViewSource::Provider,
                &status_label,
                terminal,
                Some(entry.ltx_id),
                normalized.received_at,
            )?;
        }

        if settled_delta > 0 {
            let mut balances = self.balances.lock().await;
            let balance = balances.entry(wallet).or_insert(0);
            match direction {
                sardis_types::Direction::Credit => *balance += settled_delta,
                sardis_types::Direction::Debit => *balance -= settled_delta,
            }
        }

        if outcome.pause_external_account {
            if let Some(account) = external_account {
                warn!(account = %account, "external bank account paused by return code");
                let mut paused = self.paused_accounts.lock().await;
                paused.insert(account);
            }
        }
        if outcome.retry_scheduled {
            self.registry.metrics.incr("ach.retry_scheduled");
        }
        if outcome.manual_review {
            self.registry.metrics.incr("ach.manual_review");
        }

        Ok(outcome)
    }

    /// Attach the counterparty bank account to a payment so return codes can
    /// pause it.
    pub async fn set_external_account(
        &self,
        payment_id: &PaymentId,
        account: ExternalBankAccountId,
    ) -> Result<(), OrchestratorError> {
        let mut payments = self.payments.lock().await;
        let payment = payments
            .get_mut(payment_id)
            .ok_or_else(|| OrchestratorError::PaymentNotFound(payment_id.to_string()))?;
        payment.external_account = Some(account);
        Ok(())
    }

    /// Operator kill switch; flips synchronously and is read on entry.
    pub async fn set_kill_switch(
        &self,
        org_id: &OrgId,
        wallet: &WalletId,
        halted: bool,
        operator: &str,
    ) -> Result<(), OrchestratorError> {
        if halted {
            self.registry.killswitch.halt(wallet);
        } else {
            self.registry.killswitch.resume(wallet);
        }
        self.append_ledger(
            org_id,
            EntryKind::WalletKillSwitch,
            json!({ "wallet_id": wallet, "halted": halted, "operator": operator }),
        )
        .await?;
        Ok(())
    }

    async fn append_ledger(
        &self,
        org_id: &OrgId,
        kind: EntryKind,
        payload: serde_json::Value,
    ) -> Result<sardis_ledger::LedgerEntry, OrchestratorError> {
        let mut ledger = self.registry.ledger.lock().await;
        Ok(ledger.append(org_id, kind, payload).await?)
    }

    async fn finish_idempotency(
        &self,
        scope: &str,
        key: &str,
        response: &ExecuteResponse,
        failed: bool,
    ) -> Result<(), OrchestratorError> {
        let value = serde_json::to_value(response)
            .map_err(|e| OrchestratorError::Serialization(e.to_string()))?;
        let digest = canonical_digest(&value);
        let result = if failed {
            self.registry
                .idempotency
                .fail(scope, key, digest, value)
                .await
        } else {
            self.registry
                .idempotency
                .complete(scope, key, digest, value)
                .await
        };
        match result {
            Ok(()) => Ok(()),
            // The deadline path may race a completed inner pipeline.
            Err(IdempotencyError::NotInFlight { .. }) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

fn risk_tier(risk_score: u8) -> RiskTier {
    match risk_score {
        0..=29 => RiskTier::Low,
        30..=69 => RiskTier::Standard,
        _ => RiskTier::High,
    }
}

fn declined_event(rail: sardis_types::Rail) -> RailEvent {
    match rail {
        sardis_types::Rail::Ach => RailEvent::Ach(AchEvent::Declined),
        sardis_types::Rail::Card => RailEvent::Card(CardEvent::Declined),
        sardis_types::Rail::OnChain | sardis_types::Rail::Stablecoin => {
            RailEvent::Chain(ChainEvent::Failed)
        }
    }
}

fn voided_event(rail: sardis_types::Rail) -> RailEvent {
    match rail {
        sardis_types::Rail::Ach => RailEvent::Ach(AchEvent::Voided),
        sardis_types::Rail::Card => RailEvent::Card(CardEvent::Expired),
        sardis_types::Rail::OnChain | sardis_types::Rail::Stablecoin => {
            RailEvent::Chain(ChainEvent::Failed)
        }
    }
}

fn direction_for_scope(scope: &str) -> sardis_types::Direction {
    if scope.ends_with(".fund") {
        sardis_types::Direction::Credit
    } else {
        sardis_types::Direction::Debit
    }
}
