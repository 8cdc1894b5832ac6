use crate::{ApiError, ServiceState, API_VERSION};
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Duration, Utc};
use sardis_approvals::{ApprovalRequest, ReviewOutcome};
use sardis_ledger::{EntryKind, EvidenceBundle, EvidencePage, ExportWindow, LedgerEntry};
use sardis_lifecycle::PaymentRecord;
use sardis_observability::FailoverMode;
use sardis_orchestrator::{CancelOutcome, ExecuteResponse, Hold, OrchestratorError, TreasuryBalances};
use sardis_policy::{HardCaps, PolicySnapshot, RuleSet, SpendHint};
use sardis_recon::DriftBreak;
use sardis_types::{
    AgentId, ApprovalId, CurrencyCode, ExternalBankAccountId, HoldId, LedgerEntryId, Mandate,
    MandateDraft, Money, OrgId, PaymentId, Rail, ReasonCode, WalletId,
};
use sardis_webhooks::IngressOutcome;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;

fn parse<T>(result: Result<T, sardis_types::TypeError>) -> Result<T, ApiError> {
    result.map_err(|err| ApiError::bad_request(err.to_string()))
}

// ---------------------------------------------------------------------------
// Health

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub api_version: &'static str,
    pub failover_mode: sardis_observability::FailoverMode,
}

pub async fn health(State(state): State<ServiceState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: "sardis",
        api_version: API_VERSION,
        failover_mode: state.orchestrator.registry().failover.mode(),
    })
}

// ---------------------------------------------------------------------------
// Payments

#[derive(Debug, Deserialize)]
pub struct MandateRequest {
    pub agent_id: String,
    pub org_id: String,
    pub subject_wallet: String,
    pub destination: String,
    pub amount_minor: i64,
    pub currency: String,
    pub rail: Rail,
    pub purpose: String,
}

impl MandateRequest {
    fn seal(self) -> Result<Mandate, ApiError> {
        let amount = parse(
            CurrencyCode::new(self.currency).and_then(|c| Money::new(self.amount_minor, c)),
        )?;
        MandateDraft::new(
            parse(AgentId::parse(self.agent_id))?,
            parse(OrgId::parse(self.org_id))?,
            parse(WalletId::parse(self.subject_wallet))?,
            self.destination,
            amount,
            self.rail,
            self.purpose,
        )
        .seal(Utc::now())
        .map_err(|err| ApiError::bad_request(err.to_string()))
    }
}

#[derive(Debug, Deserialize)]
pub struct ExecuteRequest {
    pub mandate: MandateRequest,
    pub idempotency_key: String,
    pub hint: Option<SpendHint>,
}

pub async fn execute_payment(
    State(state): State<ServiceState>,
    Json(request): Json<ExecuteRequest>,
) -> Result<Json<ExecuteResponse>, ApiError> {
    if request.idempotency_key.trim().is_empty() {
        return Err(ApiError::bad_request("idempotency_key is required"));
    }
    let mandate = request.mandate.seal()?;
    let response = state
        .orchestrator
        .execute(&mandate, &request.idempotency_key, request.hint.as_ref())
        .await?;
    Ok(Json(response))
}

pub async fn get_payment(
    State(state): State<ServiceState>,
    Path(id): Path<String>,
) -> Result<Json<PaymentRecord>, ApiError> {
    let payment_id = parse(PaymentId::parse(id))?;
    state
        .orchestrator
        .payment(&payment_id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("payment '{payment_id}' not found")))
}

pub async fn cancel_payment(
    State(state): State<ServiceState>,
    Path(id): Path<String>,
) -> Result<Json<CancelOutcome>, ApiError> {
    let payment_id = parse(PaymentId::parse(id))?;
    Ok(Json(state.orchestrator.cancel(&payment_id).await?))
}

// ---------------------------------------------------------------------------
// Ledger

pub async fn get_ledger_entry(
    State(state): State<ServiceState>,
    Path(ltx_id): Path<String>,
) -> Result<Json<LedgerEntry>, ApiError> {
    let ltx_id = parse(LedgerEntryId::parse(ltx_id))?;
    let ledger = state.ledger.lock().await;
    ledger
        .get(&ltx_id)
        .cloned()
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("ledger entry '{ltx_id}' not found")))
}

pub async fn verify_ledger_entry(
    State(state): State<ServiceState>,
    Path(ltx_id): Path<String>,
) -> Result<Json<sardis_ledger::VerificationReport>, ApiError> {
    let ltx_id = parse(LedgerEntryId::parse(ltx_id))?;
    let ledger = state.ledger.lock().await;
    Ok(Json(ledger.ledger().verify(&ltx_id)?))
}

// ---------------------------------------------------------------------------
// Holds

#[derive(Debug, Deserialize)]
pub struct CreateHoldRequest {
    pub org_id: String,
    pub wallet_id: String,
    pub amount_minor: i64,
    pub currency: String,
    pub ttl_secs: i64,
}

pub async fn create_hold(
    State(state): State<ServiceState>,
    Json(request): Json<CreateHoldRequest>,
) -> Result<Json<Hold>, ApiError> {
    let amount = parse(
        CurrencyCode::new(request.currency).and_then(|c| Money::new(request.amount_minor, c)),
    )?;
    let hold = state
        .holds
        .create(
            parse(OrgId::parse(request.org_id))?,
            parse(WalletId::parse(request.wallet_id))?,
            amount,
            Duration::seconds(request.ttl_secs.max(1)),
        )
        .await?;
    Ok(Json(hold))
}

#[derive(Debug, Deserialize)]
pub struct CaptureHoldRequest {
    pub amount_minor: Option<i64>,
    pub currency: Option<String>,
}

pub async fn capture_hold(
    State(state): State<ServiceState>,
    Path(id): Path<String>,
    Json(request): Json<CaptureHoldRequest>,
) -> Result<Json<Hold>, ApiError> {
    let hold_id = parse(HoldId::parse(id))?;
    let amount = match (request.amount_minor, request.currency) {
        (Some(amount_minor), Some(currency)) => Some(parse(
            CurrencyCode::new(currency).and_then(|c| Money::new(amount_minor, c)),
        )?),
        (None, None) => None,
        _ => {
            return Err(ApiError::bad_request(
                "partial capture requires both amount_minor and currency",
            ))
        }
    };
    Ok(Json(state.holds.capture(&hold_id, amount).await?))
}

pub async fn void_hold(
    State(state): State<ServiceState>,
    Path(id): Path<String>,
) -> Result<Json<Hold>, ApiError> {
    let hold_id = parse(HoldId::parse(id))?;
    Ok(Json(state.holds.void(&hold_id).await?))
}

// ---------------------------------------------------------------------------
// Approvals & trust

#[derive(Debug, Deserialize)]
pub struct CreateApprovalRequest {
    pub org_id: String,
    pub action: String,
    pub subject_digest: String,
    pub min_reviewers: u8,
    pub ttl_secs: i64,
}

pub async fn create_approval(
    State(state): State<ServiceState>,
    Json(request): Json<CreateApprovalRequest>,
) -> Result<Json<ApprovalRequest>, ApiError> {
    let approval = state
        .orchestrator
        .registry()
        .approvals
        .create(
            parse(OrgId::parse(request.org_id))?,
            &request.action,
            &request.subject_digest,
            request.min_reviewers,
            Duration::seconds(request.ttl_secs.max(1)),
        )
        .await?;
    Ok(Json(approval))
}

#[derive(Debug, Deserialize)]
pub struct DecideApprovalRequest {
    pub reviewer_id: String,
    pub outcome: ReviewOutcome,
}

pub async fn decide_approval(
    State(state): State<ServiceState>,
    Path(id): Path<String>,
    Json(request): Json<DecideApprovalRequest>,
) -> Result<Json<ApprovalRequest>, ApiError> {
    let approval_id = parse(ApprovalId::parse(id))?;
    Ok(Json(
        state
            .orchestrator
            .registry()
            .approvals
            .decide(&approval_id, &request.reviewer_id, request.outcome)
            .await?,
    ))
}

pub async fn approval_status(
    State(state): State<ServiceState>,
    Path(id): Path<String>,
) -> Result<Json<ApprovalRequest>, ApiError> {
    let approval_id = parse(ApprovalId::parse(id))?;
    Ok(Json(
        state
            .orchestrator
            .registry()
            .approvals
            .status(&approval_id)
            .await?,
    ))
}

#[derive(Debug, Deserialize)]
pub struct GrantTrustRequest {
    pub org_id: String,
    pub sender_agent: String,
    pub recipient_agent: String,
    pub created_by: String,
    pub approval_id: String,
}

pub async fn grant_trust(
    State(state): State<ServiceState>,
    Json(request): Json<GrantTrustRequest>,
) -> Result<Json<sardis_approvals::TrustRelation>, ApiError> {
    let approval_id = parse(ApprovalId::parse(request.approval_id))?;
    let approval = state
        .orchestrator
        .registry()
        .approvals
        .status(&approval_id)
        .await?;
    let relation = state
        .trust
        .grant(
            parse(OrgId::parse(request.org_id))?,
            parse(AgentId::parse(request.sender_agent))?,
            parse(AgentId::parse(request.recipient_agent))?,
            &request.created_by,
            &approval,
        )
        .await?;
    Ok(Json(relation))
}

// ---------------------------------------------------------------------------
// Treasury

#[derive(Debug, Deserialize)]
pub struct TreasuryMoveRequest {
    pub org_id: String,
    pub wallet_id: String,
    pub external_account_id: String,
    pub amount_minor: i64,
    pub currency: String,
    pub idempotency_key: String,
}

pub async fn treasury_fund(
    State(state): State<ServiceState>,
    Json(request): Json<TreasuryMoveRequest>,
) -> Result<Json<ExecuteResponse>, ApiError> {
    let amount = parse(
        CurrencyCode::new(request.currency).and_then(|c| Money::new(request.amount_minor, c)),
    )?;
    let response = state
        .treasury
        .fund(
            parse(OrgId::parse(request.org_id))?,
            parse(WalletId::parse(request.wallet_id))?,
            &parse(ExternalBankAccountId::parse(request.external_account_id))?,
            amount,
            &request.idempotency_key,
        )
        .await?;
    Ok(Json(response))
}

pub async fn treasury_withdraw(
    State(state): State<ServiceState>,
    Json(request): Json<TreasuryMoveRequest>,
) -> Result<Json<ExecuteResponse>, ApiError> {
    let amount = parse(
        CurrencyCode::new(request.currency).and_then(|c| Money::new(request.amount_minor, c)),
    )?;
    let response = state
        .treasury
        .withdraw(
            parse(OrgId::parse(request.org_id))?,
            parse(WalletId::parse(request.wallet_id))?,
            &parse(ExternalBankAccountId::parse(request.external_account_id))?,
            amount,
            &request.idempotency_key,
        )
        .await?;
    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
pub struct BalancesQuery {
    pub wallet_id: String,
}

pub async fn treasury_balances(
    State(state): State<ServiceState>,
    Query(query): Query<BalancesQuery>,
) -> Result<Json<TreasuryBalances>, ApiError> {
    let wallet_id = parse(WalletId::parse(query.wallet_id))?;
    Ok(Json(state.treasury.balances(&wallet_id).await))
}

// ---------------------------------------------------------------------------
// Webhooks

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub status: &'static str,
}

/// Raw-body webhook ingress. Responds 2xx only once the event is persisted
/// under its single-flight lock; signature, timestamp, and replay failures
/// map to 401/409 as the contract requires.
pub async fn ingest_webhook(
    State(state): State<ServiceState>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(signature) = headers.get("x-signature").and_then(|v| v.to_str().ok()) else {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "reason_code": ReasonCode::WebhookSignatureInvalid, "reason": "missing signature header" })),
        )
            .into_response();
    };

    match state
        .ingress
        .ingest(&provider, signature, &body, Utc::now())
        .await
    {
        Ok(IngressOutcome::Admitted {
            normalized, guard, ..
        }) => {
            let applied = state.orchestrator.apply_provider_event(&normalized).await;
            match applied {
                Ok(_) => {
                    state
                        .ingress
                        .mark_processed(&normalized.provider, &normalized.external_id);
                    drop(guard);
                    (StatusCode::OK, Json(WebhookAck { status: "processed" })).into_response()
                }
                Err(OrchestratorError::Lifecycle(_)) => {
                    // Invalid transition: audited by the orchestrator, the
                    // event is consumed, state is unchanged.
                    state
                        .ingress
                        .mark_processed(&normalized.provider, &normalized.external_id);
                    drop(guard);
                    (StatusCode::OK, Json(WebhookAck { status: "ignored" })).into_response()
                }
                Err(OrchestratorError::PaymentNotFound(_)) => {
                    // Left unmarked so a redelivery can apply once the
                    // payment exists.
                    drop(guard);
                    (StatusCode::OK, Json(WebhookAck { status: "deferred" })).into_response()
                }
                Err(err) => {
                    drop(guard);
                    ApiError::from(err).into_response()
                }
            }
        }
        Ok(IngressOutcome::DuplicateSuppressed) => {
            (StatusCode::OK, Json(WebhookAck { status: "duplicate" })).into_response()
        }
        Ok(IngressOutcome::Suspicious {
            external_id,
            payment_id,
        }) => {
            if let Some(payment) = state.orchestrator.payment(&payment_id).await {
                let mut ledger = state.ledger.lock().await;
                let _ = ledger
                    .append(
                        &payment.org_id,
                        EntryKind::WebhookSuspicious,
                        json!({
                            "provider": provider,
                            "external_id": external_id,
                            "payment_id": payment_id,
                        }),
                    )
                    .await;
            }
            warn!(provider, external_id, "suspicious webhook refused");
            (
                StatusCode::CONFLICT,
                Json(json!({
                    "reason_code": ReasonCode::WebhookReplaySuspicious,
                    "reason": "event id replayed with a different body",
                })),
            )
                .into_response()
        }
        Err(err) => {
            let (status, reason_code) = match &err {
                sardis_webhooks::WebhookError::SignatureMismatch
                | sardis_webhooks::WebhookError::MalformedSignatureHeader
                | sardis_webhooks::WebhookError::UnknownProvider(_) => {
                    (StatusCode::UNAUTHORIZED, ReasonCode::WebhookSignatureInvalid)
                }
                sardis_webhooks::WebhookError::StaleTimestamp { .. } => {
                    (StatusCode::UNAUTHORIZED, ReasonCode::WebhookStaleTimestamp)
                }
                sardis_webhooks::WebhookError::MalformedBody(_)
                | sardis_webhooks::WebhookError::UnknownEventType { .. } => {
                    (StatusCode::BAD_REQUEST, ReasonCode::Internal)
                }
                sardis_webhooks::WebhookError::SuspiciousReplay(_) => {
                    (StatusCode::CONFLICT, ReasonCode::WebhookReplaySuspicious)
                }
                sardis_webhooks::WebhookError::LockBusy(_) => {
                    (StatusCode::SERVICE_UNAVAILABLE, ReasonCode::Internal)
                }
                sardis_webhooks::WebhookError::AdmissionExceeded(_) => {
                    (StatusCode::TOO_MANY_REQUESTS, ReasonCode::PaymentRateLimited)
                }
            };
            (
                status,
                Json(json!({ "reason_code": reason_code, "reason": err.to_string() })),
            )
                .into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RotateSecretRequest {
    pub org_id: String,
    pub new_secret: Option<String>,
    #[serde(default)]
    pub revoke_previous: bool,
}

pub async fn rotate_webhook_secret(
    State(state): State<ServiceState>,
    Path(provider): Path<String>,
    Json(request): Json<RotateSecretRequest>,
) -> Result<Json<sardis_webhooks::RotationRecord>, ApiError> {
    let org_id = parse(OrgId::parse(request.org_id))?;
    let record = if request.revoke_previous {
        state.ingress.revoke_previous_secret(&provider).await
    } else {
        let new_secret = request
            .new_secret
            .ok_or_else(|| ApiError::bad_request("new_secret is required"))?;
        state.ingress.rotate_secret(&provider, &new_secret).await
    }
    .map_err(|err| ApiError::bad_request(err.to_string()))?;

    let mut ledger = state.ledger.lock().await;
    ledger
        .append(
            &org_id,
            EntryKind::WebhookSecretRotated,
            json!({
                "provider": record.provider,
                "previous_revoked": record.previous_revoked,
            }),
        )
        .await?;
    Ok(Json(record))
}

// ---------------------------------------------------------------------------
// Compliance export

#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    pub org_id: String,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub cursor: Option<String>,
    pub limit: Option<usize>,
    /// `page` (default) or `bundle`.
    pub format: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ExportResponse {
    Page(EvidencePage),
    Bundle(EvidenceBundle),
}

pub async fn compliance_export(
    State(state): State<ServiceState>,
    Query(query): Query<ExportQuery>,
) -> Result<Json<ExportResponse>, ApiError> {
    let org_id = parse(OrgId::parse(query.org_id))?;
    let window = ExportWindow {
        start: query.window_start,
        end: query.window_end,
    };
    let ledger = state.ledger.lock().await;
    match query.format.as_deref() {
        Some("bundle") => Ok(Json(ExportResponse::Bundle(
            ledger.ledger().export_bundle(&org_id, window)?,
        ))),
        None | Some("page") => Ok(Json(ExportResponse::Page(ledger.ledger().export_page(
            &org_id,
            window,
            query.cursor.as_deref(),
            query.limit.unwrap_or(100).min(1000),
        )?))),
        Some(other) => Err(ApiError::bad_request(format!(
            "invalid format '{other}'; expected page or bundle"
        ))),
    }
}

// ---------------------------------------------------------------------------
// Policy administration

#[derive(Debug, Deserialize)]
pub struct InstallPolicyRequest {
    pub policy_id: String,
    pub version: u32,
    pub rules: RuleSet,
    pub hard_caps: HardCaps,
}

#[derive(Debug, Serialize)]
pub struct InstallPolicyResponse {
    pub org_id: OrgId,
    pub policy_id: String,
    pub version: u32,
    pub revision_digest: String,
}

pub async fn install_policy(
    State(state): State<ServiceState>,
    Path(org_id): Path<String>,
    Json(request): Json<InstallPolicyRequest>,
) -> Result<Json<InstallPolicyResponse>, ApiError> {
    let org_id = parse(OrgId::parse(org_id))?;
    let snapshot = PolicySnapshot::build(
        request.policy_id.clone(),
        org_id.clone(),
        request.version,
        request.rules,
        request.hard_caps,
        state.drift_thresholds,
    )
    .map_err(|err| ApiError::bad_request(err.to_string()))?;
    let revision_digest = snapshot.revision_digest.clone();
    state.orchestrator.set_policy(snapshot).await;
    Ok(Json(InstallPolicyResponse {
        org_id,
        policy_id: request.policy_id,
        version: request.version,
        revision_digest,
    }))
}

// ---------------------------------------------------------------------------
// Reconciliation & operations

#[derive(Debug, Serialize)]
pub struct BreakQueueResponse {
    pub breaks: Vec<DriftBreak>,
}

pub async fn recon_breaks(
    State(state): State<ServiceState>,
) -> Result<Json<BreakQueueResponse>, ApiError> {
    let recon = state.recon.lock().await;
    Ok(Json(BreakQueueResponse {
        breaks: recon.break_queue(),
    }))
}

#[derive(Debug, Serialize)]
pub struct SweepResponse {
    pub approvals_expired: usize,
    pub holds_expired: usize,
    pub idempotency_swept: usize,
    pub recon_breaks_cut: usize,
    pub merkle_batches_sealed: usize,
}

/// Scheduled maintenance pass: expiry sweeps plus drift detection. Driven by
/// the background pool in `sardisd`, callable by operators directly.
pub async fn ops_sweep(State(state): State<ServiceState>) -> Result<Json<SweepResponse>, ApiError> {
    let approvals_expired = state
        .orchestrator
        .registry()
        .approvals
        .expire_sweep()
        .await?;
    let holds_expired = state.holds.expire_sweep().await?;
    let idempotency_swept = state
        .orchestrator
        .registry()
        .idempotency
        .sweep_expired()
        .await;

    let breaks = {
        let mut recon = state.recon.lock().await;
        recon.sweep(Utc::now())
    };
    for record in &breaks {
        if let Some(payment) = state.orchestrator.payment(&record.payment_id).await {
            let mut ledger = state.ledger.lock().await;
            ledger
                .append(
                    &payment.org_id,
                    EntryKind::ReconBreak,
                    json!({
                        "break_id": record.break_id,
                        "payment_id": record.payment_id,
                        "severity": record.severity,
                        "orchestrator_view": record.orchestrator_view,
                        "provider_view": record.provider_view,
                    }),
                )
                .await?;
        }
    }

    // Merkle sealing: one batch per org over entries appended since the
    // previous sweep.
    let merkle_batches_sealed = {
        let mut ledger = state.ledger.lock().await;
        let orgs = ledger.ledger().orgs();
        let mut sealed = 0;
        for org in orgs {
            if ledger.ledger_mut().seal_batch(&org).is_some() {
                sealed += 1;
            }
        }
        sealed
    };

    Ok(Json(SweepResponse {
        approvals_expired,
        holds_expired,
        idempotency_swept,
        recon_breaks_cut: breaks.len(),
        merkle_batches_sealed,
    }))
}

#[derive(Debug, Deserialize)]
pub struct AnchorRequest {
    pub org_id: String,
    pub merkle_root: String,
    /// Opaque reference into the external anchoring system.
    pub anchor_reference: String,
}

/// Record the external anchor for a sealed Merkle batch.
pub async fn anchor_batch(
    State(state): State<ServiceState>,
    Json(request): Json<AnchorRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let org_id = parse(OrgId::parse(request.org_id))?;
    let mut ledger = state.ledger.lock().await;
    ledger
        .ledger_mut()
        .anchor_batch(&org_id, &request.merkle_root, request.anchor_reference.as_str())?;
    Ok(Json(json!({
        "merkle_root": request.merkle_root,
        "anchor_reference": request.anchor_reference,
    })))
}

#[derive(Debug, Serialize)]
pub struct GuardrailListResponse {
    pub guardrails: Vec<sardis_observability::Guardrail>,
}

pub async fn list_guardrails(
    State(state): State<ServiceState>,
) -> Json<GuardrailListResponse> {
    Json(GuardrailListResponse {
        guardrails: state.orchestrator.registry().guardrails.list(),
    })
}

#[derive(Debug, Deserialize)]
pub struct ToggleGuardrailRequest {
    pub name: String,
    pub enabled: bool,
}

pub async fn toggle_guardrail(
    State(state): State<ServiceState>,
    Json(request): Json<ToggleGuardrailRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if !state
        .orchestrator
        .registry()
        .guardrails
        .set_enabled(&request.name, request.enabled)
    {
        return Err(ApiError::not_found(format!(
            "guardrail '{}' is not registered",
            request.name
        )));
    }
    Ok(Json(json!({ "name": request.name, "enabled": request.enabled })))
}

#[derive(Debug, Deserialize)]
pub struct FailoverRequest {
    pub org_id: String,
    pub mode: FailoverMode,
    pub operator: String,
    pub reason: String,
}

pub async fn set_failover_mode(
    State(state): State<ServiceState>,
    Json(request): Json<FailoverRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let org_id = parse(OrgId::parse(request.org_id))?;
    state
        .orchestrator
        .registry()
        .failover
        .set_mode(request.mode, &request.operator, &request.reason);
    let mut ledger = state.ledger.lock().await;
    ledger
        .append(
            &org_id,
            EntryKind::OpsFailoverMode,
            json!({
                "mode": request.mode,
                "operator": request.operator,
                "reason": request.reason,
            }),
        )
        .await?;
    Ok(Json(json!({ "mode": request.mode })))
}

#[derive(Debug, Deserialize)]
pub struct KillSwitchRequest {
    pub org_id: String,
    pub wallet_id: String,
    pub halted: bool,
    pub operator: String,
}

pub async fn set_kill_switch(
    State(state): State<ServiceState>,
    Json(request): Json<KillSwitchRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let org_id = parse(OrgId::parse(request.org_id))?;
    let wallet_id = parse(WalletId::parse(request.wallet_id))?;
    state
        .orchestrator
        .set_kill_switch(&org_id, &wallet_id, request.halted, &request.operator)
        .await?;
    Ok(Json(json!({ "wallet_id": wallet_id, "halted": request.halted })))
}
