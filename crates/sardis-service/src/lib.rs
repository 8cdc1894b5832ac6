//! Sardis HTTP control plane.
//!
//! Versioned `/v2` surface over the orchestrator, ledger, approvals, holds,
//! treasury, webhooks, and reconciliation. Every response carries
//! `X-API-Version`; errors carry `{reason_code, reason, request_id}` and
//! never leak secret material.

#![deny(unsafe_code)]

pub mod config;
pub mod handlers;

use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use config::{PanBoundaryMode, SardisConfig};
use sardis_adapters::{
    AdapterFleet, BreakerConfig, CapabilityMatrix, MockAchAdapter, MockCardAdapter,
    MockMpcSignerAdapter, RoutePlan,
};
use sardis_approvals::{ApprovalManager, TrustRegistry};
use sardis_idempotency::IdempotencyStore;
use sardis_ledger::{LedgerStorageConfig, PersistentAuditLedger};
use sardis_observability::{
    FailoverState, GuardrailRegistry, KillSwitchRegistry, MetricsRegistry, RateLimitConfig,
    SlidingWindowRateLimiter,
};
use sardis_orchestrator::{
    ComponentRegistry, HoldStore, OrchestratorConfig, PaymentOrchestrator, StaticContextSource,
    TreasuryService,
};
use sardis_policy::{DriftThresholds, PolicyEngine};
use sardis_recon::ReconStore;
use sardis_types::{AgentId, OrgId, ReasonCode};
use sardis_webhooks::WebhookIngress;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

pub const API_VERSION: &str = "2";

/// Everything the service needs at bootstrap.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub sardis: SardisConfig,
    pub ledger_storage: LedgerStorageConfig,
    /// PAN boundary permitted by the provider profile.
    pub pan_boundary_profile: PanBoundaryMode,
    /// `(provider, secret)` webhook subscriptions.
    pub webhook_secrets: Vec<(String, String)>,
    pub rate_limit: RateLimitConfig,
    /// Per-provider submit call timeout.
    pub provider_timeout: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            sardis: SardisConfig::default(),
            ledger_storage: LedgerStorageConfig::Memory,
            pan_boundary_profile: PanBoundaryMode::IssuerHostedIframePlusEnclaveBreakGlass,
            webhook_secrets: Vec::new(),
            rate_limit: RateLimitConfig::default(),
            provider_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Config(#[from] config::ConfigError),
    #[error(transparent)]
    Ledger(#[from] sardis_ledger::LedgerError),
}

/// Wired component graph behind the routers.
#[derive(Clone)]
pub struct ServiceState {
    pub orchestrator: Arc<PaymentOrchestrator>,
    pub treasury: TreasuryService,
    pub holds: HoldStore,
    pub trust: TrustRegistry,
    pub ingress: Arc<WebhookIngress>,
    pub recon: Arc<Mutex<ReconStore>>,
    pub ledger: Arc<Mutex<PersistentAuditLedger>>,
    pub metrics: MetricsRegistry,
    pub drift_thresholds: DriftThresholds,
}

impl ServiceState {
    pub async fn bootstrap(config: ServiceConfig) -> Result<Self, ServiceError> {
        let persistent = !matches!(config.ledger_storage, LedgerStorageConfig::Memory);
        let drift_thresholds = config
            .sardis
            .validate(config.pan_boundary_profile, persistent)?;

        let metrics = MetricsRegistry::new();
        let ledger = Arc::new(Mutex::new(
            PersistentAuditLedger::bootstrap(config.ledger_storage.clone()).await?,
        ));

        let mut fleet = AdapterFleet::new(
            metrics.clone(),
            BreakerConfig::default(),
            config.provider_timeout,
        );
        fleet.register(Arc::new(MockAchAdapter::new("ach_treasury_primary")));
        fleet.register(Arc::new(MockAchAdapter::new("ach_treasury_backup")));
        fleet.register(Arc::new(MockCardAdapter::new("card_issuer_primary")));
        fleet.register(Arc::new(MockMpcSignerAdapter::new("mpc_signer_primary")));

        let mut matrix = CapabilityMatrix::new();
        let usd = sardis_types::CurrencyCode::usd();
        matrix.set_default(
            sardis_types::Rail::Ach,
            usd.clone(),
            RoutePlan::new(
                config.sardis.funding.primary_adapter.clone(),
                config
                    .sardis
                    .funding
                    .fallback_adapter
                    .clone()
                    .into_iter()
                    .collect(),
            ),
        );
        matrix.set_default(
            sardis_types::Rail::Card,
            usd.clone(),
            RoutePlan::new("card_issuer_primary", vec![]),
        );
        matrix.set_default(
            sardis_types::Rail::OnChain,
            usd.clone(),
            RoutePlan::new("mpc_signer_primary", vec![]),
        );
        matrix.set_default(
            sardis_types::Rail::Stablecoin,
            usd,
            RoutePlan::new("mpc_signer_primary", vec![]),
        );

        let approvals = ApprovalManager::new(ledger.clone());
        let recon = Arc::new(Mutex::new(ReconStore::new(Default::default())));
        let registry = ComponentRegistry {
            policy: PolicyEngine::new(),
            context_source: StaticContextSource::with_trust_enforcement(
                config.sardis.a2a_enforce_trust_table,
            ),
            ledger: ledger.clone(),
            idempotency: IdempotencyStore::new(),
            approvals,
            fleet: Arc::new(fleet),
            matrix,
            recon: recon.clone(),
            killswitch: KillSwitchRegistry::new(),
            limiter: SlidingWindowRateLimiter::new(config.rate_limit),
            failover: FailoverState::new(),
            guardrails: GuardrailRegistry::new(),
            metrics: metrics.clone(),
        };
        let orchestrator = Arc::new(PaymentOrchestrator::new(
            OrchestratorConfig::default(),
            registry,
        ));
        orchestrator.registry().guardrails.register(
            "payments.execute",
            "gate over the synchronous execution pipeline",
        );

        let ingress = Arc::new(WebhookIngress::new(metrics.clone()));
        for (provider, secret) in &config.webhook_secrets {
            ingress.subscribe(provider, secret).await;
        }

        let funding_rail = match config.sardis.funding.strategy {
            config::FundingStrategy::FiatFirst | config::FundingStrategy::Hybrid => {
                sardis_types::Rail::Ach
            }
            config::FundingStrategy::StablecoinFirst => sardis_types::Rail::Stablecoin,
        };
        Ok(Self {
            treasury: TreasuryService::with_funding_rail(
                orchestrator.clone(),
                AgentId::generate(),
                funding_rail,
            ),
            holds: HoldStore::new(ledger.clone()),
            trust: TrustRegistry::new(ledger.clone()),
            orchestrator,
            ingress,
            recon,
            ledger,
            metrics,
            drift_thresholds,
        })
    }
}

/// Transport-level error envelope.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{reason}")]
    Status {
        status: StatusCode,
        reason_code: ReasonCode,
        reason: String,
    },
    #[error(transparent)]
    Orchestrator(#[from] sardis_orchestrator::OrchestratorError),
    #[error(transparent)]
    Approval(#[from] sardis_approvals::ApprovalError),
    #[error(transparent)]
    Ledger(#[from] sardis_ledger::LedgerError),
}

impl ApiError {
    pub fn bad_request(reason: impl Into<String>) -> Self {
        Self::Status {
            status: StatusCode::BAD_REQUEST,
            reason_code: ReasonCode::Internal,
            reason: reason.into(),
        }
    }

    pub fn not_found(reason: impl Into<String>) -> Self {
        Self::Status {
            status: StatusCode::NOT_FOUND,
            reason_code: ReasonCode::Internal,
            reason: reason.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let request_id = format!("req_{}", Uuid::new_v4().simple());
        let (status, reason_code, reason) = match self {
            ApiError::Status {
                status,
                reason_code,
                reason,
            } => (status, reason_code, reason),
            ApiError::Orchestrator(err) => {
                let status = match &err {
                    sardis_orchestrator::OrchestratorError::PaymentNotFound(_)
                    | sardis_orchestrator::OrchestratorError::HoldNotFound(_) => {
                        StatusCode::NOT_FOUND
                    }
                    sardis_orchestrator::OrchestratorError::HoldNotActive(_)
                    | sardis_orchestrator::OrchestratorError::CaptureExceedsHold => {
                        StatusCode::CONFLICT
                    }
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, ReasonCode::Internal, err.to_string())
            }
            ApiError::Approval(err) => {
                let status = match &err {
                    sardis_approvals::ApprovalError::NotFound(_) => StatusCode::NOT_FOUND,
                    sardis_approvals::ApprovalError::NotPending(_)
                    | sardis_approvals::ApprovalError::DuplicateReviewer(_)
                    | sardis_approvals::ApprovalError::TrustExists(_, _)
                    | sardis_approvals::ApprovalError::WrongApproval { .. } => StatusCode::CONFLICT,
                    sardis_approvals::ApprovalError::QuorumTooSmall { .. }
                    | sardis_approvals::ApprovalError::ZeroQuorum => StatusCode::BAD_REQUEST,
                    sardis_approvals::ApprovalError::Ledger(_) => {
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                };
                (status, ReasonCode::Internal, err.to_string())
            }
            ApiError::Ledger(err) => {
                let status = match &err {
                    sardis_ledger::LedgerError::EntryNotFound(_) => StatusCode::NOT_FOUND,
                    sardis_ledger::LedgerError::MalformedCursor => StatusCode::BAD_REQUEST,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, ReasonCode::Internal, err.to_string())
            }
        };
        (
            status,
            Json(serde_json::json!({
                "reason_code": reason_code,
                "reason": reason,
                "request_id": request_id,
            })),
        )
            .into_response()
    }
}

async fn add_api_version(
    request: axum::extract::Request,
    next: axum::middleware::Next,
) -> Response {
    let mut response = next.run(request).await;
    response
        .headers_mut()
        .insert("x-api-version", HeaderValue::from_static(API_VERSION));
    response
}

pub fn build_router(state: ServiceState) -> Router {
    let v2 = Router::new()
        .route("/health", get(handlers::health))
        .route("/payments/execute", post(handlers::execute_payment))
        .route("/payments/:id", get(handlers::get_payment))
        .route("/payments/:id/cancel", post(handlers::cancel_payment))
        .route("/ledger/entries/:ltx_id", get(handlers::get_ledger_entry))
        .route(
            "/ledger/entries/:ltx_id/verify",
            get(handlers::verify_ledger_entry),
        )
        .route("/holds", post(handlers::create_hold))
        .route("/holds/:id/capture", post(handlers::capture_hold))
        .route("/holds/:id/void", post(handlers::void_hold))
        .route("/approvals", post(handlers::create_approval))
        .route("/approvals/:id", get(handlers::approval_status))
        .route("/approvals/:id/decide", post(handlers::decide_approval))
        .route("/trust", post(handlers::grant_trust))
        .route("/treasury/fund", post(handlers::treasury_fund))
        .route("/treasury/withdraw", post(handlers::treasury_withdraw))
        .route("/treasury/balances", get(handlers::treasury_balances))
        .route("/webhooks/:provider", post(handlers::ingest_webhook))
        .route(
            "/webhooks/:provider/rotate",
            post(handlers::rotate_webhook_secret),
        )
        .route("/compliance/export", get(handlers::compliance_export))
        .route("/orgs/:org_id/policy", post(handlers::install_policy))
        .route("/recon/breaks", get(handlers::recon_breaks))
        .route("/ops/sweep", post(handlers::ops_sweep))
        .route("/ops/anchor", post(handlers::anchor_batch))
        .route("/ops/failover", post(handlers::set_failover_mode))
        .route("/ops/killswitch", post(handlers::set_kill_switch))
        .route("/ops/guardrails", get(handlers::list_guardrails))
        .route("/ops/guardrails/toggle", post(handlers::toggle_guardrail))
        .with_state(state);

    Router::new()
        .nest("/v2", v2)
        .layer(axum::middleware::from_fn(add_api_version))
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use chrono::Utc;
    use sardis_webhooks::signature::sign;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    const WEBHOOK_SECRET: &str = "whsec_service_test";

    fn test_config() -> ServiceConfig {
        let mut sardis = SardisConfig {
            goal_drift_review_threshold: Some(0.6),
            goal_drift_block_threshold: Some(1.5),
            idempotency_allow_inmemory: true,
            ..SardisConfig::default()
        };
        sardis.checkout.allow_inmemory_secret_store = true;
        ServiceConfig {
            sardis,
            webhook_secrets: vec![("treasury".to_string(), WEBHOOK_SECRET.to_string())],
            ..ServiceConfig::default()
        }
    }

    async fn app() -> (Router, ServiceState) {
        let state = ServiceState::bootstrap(test_config()).await.unwrap();
        (build_router(state.clone()), state)
    }

    async fn request_json(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        assert_eq!(
            response
                .headers()
                .get("x-api-version")
                .and_then(|v| v.to_str().ok()),
            Some(API_VERSION)
        );
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn install_policy(app: &Router, per_tx_minor: i64) {
        let (status, _) = request_json(
            app,
            "POST",
            "/v2/orgs/org_svc1/policy",
            Some(json!({
                "policy_id": "pol-svc",
                "version": 1,
                "rules": { "approval_threshold_minor": null },
                "hard_caps": {
                    "per_tx_minor": per_tx_minor,
                    "per_day_minor": per_tx_minor * 10,
                    "per_month_minor": per_tx_minor * 100,
                },
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    fn execute_body(amount_minor: i64, key: &str) -> Value {
        json!({
            "mandate": {
                "agent_id": "agt_svc1",
                "org_id": "org_svc1",
                "subject_wallet": "wlt_svc1",
                "destination": "vendor.example.com",
                "amount_minor": amount_minor,
                "currency": "USD",
                "rail": "ach",
                "purpose": "invoice 4471",
            },
            "idempotency_key": key,
        })
    }

    async fn execute_payment(app: &Router, amount_minor: i64, key: &str) -> (StatusCode, Value) {
        request_json(
            app,
            "POST",
            "/v2/payments/execute",
            Some(execute_body(amount_minor, key)),
        )
        .await
    }

    fn webhook_body(payment_id: &str, external_id: &str, event_type: &str) -> Vec<u8> {
        json!({
            "event_id": external_id,
            "payment_id": payment_id,
            "rail": "ach",
            "type": event_type,
        })
        .to_string()
        .into_bytes()
    }

    async fn post_webhook(app: &Router, body: &[u8], header: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri("/v2/webhooks/treasury")
            .header("content-type", "application/json")
            .header("x-signature", header)
            .body(Body::from(body.to_vec()))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn bootstrap_refuses_unacknowledged_memory_stores() {
        let config = ServiceConfig {
            sardis: SardisConfig {
                goal_drift_review_threshold: Some(0.6),
                goal_drift_block_threshold: Some(1.5),
                ..SardisConfig::default()
            },
            ..ServiceConfig::default()
        };
        assert!(matches!(
            ServiceState::bootstrap(config).await,
            Err(ServiceError::Config(_))
        ));
    }

    #[tokio::test]
    async fn bootstrap_requires_drift_thresholds() {
        let config = ServiceConfig {
            sardis: SardisConfig::default(),
            ..ServiceConfig::default()
        };
        assert!(ServiceState::bootstrap(config).await.is_err());
    }

    #[tokio::test]
    async fn execute_submits_and_exposes_payment() {
        let (app, _) = app().await;
        install_policy(&app, 10_000_000).await;

        let (status, body) = execute_payment(&app, 5_000_000, "idem-1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "submitted");
        let payment_id = body["payment_id"].as_str().unwrap().to_string();

        let (status, payment) =
            request_json(&app, "GET", &format!("/v2/payments/{payment_id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(payment["status"]["rail"], "ach");
        assert_eq!(payment["amount_pending"]["amount_minor"], 5_000_000);
    }

    #[tokio::test]
    async fn blocked_payment_reports_reason_code() {
        let (app, _) = app().await;
        install_policy(&app, 10_000_000).await;

        let (status, body) = execute_payment(&app, 500_000_000, "idem-1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "blocked");
        assert_eq!(body["reason_code"], "POLICY.LIMIT_EXCEEDED");
    }

    #[tokio::test]
    async fn webhook_lifecycle_drives_payment_to_released() {
        let (app, state) = app().await;
        install_policy(&app, 10_000_000).await;
        let (_, body) = execute_payment(&app, 5_000_000, "idem-1").await;
        let payment_id = body["payment_id"].as_str().unwrap().to_string();

        for (n, event) in ["ORIGINATION_INITIATED", "REVIEWED", "PROCESSED", "SETTLED", "RELEASED"]
            .iter()
            .enumerate()
        {
            let raw = webhook_body(&payment_id, &format!("ev-{n}"), event);
            let header = sign(WEBHOOK_SECRET, &raw, Utc::now());
            let (status, _) = post_webhook(&app, &raw, &header).await;
            assert_eq!(status, StatusCode::OK);
        }

        let (_, payment) =
            request_json(&app, "GET", &format!("/v2/payments/{payment_id}"), None).await;
        assert_eq!(payment["status"]["state"], "RELEASED");
        assert_eq!(payment["amount_settled"]["amount_minor"], 5_000_000);

        // Ledger chain for the org: decision + submitted + 4 transitions.
        let org = OrgId::parse("org_svc1").unwrap();
        let ledger = state.ledger.lock().await;
        assert_eq!(ledger.ledger().chain_len(&org), 6);
    }

    #[tokio::test]
    async fn duplicate_webhook_is_suppressed_without_side_effects() {
        let (app, state) = app().await;
        install_policy(&app, 10_000_000).await;
        let (_, body) = execute_payment(&app, 5_000_000, "idem-1").await;
        let payment_id = body["payment_id"].as_str().unwrap().to_string();

        let raw = webhook_body(&payment_id, "ev-1", "REVIEWED");
        let header = sign(WEBHOOK_SECRET, &raw, Utc::now());
        let (status, ack) = post_webhook(&app, &raw, &header).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ack["status"], "processed");

        let org = OrgId::parse("org_svc1").unwrap();
        let before = state.ledger.lock().await.ledger().chain_len(&org);

        let (status, ack) = post_webhook(&app, &raw, &header).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(ack["status"], "duplicate");
        assert_eq!(state.metrics.get("webhook.duplicate_suppressed"), 1);
        assert_eq!(state.ledger.lock().await.ledger().chain_len(&org), before);
    }

    #[tokio::test]
    async fn substituted_body_webhook_is_conflict() {
        let (app, _) = app().await;
        install_policy(&app, 10_000_000).await;
        let (_, body) = execute_payment(&app, 5_000_000, "idem-1").await;
        let payment_id = body["payment_id"].as_str().unwrap().to_string();

        let raw = webhook_body(&payment_id, "ev-1", "REVIEWED");
        let header = sign(WEBHOOK_SECRET, &raw, Utc::now());
        post_webhook(&app, &raw, &header).await;

        let forged = webhook_body(&payment_id, "ev-1", "PROCESSED");
        let forged_header = sign(WEBHOOK_SECRET, &forged, Utc::now());
        let (status, body) = post_webhook(&app, &forged, &forged_header).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["reason_code"], "WEBHOOK.REPLAY_SUSPICIOUS");
    }

    #[tokio::test]
    async fn unsigned_webhook_is_unauthorized() {
        let (app, _) = app().await;
        let raw = webhook_body("pay_none", "ev-1", "REVIEWED");
        let request = Request::builder()
            .method("POST")
            .uri("/v2/webhooks/treasury")
            .header("content-type", "application/json")
            .body(Body::from(raw))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let raw = webhook_body("pay_none", "ev-1", "REVIEWED");
        let bad_header = sign("whsec_wrong", &raw, Utc::now());
        let (status, _) = post_webhook(&app, &raw, &bad_header).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn ledger_verify_endpoint_reports_clean_chain() {
        let (app, state) = app().await;
        install_policy(&app, 10_000_000).await;
        execute_payment(&app, 5_000_000, "idem-1").await;

        let ltx_id = {
            let ledger = state.ledger.lock().await;
            let org = OrgId::parse("org_svc1").unwrap();
            ledger.ledger().org_entries(&org)[0].ltx_id.clone()
        };

        let (status, entry) =
            request_json(&app, "GET", &format!("/v2/ledger/entries/{ltx_id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(entry["kind"], "policy.decision");

        let (status, report) = request_json(
            &app,
            "GET",
            &format!("/v2/ledger/entries/{ltx_id}/verify"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(report["chain_ok"], true);
        assert_eq!(report["tampered_indices"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn holds_lifecycle_over_http() {
        let (app, _) = app().await;
        let (status, hold) = request_json(
            &app,
            "POST",
            "/v2/holds",
            Some(json!({
                "org_id": "org_svc1",
                "wallet_id": "wlt_svc1",
                "amount_minor": 250_000,
                "currency": "USD",
                "ttl_secs": 3600,
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let hold_id = hold["hold_id"].as_str().unwrap().to_string();

        let (status, captured) = request_json(
            &app,
            "POST",
            &format!("/v2/holds/{hold_id}/capture"),
            Some(json!({ "amount_minor": 100_000, "currency": "USD" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(captured["status"], "captured");
        assert_eq!(captured["captured_amount"]["amount_minor"], 100_000);

        // Terminal holds refuse further transitions.
        let (status, _) = request_json(
            &app,
            "POST",
            &format!("/v2/holds/{hold_id}/void"),
            Some(json!({})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn treasury_fund_and_balances() {
        let (app, _state) = app().await;
        install_policy(&app, 10_000_000).await;

        let (status, response) = request_json(
            &app,
            "POST",
            "/v2/treasury/fund",
            Some(json!({
                "org_id": "org_svc1",
                "wallet_id": "wlt_svc1",
                "external_account_id": "eba_operating1",
                "amount_minor": 2_000_000,
                "currency": "USD",
                "idempotency_key": "fund-1",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(response["status"], "submitted");
        let payment_id = response["payment_id"].as_str().unwrap().to_string();

        for (n, event) in ["REVIEWED", "PROCESSED", "SETTLED"].iter().enumerate() {
            let raw = webhook_body(&payment_id, &format!("fund-ev-{n}"), event);
            let header = sign(WEBHOOK_SECRET, &raw, Utc::now());
            let (status, _) = post_webhook(&app, &raw, &header).await;
            assert_eq!(status, StatusCode::OK);
        }

        let (status, balances) = request_json(
            &app,
            "GET",
            "/v2/treasury/balances?wallet_id=wlt_svc1",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(balances["available_minor"], 2_000_000);
    }

    #[tokio::test]
    async fn compliance_export_pages_are_replay_safe() {
        let (app, _) = app().await;
        install_policy(&app, 10_000_000).await;
        execute_payment(&app, 1_000_000, "idem-1").await;
        execute_payment(&app, 2_000_000, "idem-2").await;

        let start = (Utc::now() - chrono::Duration::hours(1))
            .to_rfc3339()
            .replace('+', "%2B");
        let end = (Utc::now() + chrono::Duration::hours(1))
            .to_rfc3339()
            .replace('+', "%2B");
        let uri = format!(
            "/v2/compliance/export?org_id=org_svc1&window_start={start}&window_end={end}&limit=2"
        );
        let (status, first) = request_json(&app, "GET", &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(first["records"].as_array().unwrap().len(), 2);
        let cursor = first["next_cursor"].as_str().unwrap().to_string();

        // A later append must not disturb the already-served page.
        execute_payment(&app, 3_000_000, "idem-3").await;
        let (_, replay) = request_json(&app, "GET", &uri, None).await;
        assert_eq!(first["records"], replay["records"]);

        let (status, second) = request_json(
            &app,
            "GET",
            &format!("{uri}&cursor={cursor}"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(!second["records"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failover_containment_read_paths_stay_up() {
        let (app, _) = app().await;
        install_policy(&app, 10_000_000).await;
        let (_, body) = execute_payment(&app, 5_000_000, "idem-1").await;
        let payment_id = body["payment_id"].as_str().unwrap().to_string();

        let (status, _) = request_json(
            &app,
            "POST",
            "/v2/ops/failover",
            Some(json!({
                "org_id": "org_svc1",
                "mode": "containment",
                "operator": "ops-1",
                "reason": "signer outage",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        // New executions are refused...
        let (status, refused) = execute_payment(&app, 5_000_000, "idem-2").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(refused["reason_code"], "PAYMENT.CONTAINMENT");

        // ...while reads keep working.
        let (status, _) =
            request_json(&app, "GET", &format!("/v2/payments/{payment_id}"), None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, health) = request_json(&app, "GET", "/v2/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(health["failover_mode"], "containment");
    }

    #[tokio::test]
    async fn ops_sweep_seals_merkle_batches() {
        let (app, state) = app().await;
        install_policy(&app, 10_000_000).await;
        execute_payment(&app, 5_000_000, "idem-1").await;

        let (status, body) = request_json(&app, "POST", "/v2/ops/sweep", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["approvals_expired"], 0);
        assert_eq!(body["holds_expired"], 0);
        assert_eq!(body["merkle_batches_sealed"], 1);

        // Anchor the sealed batch and see it reflected in verification.
        let (root, ltx_id) = {
            let ledger = state.ledger.lock().await;
            let org = OrgId::parse("org_svc1").unwrap();
            let batch = ledger.ledger().batches(&org).last().unwrap().clone();
            let ltx_id = ledger.ledger().org_entries(&org)[0].ltx_id.clone();
            (batch.root, ltx_id)
        };
        let (status, _) = request_json(
            &app,
            "POST",
            "/v2/ops/anchor",
            Some(json!({
                "org_id": "org_svc1",
                "merkle_root": root,
                "anchor_reference": "anchor://external/42",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, report) = request_json(
            &app,
            "GET",
            &format!("/v2/ledger/entries/{ltx_id}/verify"),
            None,
        )
        .await;
        assert_eq!(report["leaf_in_root"], true);
        assert_eq!(report["root_anchored"], true);
    }

    #[tokio::test]
    async fn guardrail_toggle_gates_executions() {
        let (app, _) = app().await;
        install_policy(&app, 10_000_000).await;

        let (status, list) = request_json(&app, "GET", "/v2/ops/guardrails", None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(list["guardrails"]
            .as_array()
            .unwrap()
            .iter()
            .any(|g| g["name"] == "payments.execute"));

        let (status, _) = request_json(
            &app,
            "POST",
            "/v2/ops/guardrails/toggle",
            Some(json!({ "name": "payments.execute", "enabled": false })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, refused) = execute_payment(&app, 5_000_000, "idem-1").await;
        assert_eq!(refused["status"], "refused");

        request_json(
            &app,
            "POST",
            "/v2/ops/guardrails/toggle",
            Some(json!({ "name": "payments.execute", "enabled": true })),
        )
        .await;
        let (_, ok) = execute_payment(&app, 5_000_000, "idem-1").await;
        assert_eq!(ok["status"], "submitted");
    }
}
