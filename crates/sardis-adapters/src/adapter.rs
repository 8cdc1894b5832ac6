use crate::error::AdapterError;
use async_trait::async_trait;
use sardis_types::{CurrencyCode, Direction, MandateId, Money, OrgId, PaymentId, Rail};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Submission handed to a provider adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitRequest {
    pub payment_id: PaymentId,
    pub org_id: OrgId,
    pub mandate_id: MandateId,
    pub rail: Rail,
    pub direction: Direction,
    pub amount: Money,
    pub destination: String,
    pub metadata: BTreeMap<String, String>,
}

/// Provider answer to a submit. A `Retryable` walks the fallback route; a
/// `Fatal` is a definitive refusal and never falls back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum SubmitOutcome {
    Accepted { provider_ref: String },
    Retryable { message: String },
    Fatal { message: String },
}

/// Provider-side view of a submitted payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderStatus {
    Pending,
    Settled,
    Returned,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoidOutcome {
    Voided,
    /// The rail has no void operation; cancellation must be refused.
    Unsupported,
}

/// Uniform provider capability surface.
///
/// Implementations must be side-effect safe on `supports` and `status`;
/// `submit` is the only money-moving call and the fleet guarantees it is
/// attempted at most once per adapter per execution.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Stable registry key, e.g. `"ach_treasury_primary"`.
    fn name(&self) -> &'static str;

    fn supports(&self, rail: Rail, direction: Direction, currency: &CurrencyCode) -> bool;

    async fn submit(&self, request: &SubmitRequest) -> SubmitOutcome;

    async fn status(&self, provider_ref: &str) -> Result<ProviderStatus, AdapterError>;

    async fn void(&self, provider_ref: &str) -> Result<VoidOutcome, AdapterError>;
}
