use sardis_policy::DriftThresholds;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("policy.goal_drift_review_threshold and policy.goal_drift_block_threshold must be set explicitly (review < block)")]
    MissingDriftThresholds,

    #[error("ai.advisory_only must remain true; deterministic policy is authoritative")]
    AdvisoryOnlyDisabled,

    #[error("checkout.pan_boundary_mode '{requested}' is looser than the provider profile '{profile}'")]
    PanBoundaryTooLoose { requested: String, profile: String },

    #[error("running without a persistent {store} store requires {flag}=true (explicit operator choice)")]
    InMemoryStoreNotAcknowledged {
        store: &'static str,
        flag: &'static str,
    },
}

/// Funding routing preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FundingStrategy {
    #[default]
    FiatFirst,
    StablecoinFirst,
    Hybrid,
}

/// Where PAN entry is allowed to happen. The core itself never sees PAN or
/// CVV; this only selects the checkout boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PanBoundaryMode {
    IssuerHostedIframeOnly,
    EnclaveBreakGlassOnly,
    IssuerHostedIframePlusEnclaveBreakGlass,
}

impl PanBoundaryMode {
    /// Higher rank means looser: more places PAN may transit.
    fn looseness(&self) -> u8 {
        match self {
            PanBoundaryMode::IssuerHostedIframeOnly => 0,
            PanBoundaryMode::EnclaveBreakGlassOnly => 1,
            PanBoundaryMode::IssuerHostedIframePlusEnclaveBreakGlass => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PanBoundaryMode::IssuerHostedIframeOnly => "issuer_hosted_iframe_only",
            PanBoundaryMode::EnclaveBreakGlassOnly => "enclave_break_glass_only",
            PanBoundaryMode::IssuerHostedIframePlusEnclaveBreakGlass => {
                "issuer_hosted_iframe_plus_enclave_break_glass"
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundingConfig {
    #[serde(default)]
    pub strategy: FundingStrategy,
    pub primary_adapter: String,
    pub fallback_adapter: Option<String>,
}

impl Default for FundingConfig {
    fn default() -> Self {
        Self {
            strategy: FundingStrategy::FiatFirst,
            primary_adapter: "ach_treasury_primary".to_string(),
            fallback_adapter: Some("ach_treasury_backup".to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutConfig {
    pub pan_boundary_mode: PanBoundaryMode,
    /// Explicit operator acknowledgement for memory-only secret handling.
    #[serde(default)]
    pub allow_inmemory_secret_store: bool,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            pan_boundary_mode: PanBoundaryMode::IssuerHostedIframeOnly,
            allow_inmemory_secret_store: false,
        }
    }
}

/// Recognized configuration surface of the control plane.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SardisConfig {
    #[serde(default)]
    pub funding: FundingConfig,
    #[serde(default)]
    pub checkout: CheckoutConfig,
    /// `a2a.enforce_trust_table`
    #[serde(default = "default_true")]
    pub a2a_enforce_trust_table: bool,
    /// `policy.goal_drift_review_threshold` — required, no default.
    pub goal_drift_review_threshold: Option<f64>,
    /// `policy.goal_drift_block_threshold` — required, no default.
    pub goal_drift_block_threshold: Option<f64>,
    /// `ai.advisory_only` — must stay true.
    #[serde(default = "default_true")]
    pub ai_advisory_only: bool,
    /// Explicit operator acknowledgement for memory-only idempotency.
    #[serde(default)]
    pub idempotency_allow_inmemory: bool,
}

fn default_true() -> bool {
    true
}

impl Default for SardisConfig {
    fn default() -> Self {
        Self {
            funding: FundingConfig::default(),
            checkout: CheckoutConfig::default(),
            a2a_enforce_trust_table: true,
            goal_drift_review_threshold: None,
            goal_drift_block_threshold: None,
            ai_advisory_only: true,
            idempotency_allow_inmemory: false,
        }
    }
}

impl SardisConfig {
    /// Startup validation. `profile` is the PAN boundary the provider
    /// profile permits; `persistent_stores` is whether durable ledger and
    /// idempotency backends are configured.
    pub fn validate(
        &self,
        profile: PanBoundaryMode,
        persistent_stores: bool,
    ) -> Result<DriftThresholds, ConfigError> {
        let (Some(review), Some(block)) = (
            self.goal_drift_review_threshold,
            self.goal_drift_block_threshold,
        ) else {
            return Err(ConfigError::MissingDriftThresholds);
        };
        let thresholds = DriftThresholds::validated(review, block)
            .map_err(|_| ConfigError::MissingDriftThresholds)?;

        if !self.ai_advisory_only {
            return Err(ConfigError::AdvisoryOnlyDisabled);
        }

        if self.checkout.pan_boundary_mode.looseness() > profile.looseness() {
            return Err(ConfigError::PanBoundaryTooLoose {
                requested: self.checkout.pan_boundary_mode.as_str().to_string(),
                profile: profile.as_str().to_string(),
            });
        }

        if !persistent_stores {
            if !self.checkout.allow_inmemory_secret_store {
                return Err(ConfigError::InMemoryStoreNotAcknowledged {
                    store: "secret",
                    flag: "checkout.allow_inmemory_secret_store",
                });
            }
            if !self.idempotency_allow_inmemory {
                return Err(ConfigError::InMemoryStoreNotAcknowledged {
                    store: "idempotency",
                    flag: "idempotency.allow_inmemory",
                });
            }
        }

        Ok(thresholds)
    }
}
