use chrono::{DateTime, Utc};
use sardis_types::Rail;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tracing::warn;

/// Deterministic operating modes for signer or provider outages.
///
/// Transitions are operator-driven, never automatic. Read, list, admin, and
/// audit surfaces stay available in every mode; only new executions are
/// gated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailoverMode {
    /// Full service.
    Normal,
    /// Policy and approvals stay active; only low-risk rails execute, and
    /// anything above the org approval threshold requires approval.
    Degraded,
    /// Deny all new executions; the plane is read-only.
    Containment,
}

/// What the current mode permits for a new execution on a rail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModePermit {
    Allowed,
    /// Allowed, but approval is forced regardless of amount.
    AllowedWithApproval,
    Denied,
}

impl FailoverMode {
    /// On-chain rails depend on the external signer, so Degraded keeps only
    /// the fiat rails moving.
    pub fn permit(&self, rail: Rail) -> ModePermit {
        match self {
            FailoverMode::Normal => ModePermit::Allowed,
            FailoverMode::Degraded => match rail {
                Rail::Ach | Rail::Card => ModePermit::AllowedWithApproval,
                Rail::OnChain | Rail::Stablecoin => ModePermit::Denied,
            },
            FailoverMode::Containment => ModePermit::Denied,
        }
    }
}

/// Shared, operator-settable failover state.
#[derive(Debug, Clone)]
pub struct FailoverState {
    inner: Arc<Mutex<ModeRecord>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ModeRecord {
    mode: FailoverMode,
    changed_at: DateTime<Utc>,
    changed_by: String,
    reason: String,
}

impl Default for FailoverState {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(ModeRecord {
                mode: FailoverMode::Normal,
                changed_at: Utc::now(),
                changed_by: "startup".to_string(),
                reason: "initial".to_string(),
            })),
        }
    }
}

impl FailoverState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> FailoverMode {
        self.lock().mode
    }

    pub fn set_mode(&self, mode: FailoverMode, operator: &str, reason: &str) {
        warn!(?mode, operator, reason, "failover mode changed");
        let mut record = self.lock();
        record.mode = mode;
        record.changed_at = Utc::now();
        record.changed_by = operator.to_string();
        record.reason = reason.to_string();
    }

    pub fn permit(&self, rail: Rail) -> ModePermit {
        self.mode().permit(rail)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ModeRecord> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
