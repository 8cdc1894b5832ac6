use crate::drift::DriftThresholds;
use crate::error::PolicyError;
use sardis_types::{canonical_digest, OrgId, Rail};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Non-relaxable ceilings, pinned per org policy revision.
///
/// Nothing downstream of snapshot construction can loosen these; the
/// natural-language hint layer in particular is clamped against them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HardCaps {
    pub per_tx_minor: i64,
    pub per_day_minor: i64,
    pub per_month_minor: i64,
    /// Per-transaction ceiling per rail, where tighter than `per_tx_minor`.
    #[serde(default)]
    pub per_rail_minor: BTreeMap<Rail, i64>,
}

impl HardCaps {
    pub fn per_tx_for(&self, rail: Rail) -> i64 {
        self.per_rail_minor
            .get(&rail)
            .copied()
            .map(|cap| cap.min(self.per_tx_minor))
            .unwrap_or(self.per_tx_minor)
    }
}

/// Count + amount ceiling for one velocity window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowLimit {
    pub max_count: u32,
    pub max_amount_minor: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VelocityLimits {
    pub per_minute: WindowLimit,
    pub per_hour: WindowLimit,
    pub per_day: WindowLimit,
}

/// Declarative org rules beneath the hard-cap layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleSet {
    /// When non-empty, destinations must appear here (normalized exact match).
    pub allowed_vendors: BTreeSet<String>,
    pub blocked_vendors: BTreeSet<String>,
    pub vendors_requiring_approval: BTreeSet<String>,
    pub blocked_categories: BTreeSet<String>,
    /// Amounts strictly above this require approval.
    pub approval_threshold_minor: Option<i64>,
    pub velocity: Option<VelocityLimits>,
}

/// Immutable, revision-pinned policy snapshot the engine evaluates against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicySnapshot {
    pub policy_id: String,
    pub org_id: OrgId,
    pub version: u32,
    pub rules: RuleSet,
    pub hard_caps: HardCaps,
    pub drift: DriftThresholds,
    /// Content address of the snapshot, for decision provenance.
    pub revision_digest: String,
}

impl PolicySnapshot {
    pub fn build(
        policy_id: impl Into<String>,
        org_id: OrgId,
        version: u32,
        rules: RuleSet,
        hard_caps: HardCaps,
        drift: DriftThresholds,
    ) -> Result<Self, PolicyError> {
        if hard_caps.per_tx_minor <= 0
            || hard_caps.per_day_minor <= 0
            || hard_caps.per_month_minor <= 0
        {
            return Err(PolicyError::InvalidSnapshot(
                "hard caps must be positive".to_string(),
            ));
        }
        if let Some(threshold) = rules.approval_threshold_minor {
            if threshold < 0 {
                return Err(PolicyError::InvalidSnapshot(
                    "approval threshold must be non-negative".to_string(),
                ));
            }
        }
        let mut snapshot = Self {
            policy_id: policy_id.into(),
            org_id,
            version,
            rules,
            hard_caps,
            drift,
            revision_digest: String::new(),
        };
        snapshot.revision_digest = canonical_digest(&(
            &snapshot.policy_id,
            &snapshot.org_id,
            snapshot.version,
            &snapshot.rules,
            &snapshot.hard_caps,
            &snapshot.drift,
        ));
        Ok(snapshot)
    }
}
