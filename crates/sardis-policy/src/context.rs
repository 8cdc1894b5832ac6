use crate::drift::DriftProfile;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Rolling counter over one velocity window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WindowCounter {
    pub count: u32,
    pub amount_minor: i64,
}

/// Current org spend counters, read from the canonical store before each
/// decision. The engine treats them as an immutable input.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrgCounters {
    pub minute: WindowCounter,
    pub hour: WindowCounter,
    pub day: WindowCounter,
    pub month_amount_minor: i64,
}

/// Wallet preconditions at decision time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletState {
    pub active: bool,
    pub kill_switched: bool,
    pub rail_enabled: bool,
}

impl WalletState {
    pub fn healthy() -> Self {
        Self {
            active: true,
            kill_switched: false,
            rail_enabled: true,
        }
    }
}

/// External compliance screen results, supplied by the screening service.
/// Unknown is treated the same as failed: the money path fails closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScreenState {
    Clear,
    Failed,
    Unavailable,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceState {
    pub sanctions: ScreenState,
    pub kyb_verified: bool,
    /// Whether a trust relation exists for an agent-to-agent transfer.
    pub trust_relation_present: bool,
}

impl ComplianceState {
    pub fn clear() -> Self {
        Self {
            sanctions: ScreenState::Clear,
            kyb_verified: true,
            trust_relation_present: true,
        }
    }
}

/// Everything beyond the mandate the engine needs for one decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalContext {
    pub wallet: WalletState,
    pub compliance: ComplianceState,
    pub counters: OrgCounters,
    /// True when the destination is another agent's wallet.
    pub agent_to_agent: bool,
    /// Whether trust-table enforcement is switched on for the org.
    pub enforce_trust_table: bool,
    /// Vendor category from enrichment, when known.
    pub vendor_category: Option<String>,
    /// Observed mandate counts per category for the acting agent.
    pub observed_categories: BTreeMap<String, u64>,
    /// Expected category distribution for the acting agent; empty disables
    /// drift scoring.
    pub drift_profile: DriftProfile,
}

impl EvalContext {
    /// A context that passes every gate; tests tighten from here.
    pub fn permissive() -> Self {
        Self {
            wallet: WalletState::healthy(),
            compliance: ComplianceState::clear(),
            counters: OrgCounters::default(),
            agent_to_agent: false,
            enforce_trust_table: true,
            vendor_category: None,
            observed_categories: BTreeMap::new(),
            drift_profile: DriftProfile::default(),
        }
    }
}
