use chrono::{DateTime, Utc};
use sardis_types::{LedgerEntryId, PaymentId, Rail};
use serde::{Deserialize, Serialize};

/// Where a state observation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewSource {
    Orchestrator,
    Provider,
    Chain,
}

/// One observed state for a payment, from one source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateObservation {
    pub source: ViewSource,
    pub state: String,
    pub terminal: bool,
    pub observed_at: DateTime<Utc>,
    /// Ledger anchor; mandatory for terminal observations.
    pub ltx_id: Option<LedgerEntryId>,
}

/// Severity tiers driving operator SLA.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakSeverity {
    /// Views disagree but both are progressing, non-terminal.
    Low,
    /// Views disagree and one side has stalled past the window.
    Medium,
    /// One view believes the payment is terminal and the other does not.
    Critical,
}

/// A detected divergence between the orchestrator and provider views.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriftBreak {
    pub break_id: String,
    pub payment_id: PaymentId,
    pub orchestrator_view: Option<String>,
    pub provider_view: Option<String>,
    pub severity: BreakSeverity,
    pub detected_at: DateTime<Utc>,
}

/// Canonical multi-source state history for one payment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalJourney {
    pub payment_id: PaymentId,
    pub rail: Rail,
    pub states_seen: Vec<StateObservation>,
    pub terminal: bool,
    pub opened_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub drift_breaks: Vec<DriftBreak>,
}

impl CanonicalJourney {
    pub fn open(payment_id: PaymentId, rail: Rail, opened_at: DateTime<Utc>) -> Self {
        Self {
            payment_id,
            rail,
            states_seen: Vec::new(),
            terminal: false,
            opened_at,
            closed_at: None,
            drift_breaks: Vec::new(),
        }
    }

    pub fn last_view(&self, source: ViewSource) -> Option<&StateObservation> {
        self.states_seen
            .iter()
            .rev()
            .find(|observation| observation.source == source)
    }
}
