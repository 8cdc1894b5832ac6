use crate::error::ReconError;
use crate::journey::{
    BreakSeverity, CanonicalJourney, DriftBreak, StateObservation, ViewSource,
};
use chrono::{DateTime, Duration, Utc};
use sardis_types::{LedgerEntryId, PaymentId, Rail};
use std::collections::HashMap;
use tracing::warn;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct ReconConfig {
    /// How long the orchestrator and provider views may disagree before a
    /// break record is cut.
    pub drift_window: Duration,
    /// SLA for non-critical deltas; calendar semantics are deployment
    /// configuration.
    pub noncritical_sla: Duration,
}

impl Default for ReconConfig {
    fn default() -> Self {
        Self {
            drift_window: Duration::minutes(2),
            noncritical_sla: Duration::hours(24),
        }
    }
}

/// Journey store plus the operator break queue.
#[derive(Debug, Default)]
pub struct ReconStore {
    config: ReconConfig,
    journeys: HashMap<PaymentId, CanonicalJourney>,
    break_queue: Vec<DriftBreak>,
}

impl ReconStore {
    pub fn new(config: ReconConfig) -> Self {
        Self {
            config,
            journeys: HashMap::new(),
            break_queue: Vec::new(),
        }
    }

    /// Record one state observation. Terminal observations must carry their
    /// ledger anchor; a journey already terminal never downgrades, late
    /// observations are kept for forensics only.
    pub fn observe(
        &mut self,
        payment_id: &PaymentId,
        rail: Rail,
        source: ViewSource,
        state: &str,
        terminal: bool,
        ltx_id: Option<LedgerEntryId>,
        at: DateTime<Utc>,
    ) -> Result<(), ReconError> {
        if terminal && ltx_id.is_none() {
            return Err(ReconError::MissingLedgerAnchor(payment_id.to_string()));
        }

        let journey = self
            .journeys
            .entry(payment_id.clone())
            .or_insert_with(|| CanonicalJourney::open(payment_id.clone(), rail, at));
        if journey.rail != rail {
            return Err(ReconError::RailMismatch(payment_id.to_string()));
        }

        journey.states_seen.push(StateObservation {
            source,
            state: state.to_string(),
            terminal,
            observed_at: at,
            ltx_id,
        });

        if terminal && !journey.terminal {
            journey.terminal = true;
            journey.closed_at = Some(at);
        }
        Ok(())
    }

    pub fn journey(&self, payment_id: &PaymentId) -> Option<&CanonicalJourney> {
        self.journeys.get(payment_id)
    }

    /// Scan every open disagreement and cut break records for those older
    /// than the drift window. Returns the newly created breaks.
    pub fn sweep(&mut self, now: DateTime<Utc>) -> Vec<DriftBreak> {
        let mut fresh = Vec::new();
        for journey in self.journeys.values_mut() {
            let orchestrator = journey.last_view(ViewSource::Orchestrator);
            let provider = journey.last_view(ViewSource::Provider);
            let (Some(orch), Some(prov)) = (orchestrator, provider) else {
                continue;
            };
            if orch.state == prov.state {
                continue;
            }
            let disagreement_since = orch.observed_at.max(prov.observed_at);
            if now - disagreement_since < self.config.drift_window {
                continue;
            }
            // One break per disagreement pair; re-sweeps must not duplicate.
            let already_cut = journey.drift_breaks.iter().any(|existing| {
                existing.orchestrator_view.as_deref() == Some(orch.state.as_str())
                    && existing.provider_view.as_deref() == Some(prov.state.as_str())
            });
            if already_cut {
                continue;
            }

            let severity = if orch.terminal != prov.terminal {
                BreakSeverity::Critical
            } else if now - disagreement_since >= self.config.drift_window * 2 {
                BreakSeverity::Medium
            } else {
                BreakSeverity::Low
            };

            let record = DriftBreak {
                break_id: format!("brk_{}", Uuid::new_v4().simple()),
                payment_id: journey.payment_id.clone(),
                orchestrator_view: Some(orch.state.clone()),
                provider_view: Some(prov.state.clone()),
                severity,
                detected_at: now,
            };
            warn!(
                payment = %record.payment_id,
                ?severity,
                orchestrator = record.orchestrator_view.as_deref().unwrap_or(""),
                provider = record.provider_view.as_deref().unwrap_or(""),
                "recon drift break"
            );
            journey.drift_breaks.push(record.clone());
            self.break_queue.push(record.clone());
            fresh.push(record);
        }
        fresh
    }

    /// Operator-visible queue, most severe first.
    pub fn break_queue(&self) -> Vec<DriftBreak> {
        let mut queue = self.break_queue.clone();
        queue.sort_by_key(|record| match record.severity {
            BreakSeverity::Critical => 0,
            BreakSeverity::Medium => 1,
            BreakSeverity::Low => 2,
        });
        queue
    }

    pub fn resolve_break(&mut self, break_id: &str) -> bool {
        let before = self.break_queue.len();
        self.break_queue.retain(|record| record.break_id != break_id);
        before != self.break_queue.len()
    }
}
