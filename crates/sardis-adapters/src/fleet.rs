use crate::adapter::{ProviderAdapter, SubmitOutcome, SubmitRequest, VoidOutcome};
use crate::breaker::{BreakerConfig, CircuitBreaker};
use crate::error::AdapterError;
use crate::matrix::RoutePlan;
use sardis_observability::MetricsRegistry;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// One attempt in a failover walk, for the audit payload and metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitAttempt {
    pub adapter: String,
    pub outcome: String,
}

/// Result of walking a route once.
#[derive(Debug, Clone)]
pub enum FleetOutcome {
    Accepted {
        adapter: String,
        provider_ref: String,
        /// True when the accepting adapter was not the primary.
        after_failover: bool,
        attempts: Vec<SubmitAttempt>,
    },
    /// Definitive provider refusal; no fallback was attempted past it.
    Fatal {
        adapter: String,
        message: String,
        attempts: Vec<SubmitAttempt>,
    },
    /// Every adapter on the route was open, unsupported, or retryable-failed.
    AllFailed { attempts: Vec<SubmitAttempt> },
}

/// Registry of adapters with their breakers, and the deterministic failover
/// walk over a resolved route plan.
#[derive(Clone)]
pub struct AdapterFleet {
    adapters: HashMap<String, Arc<dyn ProviderAdapter>>,
    breakers: HashMap<String, CircuitBreaker>,
    breaker_config: BreakerConfig,
    metrics: MetricsRegistry,
    call_timeout: Duration,
}

impl AdapterFleet {
    pub fn new(metrics: MetricsRegistry, breaker_config: BreakerConfig, call_timeout: Duration) -> Self {
        Self {
            adapters: HashMap::new(),
            breakers: HashMap::new(),
            breaker_config,
            metrics,
            call_timeout,
        }
    }

    pub fn register(&mut self, adapter: Arc<dyn ProviderAdapter>) {
        let name = adapter.name().to_string();
        self.breakers
            .insert(name.clone(), CircuitBreaker::new(self.breaker_config));
        self.adapters.insert(name, adapter);
    }

    pub fn adapter(&self, name: &str) -> Result<Arc<dyn ProviderAdapter>, AdapterError> {
        self.adapters
            .get(name)
            .cloned()
            .ok_or_else(|| AdapterError::UnknownAdapter(name.to_string()))
    }

    pub fn breaker(&self, name: &str) -> Option<&CircuitBreaker> {
        self.breakers.get(name)
    }

    /// Walk the route once: primary, then fallbacks in configured order.
    /// Breaker-open adapters are skipped; a timeout counts as retryable; a
    /// fatal answer stops the walk.
    pub async fn submit_with_failover(
        &self,
        plan: &RoutePlan,
        request: &SubmitRequest,
    ) -> FleetOutcome {
        let mut attempts: Vec<SubmitAttempt> = Vec::new();

        for (position, name) in plan.walk_order().enumerate() {
            let Some(adapter) = self.adapters.get(name) else {
                attempts.push(attempt(name, "unregistered"));
                continue;
            };
            if !adapter.supports(request.rail, request.direction, &request.amount.currency) {
                attempts.push(attempt(name, "unsupported"));
                continue;
            }
            let breaker = &self.breakers[name];
            if !breaker.allow_request() {
                attempts.push(attempt(name, "breaker_open"));
                self.metrics.incr("provider.submit.skipped_breaker_open");
                continue;
            }

            let outcome = match tokio::time::timeout(self.call_timeout, adapter.submit(request)).await
            {
                Ok(outcome) => outcome,
                Err(_) => SubmitOutcome::Retryable {
                    message: "provider call timed out".to_string(),
                },
            };

            match outcome {
                SubmitOutcome::Accepted { provider_ref } => {
                    breaker.record_success();
                    self.metrics.incr("provider.submit.accepted");
                    let after_failover = position > 0;
                    if after_failover {
                        self.metrics.incr("funding.failover.success_after_failover");
                    }
                    attempts.push(attempt(name, "accepted"));
                    info!(adapter = name, provider_ref, after_failover, "provider accepted");
                    return FleetOutcome::Accepted {
                        adapter: name.to_string(),
                        provider_ref,
                        after_failover,
                        attempts,
                    };
                }
                SubmitOutcome::Retryable { message } => {
                    breaker.record_failure();
                    self.metrics.incr("provider.submit.retryable");
                    warn!(adapter = name, message, "provider retryable failure");
                    attempts.push(attempt(name, "retryable"));
                }
                SubmitOutcome::Fatal { message } => {
                    self.metrics.incr("provider.submit.fatal");
                    warn!(adapter = name, message, "provider fatal refusal");
                    attempts.push(attempt(name, "fatal"));
                    return FleetOutcome::Fatal {
                        adapter: name.to_string(),
                        message,
                        attempts,
                    };
                }
            }
        }

        self.metrics.incr("provider.all_failed");
        FleetOutcome::AllFailed { attempts }
    }

    /// Provider-specific voiding for cancellation.
    pub async fn void(
        &self,
        adapter_name: &str,
        provider_ref: &str,
    ) -> Result<VoidOutcome, AdapterError> {
        self.adapter(adapter_name)?.void(provider_ref).await
    }
}

impl std::fmt::Debug for AdapterFleet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterFleet")
            .field("adapters", &self.adapters.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn attempt(adapter: &str, outcome: &str) -> SubmitAttempt {
    SubmitAttempt {
        adapter: adapter.to_string(),
        outcome: outcome.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{AlwaysFatalAdapter, AlwaysRetryableAdapter, MockAchAdapter};
    use sardis_types::{
        CurrencyCode, Direction, MandateId, Money, OrgId, PaymentId, Rail,
    };
    use std::collections::BTreeMap;

    fn request() -> SubmitRequest {
        SubmitRequest {
            payment_id: PaymentId::generate(),
            org_id: OrgId::parse("org_fleet1").unwrap(),
            mandate_id: MandateId::generate(),
            rail: Rail::Ach,
            direction: Direction::Debit,
            amount: Money::new(5_000_000, CurrencyCode::usd()).unwrap(),
            destination: "vendor.example.com".to_string(),
            metadata: BTreeMap::new(),
        }
    }

    fn fleet() -> AdapterFleet {
        AdapterFleet::new(
            MetricsRegistry::new(),
            BreakerConfig::default(),
            Duration::from_millis(500),
        )
    }

    #[tokio::test]
    async fn primary_accepts_without_failover() {
        let mut fleet = fleet();
        fleet.register(Arc::new(MockAchAdapter::new("ach_primary")));
        let plan = RoutePlan::new("ach_primary", vec![]);

        match fleet.submit_with_failover(&plan, &request()).await {
            FleetOutcome::Accepted {
                adapter,
                after_failover,
                ..
            } => {
                assert_eq!(adapter, "ach_primary");
                assert!(!after_failover);
            }
            other => panic!("expected accept, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn retryable_primary_falls_over_to_secondary() {
        let mut fleet = fleet();
        fleet.register(Arc::new(AlwaysRetryableAdapter::new("ach_primary")));
        fleet.register(Arc::new(MockAchAdapter::new("ach_backup")));
        let plan = RoutePlan::new("ach_primary", vec!["ach_backup".to_string()]);

        match fleet.submit_with_failover(&plan, &request()).await {
            FleetOutcome::Accepted {
                adapter,
                after_failover,
                attempts,
                ..
            } => {
                assert_eq!(adapter, "ach_backup");
                assert!(after_failover);
                assert_eq!(attempts.len(), 2);
            }
            other => panic!("expected failover accept, got {other:?}"),
        }
        assert_eq!(
            fleet
                .metrics
                .get("funding.failover.success_after_failover"),
            1
        );
    }

    #[tokio::test]
    async fn fatal_never_falls_back() {
        let mut fleet = fleet();
        fleet.register(Arc::new(AlwaysFatalAdapter::new("ach_primary")));
        fleet.register(Arc::new(MockAchAdapter::new("ach_backup")));
        let plan = RoutePlan::new("ach_primary", vec!["ach_backup".to_string()]);

        match fleet.submit_with_failover(&plan, &request()).await {
            FleetOutcome::Fatal { adapter, attempts, .. } => {
                assert_eq!(adapter, "ach_primary");
                assert_eq!(attempts.len(), 1);
            }
            other => panic!("expected fatal, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn exhausted_route_reports_all_failed() {
        let mut fleet = fleet();
        fleet.register(Arc::new(AlwaysRetryableAdapter::new("ach_primary")));
        fleet.register(Arc::new(AlwaysRetryableAdapter::new("ach_backup")));
        let plan = RoutePlan::new("ach_primary", vec!["ach_backup".to_string()]);

        match fleet.submit_with_failover(&plan, &request()).await {
            FleetOutcome::AllFailed { attempts } => {
                assert_eq!(attempts.len(), 2);
                assert!(attempts.iter().all(|a| a.outcome == "retryable"));
            }
            other => panic!("expected all-failed, got {other:?}"),
        }
        assert_eq!(fleet.metrics.get("provider.all_failed"), 1);
    }

    #[tokio::test]
    async fn open_breaker_is_skipped() {
        let mut fleet = AdapterFleet::new(
            MetricsRegistry::new(),
            BreakerConfig {
                failure_threshold: 1,
                recovery_timeout: chrono::Duration::minutes(5),
                half_open_probes: 1,
            },
            Duration::from_millis(500),
        );
        fleet.register(Arc::new(AlwaysRetryableAdapter::new("ach_primary")));
        fleet.register(Arc::new(MockAchAdapter::new("ach_backup")));
        let plan = RoutePlan::new("ach_primary", vec!["ach_backup".to_string()]);

        // First walk trips the primary's breaker.
        fleet.submit_with_failover(&plan, &request()).await;
        // Second walk skips it without calling.
        match fleet.submit_with_failover(&plan, &request()).await {
            FleetOutcome::Accepted { attempts, .. } => {
                assert_eq!(attempts[0].outcome, "breaker_open");
            }
            other => panic!("expected accept, got {other:?}"),
        }
    }
}
