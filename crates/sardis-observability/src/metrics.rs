use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// In-process counter registry.
///
/// Samples are also emitted through `tracing`, which is the export seam;
/// nothing here talks to a metrics backend directly.
#[derive(Debug, Clone, Default)]
pub struct MetricsRegistry {
    counters: Arc<Mutex<HashMap<String, u64>>>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn incr(&self, name: &str) {
        self.incr_by(name, 1);
    }

    pub fn incr_by(&self, name: &str, delta: u64) {
        let mut counters = match self.counters.lock() {
            Ok(counters) => counters,
            Err(poisoned) => poisoned.into_inner(),
        };
        let value = counters.entry(name.to_string()).or_insert(0);
        *value = value.saturating_add(delta);
        debug!(metric = name, value = *value, "counter");
    }

    pub fn get(&self, name: &str) -> u64 {
        let counters = match self.counters.lock() {
            Ok(counters) => counters,
            Err(poisoned) => poisoned.into_inner(),
        };
        counters.get(name).copied().unwrap_or(0)
    }

    pub fn snapshot(&self) -> HashMap<String, u64> {
        let counters = match self.counters.lock() {
            Ok(counters) => counters,
            Err(poisoned) => poisoned.into_inner(),
        };
        counters.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let metrics = MetricsRegistry::new();
        metrics.incr("webhook.duplicate_suppressed");
        metrics.incr("webhook.duplicate_suppressed");
        metrics.incr_by("funding.failover.success_after_failover", 3);

        assert_eq!(metrics.get("webhook.duplicate_suppressed"), 2);
        assert_eq!(metrics.get("funding.failover.success_after_failover"), 3);
        assert_eq!(metrics.get("never.touched"), 0);
    }

    #[test]
    fn snapshot_is_a_copy() {
        let metrics = MetricsRegistry::new();
        metrics.incr("a");
        let snap = metrics.snapshot();
        metrics.incr("a");
        assert_eq!(snap.get("a"), Some(&1));
        assert_eq!(metrics.get("a"), 2);
    }
}
