use chrono::{DateTime, Duration, Utc};
use sardis_types::AgentId;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

/// Per-agent admission window.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 60,
            window: Duration::minutes(1),
        }
    }
}

/// Sliding-window request limiter, applied before policy evaluation so a
/// flooding agent is refused without burning a policy decision.
#[derive(Debug, Clone)]
pub struct SlidingWindowRateLimiter {
    config: RateLimitConfig,
    hits: Arc<Mutex<HashMap<AgentId, VecDeque<DateTime<Utc>>>>>,
}

impl SlidingWindowRateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            hits: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Record an attempt at `now` and report whether it is admitted.
    pub fn check_and_record(&self, agent: &AgentId, now: DateTime<Utc>) -> bool {
        let mut hits = match self.hits.lock() {
            Ok(hits) => hits,
            Err(poisoned) => poisoned.into_inner(),
        };
        let window = hits.entry(agent.clone()).or_default();
        let horizon = now - self.config.window;
        while window.front().is_some_and(|ts| *ts <= horizon) {
            window.pop_front();
        }
        if window.len() as u32 >= self.config.max_requests {
            return false;
        }
        window.push_back(now);
        true
    }

    pub fn admit(&self, agent: &AgentId) -> bool {
        self.check_and_record(agent, Utc::now())
    }
}
