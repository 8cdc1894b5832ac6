//! Operational guardrails around the Sardis money path: in-process metrics,
//! per-agent rate limits, per-wallet kill switches, and the deterministic
//! Normal/Degraded/Containment failover ladder.

#![deny(unsafe_code)]

pub mod failover;
pub mod guardrail;
pub mod killswitch;
pub mod metrics;
pub mod ratelimit;

pub use failover::{FailoverMode, FailoverState, ModePermit};
pub use guardrail::{Guardrail, GuardrailRegistry};
pub use killswitch::KillSwitchRegistry;
pub use metrics::MetricsRegistry;
pub use ratelimit::{RateLimitConfig, SlidingWindowRateLimiter};
