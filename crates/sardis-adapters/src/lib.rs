//! Provider adapter framework.
//!
//! Adapters present one uniform capability surface per provider: `supports`,
//! `submit`, `status`, `void`. A capability matrix resolves the primary and
//! ordered fallbacks per org/rail/currency; the fleet walks that route once,
//! deterministically, skipping adapters whose circuit breaker is open. A
//! `Fatal` answer never falls back.

#![deny(unsafe_code)]

pub mod adapter;
pub mod breaker;
pub mod error;
pub mod fixtures;
pub mod fleet;
pub mod matrix;

pub use adapter::{
    ProviderAdapter, ProviderStatus, SubmitOutcome, SubmitRequest, VoidOutcome,
};
pub use breaker::{BreakerConfig, BreakerState, CircuitBreaker};
pub use error::AdapterError;
pub use fixtures::{
    AlwaysFatalAdapter, AlwaysRetryableAdapter, MockAchAdapter, MockCardAdapter,
    MockMpcSignerAdapter,
};
pub use fleet::{AdapterFleet, FleetOutcome, SubmitAttempt};
pub use matrix::{CapabilityMatrix, RiskTier, RoutePlan};
