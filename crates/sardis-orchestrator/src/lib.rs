//! Payment orchestrator: the synchronous decision-and-settlement pipeline.
//!
//! `execute` takes a sealed mandate from "agent submits payment intent" to
//! "funds move or are definitively refused": idempotency admission, policy
//! decision, approval gating, provider dispatch with deterministic failover,
//! and a ledger anchor for every outcome. The asynchronous path drives
//! payment state machines from normalized provider events under a
//! per-payment single-flight lock.

#![deny(unsafe_code)]

pub mod context;
pub mod engine;
pub mod error;
pub mod holds;
pub mod treasury;

pub use context::{ContextSource, StaticContextSource};
pub use engine::{
    CancelOutcome, ComponentRegistry, ExecuteResponse, ExecuteStatus, OrchestratorConfig,
    PaymentOrchestrator, EXECUTE_SCOPE,
};
pub use error::OrchestratorError;
pub use holds::{Hold, HoldStatus, HoldStore};
pub use treasury::{TreasuryBalances, TreasuryService};
