//! Canonical reconciliation store.
//!
//! One journey per payment accumulates every state observation across the
//! orchestrator, provider webhooks, and chain events. When the orchestrator
//! and provider views disagree for longer than the drift window, a break
//! record lands in an operator-visible queue with a severity tier.

#![deny(unsafe_code)]

pub mod error;
pub mod journey;
pub mod store;

pub use error::ReconError;
pub use journey::{BreakSeverity, CanonicalJourney, DriftBreak, StateObservation, ViewSource};
pub use store::{ReconConfig, ReconStore};
