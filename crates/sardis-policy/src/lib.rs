//! Deterministic policy decision engine.
//!
//! Evaluation is strictly layered: immutable hard caps, wallet preconditions,
//! compliance gates, vendor/category rules, velocity windows, approval
//! thresholds, then goal drift. The same mandate, snapshot, and counters
//! always produce the same decision, and every error on the way translates
//! into a refusal. Natural-language hints may only ever tighten a cap.

#![deny(unsafe_code)]

pub mod context;
pub mod decision;
pub mod drift;
pub mod engine;
pub mod error;
pub mod hints;
pub mod snapshot;
pub mod vendor;

pub use context::{ComplianceState, EvalContext, OrgCounters, WalletState, WindowCounter};
pub use decision::{ApprovalTemplate, PolicyCheck, PolicyDecision, PolicyOutcome};
pub use drift::{DriftProfile, DriftThresholds};
pub use engine::PolicyEngine;
pub use error::PolicyError;
pub use hints::{HintApplication, SpendHint};
pub use snapshot::{HardCaps, PolicySnapshot, RuleSet, VelocityLimits, WindowLimit};
pub use vendor::normalize_domain;
