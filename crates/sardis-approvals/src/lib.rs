//! Approval manager: request/approve/deny/expire with quorum semantics.
//!
//! Clients poll or re-read state; there is no in-memory hand-off channel to
//! the orchestrator. Every transition lands on the audit ledger.

#![deny(unsafe_code)]

pub mod error;
pub mod manager;
pub mod trust;

pub use error::ApprovalError;
pub use manager::{
    ApprovalManager, ApprovalRequest, ApprovalStatus, ReviewOutcome, ReviewerVote,
};
pub use trust::{TrustRegistry, TrustRelation};
