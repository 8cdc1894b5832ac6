//! Payment lifecycle state machines, one per rail.
//!
//! Transitions are driven exclusively by normalized provider events. The
//! tables are closed: an event outside the table is rejected without touching
//! state, and a terminal state can never be downgraded by an out-of-order
//! delivery. Re-asserting the same terminal is accepted as a no-op so webhook
//! replays stay idempotent.

#![deny(unsafe_code)]

pub mod ach;
pub mod card;
pub mod chain;
pub mod error;
pub mod machine;
pub mod payment;

pub use ach::{AchEvent, AchState, ReturnCode, ReturnDisposition};
pub use card::{CardEvent, CardState};
pub use chain::{ChainEvent, ChainState};
pub use error::LifecycleError;
pub use machine::{apply_event, RailEvent, RailState, TransitionOutcome};
pub use payment::PaymentRecord;

/// ACH auto-retry ceiling for retry-eligible return codes.
pub const MAX_ACH_RETRIES: u8 = 2;
