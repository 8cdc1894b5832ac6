//! Idempotency guarantees for the Sardis money path.
//!
//! A `(scope, key)` pair names one logical operation. The store remembers the
//! outcome of the first attempt so replays observe the identical result and
//! money moves at most once; the lock registry serializes concurrent work on
//! one payment with bounded acquisition.

#![deny(unsafe_code)]

pub mod error;
pub mod lock;
pub mod store;

pub use error::IdempotencyError;
pub use lock::{KeyGuard, LockRegistry};
pub use store::{BeginOutcome, IdempotencyRecord, IdempotencyState, IdempotencyStore};
