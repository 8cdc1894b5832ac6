//! Append-only audit ledger for the Sardis control plane.
//!
//! Every state change on the money path lands here as a hash-chained entry:
//! `entry_hash = H(prev_hash || payload_digest || created_at || kind)`, with a
//! strict per-org sequence and no in-place mutation, ever. Entries are sealed
//! into Merkle batches whose roots can be anchored to an opaque external
//! reference, and evidence exports paginate with a replay-safe cursor.

#![deny(unsafe_code)]

pub mod chain;
pub mod entry;
pub mod error;
pub mod export;
pub mod merkle;
pub mod store;

pub use chain::{AuditLedger, Receipt, VerificationReport};
pub use entry::{EntryKind, LedgerEntry};
pub use error::LedgerError;
pub use export::{EvidenceBundle, EvidencePage, ExportCursor, ExportWindow};
pub use merkle::MerkleBatch;
pub use store::{LedgerStorageConfig, PersistentAuditLedger};
