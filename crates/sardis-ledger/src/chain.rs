use crate::entry::{compute_entry_hash, payload_digest, EntryKind, LedgerEntry};
use crate::error::LedgerError;
use crate::merkle::MerkleBatch;
use chrono::Utc;
use sardis_types::{LedgerEntryId, OrgId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Proof handed back to callers that an audit record was anchored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Receipt {
    pub ltx_id: LedgerEntryId,
    pub org_id: OrgId,
    pub seq: u64,
    pub entry_hash: String,
    pub merkle_root: Option<String>,
    pub anchor_reference: Option<String>,
}

/// Outcome of verifying one entry against its org chain and batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationReport {
    pub chain_ok: bool,
    pub leaf_in_root: bool,
    pub root_anchored: bool,
    pub tampered_indices: Vec<u64>,
}

impl VerificationReport {
    pub fn is_clean(&self) -> bool {
        self.chain_ok && self.tampered_indices.is_empty()
    }
}

/// In-memory append-only ledger, one hash chain per org.
///
/// No mutation APIs are exposed; every state transition becomes an additional
/// record. The build/commit split lets a persistence layer make an entry
/// durable before it joins the in-memory chain.
#[derive(Debug, Default, Clone)]
pub struct AuditLedger {
    chains: HashMap<OrgId, Vec<LedgerEntry>>,
    index: HashMap<LedgerEntryId, (OrgId, u64)>,
    batches: HashMap<OrgId, Vec<MerkleBatch>>,
}

impl AuditLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from persisted entries, verifying per-org sequence and chain.
    pub fn from_entries(entries: Vec<LedgerEntry>) -> Result<Self, LedgerError> {
        let mut ledger = Self::new();
        for entry in entries {
            let chain = ledger.chains.entry(entry.org_id.clone()).or_default();
            let expected = chain.len() as u64;
            if entry.seq != expected {
                return Err(LedgerError::SequenceGap {
                    org: entry.org_id.to_string(),
                    expected,
                    found: entry.seq,
                });
            }
            ledger
                .index
                .insert(entry.ltx_id.clone(), (entry.org_id.clone(), entry.seq));
            chain.push(entry);
        }
        for org in ledger.chains.keys().cloned().collect::<Vec<_>>() {
            if !ledger.verify_org_chain(&org).is_empty() {
                return Err(LedgerError::ChainBroken(org.to_string()));
            }
        }
        Ok(ledger)
    }

    pub fn append(
        &mut self,
        org_id: &OrgId,
        kind: EntryKind,
        payload: Value,
    ) -> Result<LedgerEntry, LedgerError> {
        let entry = self.build_entry(org_id, kind, payload);
        self.commit_entry(entry.clone())?;
        Ok(entry)
    }

    /// Build the next deterministic entry without mutating the chain.
    pub fn build_entry(&self, org_id: &OrgId, kind: EntryKind, payload: Value) -> LedgerEntry {
        let chain = self.chains.get(org_id);
        let seq = chain.map(|c| c.len() as u64).unwrap_or(0);
        let prev_hash = chain.and_then(|c| c.last()).map(|e| e.entry_hash.clone());
        let created_at = Utc::now();
        let digest = payload_digest(&payload);
        let entry_hash = compute_entry_hash(prev_hash.as_deref(), &digest, created_at, kind);

        LedgerEntry {
            ltx_id: LedgerEntryId::generate(),
            org_id: org_id.clone(),
            seq,
            prev_hash,
            entry_hash,
            payload_digest: digest,
            created_at,
            kind,
            payload,
        }
    }

    /// Commit a pre-built entry after external durability succeeds.
    pub fn commit_entry(&mut self, entry: LedgerEntry) -> Result<(), LedgerError> {
        let chain = self.chains.entry(entry.org_id.clone()).or_default();
        let expected_seq = chain.len() as u64;
        if entry.seq != expected_seq {
            return Err(LedgerError::CommitMismatch(format!(
                "seq: expected {expected_seq}, got {}",
                entry.seq
            )));
        }
        let expected_prev = chain.last().map(|e| e.entry_hash.clone());
        if entry.prev_hash != expected_prev {
            return Err(LedgerError::CommitMismatch("prev_hash".to_string()));
        }
        if entry.entry_hash != entry.expected_hash() {
            return Err(LedgerError::CommitMismatch("entry_hash".to_string()));
        }
        self.index
            .insert(entry.ltx_id.clone(), (entry.org_id.clone(), entry.seq));
        chain.push(entry);
        Ok(())
    }

    pub fn get(&self, ltx_id: &LedgerEntryId) -> Option<&LedgerEntry> {
        let (org, seq) = self.index.get(ltx_id)?;
        self.chains.get(org)?.get(*seq as usize)
    }

    /// Page through an org chain in sequence order. The cursor is the last
    /// sequence number already returned; later appends only ever land after
    /// it, so pages are stable.
    pub fn list(
        &self,
        org_id: &OrgId,
        after_seq: Option<u64>,
        limit: usize,
    ) -> (Vec<LedgerEntry>, Option<u64>) {
        let Some(chain) = self.chains.get(org_id) else {
            return (Vec::new(), None);
        };
        let start = after_seq.map(|s| s as usize + 1).unwrap_or(0);
        let page: Vec<LedgerEntry> = chain.iter().skip(start).take(limit).cloned().collect();
        let next = if start + page.len() < chain.len() {
            page.last().map(|e| e.seq)
        } else {
            None
        };
        (page, next)
    }

    pub fn org_entries(&self, org_id: &OrgId) -> &[LedgerEntry] {
        self.chains.get(org_id).map(|c| c.as_slice()).unwrap_or(&[])
    }

    pub fn orgs(&self) -> Vec<OrgId> {
        self.chains.keys().cloned().collect()
    }

    pub fn chain_len(&self, org_id: &OrgId) -> u64 {
        self.chains.get(org_id).map(|c| c.len() as u64).unwrap_or(0)
    }

    /// Seal all not-yet-batched entries of an org into a Merkle batch.
    pub fn seal_batch(&mut self, org_id: &OrgId) -> Option<MerkleBatch> {
        let chain = self.chains.get(org_id)?;
        let sealed_through = self
            .batches
            .get(org_id)
            .and_then(|b| b.last())
            .map(|b| b.last_seq + 1)
            .unwrap_or(0);
        if sealed_through as usize >= chain.len() {
            return None;
        }
        let leaves: Vec<String> = chain[sealed_through as usize..]
            .iter()
            .map(|e| e.entry_hash.clone())
            .collect();
        let batch = MerkleBatch::seal(
            org_id.clone(),
            sealed_through,
            chain.len() as u64 - 1,
            leaves,
        );
        self.batches
            .entry(org_id.clone())
            .or_default()
            .push(batch.clone());
        Some(batch)
    }

    /// Record the external anchor for a sealed batch.
    pub fn anchor_batch(
        &mut self,
        org_id: &OrgId,
        root: &str,
        reference: impl Into<String>,
    ) -> Result<(), LedgerError> {
        let batches = self
            .batches
            .get_mut(org_id)
            .ok_or_else(|| LedgerError::BatchNotFound(root.to_string()))?;
        let batch = batches
            .iter_mut()
            .find(|b| b.root == root)
            .ok_or_else(|| LedgerError::BatchNotFound(root.to_string()))?;
        batch.anchor_reference = Some(reference.into());
        Ok(())
    }

    pub fn batches(&self, org_id: &OrgId) -> &[MerkleBatch] {
        self.batches.get(org_id).map(|b| b.as_slice()).unwrap_or(&[])
    }

    pub fn receipt(&self, ltx_id: &LedgerEntryId) -> Result<Receipt, LedgerError> {
        let entry = self
            .get(ltx_id)
            .ok_or_else(|| LedgerError::EntryNotFound(ltx_id.to_string()))?;
        let batch = self.batch_for(&entry.org_id, entry.seq);
        Ok(Receipt {
            ltx_id: entry.ltx_id.clone(),
            org_id: entry.org_id.clone(),
            seq: entry.seq,
            entry_hash: entry.entry_hash.clone(),
            merkle_root: batch.map(|b| b.root.clone()),
            anchor_reference: batch.and_then(|b| b.anchor_reference.clone()),
        })
    }

    pub fn verify(&self, ltx_id: &LedgerEntryId) -> Result<VerificationReport, LedgerError> {
        let entry = self
            .get(ltx_id)
            .ok_or_else(|| LedgerError::EntryNotFound(ltx_id.to_string()))?;
        let tampered = self.verify_org_chain(&entry.org_id);
        let batch = self.batch_for(&entry.org_id, entry.seq);
        let leaf_in_root = batch
            .map(|b| b.contains_leaf(&entry.entry_hash) && b.root_matches())
            .unwrap_or(false);
        let root_anchored = batch.map(|b| b.anchor_reference.is_some()).unwrap_or(false);
        Ok(VerificationReport {
            chain_ok: tampered.is_empty(),
            leaf_in_root,
            root_anchored,
            tampered_indices: tampered,
        })
    }

    fn batch_for(&self, org_id: &OrgId, seq: u64) -> Option<&MerkleBatch> {
        self.batches
            .get(org_id)?
            .iter()
            .find(|b| b.first_seq <= seq && seq <= b.last_seq)
    }

    /// Walk one org chain and return the sequence numbers whose recomputed
    /// hash or linkage disagrees with what is stored.
    fn verify_org_chain(&self, org_id: &OrgId) -> Vec<u64> {
        let Some(chain) = self.chains.get(org_id) else {
            return Vec::new();
        };
        let mut tampered = Vec::new();
        let mut prev: Option<&str> = None;
        for entry in chain {
            if !entry.is_intact() || entry.prev_hash.as_deref() != prev {
                tampered.push(entry.seq);
            }
            prev = Some(entry.entry_hash.as_str());
        }
        tampered
    }
}
