use crate::chain::AuditLedger;
use crate::entry::LedgerEntry;
use crate::error::LedgerError;
use chrono::{DateTime, Utc};
use sardis_types::OrgId;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Half-open evidence window `[start, end]` over entry creation times.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExportWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ExportWindow {
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.start <= ts && ts <= self.end
    }
}

/// Stable pagination cursor binding `(org, window_start, last_seen_seq)`.
///
/// Appends that happen mid-export always receive a higher sequence number
/// than anything already returned, so a page produced for a given cursor can
/// never change or reorder retroactively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportCursor {
    pub org_id: OrgId,
    pub window_start: DateTime<Utc>,
    pub last_seen_seq: u64,
}

impl ExportCursor {
    /// Opaque wire form.
    pub fn encode(&self) -> String {
        let json = serde_json::to_vec(self).unwrap_or_default();
        hex::encode(json)
    }

    pub fn decode(token: &str) -> Result<Self, LedgerError> {
        let bytes = hex::decode(token).map_err(|_| LedgerError::MalformedCursor)?;
        serde_json::from_slice(&bytes).map_err(|_| LedgerError::MalformedCursor)
    }
}

/// One page of an evidence export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidencePage {
    pub records: Vec<LedgerEntry>,
    pub next_cursor: Option<String>,
}

/// Complete export of a window: newline-delimited records plus a manifest
/// carrying SHA-256 over the concatenated lines and the Merkle roots sealed
/// inside the window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceBundle {
    pub org_id: OrgId,
    pub window: ExportWindow,
    pub record_count: usize,
    pub ndjson: String,
    pub manifest_sha256: String,
    pub merkle_roots: Vec<String>,
}

impl AuditLedger {
    /// Replay-safe page of entries inside `window`, starting after the
    /// cursor's `last_seen_seq`.
    pub fn export_page(
        &self,
        org_id: &OrgId,
        window: ExportWindow,
        cursor: Option<&str>,
        limit: usize,
    ) -> Result<EvidencePage, LedgerError> {
        let after_seq = match cursor {
            Some(token) => {
                let cursor = ExportCursor::decode(token)?;
                if cursor.org_id != *org_id || cursor.window_start != window.start {
                    return Err(LedgerError::MalformedCursor);
                }
                Some(cursor.last_seen_seq)
            }
            None => None,
        };

        let mut records = Vec::new();
        let mut remainder = false;
        for entry in self.org_entries(org_id) {
            if let Some(after) = after_seq {
                if entry.seq <= after {
                    continue;
                }
            }
            if !window.contains(entry.created_at) {
                continue;
            }
            if records.len() == limit {
                remainder = true;
                break;
            }
            records.push(entry.clone());
        }

        let next_cursor = if remainder {
            records.last().map(|last: &LedgerEntry| {
                ExportCursor {
                    org_id: org_id.clone(),
                    window_start: window.start,
                    last_seen_seq: last.seq,
                }
                .encode()
            })
        } else {
            None
        };

        Ok(EvidencePage {
            records,
            next_cursor,
        })
    }

    /// Export every entry of a window as an evidence bundle.
    pub fn export_bundle(
        &self,
        org_id: &OrgId,
        window: ExportWindow,
    ) -> Result<EvidenceBundle, LedgerError> {
        let mut ndjson = String::new();
        let mut count = 0usize;
        for entry in self.org_entries(org_id) {
            if !window.contains(entry.created_at) {
                continue;
            }
            let line = serde_json::to_string(entry)
                .map_err(|e| LedgerError::Serialization(e.to_string()))?;
            ndjson.push_str(&line);
            ndjson.push('\n');
            count += 1;
        }

        let merkle_roots: Vec<String> = self
            .batches(org_id)
            .iter()
            .filter(|b| window.contains(b.sealed_at))
            .map(|b| b.root.clone())
            .collect();

        let mut hasher = Sha256::new();
        hasher.update(ndjson.as_bytes());
        for root in &merkle_roots {
            hasher.update(root.as_bytes());
        }
        let manifest_sha256 = hex::encode(hasher.finalize());

        Ok(EvidenceBundle {
            org_id: org_id.clone(),
            window,
            record_count: count,
            ndjson,
            manifest_sha256,
            merkle_roots,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::EntryKind;
    use chrono::Duration;
    use serde_json::json;

    fn org() -> OrgId {
        OrgId::parse("org_export1").unwrap()
    }

    fn wide_window() -> ExportWindow {
        let now = Utc::now();
        ExportWindow {
            start: now - Duration::hours(1),
            end: now + Duration::hours(1),
        }
    }

    #[test]
    fn pages_are_stable_under_mid_export_appends() {
        let mut ledger = AuditLedger::new();
        for n in 0..4 {
            ledger
                .append(&org(), EntryKind::PaymentTransition, json!({ "n": n }))
                .unwrap();
        }
        let window = wide_window();
        let first = ledger.export_page(&org(), window, None, 2).unwrap();
        assert_eq!(first.records.len(), 2);
        let token = first.next_cursor.clone().unwrap();

        // Append after the first page was served.
        ledger
            .append(&org(), EntryKind::PaymentTransition, json!({"n": 99}))
            .unwrap();

        let replayed = ledger.export_page(&org(), window, None, 2).unwrap();
        assert_eq!(first.records, replayed.records);

        let second = ledger
            .export_page(&org(), window, Some(&token), 10)
            .unwrap();
        assert_eq!(second.records.first().unwrap().seq, 2);
    }

    #[test]
    fn cursor_binds_org_and_window() {
        let mut ledger = AuditLedger::new();
        ledger
            .append(&org(), EntryKind::PaymentSubmitted, json!({}))
            .unwrap();
        let window = wide_window();
        let cursor = ExportCursor {
            org_id: OrgId::parse("org_other9").unwrap(),
            window_start: window.start,
            last_seen_seq: 0,
        }
        .encode();
        assert!(matches!(
            ledger.export_page(&org(), window, Some(&cursor), 10),
            Err(LedgerError::MalformedCursor)
        ));
    }

    #[test]
    fn cursor_rejects_garbage() {
        assert!(ExportCursor::decode("not-hex!").is_err());
    }

    #[test]
    fn bundle_manifest_covers_lines_and_roots() {
        let mut ledger = AuditLedger::new();
        ledger
            .append(&org(), EntryKind::PaymentSubmitted, json!({"a": 1}))
            .unwrap();
        ledger
            .append(&org(), EntryKind::PaymentTransition, json!({"a": 2}))
            .unwrap();
        ledger.seal_batch(&org());

        let bundle = ledger.export_bundle(&org(), wide_window()).unwrap();
        assert_eq!(bundle.record_count, 2);
        assert_eq!(bundle.ndjson.lines().count(), 2);
        assert_eq!(bundle.merkle_roots.len(), 1);
        assert_eq!(bundle.manifest_sha256.len(), 64);
    }
}
