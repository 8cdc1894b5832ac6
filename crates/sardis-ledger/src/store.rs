use crate::chain::AuditLedger;
use crate::entry::{EntryKind, LedgerEntry};
use crate::error::LedgerError;
use sardis_types::{LedgerEntryId, OrgId};
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use std::io::Write;
use std::path::PathBuf;
use tracing::{error, warn};

/// Ledger persistence backend configuration.
#[derive(Debug, Clone, Default)]
pub enum LedgerStorageConfig {
    /// Keep the chain in process memory only.
    #[default]
    Memory,
    /// Mirror every entry to PostgreSQL and hydrate on startup. When the
    /// mirror becomes unavailable, entries spool to a local NDJSON file and
    /// the ledger reports itself degraded so the orchestrator can refuse new
    /// payments rather than lose audit records.
    Postgres {
        database_url: String,
        max_connections: u32,
        spool_path: PathBuf,
    },
}

impl LedgerStorageConfig {
    pub fn memory() -> Self {
        Self::Memory
    }

    pub fn postgres(
        database_url: impl Into<String>,
        max_connections: u32,
        spool_path: impl Into<PathBuf>,
    ) -> Self {
        Self::Postgres {
            database_url: database_url.into(),
            max_connections,
            spool_path: spool_path.into(),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Postgres { .. } => "postgres",
        }
    }
}

#[derive(Debug)]
enum Backend {
    Memory,
    Postgres {
        store: PostgresLedgerStore,
        spool_path: PathBuf,
    },
}

/// Runtime ledger that keeps the in-memory authoritative chain while
/// optionally mirroring each entry to PostgreSQL.
///
/// Entry hash and sequence are computed against the in-memory chain first;
/// the entry is made durable before it is committed in memory; persisted
/// entries are hydrated and hash-verified on startup.
#[derive(Debug)]
pub struct PersistentAuditLedger {
    ledger: AuditLedger,
    backend: Backend,
    degraded: bool,
}

impl PersistentAuditLedger {
    pub async fn bootstrap(config: LedgerStorageConfig) -> Result<Self, LedgerError> {
        match config {
            LedgerStorageConfig::Memory => Ok(Self {
                ledger: AuditLedger::new(),
                backend: Backend::Memory,
                degraded: false,
            }),
            LedgerStorageConfig::Postgres {
                database_url,
                max_connections,
                spool_path,
            } => {
                let store = PostgresLedgerStore::connect(&database_url, max_connections).await?;
                store.ensure_schema().await?;
                let entries = store.load_entries().await?;
                let ledger = AuditLedger::from_entries(entries)?;
                Ok(Self {
                    ledger,
                    backend: Backend::Postgres { store, spool_path },
                    degraded: false,
                })
            }
        }
    }

    /// Build from already-persisted entries, memory backend.
    pub fn from_entries(entries: Vec<LedgerEntry>) -> Result<Self, LedgerError> {
        Ok(Self {
            ledger: AuditLedger::from_entries(entries)?,
            backend: Backend::Memory,
            degraded: false,
        })
    }

    pub fn backend_label(&self) -> &'static str {
        match self.backend {
            Backend::Memory => "memory",
            Backend::Postgres { .. } => "postgres",
        }
    }

    /// True once the durable mirror has failed and entries are spooling to
    /// disk. The money path must refuse new work while this holds.
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    pub fn ledger(&self) -> &AuditLedger {
        &self.ledger
    }

    pub fn ledger_mut(&mut self) -> &mut AuditLedger {
        &mut self.ledger
    }

    pub async fn append(
        &mut self,
        org_id: &OrgId,
        kind: EntryKind,
        payload: Value,
    ) -> Result<LedgerEntry, LedgerError> {
        let entry = self.ledger.build_entry(org_id, kind, payload);

        if let Backend::Postgres { store, spool_path } = &self.backend {
            if let Err(err) = store.insert_entry(&entry).await {
                error!(ltx_id = %entry.ltx_id, %err, "ledger mirror unavailable, spooling to disk");
                spool_entry(spool_path, &entry)?;
                self.degraded = true;
            } else if self.degraded {
                warn!("ledger mirror recovered; spool replay required before clearing degraded state");
            }
        }

        self.ledger.commit_entry(entry.clone())?;
        Ok(entry)
    }

    pub fn get(&self, ltx_id: &LedgerEntryId) -> Option<&LedgerEntry> {
        self.ledger.get(ltx_id)
    }
}

/// Append one NDJSON line per entry. The spool is the narrow fail-open path
/// of the audit pipeline: the record survives even when the mirror is down.
fn spool_entry(path: &PathBuf, entry: &LedgerEntry) -> Result<(), LedgerError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| LedgerError::Spool(e.to_string()))?;
    }
    let line =
        serde_json::to_string(entry).map_err(|e| LedgerError::Serialization(e.to_string()))?;
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| LedgerError::Spool(e.to_string()))?;
    writeln!(file, "{line}").map_err(|e| LedgerError::Spool(e.to_string()))?;
    Ok(())
}

#[derive(Debug)]
struct PostgresLedgerStore {
    pool: PgPool,
}

impl PostgresLedgerStore {
    async fn connect(database_url: &str, max_connections: u32) -> Result<Self, LedgerError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect(database_url)
            .await
            .map_err(|e| LedgerError::Storage(format!("postgres connect failed: {e}")))?;
        Ok(Self { pool })
    }

    async fn ensure_schema(&self) -> Result<(), LedgerError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sardis_ledger_entries (
                ltx_id TEXT NOT NULL UNIQUE,
                org_id TEXT NOT NULL,
                seq BIGINT NOT NULL,
                prev_hash TEXT NULL,
                entry_hash TEXT NOT NULL,
                payload_digest TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL,
                kind TEXT NOT NULL,
                payload JSONB NOT NULL,
                PRIMARY KEY (org_id, seq)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| LedgerError::Storage(format!("postgres schema create failed: {e}")))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_sardis_ledger_kind ON sardis_ledger_entries (org_id, kind)",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| LedgerError::Storage(format!("postgres index create failed: {e}")))?;

        Ok(())
    }

    async fn load_entries(&self) -> Result<Vec<LedgerEntry>, LedgerError> {
        let rows = sqlx::query(
            r#"
            SELECT ltx_id, org_id, seq, prev_hash, entry_hash, payload_digest,
                   created_at, kind, payload
            FROM sardis_ledger_entries
            ORDER BY org_id ASC, seq ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| LedgerError::Storage(format!("postgres load failed: {e}")))?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let ltx: String = row
                .try_get("ltx_id")
                .map_err(|e| LedgerError::Storage(format!("decode ltx_id: {e}")))?;
            let org: String = row
                .try_get("org_id")
                .map_err(|e| LedgerError::Storage(format!("decode org_id: {e}")))?;
            let seq: i64 = row
                .try_get("seq")
                .map_err(|e| LedgerError::Storage(format!("decode seq: {e}")))?;
            let kind_raw: String = row
                .try_get("kind")
                .map_err(|e| LedgerError::Storage(format!("decode kind: {e}")))?;
            let kind: EntryKind = serde_json::from_value(Value::String(kind_raw.clone()))
                .map_err(|_| LedgerError::Storage(format!("unknown ledger kind '{kind_raw}'")))?;

            entries.push(LedgerEntry {
                ltx_id: LedgerEntryId::parse(ltx)
                    .map_err(|e| LedgerError::Storage(e.to_string()))?,
                org_id: OrgId::parse(org).map_err(|e| LedgerError::Storage(e.to_string()))?,
                seq: seq
                    .try_into()
                    .map_err(|_| LedgerError::Storage("negative seq in storage".to_string()))?,
                prev_hash: row
                    .try_get("prev_hash")
                    .map_err(|e| LedgerError::Storage(format!("decode prev_hash: {e}")))?,
                entry_hash: row
                    .try_get("entry_hash")
                    .map_err(|e| LedgerError::Storage(format!("decode entry_hash: {e}")))?,
                payload_digest: row
                    .try_get("payload_digest")
                    .map_err(|e| LedgerError::Storage(format!("decode payload_digest: {e}")))?,
                created_at: row
                    .try_get("created_at")
                    .map_err(|e| LedgerError::Storage(format!("decode created_at: {e}")))?,
                kind,
                payload: row
                    .try_get("payload")
                    .map_err(|e| LedgerError::Storage(format!("decode payload: {e}")))?,
            });
        }
        Ok(entries)
    }

    async fn insert_entry(&self, entry: &LedgerEntry) -> Result<(), LedgerError> {
        let seq: i64 = entry
            .seq
            .try_into()
            .map_err(|_| LedgerError::Storage("seq exceeds BIGINT range".to_string()))?;
        let kind = serde_json::to_value(entry.kind)
            .ok()
            .and_then(|v| v.as_str().map(|s| s.to_string()))
            .ok_or_else(|| LedgerError::Serialization("kind encode failed".to_string()))?;
        sqlx::query(
            r#"
            INSERT INTO sardis_ledger_entries (
                ltx_id, org_id, seq, prev_hash, entry_hash, payload_digest,
                created_at, kind, payload
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(entry.ltx_id.as_str())
        .bind(entry.org_id.as_str())
        .bind(seq)
        .bind(&entry.prev_hash)
        .bind(&entry.entry_hash)
        .bind(&entry.payload_digest)
        .bind(entry.created_at)
        .bind(kind)
        .bind(&entry.payload)
        .execute(&self.pool)
        .await
        .map_err(|e| LedgerError::Storage(format!("postgres insert failed: {e}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn org() -> OrgId {
        OrgId::parse("org_store1").unwrap()
    }

    #[tokio::test]
    async fn memory_backend_appends_and_verifies() {
        let mut ledger = PersistentAuditLedger::bootstrap(LedgerStorageConfig::memory())
            .await
            .unwrap();
        let first = ledger
            .append(&org(), EntryKind::PaymentSubmitted, json!({"ok": true}))
            .await
            .unwrap();
        ledger
            .append(&org(), EntryKind::PaymentTransition, json!({"ok": true}))
            .await
            .unwrap();

        assert_eq!(ledger.ledger().chain_len(&org()), 2);
        assert!(!ledger.is_degraded());
        let report = ledger.ledger().verify(&first.ltx_id).unwrap();
        assert!(report.chain_ok);
    }

    #[tokio::test]
    async fn from_entries_rehydrates_verified_chain() {
        let mut base = AuditLedger::new();
        base.append(&org(), EntryKind::PaymentSubmitted, json!({"n": 1}))
            .unwrap();
        base.append(&org(), EntryKind::PaymentTransition, json!({"n": 2}))
            .unwrap();

        let rehydrated =
            PersistentAuditLedger::from_entries(base.org_entries(&org()).to_vec()).unwrap();
        assert_eq!(rehydrated.ledger().chain_len(&org()), 2);
        assert_eq!(rehydrated.backend_label(), "memory");
    }

    #[test]
    fn spool_appends_ndjson_lines() {
        let dir = std::env::temp_dir().join(format!("sardis-spool-{}", uuid::Uuid::new_v4()));
        let path = dir.join("audit.spool");
        let mut ledger = AuditLedger::new();
        let entry = ledger
            .append(&org(), EntryKind::PaymentBlocked, json!({"r": "cap"}))
            .unwrap();

        spool_entry(&path, &entry).unwrap();
        spool_entry(&path, &entry).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);
        let parsed: LedgerEntry = serde_json::from_str(content.lines().next().unwrap()).unwrap();
        assert_eq!(parsed.ltx_id, entry.ltx_id);
    }
}
