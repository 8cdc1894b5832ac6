use crate::error::OrchestratorError;
use chrono::{DateTime, Duration, Utc};
use sardis_ledger::{EntryKind, PersistentAuditLedger};
use sardis_types::{HoldId, Money, OrgId, WalletId};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HoldStatus {
    Active,
    Captured,
    Voided,
    Expired,
}

impl HoldStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, HoldStatus::Active)
    }
}

/// Two-phase reservation against a wallet. Terminal transitions are
/// irreversible and `captured_amount` never exceeds the reserved amount.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hold {
    pub hold_id: HoldId,
    pub org_id: OrgId,
    pub wallet_id: WalletId,
    pub amount: Money,
    pub status: HoldStatus,
    pub captured_amount: Money,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Hold lifecycle owner; every transition lands on the audit ledger.
#[derive(Clone)]
pub struct HoldStore {
    holds: Arc<Mutex<HashMap<HoldId, Hold>>>,
    ledger: Arc<Mutex<PersistentAuditLedger>>,
}

impl HoldStore {
    pub fn new(ledger: Arc<Mutex<PersistentAuditLedger>>) -> Self {
        Self {
            holds: Arc::new(Mutex::new(HashMap::new())),
            ledger,
        }
    }

    pub async fn create(
        &self,
        org_id: OrgId,
        wallet_id: WalletId,
        amount: Money,
        ttl: Duration,
    ) -> Result<Hold, OrchestratorError> {
        let now = Utc::now();
        let hold = Hold {
            hold_id: HoldId::generate(),
            org_id: org_id.clone(),
            wallet_id,
            captured_amount: Money::zero(amount.currency.clone()),
            amount,
            status: HoldStatus::Active,
            created_at: now,
            expires_at: now + ttl,
        };

        self.append(
            &org_id,
            EntryKind::HoldCreated,
            json!({
                "hold_id": hold.hold_id,
                "wallet_id": hold.wallet_id,
                "amount_minor": hold.amount.amount_minor,
                "currency": hold.amount.currency,
                "expires_at": hold.expires_at,
            }),
        )
        .await?;

        let mut holds = self.holds.lock().await;
        holds.insert(hold.hold_id.clone(), hold.clone());
        Ok(hold)
    }

    /// Capture up to the reserved amount; `None` captures in full.
    pub async fn capture(
        &self,
        hold_id: &HoldId,
        amount: Option<Money>,
    ) -> Result<Hold, OrchestratorError> {
        let updated = {
            let mut holds = self.holds.lock().await;
            let hold = holds
                .get_mut(hold_id)
                .ok_or_else(|| OrchestratorError::HoldNotFound(hold_id.to_string()))?;
            expire_if_due(hold);
            if hold.status != HoldStatus::Active {
                return Err(OrchestratorError::HoldNotActive(hold_id.to_string()));
            }
            let captured = amount.unwrap_or_else(|| hold.amount.clone());
            if captured.exceeds(&hold.amount)? {
                return Err(OrchestratorError::CaptureExceedsHold);
            }
            hold.captured_amount = captured;
            hold.status = HoldStatus::Captured;
            hold.clone()
        };

        self.append(
            &updated.org_id,
            EntryKind::HoldCaptured,
            json!({
                "hold_id": updated.hold_id,
                "captured_minor": updated.captured_amount.amount_minor,
            }),
        )
        .await?;
        Ok(updated)
    }

    pub async fn void(&self, hold_id: &HoldId) -> Result<Hold, OrchestratorError> {
        let updated = {
            let mut holds = self.holds.lock().await;
            let hold = holds
                .get_mut(hold_id)
                .ok_or_else(|| OrchestratorError::HoldNotFound(hold_id.to_string()))?;
            expire_if_due(hold);
            if hold.status != HoldStatus::Active {
                return Err(OrchestratorError::HoldNotActive(hold_id.to_string()));
            }
            hold.status = HoldStatus::Voided;
            hold.clone()
        };

        self.append(
            &updated.org_id,
            EntryKind::HoldVoided,
            json!({ "hold_id": updated.hold_id }),
        )
        .await?;
        Ok(updated)
    }

    pub async fn get(&self, hold_id: &HoldId) -> Option<Hold> {
        let holds = self.holds.lock().await;
        holds.get(hold_id).cloned()
    }

    /// Expire overdue active holds; returns how many transitioned.
    pub async fn expire_sweep(&self) -> Result<usize, OrchestratorError> {
        let expired: Vec<Hold> = {
            let mut holds = self.holds.lock().await;
            holds
                .values_mut()
                .filter(|hold| hold.status == HoldStatus::Active && hold.expires_at <= Utc::now())
                .map(|hold| {
                    hold.status = HoldStatus::Expired;
                    hold.clone()
                })
                .collect()
        };

        for hold in &expired {
            self.append(
                &hold.org_id,
                EntryKind::HoldExpired,
                json!({ "hold_id": hold.hold_id }),
            )
            .await?;
        }
        Ok(expired.len())
    }

    async fn append(
        &self,
        org_id: &OrgId,
        kind: EntryKind,
        payload: serde_json::Value,
    ) -> Result<(), OrchestratorError> {
        let mut ledger = self.ledger.lock().await;
        ledger.append(org_id, kind, payload).await?;
        Ok(())
    }
}

fn expire_if_due(hold: &mut Hold) {
    if hold.status == HoldStatus::Active && hold.expires_at <= Utc::now() {
        hold.status = HoldStatus::Expired;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sardis_ledger::LedgerStorageConfig;
    use sardis_types::CurrencyCode;

    async fn store() -> HoldStore {
        let ledger = PersistentAuditLedger::bootstrap(LedgerStorageConfig::memory())
            .await
            .unwrap();
        HoldStore::new(Arc::new(Mutex::new(ledger)))
    }

    fn org() -> OrgId {
        OrgId::parse("org_hold1").unwrap()
    }

    fn wallet() -> WalletId {
        WalletId::parse("wlt_hold1").unwrap()
    }

    fn usd(amount: i64) -> Money {
        Money::new(amount, CurrencyCode::usd()).unwrap()
    }

    #[tokio::test]
    async fn create_capture_full() {
        let store = store().await;
        let hold = store
            .create(org(), wallet(), usd(100_000), Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(hold.status, HoldStatus::Active);

        let captured = store.capture(&hold.hold_id, None).await.unwrap();
        assert_eq!(captured.status, HoldStatus::Captured);
        assert_eq!(captured.captured_amount.amount_minor, 100_000);
    }

    #[tokio::test]
    async fn partial_capture_within_reservation() {
        let store = store().await;
        let hold = store
            .create(org(), wallet(), usd(100_000), Duration::hours(1))
            .await
            .unwrap();
        let captured = store
            .capture(&hold.hold_id, Some(usd(40_000)))
            .await
            .unwrap();
        assert_eq!(captured.captured_amount.amount_minor, 40_000);
    }

    #[tokio::test]
    async fn over_capture_is_refused() {
        let store = store().await;
        let hold = store
            .create(org(), wallet(), usd(100_000), Duration::hours(1))
            .await
            .unwrap();
        let err = store
            .capture(&hold.hold_id, Some(usd(100_001)))
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::CaptureExceedsHold));
        // The hold is untouched.
        assert_eq!(
            store.get(&hold.hold_id).await.unwrap().status,
            HoldStatus::Active
        );
    }

    #[tokio::test]
    async fn terminal_holds_are_irreversible() {
        let store = store().await;
        let hold = store
            .create(org(), wallet(), usd(100_000), Duration::hours(1))
            .await
            .unwrap();
        store.void(&hold.hold_id).await.unwrap();

        assert!(matches!(
            store.capture(&hold.hold_id, None).await.unwrap_err(),
            OrchestratorError::HoldNotActive(_)
        ));
        assert!(matches!(
            store.void(&hold.hold_id).await.unwrap_err(),
            OrchestratorError::HoldNotActive(_)
        ));
    }

    #[tokio::test]
    async fn expiry_sweep_transitions_overdue_holds() {
        let store = store().await;
        let hold = store
            .create(org(), wallet(), usd(100_000), Duration::milliseconds(-1))
            .await
            .unwrap();
        assert_eq!(store.expire_sweep().await.unwrap(), 1);
        assert_eq!(
            store.get(&hold.hold_id).await.unwrap().status,
            HoldStatus::Expired
        );
    }
}
