use chrono::{DateTime, Utc};
use sardis_types::ProviderEventId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventState {
    New,
    Processed,
    Suspicious,
}

/// Stored webhook delivery. `event_id` is the internal row id; the dedupe
/// key is the provider-assigned `(provider, external_id)` pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEventRecord {
    pub event_id: ProviderEventId,
    pub provider: String,
    pub external_id: String,
    pub body_hash: String,
    pub state: EventState,
    pub received_at: DateTime<Utc>,
}

/// Outcome of admitting a delivery against the dedupe store.
#[derive(Debug, Clone)]
pub enum AdmitOutcome {
    /// First sighting; the record was persisted in `New` state.
    Fresh(WebhookEventRecord),
    /// Same id, same body. The stored state tells the caller whether the
    /// original processing completed or crashed mid-way.
    Duplicate(WebhookEventRecord),
    /// Same id, different body: replay with substituted payload. The stored
    /// record is marked suspicious and must never be applied.
    Suspicious(WebhookEventRecord),
}

/// Exactly-once admission ledger keyed on `(provider, provider_event_id)`.
#[derive(Debug, Clone, Default)]
pub struct DedupeStore {
    events: Arc<Mutex<HashMap<(String, String), WebhookEventRecord>>>,
}

impl DedupeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn admit(&self, provider: &str, external_id: &str, body_hash: &str) -> AdmitOutcome {
        let mut events = self.lock();
        let key = (provider.to_string(), external_id.to_string());

        if let Some(existing) = events.get_mut(&key) {
            if existing.body_hash != body_hash || existing.state == EventState::Suspicious {
                existing.state = EventState::Suspicious;
                return AdmitOutcome::Suspicious(existing.clone());
            }
            return AdmitOutcome::Duplicate(existing.clone());
        }

        let record = WebhookEventRecord {
            event_id: ProviderEventId::generate(),
            provider: provider.to_string(),
            external_id: external_id.to_string(),
            body_hash: body_hash.to_string(),
            state: EventState::New,
            received_at: Utc::now(),
        };
        events.insert(key, record.clone());
        AdmitOutcome::Fresh(record)
    }

    pub fn mark_processed(&self, provider: &str, external_id: &str) -> bool {
        let mut events = self.lock();
        match events.get_mut(&(provider.to_string(), external_id.to_string())) {
            Some(record) if record.state == EventState::New => {
                record.state = EventState::Processed;
                true
            }
            _ => false,
        }
    }

    pub fn get(&self, provider: &str, external_id: &str) -> Option<WebhookEventRecord> {
        self.lock()
            .get(&(provider.to_string(), external_id.to_string()))
            .cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<(String, String), WebhookEventRecord>> {
        match self.events.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
