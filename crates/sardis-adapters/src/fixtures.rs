use crate::adapter::{ProviderAdapter, ProviderStatus, SubmitOutcome, SubmitRequest, VoidOutcome};
use crate::error::AdapterError;
use async_trait::async_trait;
use sardis_types::{CurrencyCode, Direction, Rail};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

fn lock<'a, T>(mutex: &'a Mutex<T>) -> std::sync::MutexGuard<'a, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Deterministic ACH fixture: accepts USD ACH submissions and tracks refs so
/// `status`/`void` behave like a real treasury provider in tests.
#[derive(Debug)]
pub struct MockAchAdapter {
    name: &'static str,
    submissions: Arc<Mutex<HashMap<String, ProviderStatus>>>,
}

impl MockAchAdapter {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            submissions: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

#[async_trait]
impl ProviderAdapter for MockAchAdapter {
    fn name(&self) -> &'static str {
        self.name
    }

    fn supports(&self, rail: Rail, _direction: Direction, currency: &CurrencyCode) -> bool {
        rail == Rail::Ach && currency.as_str() == "USD"
    }

    async fn submit(&self, request: &SubmitRequest) -> SubmitOutcome {
        let short: String = request.payment_id.as_str().chars().rev().take(8).collect();
        let provider_ref = format!("{}-{short}", self.name);
        lock(&self.submissions).insert(provider_ref.clone(), ProviderStatus::Pending);
        SubmitOutcome::Accepted { provider_ref }
    }

    async fn status(&self, provider_ref: &str) -> Result<ProviderStatus, AdapterError> {
        lock(&self.submissions)
            .get(provider_ref)
            .copied()
            .ok_or_else(|| AdapterError::UnknownReference(provider_ref.to_string()))
    }

    async fn void(&self, provider_ref: &str) -> Result<VoidOutcome, AdapterError> {
        let mut submissions = lock(&self.submissions);
        match submissions.get_mut(provider_ref) {
            Some(status @ ProviderStatus::Pending) => {
                *status = ProviderStatus::Failed;
                Ok(VoidOutcome::Voided)
            }
            Some(_) => Ok(VoidOutcome::Unsupported),
            None => Err(AdapterError::UnknownReference(provider_ref.to_string())),
        }
    }
}

/// Card-rail fixture.
#[derive(Debug)]
pub struct MockCardAdapter {
    name: &'static str,
    submissions: Arc<Mutex<HashMap<String, ProviderStatus>>>,
}

impl MockCardAdapter {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            submissions: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

#[async_trait]
impl ProviderAdapter for MockCardAdapter {
    fn name(&self) -> &'static str {
        self.name
    }

    fn supports(&self, rail: Rail, direction: Direction, _currency: &CurrencyCode) -> bool {
        rail == Rail::Card && direction == Direction::Debit
    }

    async fn submit(&self, request: &SubmitRequest) -> SubmitOutcome {
        let short: String = request.payment_id.as_str().chars().rev().take(8).collect();
        let provider_ref = format!("{}-{short}", self.name);
        lock(&self.submissions).insert(provider_ref.clone(), ProviderStatus::Pending);
        SubmitOutcome::Accepted { provider_ref }
    }

    async fn status(&self, provider_ref: &str) -> Result<ProviderStatus, AdapterError> {
        lock(&self.submissions)
            .get(provider_ref)
            .copied()
            .ok_or_else(|| AdapterError::UnknownReference(provider_ref.to_string()))
    }

    async fn void(&self, provider_ref: &str) -> Result<VoidOutcome, AdapterError> {
        let mut submissions = lock(&self.submissions);
        match submissions.get_mut(provider_ref) {
            Some(status @ ProviderStatus::Pending) => {
                *status = ProviderStatus::Failed;
                Ok(VoidOutcome::Voided)
            }
            Some(_) => Ok(VoidOutcome::Unsupported),
            None => Err(AdapterError::UnknownReference(provider_ref.to_string())),
        }
    }
}

/// Stable-coin path through an external MPC signing service. `submit`
/// returns once the signer has accepted the operation; chain confirmation
/// arrives later as webhook events. On-chain transactions cannot be voided.
#[derive(Debug)]
pub struct MockMpcSignerAdapter {
    name: &'static str,
    accepted: Arc<Mutex<HashMap<String, ProviderStatus>>>,
}

impl MockMpcSignerAdapter {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            accepted: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

#[async_trait]
impl ProviderAdapter for MockMpcSignerAdapter {
    fn name(&self) -> &'static str {
        self.name
    }

    fn supports(&self, rail: Rail, _direction: Direction, _currency: &CurrencyCode) -> bool {
        matches!(rail, Rail::OnChain | Rail::Stablecoin)
    }

    async fn submit(&self, request: &SubmitRequest) -> SubmitOutcome {
        let short: String = request.payment_id.as_str().chars().rev().take(8).collect();
        let provider_ref = format!("mpc-{short}");
        lock(&self.accepted).insert(provider_ref.clone(), ProviderStatus::Pending);
        SubmitOutcome::Accepted { provider_ref }
    }

    async fn status(&self, provider_ref: &str) -> Result<ProviderStatus, AdapterError> {
        lock(&self.accepted)
            .get(provider_ref)
            .copied()
            .ok_or_else(|| AdapterError::UnknownReference(provider_ref.to_string()))
    }

    async fn void(&self, _provider_ref: &str) -> Result<VoidOutcome, AdapterError> {
        Ok(VoidOutcome::Unsupported)
    }
}

/// Fixture that always reports a retryable failure, for failover tests.
#[derive(Debug)]
pub struct AlwaysRetryableAdapter {
    name: &'static str,
}

impl AlwaysRetryableAdapter {
    pub fn new(name: &'static str) -> Self {
        Self { name }
    }
}

#[async_trait]
impl ProviderAdapter for AlwaysRetryableAdapter {
    fn name(&self) -> &'static str {
        self.name
    }

    fn supports(&self, _rail: Rail, _direction: Direction, _currency: &CurrencyCode) -> bool {
        true
    }

    async fn submit(&self, _request: &SubmitRequest) -> SubmitOutcome {
        SubmitOutcome::Retryable {
            message: "simulated 503".to_string(),
        }
    }

    async fn status(&self, provider_ref: &str) -> Result<ProviderStatus, AdapterError> {
        Err(AdapterError::UnknownReference(provider_ref.to_string()))
    }

    async fn void(&self, provider_ref: &str) -> Result<VoidOutcome, AdapterError> {
        Err(AdapterError::UnknownReference(provider_ref.to_string()))
    }
}

/// Fixture that always refuses terminally.
#[derive(Debug)]
pub struct AlwaysFatalAdapter {
    name: &'static str,
}

impl AlwaysFatalAdapter {
    pub fn new(name: &'static str) -> Self {
        Self { name }
    }
}

#[async_trait]
impl ProviderAdapter for AlwaysFatalAdapter {
    fn name(&self) -> &'static str {
        self.name
    }

    fn supports(&self, _rail: Rail, _direction: Direction, _currency: &CurrencyCode) -> bool {
        true
    }

    async fn submit(&self, _request: &SubmitRequest) -> SubmitOutcome {
        SubmitOutcome::Fatal {
            message: "account closed".to_string(),
        }
    }

    async fn status(&self, provider_ref: &str) -> Result<ProviderStatus, AdapterError> {
        Err(AdapterError::UnknownReference(provider_ref.to_string()))
    }

    async fn void(&self, provider_ref: &str) -> Result<VoidOutcome, AdapterError> {
        Err(AdapterError::UnknownReference(provider_ref.to_string()))
    }
}
