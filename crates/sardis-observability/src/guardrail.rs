use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// A named operational guardrail with an on/off state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Guardrail {
    pub name: String,
    pub description: String,
    pub enabled: bool,
}

/// Registry of guardrails the orchestrator consults before acting.
///
/// Disabling a guardrail is an operator action; unknown guardrails read as
/// enabled so a missing registration can never silently open a gate.
#[derive(Debug, Clone, Default)]
pub struct GuardrailRegistry {
    rails: Arc<Mutex<BTreeMap<String, Guardrail>>>,
}

impl GuardrailRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, name: &str, description: &str) {
        self.lock().insert(
            name.to_string(),
            Guardrail {
                name: name.to_string(),
                description: description.to_string(),
                enabled: true,
            },
        );
    }

    pub fn set_enabled(&self, name: &str, enabled: bool) -> bool {
        let mut rails = self.lock();
        match rails.get_mut(name) {
            Some(rail) => {
                rail.enabled = enabled;
                true
            }
            None => false,
        }
    }

    /// Fail closed: absent guardrails count as enabled.
    pub fn is_enabled(&self, name: &str) -> bool {
        self.lock().get(name).map(|g| g.enabled).unwrap_or(true)
    }

    pub fn list(&self) -> Vec<Guardrail> {
        self.lock().values().cloned().collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, Guardrail>> {
        match self.rails.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
