use sardis_policy::EvalContext;
use sardis_types::Mandate;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Supplies the per-decision evaluation context: wallet preconditions,
/// compliance screen results, velocity counters, and drift profile.
///
/// Production wires this to the canonical store and the screening service;
/// tests inject fixed contexts. The orchestrator overlays its own kill-switch
/// view on whatever this returns.
pub trait ContextSource: Send + Sync {
    fn eval_context(&self, mandate: &Mandate) -> EvalContext;
}

/// Context source backed by explicit per-wallet entries with a permissive
/// default. The org-level `a2a.enforce_trust_table` switch is stamped onto
/// every context it hands out.
pub struct StaticContextSource {
    by_wallet: Mutex<HashMap<String, EvalContext>>,
    enforce_trust_table: bool,
}

impl Default for StaticContextSource {
    fn default() -> Self {
        Self {
            by_wallet: Mutex::new(HashMap::new()),
            enforce_trust_table: true,
        }
    }
}

impl StaticContextSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_trust_enforcement(enforce_trust_table: bool) -> Arc<Self> {
        Arc::new(Self {
            by_wallet: Mutex::new(HashMap::new()),
            enforce_trust_table,
        })
    }

    pub fn set(&self, wallet: &str, ctx: EvalContext) {
        let mut by_wallet = match self.by_wallet.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        by_wallet.insert(wallet.to_string(), ctx);
    }
}

impl ContextSource for StaticContextSource {
    fn eval_context(&self, mandate: &Mandate) -> EvalContext {
        let by_wallet = match self.by_wallet.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let mut ctx = by_wallet
            .get(mandate.subject_wallet.as_str())
            .cloned()
            .unwrap_or_else(EvalContext::permissive);
        ctx.enforce_trust_table = self.enforce_trust_table;
        ctx
    }
}
