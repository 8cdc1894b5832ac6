use sardis_types::WalletId;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tracing::warn;

/// Per-wallet halt flags, read on entry to the orchestrator.
///
/// Flipping a switch is synchronous; in-flight payments drain or time out,
/// and no new payment starts for a halted wallet.
#[derive(Debug, Clone, Default)]
pub struct KillSwitchRegistry {
    halted: Arc<Mutex<HashSet<WalletId>>>,
}

impl KillSwitchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn halt(&self, wallet: &WalletId) -> bool {
        warn!(wallet = %wallet, "wallet kill switch engaged");
        self.lock().insert(wallet.clone())
    }

    pub fn resume(&self, wallet: &WalletId) -> bool {
        self.lock().remove(wallet)
    }

    pub fn is_halted(&self, wallet: &WalletId) -> bool {
        self.lock().contains(wallet)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashSet<WalletId>> {
        match self.halted.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn halt_and_resume_roundtrip() {
        let switches = KillSwitchRegistry::new();
        let wallet = WalletId::parse("wlt_ops1").unwrap();

        assert!(!switches.is_halted(&wallet));
        assert!(switches.halt(&wallet));
        assert!(switches.is_halted(&wallet));
        // Second halt is a no-op.
        assert!(!switches.halt(&wallet));
        assert!(switches.resume(&wallet));
        assert!(!switches.is_halted(&wallet));
    }
}
