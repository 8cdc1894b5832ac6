use crate::snapshot::HardCaps;
use sardis_types::Rail;
use serde::{Deserialize, Serialize};

/// Advisory cap suggestions distilled from a natural-language policy parser.
///
/// The parser itself lives outside the core; whatever it produces arrives
/// here as plain numbers. Hints are advisory only: they may tighten the
/// effective caps and can never relax the immutable hard-cap layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpendHint {
    pub per_tx_minor: Option<i64>,
    pub per_day_minor: Option<i64>,
    pub per_month_minor: Option<i64>,
    /// Free-text provenance, presentation only.
    pub source: Option<String>,
}

/// Result of clamping a hint against the hard caps.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HintApplication {
    pub effective_per_tx_minor: Option<i64>,
    pub effective_per_day_minor: Option<i64>,
    pub effective_per_month_minor: Option<i64>,
    /// Fields where the hint tried to exceed a hard cap and was ignored.
    pub overreaches: Vec<String>,
}

impl HintApplication {
    pub fn had_overreach(&self) -> bool {
        !self.overreaches.is_empty()
    }
}

/// Clamp `hint` against `caps` for a given rail. A hint at or below the cap
/// becomes the effective limit; above it, the cap stands and the overreach is
/// recorded for the audit trail.
pub fn apply_hint(caps: &HardCaps, rail: Rail, hint: &SpendHint) -> HintApplication {
    let mut application = HintApplication::default();

    let per_tx_cap = caps.per_tx_for(rail);
    match hint.per_tx_minor {
        Some(suggested) if suggested > per_tx_cap => {
            application.overreaches.push("per_tx".to_string());
        }
        Some(suggested) => application.effective_per_tx_minor = Some(suggested),
        None => {}
    }

    match hint.per_day_minor {
        Some(suggested) if suggested > caps.per_day_minor => {
            application.overreaches.push("per_day".to_string());
        }
        Some(suggested) => application.effective_per_day_minor = Some(suggested),
        None => {}
    }

    match hint.per_month_minor {
        Some(suggested) if suggested > caps.per_month_minor => {
            application.overreaches.push("per_month".to_string());
        }
        Some(suggested) => application.effective_per_month_minor = Some(suggested),
        None => {}
    }

    application
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn caps() -> HardCaps {
        HardCaps {
            per_tx_minor: 10_000_000,
            per_day_minor: 50_000_000,
            per_month_minor: 400_000_000,
            per_rail_minor: BTreeMap::new(),
        }
    }

    #[test]
    fn tighter_hint_becomes_effective() {
        let hint = SpendHint {
            per_tx_minor: Some(1_000_000),
            ..SpendHint::default()
        };
        let applied = apply_hint(&caps(), Rail::Ach, &hint);
        assert_eq!(applied.effective_per_tx_minor, Some(1_000_000));
        assert!(!applied.had_overreach());
    }

    #[test]
    fn looser_hint_is_ignored_and_recorded() {
        let hint = SpendHint {
            per_tx_minor: Some(99_000_000),
            per_day_minor: Some(60_000_000),
            ..SpendHint::default()
        };
        let applied = apply_hint(&caps(), Rail::Ach, &hint);
        assert_eq!(applied.effective_per_tx_minor, None);
        assert_eq!(applied.effective_per_day_minor, None);
        assert_eq!(applied.overreaches, vec!["per_tx", "per_day"]);
    }

    #[test]
    fn hint_equal_to_cap_is_accepted() {
        let hint = SpendHint {
            per_tx_minor: Some(10_000_000),
            ..SpendHint::default()
        };
        let applied = apply_hint(&caps(), Rail::Ach, &hint);
        assert_eq!(applied.effective_per_tx_minor, Some(10_000_000));
    }
}
