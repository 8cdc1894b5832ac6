use crate::error::PolicyError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Goal-drift bands. There are deliberately no defaults: deployments must
/// choose them explicitly or the engine refuses to construct a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DriftThresholds {
    pub review_threshold: f64,
    pub block_threshold: f64,
}

impl DriftThresholds {
    pub fn validated(review_threshold: f64, block_threshold: f64) -> Result<Self, PolicyError> {
        if !review_threshold.is_finite()
            || !block_threshold.is_finite()
            || review_threshold < 0.0
            || review_threshold >= block_threshold
        {
            return Err(PolicyError::MissingDriftThresholds);
        }
        Ok(Self {
            review_threshold,
            block_threshold,
        })
    }
}

/// Expected share of mandates per category for one agent, against which the
/// observed distribution is scored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DriftProfile {
    pub expected_shares: BTreeMap<String, f64>,
}

impl DriftProfile {
    /// Chi-squared-style deviation between observed mandate counts and the
    /// expected categorical distribution. Larger means the agent's recent
    /// behavior has moved away from its declared purpose mix.
    pub fn score(&self, observed: &BTreeMap<String, u64>) -> f64 {
        let total: u64 = observed.values().sum();
        if total == 0 || self.expected_shares.is_empty() {
            return 0.0;
        }
        let total = total as f64;
        let mut score = 0.0;
        // Floor keeps a zero-expectation bin from dividing by zero while
        // still punishing spend in categories the profile never predicted.
        const FLOOR: f64 = 0.005;
        let mut categories: BTreeMap<&str, f64> = self
            .expected_shares
            .iter()
            .map(|(k, v)| (k.as_str(), v.max(FLOOR)))
            .collect();
        for category in observed.keys() {
            categories.entry(category.as_str()).or_insert(FLOOR);
        }
        for (category, expected_share) in categories {
            let observed_share =
                observed.get(category).copied().unwrap_or(0) as f64 / total;
            let delta = observed_share - expected_share;
            score += (delta * delta) / expected_share;
        }
        score
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> DriftProfile {
        let mut expected_shares = BTreeMap::new();
        expected_shares.insert("cloud".to_string(), 0.7);
        expected_shares.insert("saas".to_string(), 0.3);
        DriftProfile { expected_shares }
    }

    #[test]
    fn matching_distribution_scores_near_zero() {
        let mut observed = BTreeMap::new();
        observed.insert("cloud".to_string(), 70);
        observed.insert("saas".to_string(), 30);
        assert!(profile().score(&observed) < 0.01);
    }

    #[test]
    fn unexpected_category_scores_high() {
        let mut observed = BTreeMap::new();
        observed.insert("gambling".to_string(), 100);
        assert!(profile().score(&observed) > 1.0);
    }

    #[test]
    fn empty_observation_scores_zero() {
        assert_eq!(profile().score(&BTreeMap::new()), 0.0);
    }

    #[test]
    fn thresholds_require_explicit_ordered_values() {
        assert!(DriftThresholds::validated(0.5, 0.2).is_err());
        assert!(DriftThresholds::validated(f64::NAN, 1.0).is_err());
        assert!(DriftThresholds::validated(-0.1, 1.0).is_err());
        let ok = DriftThresholds::validated(0.4, 1.2).unwrap();
        assert_eq!(ok.review_threshold, 0.4);
    }
}
