use crate::error::AdapterError;
use sardis_types::{CurrencyCode, OrgId, Rail};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Routing risk tier resolved by the orchestrator from the policy decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskTier {
    Low,
    Standard,
    High,
}

/// Primary adapter plus ordered fallbacks for one routing key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutePlan {
    pub primary: String,
    pub fallbacks: Vec<String>,
}

impl RoutePlan {
    pub fn new(primary: impl Into<String>, fallbacks: Vec<String>) -> Self {
        Self {
            primary: primary.into(),
            fallbacks,
        }
    }

    /// Deterministic walk order: primary first, then fallbacks as configured.
    pub fn walk_order(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.primary.as_str()).chain(self.fallbacks.iter().map(|s| s.as_str()))
    }
}

/// Resolves `(org, rail, currency, risk_tier)` to a route plan.
///
/// Lookup precedence: org+tier route, org standard-tier route, then the
/// org-independent default for the rail/currency. Absence of any of these is
/// a hard routing error, not an implicit adapter choice.
#[derive(Debug, Clone, Default)]
pub struct CapabilityMatrix {
    org_routes: HashMap<(OrgId, Rail, CurrencyCode, RiskTier), RoutePlan>,
    defaults: HashMap<(Rail, CurrencyCode), RoutePlan>,
}

impl CapabilityMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_default(&mut self, rail: Rail, currency: CurrencyCode, plan: RoutePlan) {
        self.defaults.insert((rail, currency), plan);
    }

    pub fn set_org_route(
        &mut self,
        org: OrgId,
        rail: Rail,
        currency: CurrencyCode,
        tier: RiskTier,
        plan: RoutePlan,
    ) {
        self.org_routes.insert((org, rail, currency, tier), plan);
    }

    pub fn resolve(
        &self,
        org: &OrgId,
        rail: Rail,
        currency: &CurrencyCode,
        tier: RiskTier,
    ) -> Result<RoutePlan, AdapterError> {
        if let Some(plan) =
            self.org_routes
                .get(&(org.clone(), rail, currency.clone(), tier))
        {
            return Ok(plan.clone());
        }
        if tier != RiskTier::Standard {
            if let Some(plan) =
                self.org_routes
                    .get(&(org.clone(), rail, currency.clone(), RiskTier::Standard))
            {
                return Ok(plan.clone());
            }
        }
        self.defaults
            .get(&(rail, currency.clone()))
            .cloned()
            .ok_or_else(|| AdapterError::NoRoute {
                org: org.to_string(),
                rail: rail.to_string(),
                currency: currency.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn org() -> OrgId {
        OrgId::parse("org_route1").unwrap()
    }

    #[test]
    fn resolves_org_route_over_default() {
        let mut matrix = CapabilityMatrix::new();
        matrix.set_default(
            Rail::Ach,
            CurrencyCode::usd(),
            RoutePlan::new("default_ach", vec![]),
        );
        matrix.set_org_route(
            org(),
            Rail::Ach,
            CurrencyCode::usd(),
            RiskTier::Standard,
            RoutePlan::new("org_ach", vec!["default_ach".to_string()]),
        );

        let plan = matrix
            .resolve(&org(), Rail::Ach, &CurrencyCode::usd(), RiskTier::Standard)
            .unwrap();
        assert_eq!(plan.primary, "org_ach");
        assert_eq!(
            plan.walk_order().collect::<Vec<_>>(),
            vec!["org_ach", "default_ach"]
        );
    }

    #[test]
    fn high_tier_falls_back_to_standard_then_default() {
        let mut matrix = CapabilityMatrix::new();
        matrix.set_default(
            Rail::Card,
            CurrencyCode::usd(),
            RoutePlan::new("default_card", vec![]),
        );

        let plan = matrix
            .resolve(&org(), Rail::Card, &CurrencyCode::usd(), RiskTier::High)
            .unwrap();
        assert_eq!(plan.primary, "default_card");

        matrix.set_org_route(
            org(),
            Rail::Card,
            CurrencyCode::usd(),
            RiskTier::High,
            RoutePlan::new("card_high_scrutiny", vec![]),
        );
        let plan = matrix
            .resolve(&org(), Rail::Card, &CurrencyCode::usd(), RiskTier::High)
            .unwrap();
        assert_eq!(plan.primary, "card_high_scrutiny");
    }

    #[test]
    fn missing_route_is_an_error() {
        let matrix = CapabilityMatrix::new();
        assert!(matches!(
            matrix.resolve(&org(), Rail::OnChain, &CurrencyCode::usd(), RiskTier::Low),
            Err(AdapterError::NoRoute { .. })
        ));
    }
}
