use crate::context::{EvalContext, ScreenState};
use crate::decision::{ApprovalTemplate, PolicyCheck, PolicyDecision, PolicyOutcome};
use crate::error::PolicyError;
use crate::hints::{apply_hint, SpendHint};
use crate::snapshot::{PolicySnapshot, WindowLimit};
use crate::vendor::{normalize_domain, vendor_matches};
use sardis_types::{DecisionId, Mandate, ReasonCode};
use tracing::{debug, warn};

const APPROVAL_TTL_SECS: u64 = 3600;

/// Deterministic layered policy engine.
///
/// The engine is free of I/O and clocks: the mandate, snapshot, counters, and
/// context fully determine the decision, including the reason code. Any
/// internal evaluation failure is translated into a refusal.
#[derive(Debug, Clone, Default)]
pub struct PolicyEngine;

impl PolicyEngine {
    pub fn new() -> Self {
        Self
    }

    /// Evaluate a mandate. Never panics, never errs: the fail-closed seam
    /// turns evaluation failures into `BLOCKED / POLICY.CHECK_FAILED`.
    pub fn evaluate(
        &self,
        mandate: &Mandate,
        snapshot: &PolicySnapshot,
        ctx: &EvalContext,
        hint: Option<&SpendHint>,
    ) -> PolicyDecision {
        match self.evaluate_layers(mandate, snapshot, ctx, hint) {
            Ok(decision) => decision,
            Err(err) => {
                warn!(mandate = %mandate.mandate_id, %err, "policy evaluation failed closed");
                PolicyDecision {
                    decision_id: DecisionId::generate(),
                    outcome: PolicyOutcome::Blocked,
                    reason_code: Some(ReasonCode::PolicyCheckFailed),
                    reason: "policy evaluation error".to_string(),
                    risk_score: 100,
                    checks: vec![PolicyCheck::failed("engine", err.to_string())],
                    approval_template: None,
                    policy_revision: snapshot.revision_digest.clone(),
                }
            }
        }
    }

    fn evaluate_layers(
        &self,
        mandate: &Mandate,
        snapshot: &PolicySnapshot,
        ctx: &EvalContext,
        hint: Option<&SpendHint>,
    ) -> Result<PolicyDecision, PolicyError> {
        let mut checks: Vec<PolicyCheck> = Vec::new();
        let amount = mandate.amount.amount_minor;
        let risk_score = self.risk_score(mandate, snapshot, ctx);

        // Layer 1: immutable hard caps, with the NL hint clamped against them.
        let applied = hint
            .map(|hint| apply_hint(&snapshot.hard_caps, mandate.rail, hint))
            .unwrap_or_default();
        if applied.had_overreach() {
            checks.push(PolicyCheck::failed(
                "policy.nl_overreach",
                format!("hint exceeded hard caps: {}", applied.overreaches.join(",")),
            ));
        }

        let per_tx_cap = applied
            .effective_per_tx_minor
            .map(|hinted| hinted.min(snapshot.hard_caps.per_tx_for(mandate.rail)))
            .unwrap_or_else(|| snapshot.hard_caps.per_tx_for(mandate.rail));
        if amount > per_tx_cap {
            checks.push(PolicyCheck::failed(
                "hard_cap.per_tx",
                format!("{amount} > {per_tx_cap}"),
            ));
            return Ok(self.refuse(
                snapshot,
                PolicyOutcome::Blocked,
                ReasonCode::PolicyLimitExceeded,
                format!("amount {amount} exceeds per-transaction cap {per_tx_cap}"),
                risk_score,
                checks,
            ));
        }
        checks.push(PolicyCheck::passed(
            "hard_cap.per_tx",
            format!("{amount} <= {per_tx_cap}"),
        ));

        let day_cap = applied
            .effective_per_day_minor
            .map(|hinted| hinted.min(snapshot.hard_caps.per_day_minor))
            .unwrap_or(snapshot.hard_caps.per_day_minor);
        let day_projected = ctx
            .counters
            .day
            .amount_minor
            .checked_add(amount)
            .ok_or_else(|| PolicyError::CheckFailed("day counter overflow".to_string()))?;
        if day_projected > day_cap {
            checks.push(PolicyCheck::failed(
                "hard_cap.per_day",
                format!("{day_projected} > {day_cap}"),
            ));
            return Ok(self.refuse(
                snapshot,
                PolicyOutcome::Blocked,
                ReasonCode::PolicyLimitExceeded,
                format!("daily spend {day_projected} would exceed cap {day_cap}"),
                risk_score,
                checks,
            ));
        }
        checks.push(PolicyCheck::passed(
            "hard_cap.per_day",
            format!("{day_projected} <= {day_cap}"),
        ));

        let month_cap = applied
            .effective_per_month_minor
            .map(|hinted| hinted.min(snapshot.hard_caps.per_month_minor))
            .unwrap_or(snapshot.hard_caps.per_month_minor);
        let month_projected = ctx
            .counters
            .month_amount_minor
            .checked_add(amount)
            .ok_or_else(|| PolicyError::CheckFailed("month counter overflow".to_string()))?;
        if month_projected > month_cap {
            checks.push(PolicyCheck::failed(
                "hard_cap.per_month",
                format!("{month_projected} > {month_cap}"),
            ));
            return Ok(self.refuse(
                snapshot,
                PolicyOutcome::Blocked,
                ReasonCode::PolicyLimitExceeded,
                format!("monthly spend {month_projected} would exceed cap {month_cap}"),
                risk_score,
                checks,
            ));
        }
        checks.push(PolicyCheck::passed(
            "hard_cap.per_month",
            format!("{month_projected} <= {month_cap}"),
        ));

        // Layer 2: wallet preconditions.
        if !ctx.wallet.active || ctx.wallet.kill_switched || !ctx.wallet.rail_enabled {
            let detail = if ctx.wallet.kill_switched {
                "wallet kill switch engaged"
            } else if !ctx.wallet.active {
                "wallet inactive"
            } else {
                "rail disabled for wallet"
            };
            checks.push(PolicyCheck::failed("wallet.preconditions", detail));
            return Ok(self.refuse(
                snapshot,
                PolicyOutcome::Blocked,
                ReasonCode::PolicyWalletHalted,
                detail.to_string(),
                risk_score,
                checks,
            ));
        }
        checks.push(PolicyCheck::passed("wallet.preconditions", "wallet ready"));

        // Layer 3: compliance gates. Unknown screens fail closed.
        if ctx.compliance.sanctions != ScreenState::Clear {
            let detail = match ctx.compliance.sanctions {
                ScreenState::Failed => "sanctions screen failed",
                ScreenState::Unavailable => "sanctions screen unavailable",
                ScreenState::Clear => unreachable!(),
            };
            checks.push(PolicyCheck::failed("compliance.sanctions", detail));
            return Ok(self.refuse(
                snapshot,
                PolicyOutcome::Blocked,
                ReasonCode::PolicyComplianceFail,
                detail.to_string(),
                risk_score,
                checks,
            ));
        }
        if !ctx.compliance.kyb_verified {
            checks.push(PolicyCheck::failed("compliance.kyb", "KYB not verified"));
            return Ok(self.refuse(
                snapshot,
                PolicyOutcome::Blocked,
                ReasonCode::PolicyComplianceFail,
                "KYB not verified".to_string(),
                risk_score,
                checks,
            ));
        }
        if ctx.agent_to_agent && ctx.enforce_trust_table && !ctx.compliance.trust_relation_present {
            checks.push(PolicyCheck::failed(
                "compliance.trust_relation",
                "no trust relation for agent-to-agent transfer",
            ));
            return Ok(self.refuse(
                snapshot,
                PolicyOutcome::Blocked,
                ReasonCode::PolicyComplianceFail,
                "agent-to-agent transfer without trust relation".to_string(),
                risk_score,
                checks,
            ));
        }
        checks.push(PolicyCheck::passed("compliance.gates", "screens clear"));

        // Layer 4: vendor and category rules, exact normalized match only.
        let destination = normalize_domain(&mandate.destination);
        if snapshot
            .rules
            .blocked_vendors
            .iter()
            .any(|rule| vendor_matches(rule, &mandate.destination))
        {
            checks.push(PolicyCheck::failed(
                "vendor.blocklist",
                format!("'{destination}' is blocked"),
            ));
            return Ok(self.refuse(
                snapshot,
                PolicyOutcome::Blocked,
                ReasonCode::PolicyVendorBlocked,
                format!("vendor '{destination}' is blocked"),
                risk_score,
                checks,
            ));
        }
        if !snapshot.rules.allowed_vendors.is_empty()
            && !snapshot
                .rules
                .allowed_vendors
                .iter()
                .any(|rule| vendor_matches(rule, &mandate.destination))
        {
            checks.push(PolicyCheck::failed(
                "vendor.allowlist",
                format!("'{destination}' not on allowlist"),
            ));
            return Ok(self.refuse(
                snapshot,
                PolicyOutcome::Blocked,
                ReasonCode::PolicyVendorBlocked,
                format!("vendor '{destination}' is not on the allowlist"),
                risk_score,
                checks,
            ));
        }
        if let Some(category) = ctx.vendor_category.as_deref() {
            if snapshot
                .rules
                .blocked_categories
                .contains(&category.to_ascii_lowercase())
            {
                checks.push(PolicyCheck::failed(
                    "category.blocklist",
                    format!("category '{category}' is blocked"),
                ));
                return Ok(self.refuse(
                    snapshot,
                    PolicyOutcome::Blocked,
                    ReasonCode::PolicyCategoryBlocked,
                    format!("category '{category}' is blocked"),
                    risk_score,
                    checks,
                ));
            }
        }
        if snapshot
            .rules
            .vendors_requiring_approval
            .iter()
            .any(|rule| vendor_matches(rule, &mandate.destination))
        {
            checks.push(PolicyCheck::failed(
                "vendor.approval_list",
                format!("'{destination}' requires approval"),
            ));
            return Ok(self.require_approval(
                mandate,
                snapshot,
                ReasonCode::PolicyVendorRequiresApproval,
                format!("vendor '{destination}' requires approval"),
                risk_score,
                checks,
            ));
        }
        checks.push(PolicyCheck::passed("vendor.rules", "vendor permitted"));

        // Layer 5: velocity windows.
        if let Some(velocity) = &snapshot.rules.velocity {
            for (name, window, limit) in [
                ("velocity.minute", ctx.counters.minute, velocity.per_minute),
                ("velocity.hour", ctx.counters.hour, velocity.per_hour),
                ("velocity.day", ctx.counters.day, velocity.per_day),
            ] {
                if exceeds_window(window.count, window.amount_minor, amount, limit)? {
                    checks.push(PolicyCheck::failed(
                        name,
                        format!(
                            "count {} amount {} against limit {}/{}",
                            window.count + 1,
                            window.amount_minor + amount,
                            limit.max_count,
                            limit.max_amount_minor
                        ),
                    ));
                    return Ok(self.refuse(
                        snapshot,
                        PolicyOutcome::Blocked,
                        ReasonCode::PolicyVelocityExceeded,
                        format!("velocity window '{name}' exhausted"),
                        risk_score,
                        checks,
                    ));
                }
            }
            checks.push(PolicyCheck::passed("velocity.windows", "within limits"));
        }

        // Layer 6: approval threshold.
        if let Some(threshold) = snapshot.rules.approval_threshold_minor {
            if amount > threshold {
                checks.push(PolicyCheck::failed(
                    "approval.threshold",
                    format!("{amount} > {threshold}"),
                ));
                return Ok(self.require_approval(
                    mandate,
                    snapshot,
                    ReasonCode::PolicyApprovalRequired,
                    format!("amount {amount} exceeds approval threshold {threshold}"),
                    risk_score,
                    checks,
                ));
            }
            checks.push(PolicyCheck::passed(
                "approval.threshold",
                format!("{amount} <= {threshold}"),
            ));
        }

        // Layer 7: goal drift over categorical bins.
        let drift_score = snapshot_drift_score(mandate, snapshot, ctx);
        if drift_score >= snapshot.drift.block_threshold {
            checks.push(PolicyCheck::failed(
                "drift.score",
                format!("{drift_score:.4} >= {}", snapshot.drift.block_threshold),
            ));
            return Ok(self.refuse(
                snapshot,
                PolicyOutcome::Blocked,
                ReasonCode::PolicyDriftBlocked,
                format!("goal drift score {drift_score:.4} at or above block threshold"),
                risk_score,
                checks,
            ));
        }
        if drift_score >= snapshot.drift.review_threshold {
            checks.push(PolicyCheck::failed(
                "drift.score",
                format!("{drift_score:.4} in review band"),
            ));
            return Ok(self.require_approval(
                mandate,
                snapshot,
                ReasonCode::PolicyApprovalRequired,
                format!("goal drift score {drift_score:.4} requires review"),
                risk_score,
                checks,
            ));
        }
        checks.push(PolicyCheck::passed(
            "drift.score",
            format!("{drift_score:.4} below review threshold"),
        ));

        debug!(mandate = %mandate.mandate_id, risk_score, "mandate approved");
        Ok(PolicyDecision {
            decision_id: DecisionId::generate(),
            outcome: PolicyOutcome::Approved,
            reason_code: None,
            reason: "all policy layers passed".to_string(),
            risk_score,
            checks,
            approval_template: None,
            policy_revision: snapshot.revision_digest.clone(),
        })
    }

    fn refuse(
        &self,
        snapshot: &PolicySnapshot,
        outcome: PolicyOutcome,
        reason_code: ReasonCode,
        reason: String,
        risk_score: u8,
        checks: Vec<PolicyCheck>,
    ) -> PolicyDecision {
        PolicyDecision {
            decision_id: DecisionId::generate(),
            outcome,
            reason_code: Some(reason_code),
            reason,
            risk_score,
            checks,
            approval_template: None,
            policy_revision: snapshot.revision_digest.clone(),
        }
    }

    fn require_approval(
        &self,
        mandate: &Mandate,
        snapshot: &PolicySnapshot,
        reason_code: ReasonCode,
        reason: String,
        risk_score: u8,
        checks: Vec<PolicyCheck>,
    ) -> PolicyDecision {
        PolicyDecision {
            decision_id: DecisionId::generate(),
            outcome: PolicyOutcome::RequiresApproval,
            reason_code: Some(reason_code),
            reason,
            risk_score,
            checks,
            approval_template: Some(ApprovalTemplate {
                action: "payment.execute".to_string(),
                subject_digest: mandate.audit_hash.clone(),
                min_reviewers: 1,
                ttl_secs: APPROVAL_TTL_SECS,
            }),
            policy_revision: snapshot.revision_digest.clone(),
        }
    }

    /// Deterministic composite over cap utilization, velocity pressure, and
    /// drift. Integer weighting keeps results stable across platforms.
    fn risk_score(
        &self,
        mandate: &Mandate,
        snapshot: &PolicySnapshot,
        ctx: &EvalContext,
    ) -> u8 {
        let amount = mandate.amount.amount_minor.max(0) as u128;
        let per_tx = snapshot.hard_caps.per_tx_for(mandate.rail).max(1) as u128;
        let amount_factor = ((amount * 100) / per_tx).min(100) as u16;

        let day_used = ctx.counters.day.amount_minor.max(0) as u128;
        let per_day = snapshot.hard_caps.per_day_minor.max(1) as u128;
        let day_factor = (((day_used + amount) * 100) / per_day).min(100) as u16;

        let drift = snapshot_drift_score(mandate, snapshot, ctx);
        let drift_factor = ((drift / snapshot.drift.block_threshold.max(f64::MIN_POSITIVE))
            * 100.0)
            .clamp(0.0, 100.0) as u16;

        ((amount_factor * 40 + day_factor * 30 + drift_factor * 30) / 100) as u8
    }
}

fn exceeds_window(
    count: u32,
    window_amount: i64,
    amount: i64,
    limit: WindowLimit,
) -> Result<bool, PolicyError> {
    let projected_count = count
        .checked_add(1)
        .ok_or_else(|| PolicyError::CheckFailed("velocity count overflow".to_string()))?;
    let projected_amount = window_amount
        .checked_add(amount)
        .ok_or_else(|| PolicyError::CheckFailed("velocity amount overflow".to_string()))?;
    Ok(projected_count > limit.max_count || projected_amount > limit.max_amount_minor)
}

/// Score the observed category mix with the candidate mandate folded in,
/// against the agent's expected profile carried on the context.
fn snapshot_drift_score(
    mandate: &Mandate,
    _snapshot: &PolicySnapshot,
    ctx: &EvalContext,
) -> f64 {
    if ctx.drift_profile.expected_shares.is_empty() {
        return 0.0;
    }
    let mut observed = ctx.observed_categories.clone();
    let category = ctx
        .vendor_category
        .clone()
        .unwrap_or_else(|| mandate.purpose.to_ascii_lowercase());
    *observed.entry(category).or_insert(0) += 1;
    ctx.drift_profile.score(&observed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drift::DriftThresholds;
    use crate::snapshot::{HardCaps, RuleSet, VelocityLimits};
    use chrono::Utc;
    use sardis_types::{AgentId, CurrencyCode, MandateDraft, Money, OrgId, Rail, WalletId};
    use std::collections::{BTreeMap, BTreeSet};

    fn mandate(amount_minor: i64, destination: &str, rail: Rail) -> Mandate {
        MandateDraft::new(
            AgentId::parse("agt_proc1").unwrap(),
            OrgId::parse("org_acme1").unwrap(),
            WalletId::parse("wlt_ops1").unwrap(),
            destination,
            Money::new(amount_minor, CurrencyCode::usd()).unwrap(),
            rail,
            "infrastructure invoice",
        )
        .seal(Utc::now())
        .unwrap()
    }

    fn snapshot(rules: RuleSet) -> PolicySnapshot {
        PolicySnapshot::build(
            "pol-1",
            OrgId::parse("org_acme1").unwrap(),
            1,
            rules,
            HardCaps {
                per_tx_minor: 10_000_000,
                per_day_minor: 50_000_000,
                per_month_minor: 400_000_000,
                per_rail_minor: BTreeMap::new(),
            },
            DriftThresholds::validated(0.6, 1.5).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn allowed_payment_is_approved() {
        let engine = PolicyEngine::new();
        let decision = engine.evaluate(
            &mandate(5_000_000, "vendor.example.com", Rail::Ach),
            &snapshot(RuleSet::default()),
            &EvalContext::permissive(),
            None,
        );
        assert_eq!(decision.outcome, PolicyOutcome::Approved);
        assert!(decision.reason_code.is_none());
    }

    #[test]
    fn per_tx_hard_cap_blocks_regardless_of_rules() {
        let engine = PolicyEngine::new();
        let decision = engine.evaluate(
            &mandate(500_000_000, "vendor.example.com", Rail::Ach),
            &snapshot(RuleSet::default()),
            &EvalContext::permissive(),
            None,
        );
        assert_eq!(decision.outcome, PolicyOutcome::Blocked);
        assert_eq!(
            decision.reason_code,
            Some(ReasonCode::PolicyLimitExceeded)
        );
    }

    #[test]
    fn nl_hint_cannot_relax_hard_cap() {
        let engine = PolicyEngine::new();
        let hint = SpendHint {
            per_tx_minor: Some(900_000_000),
            ..SpendHint::default()
        };
        let decision = engine.evaluate(
            &mandate(500_000_000, "vendor.example.com", Rail::Ach),
            &snapshot(RuleSet::default()),
            &EvalContext::permissive(),
            Some(&hint),
        );
        assert_eq!(decision.outcome, PolicyOutcome::Blocked);
        assert!(decision
            .checks
            .iter()
            .any(|check| check.name == "policy.nl_overreach"));
    }

    #[test]
    fn nl_hint_can_tighten() {
        let engine = PolicyEngine::new();
        let hint = SpendHint {
            per_tx_minor: Some(1_000_000),
            ..SpendHint::default()
        };
        let decision = engine.evaluate(
            &mandate(5_000_000, "vendor.example.com", Rail::Ach),
            &snapshot(RuleSet::default()),
            &EvalContext::permissive(),
            Some(&hint),
        );
        assert_eq!(decision.outcome, PolicyOutcome::Blocked);
        assert_eq!(decision.reason_code, Some(ReasonCode::PolicyLimitExceeded));
    }

    #[test]
    fn kill_switched_wallet_is_halted() {
        let engine = PolicyEngine::new();
        let mut ctx = EvalContext::permissive();
        ctx.wallet.kill_switched = true;
        let decision = engine.evaluate(
            &mandate(1_000, "vendor.example.com", Rail::Ach),
            &snapshot(RuleSet::default()),
            &ctx,
            None,
        );
        assert_eq!(decision.reason_code, Some(ReasonCode::PolicyWalletHalted));
    }

    #[test]
    fn unavailable_sanctions_screen_fails_closed() {
        let engine = PolicyEngine::new();
        let mut ctx = EvalContext::permissive();
        ctx.compliance.sanctions = ScreenState::Unavailable;
        let decision = engine.evaluate(
            &mandate(1_000, "vendor.example.com", Rail::Ach),
            &snapshot(RuleSet::default()),
            &ctx,
            None,
        );
        assert_eq!(decision.outcome, PolicyOutcome::Blocked);
        assert_eq!(decision.reason_code, Some(ReasonCode::PolicyComplianceFail));
    }

    #[test]
    fn agent_to_agent_needs_trust_relation() {
        let engine = PolicyEngine::new();
        let mut ctx = EvalContext::permissive();
        ctx.agent_to_agent = true;
        ctx.compliance.trust_relation_present = false;
        let decision = engine.evaluate(
            &mandate(1_000, "agt-wallet.internal", Rail::Stablecoin),
            &snapshot(RuleSet::default()),
            &ctx,
            None,
        );
        assert_eq!(decision.reason_code, Some(ReasonCode::PolicyComplianceFail));

        // With enforcement off the same transfer passes the gate.
        ctx.enforce_trust_table = false;
        let decision = engine.evaluate(
            &mandate(1_000, "agt-wallet.internal", Rail::Stablecoin),
            &snapshot(RuleSet::default()),
            &ctx,
            None,
        );
        assert_eq!(decision.outcome, PolicyOutcome::Approved);
    }

    #[test]
    fn allowlist_uses_exact_normalized_match() {
        let engine = PolicyEngine::new();
        let mut rules = RuleSet::default();
        rules.allowed_vendors = BTreeSet::from(["aws.amazon.com".to_string()]);
        let snap = snapshot(rules);

        let allowed = engine.evaluate(
            &mandate(1_000, "https://WWW.aws.amazon.com", Rail::Ach),
            &snap,
            &EvalContext::permissive(),
            None,
        );
        assert_eq!(allowed.outcome, PolicyOutcome::Approved);

        // Substring relatives of an allowlisted vendor must not pass.
        let spoofed = engine.evaluate(
            &mandate(1_000, "aws-evil.com", Rail::Ach),
            &snap,
            &EvalContext::permissive(),
            None,
        );
        assert_eq!(spoofed.outcome, PolicyOutcome::Blocked);
        assert_eq!(spoofed.reason_code, Some(ReasonCode::PolicyVendorBlocked));
    }

    #[test]
    fn blocked_vendor_and_category() {
        let engine = PolicyEngine::new();
        let mut rules = RuleSet::default();
        rules.blocked_vendors = BTreeSet::from(["casino.example.com".to_string()]);
        rules.blocked_categories = BTreeSet::from(["gambling".to_string()]);
        let snap = snapshot(rules);

        let by_vendor = engine.evaluate(
            &mandate(1_000, "casino.example.com", Rail::Card),
            &snap,
            &EvalContext::permissive(),
            None,
        );
        assert_eq!(by_vendor.reason_code, Some(ReasonCode::PolicyVendorBlocked));

        let mut ctx = EvalContext::permissive();
        ctx.vendor_category = Some("Gambling".to_string());
        let by_category = engine.evaluate(
            &mandate(1_000, "fun.example.com", Rail::Card),
            &snap,
            &ctx,
            None,
        );
        assert_eq!(
            by_category.reason_code,
            Some(ReasonCode::PolicyCategoryBlocked)
        );
    }

    #[test]
    fn velocity_window_blocks_when_exhausted() {
        let engine = PolicyEngine::new();
        let mut rules = RuleSet::default();
        rules.velocity = Some(VelocityLimits {
            per_minute: WindowLimit {
                max_count: 2,
                max_amount_minor: 10_000_000,
            },
            per_hour: WindowLimit {
                max_count: 100,
                max_amount_minor: 50_000_000,
            },
            per_day: WindowLimit {
                max_count: 1000,
                max_amount_minor: 50_000_000,
            },
        });
        let snap = snapshot(rules);
        let mut ctx = EvalContext::permissive();
        ctx.counters.minute.count = 2;

        let decision = engine.evaluate(
            &mandate(1_000, "vendor.example.com", Rail::Ach),
            &snap,
            &ctx,
            None,
        );
        assert_eq!(
            decision.reason_code,
            Some(ReasonCode::PolicyVelocityExceeded)
        );
    }

    #[test]
    fn approval_threshold_emits_template() {
        let engine = PolicyEngine::new();
        let mut rules = RuleSet::default();
        rules.approval_threshold_minor = Some(1_000_000);
        let m = mandate(2_000_000, "vendor.example.com", Rail::Ach);
        let decision = engine.evaluate(&m, &snapshot(rules), &EvalContext::permissive(), None);

        assert_eq!(decision.outcome, PolicyOutcome::RequiresApproval);
        let template = decision.approval_template.unwrap();
        assert_eq!(template.subject_digest, m.audit_hash);
        assert_eq!(template.min_reviewers, 1);
    }

    #[test]
    fn decisions_are_deterministic_modulo_id() {
        let engine = PolicyEngine::new();
        let m = mandate(5_000_000, "vendor.example.com", Rail::Ach);
        let snap = snapshot(RuleSet::default());
        let ctx = EvalContext::permissive();

        let a = engine.evaluate(&m, &snap, &ctx, None);
        let b = engine.evaluate(&m, &snap, &ctx, None);
        assert_eq!(a.outcome, b.outcome);
        assert_eq!(a.reason_code, b.reason_code);
        assert_eq!(a.risk_score, b.risk_score);
        assert_eq!(a.checks.len(), b.checks.len());
    }

    #[test]
    fn drift_blocks_when_category_mix_diverges() {
        let engine = PolicyEngine::new();
        let mut ctx = EvalContext::permissive();
        ctx.drift_profile = crate::drift::DriftProfile {
            expected_shares: BTreeMap::from([
                ("cloud".to_string(), 0.7),
                ("saas".to_string(), 0.3),
            ]),
        };
        // Recent behavior is all in a category the profile never predicted.
        ctx.observed_categories = BTreeMap::from([("gambling".to_string(), 30)]);
        ctx.vendor_category = Some("gambling".to_string());

        let decision = engine.evaluate(
            &mandate(1_000, "vendor.example.com", Rail::Card),
            &snapshot(RuleSet::default()),
            &ctx,
            None,
        );
        assert_eq!(decision.outcome, PolicyOutcome::Blocked);
        assert_eq!(decision.reason_code, Some(ReasonCode::PolicyDriftBlocked));
    }

    #[test]
    fn drift_review_band_requires_approval() {
        let engine = PolicyEngine::new();
        let snap = PolicySnapshot::build(
            "pol-1",
            OrgId::parse("org_acme1").unwrap(),
            1,
            RuleSet::default(),
            HardCaps {
                per_tx_minor: 10_000_000,
                per_day_minor: 50_000_000,
                per_month_minor: 400_000_000,
                per_rail_minor: BTreeMap::new(),
            },
            DriftThresholds::validated(0.2, 10.0).unwrap(),
        )
        .unwrap();

        let mut ctx = EvalContext::permissive();
        ctx.drift_profile = crate::drift::DriftProfile {
            expected_shares: BTreeMap::from([
                ("cloud".to_string(), 0.5),
                ("saas".to_string(), 0.3),
                ("misc".to_string(), 0.2),
            ]),
        };
        ctx.observed_categories = BTreeMap::from([
            ("cloud".to_string(), 4),
            ("saas".to_string(), 2),
            ("misc".to_string(), 3),
        ]);
        ctx.vendor_category = Some("misc".to_string());

        let decision = engine.evaluate(
            &mandate(1_000, "vendor.example.com", Rail::Card),
            &snap,
            &ctx,
            None,
        );
        assert_eq!(decision.outcome, PolicyOutcome::RequiresApproval);
        assert!(decision.approval_template.is_some());
    }
}
