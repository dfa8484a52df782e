//! Scaling rule evaluation
//!
//! Rules are walked in catalog order. Every rule whose threshold is reached
//! is recorded; a multiplier rule replaces the running multiplier (so the
//! last matching one wins), a surcharge rule adds its amount to the base cost.

use serde::Serialize;

use crate::models::{ScalingMode, ScalingRule};

/// A rule that matched a resolved quantity, as reported in the quote
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppliedRule {
    /// Rule label
    pub rule: Option<String>,
    pub mode: ScalingMode,
    pub multiplier: f64,
    pub threshold: i64,
}

impl From<&ScalingRule> for AppliedRule {
    fn from(rule: &ScalingRule) -> Self {
        Self {
            rule: rule.label.clone(),
            mode: rule.mode,
            multiplier: rule.multiplier,
            threshold: rule.threshold,
        }
    }
}

/// Result of running the rules against one quantity
#[derive(Debug, Clone, PartialEq)]
pub struct ScalingOutcome {
    /// Multiplier to apply to the adjusted cost (1.0 when no multiplier rule matched)
    pub multiplier: f64,
    /// Sum of matched surcharges
    pub surcharge: f64,
    /// Matched rules in evaluation order
    pub applied: Vec<AppliedRule>,
}

impl ScalingOutcome {
    /// Apply the outcome to a base cost (unrounded)
    pub fn adjust(&self, base_cost: f64) -> f64 {
        (base_cost + self.surcharge) * self.multiplier
    }
}

/// Evaluates an ordered rule list
#[derive(Debug, Clone, Copy)]
pub struct ScalingRuleEvaluator<'a> {
    rules: &'a [ScalingRule],
}

impl<'a> ScalingRuleEvaluator<'a> {
    pub fn new(rules: &'a [ScalingRule]) -> Self {
        Self { rules }
    }

    pub fn evaluate(&self, quantity: i64) -> ScalingOutcome {
        let mut multiplier = 1.0;
        let mut surcharge = 0.0;
        let mut applied = Vec::new();

        for rule in self.rules.iter().filter(|r| quantity >= r.threshold) {
            match rule.mode {
                ScalingMode::Multiplier => multiplier = rule.multiplier,
                ScalingMode::Surcharge => surcharge += rule.multiplier,
            }
            applied.push(AppliedRule::from(rule));
        }

        ScalingOutcome {
            multiplier,
            surcharge,
            applied,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_rules() {
        let outcome = ScalingRuleEvaluator::new(&[]).evaluate(100);
        assert_eq!(outcome.multiplier, 1.0);
        assert_eq!(outcome.surcharge, 0.0);
        assert!(outcome.applied.is_empty());
        assert_eq!(outcome.adjust(7.5), 7.5);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let rules = [ScalingRule::multiplier(4096, 0.9)];
        let evaluator = ScalingRuleEvaluator::new(&rules);
        assert_eq!(evaluator.evaluate(4095).multiplier, 1.0);
        assert_eq!(evaluator.evaluate(4096).multiplier, 0.9);
    }

    #[test]
    fn test_later_multiplier_overwrites() {
        let rules = [
            ScalingRule::multiplier(1000, 0.9).with_label("bulk"),
            ScalingRule::multiplier(2000, 0.8).with_label("huge"),
        ];
        let outcome = ScalingRuleEvaluator::new(&rules).evaluate(2500);

        // Not 0.72: the later rule replaces the earlier multiplier
        assert_eq!(outcome.multiplier, 0.8);
        assert_eq!(outcome.applied.len(), 2);
        assert_eq!(outcome.applied[0].rule.as_deref(), Some("bulk"));
        assert_eq!(outcome.applied[1].rule.as_deref(), Some("huge"));
    }

    #[test]
    fn test_surcharges_accumulate() {
        let rules = [
            ScalingRule::surcharge(10, 1.5),
            ScalingRule::surcharge(20, 2.5),
            ScalingRule::surcharge(50, 100.0),
        ];
        let outcome = ScalingRuleEvaluator::new(&rules).evaluate(25);
        assert_eq!(outcome.surcharge, 4.0);
        assert_eq!(outcome.applied.len(), 2);
        assert_eq!(outcome.adjust(6.0), 10.0);
    }

    #[test]
    fn test_mixed_rules_apply_multiplier_to_surcharged_cost() {
        let rules = [ScalingRule::surcharge(0, 2.0), ScalingRule::multiplier(0, 0.5)];
        let outcome = ScalingRuleEvaluator::new(&rules).evaluate(1);
        assert_eq!(outcome.adjust(8.0), 5.0);
        assert_eq!(outcome.applied[0].mode, ScalingMode::Surcharge);
        assert_eq!(outcome.applied[1].mode, ScalingMode::Multiplier);
    }
}
