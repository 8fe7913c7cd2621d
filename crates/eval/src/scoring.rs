//! Scoring strategies: per-rule outcomes into a criteria-level score.
//!
//! Pure functions over the ordered outcome list. A criteria with zero
//! active rules scores 100 under every method (vacuous pass), decided
//! here once rather than per method.

use rust_decimal::Decimal;

use eligo_core::ScoringMethod;

use crate::numeric::round_score;
use crate::types::RuleOutcome;

/// Fold rule outcomes into a 0..=100 score.
pub fn score(method: ScoringMethod, outcomes: &[RuleOutcome]) -> Decimal {
    if outcomes.is_empty() {
        // Vacuous pass: nothing to violate.
        return Decimal::ONE_HUNDRED;
    }
    match method {
        ScoringMethod::PassFail => {
            if outcomes.iter().all(|o| o.passed) {
                Decimal::ONE_HUNDRED
            } else {
                Decimal::ZERO
            }
        }
        ScoringMethod::Weighted => {
            let total: Decimal = outcomes.iter().map(|o| Decimal::from(o.weight)).sum();
            if total.is_zero() {
                // Unreachable through the builder (weights are positive),
                // kept for rows written directly to storage.
                return Decimal::ZERO;
            }
            let passed: Decimal = outcomes
                .iter()
                .filter(|o| o.passed)
                .map(|o| Decimal::from(o.weight))
                .sum();
            round_score(Decimal::ONE_HUNDRED * passed / total)
        }
        ScoringMethod::Average => {
            let total = Decimal::from(outcomes.len() as u64);
            let sum: Decimal = outcomes
                .iter()
                .map(|o| {
                    if o.passed {
                        Decimal::ONE_HUNDRED
                    } else {
                        Decimal::ZERO
                    }
                })
                .sum();
            round_score(sum / total)
        }
        ScoringMethod::Percentage => {
            let total = Decimal::from(outcomes.len() as u64);
            let passed = Decimal::from(outcomes.iter().filter(|o| o.passed).count() as u64);
            round_score(Decimal::ONE_HUNDRED * passed / total)
        }
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────
