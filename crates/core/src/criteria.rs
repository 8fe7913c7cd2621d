//! Criteria and rule model.
//!
//! A `Criteria` is a named, ordered set of rules plus a scoring method and
//! passing threshold. Rules belong to exactly one criteria. Both types are
//! plain domain values here; persistence rows live in the storage crate
//! and the engine converts between the two.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::operator::OperatorKind;

/// How per-rule outcomes fold into a criteria-level score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScoringMethod {
    /// 100 if every rule passes, else 0.
    PassFail,
    /// Weight-proportional share of passed rules.
    #[default]
    Weighted,
    /// Unweighted mean of pass/fail.
    Average,
    /// Share of passed rules by count.
    Percentage,
}

impl ScoringMethod {
    pub fn parse(name: &str) -> Result<ScoringMethod, ModelError> {
        match name {
            "pass_fail" => Ok(ScoringMethod::PassFail),
            "weighted" => Ok(ScoringMethod::Weighted),
            "average" => Ok(ScoringMethod::Average),
            "percentage" => Ok(ScoringMethod::Percentage),
            other => Err(ModelError::UnknownScoringMethod {
                name: other.to_string(),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ScoringMethod::PassFail => "pass_fail",
            ScoringMethod::Weighted => "weighted",
            ScoringMethod::Average => "average",
            ScoringMethod::Percentage => "percentage",
        }
    }
}

/// One score band mapping to a decision label, bounds inclusive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionBand {
    pub min: Decimal,
    pub max: Decimal,
    pub label: String,
}

impl DecisionBand {
    pub fn contains(&self, score: Decimal) -> bool {
        score >= self.min && score <= self.max
    }
}

/// One evaluable condition: field / operator / expected value / weight.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    /// Stable identifier. Assigned by the engine on save when empty.
    pub id: Option<String>,
    /// Dotted path into the input record.
    pub field: String,
    pub operator: OperatorKind,
    /// Expected value; shape validated against the operator at build time.
    pub value: serde_json::Value,
    /// Explicit weight. When absent, `priority` resolves against the
    /// configured priority-to-weight table at save time.
    pub weight: Option<u32>,
    pub priority: Option<String>,
    pub order: u32,
    pub is_active: bool,
}

/// A named, ordered set of rules plus scoring method and threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct Criteria {
    pub id: String,
    pub name: String,
    /// Unique, URL-safe secondary key.
    pub slug: String,
    pub is_active: bool,
    pub kind: Option<String>,
    pub group: Option<String>,
    pub category: Option<String>,
    /// Free-form caller metadata.
    pub metadata: serde_json::Value,
    pub scoring_method: ScoringMethod,
    /// Passing threshold override; the engine default applies when None.
    pub passing_threshold: Option<Decimal>,
    /// Score bands for decision labels; highest band wins on overlap.
    pub decision_bands: Vec<DecisionBand>,
    pub rules: Vec<Rule>,
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scoring_method_round_trips() {
        for m in [
            ScoringMethod::PassFail,
            ScoringMethod::Weighted,
            ScoringMethod::Average,
            ScoringMethod::Percentage,
        ] {
            assert_eq!(ScoringMethod::parse(m.name()).unwrap(), m);
        }
        assert!(ScoringMethod::parse("majority").is_err());
    }

    #[test]
    fn band_bounds_inclusive() {
        let band = DecisionBand {
            min: Decimal::from(80),
            max: Decimal::from(89),
            label: "Good".to_string(),
        };
        assert!(band.contains(Decimal::from(80)));
        assert!(band.contains(Decimal::from(89)));
        assert!(!band.contains(Decimal::from(90)));
    }
}
