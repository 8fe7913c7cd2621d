//! Criteria and rule builders with build-time validation.
//!
//! All shape constraints are enforced when `build()` runs: a criteria
//! that constructs successfully will never hit a malformed expected
//! value or invalid pattern during evaluation.

use rust_decimal::Decimal;

use crate::criteria::{Criteria, DecisionBand, Rule, ScoringMethod};
use crate::error::ModelError;
use crate::operator::OperatorKind;

/// Builder for a single rule. Created via [`RuleBuilder::new`] and handed
/// to [`CriteriaBuilder::rule`].
#[derive(Debug, Clone)]
pub struct RuleBuilder {
    id: Option<String>,
    field: String,
    operator: OperatorKind,
    value: serde_json::Value,
    weight: Option<u32>,
    priority: Option<String>,
    order: Option<u32>,
    is_active: bool,
}

impl RuleBuilder {
    pub fn new(field: &str, operator: &str, value: serde_json::Value) -> RuleBuilder {
        RuleBuilder {
            id: None,
            field: field.to_string(),
            operator: OperatorKind::parse(operator),
            value,
            weight: None,
            priority: None,
            order: None,
            is_active: true,
        }
    }

    pub fn id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }

    pub fn weight(mut self, weight: u32) -> Self {
        self.weight = Some(weight);
        self
    }

    /// Named priority resolved against the configured weight table when
    /// no explicit weight is given.
    pub fn priority(mut self, priority: &str) -> Self {
        self.priority = Some(priority.to_string());
        self
    }

    pub fn order(mut self, order: u32) -> Self {
        self.order = Some(order);
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }

    /// Validate and build. `position` supplies the default order.
    pub fn build(self, position: u32) -> Result<Rule, ModelError> {
        self.operator.validate_shape(&self.value)?;
        if let Some(0) = self.weight {
            return Err(ModelError::InvalidWeight { weight: 0 });
        }
        Ok(Rule {
            id: self.id,
            field: self.field,
            operator: self.operator,
            value: self.value,
            weight: self.weight,
            priority: self.priority,
            order: self.order.unwrap_or(position),
            is_active: self.is_active,
        })
    }
}

/// Builder for a criteria and its rules.
#[derive(Debug, Clone)]
pub struct CriteriaBuilder {
    id: Option<String>,
    name: String,
    slug: Option<String>,
    is_active: bool,
    kind: Option<String>,
    group: Option<String>,
    category: Option<String>,
    metadata: serde_json::Value,
    scoring_method: ScoringMethod,
    passing_threshold: Option<Decimal>,
    decision_bands: Vec<DecisionBand>,
    rules: Vec<RuleBuilder>,
}

impl CriteriaBuilder {
    pub fn new(name: &str) -> CriteriaBuilder {
        CriteriaBuilder {
            id: None,
            name: name.to_string(),
            slug: None,
            is_active: true,
            kind: None,
            group: None,
            category: None,
            metadata: serde_json::Value::Object(serde_json::Map::new()),
            scoring_method: ScoringMethod::default(),
            passing_threshold: None,
            decision_bands: Vec::new(),
            rules: Vec::new(),
        }
    }

    pub fn id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }

    pub fn slug(mut self, slug: &str) -> Self {
        self.slug = Some(slug.to_string());
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }

    pub fn kind(mut self, kind: &str) -> Self {
        self.kind = Some(kind.to_string());
        self
    }

    pub fn group(mut self, group: &str) -> Self {
        self.group = Some(group.to_string());
        self
    }

    pub fn category(mut self, category: &str) -> Self {
        self.category = Some(category.to_string());
        self
    }

    pub fn metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn scoring_method(mut self, method: ScoringMethod) -> Self {
        self.scoring_method = method;
        self
    }

    pub fn passing_threshold(mut self, threshold: impl Into<Decimal>) -> Self {
        self.passing_threshold = Some(threshold.into());
        self
    }

    /// Add a decision band. Bands are kept in insertion order; the engine
    /// resolves overlaps highest-band-first.
    pub fn band(mut self, min: impl Into<Decimal>, max: impl Into<Decimal>, label: &str) -> Self {
        self.decision_bands.push(DecisionBand {
            min: min.into(),
            max: max.into(),
            label: label.to_string(),
        });
        self
    }

    pub fn rule(mut self, rule: RuleBuilder) -> Self {
        self.rules.push(rule);
        self
    }

    /// Validate and build the criteria. Rule shape violations surface
    /// here, never at evaluation time.
    pub fn build(self) -> Result<Criteria, ModelError> {
        if self.name.trim().is_empty() {
            return Err(ModelError::EmptyName);
        }
        let slug = match self.slug {
            Some(slug) => slug,
            None => slugify(&self.name),
        };
        let id = self.id.unwrap_or_else(|| slug.clone());

        let mut rules = Vec::with_capacity(self.rules.len());
        for (position, rule) in self.rules.into_iter().enumerate() {
            rules.push(rule.build(position as u32)?);
        }

        Ok(Criteria {
            id,
            name: self.name,
            slug,
            is_active: self.is_active,
            kind: self.kind,
            group: self.group,
            category: self.category,
            metadata: self.metadata,
            scoring_method: self.scoring_method,
            passing_threshold: self.passing_threshold,
            decision_bands: self.decision_bands,
            rules,
        })
    }
}

/// Lowercase, alphanumeric-and-dash slug derived from a display name.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_dash = true;
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_assigns_slug_id_and_order() {
        let criteria = CriteriaBuilder::new("Loan Approval")
            .scoring_method(ScoringMethod::Weighted)
            .passing_threshold(70)
            .rule(RuleBuilder::new("income", ">=", serde_json::json!(3000)).weight(40))
            .rule(RuleBuilder::new("credit_score", ">=", serde_json::json!(650)).weight(60))
            .build()
            .unwrap();

        assert_eq!(criteria.slug, "loan-approval");
        assert_eq!(criteria.id, "loan-approval");
        assert_eq!(criteria.rules.len(), 2);
        assert_eq!(criteria.rules[0].order, 0);
        assert_eq!(criteria.rules[1].order, 1);
        assert_eq!(criteria.passing_threshold, Some(Decimal::from(70)));
    }

    #[test]
    fn build_rejects_malformed_rule() {
        let err = CriteriaBuilder::new("Age Gate")
            .rule(RuleBuilder::new("age", "between", serde_json::json!([65, 18])))
            .build()
            .unwrap_err();
        assert!(matches!(err, ModelError::InvalidRange { .. }));
    }

    #[test]
    fn build_rejects_invalid_regex_up_front() {
        let err = CriteriaBuilder::new("Postcode")
            .rule(RuleBuilder::new("postcode", "regex", serde_json::json!("/([a-z/")))
            .build()
            .unwrap_err();
        assert!(matches!(err, ModelError::InvalidPattern { .. }));
    }

    #[test]
    fn build_rejects_zero_weight() {
        let err = CriteriaBuilder::new("Weights")
            .rule(RuleBuilder::new("x", "=", serde_json::json!(1)).weight(0))
            .build()
            .unwrap_err();
        assert!(matches!(err, ModelError::InvalidWeight { weight: 0 }));
    }

    #[test]
    fn build_rejects_empty_name() {
        assert!(matches!(
            CriteriaBuilder::new("  ").build(),
            Err(ModelError::EmptyName)
        ));
    }

    #[test]
    fn explicit_order_and_slug_preserved() {
        let criteria = CriteriaBuilder::new("Custom")
            .slug("my-custom-check")
            .id("c-9")
            .rule(RuleBuilder::new("x", "exists", serde_json::Value::Null).order(7))
            .build()
            .unwrap();
        assert_eq!(criteria.slug, "my-custom-check");
        assert_eq!(criteria.id, "c-9");
        assert_eq!(criteria.rules[0].order, 7);
    }

    #[test]
    fn slugify_collapses_punctuation() {
        assert_eq!(slugify("Loan Approval"), "loan-approval");
        assert_eq!(slugify("KYC -- Tier 2!"), "kyc-tier-2");
    }
}
