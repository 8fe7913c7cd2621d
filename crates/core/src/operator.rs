//! Operator kinds and expected-value shape validation.
//!
//! The operator set is a closed enumeration plus an open `Custom` variant
//! keyed by name. Shape constraints (array for membership, strictly
//! ordered two-element range, delimiter-wrapped valid pattern) are
//! enforced here at build time so that evaluation never has to downgrade
//! a malformed rule to a silent false.

use std::fmt;

use crate::error::ModelError;
use crate::value::json_decimal;

/// One of the built-in comparison operators, or a custom operator
/// resolved by name against the engine's registry at evaluation time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum OperatorKind {
    Equals,
    NotEquals,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    In,
    NotIn,
    Between,
    NotBetween,
    Contains,
    StartsWith,
    EndsWith,
    Exists,
    NotExists,
    Regex,
    Custom(String),
}

impl OperatorKind {
    /// Parse an operator name. Unrecognized names become `Custom`; whether
    /// such a name is actually registered is checked at evaluation time,
    /// where an unknown name is a configuration error.
    pub fn parse(name: &str) -> OperatorKind {
        match name {
            "=" | "==" | "eq" | "equals" => OperatorKind::Equals,
            "!=" | "<>" | "neq" | "not_equals" => OperatorKind::NotEquals,
            ">" | "gt" => OperatorKind::GreaterThan,
            ">=" | "gte" => OperatorKind::GreaterThanOrEqual,
            "<" | "lt" => OperatorKind::LessThan,
            "<=" | "lte" => OperatorKind::LessThanOrEqual,
            "in" => OperatorKind::In,
            "not_in" => OperatorKind::NotIn,
            "between" => OperatorKind::Between,
            "not_between" => OperatorKind::NotBetween,
            "contains" => OperatorKind::Contains,
            "starts_with" => OperatorKind::StartsWith,
            "ends_with" => OperatorKind::EndsWith,
            "exists" => OperatorKind::Exists,
            "not_exists" => OperatorKind::NotExists,
            "regex" | "matches" => OperatorKind::Regex,
            other => {
                let name = other.strip_prefix("custom:").unwrap_or(other);
                OperatorKind::Custom(name.to_string())
            }
        }
    }

    /// Canonical storage name.
    pub fn name(&self) -> String {
        match self {
            OperatorKind::Equals => "=".to_string(),
            OperatorKind::NotEquals => "!=".to_string(),
            OperatorKind::GreaterThan => ">".to_string(),
            OperatorKind::GreaterThanOrEqual => ">=".to_string(),
            OperatorKind::LessThan => "<".to_string(),
            OperatorKind::LessThanOrEqual => "<=".to_string(),
            OperatorKind::In => "in".to_string(),
            OperatorKind::NotIn => "not_in".to_string(),
            OperatorKind::Between => "between".to_string(),
            OperatorKind::NotBetween => "not_between".to_string(),
            OperatorKind::Contains => "contains".to_string(),
            OperatorKind::StartsWith => "starts_with".to_string(),
            OperatorKind::EndsWith => "ends_with".to_string(),
            OperatorKind::Exists => "exists".to_string(),
            OperatorKind::NotExists => "not_exists".to_string(),
            OperatorKind::Regex => "regex".to_string(),
            OperatorKind::Custom(name) => format!("custom:{}", name),
        }
    }

    /// Validate the expected value's shape against this operator.
    ///
    /// Custom operators accept any shape -- the callback owns its contract.
    pub fn validate_shape(&self, expected: &serde_json::Value) -> Result<(), ModelError> {
        match self {
            OperatorKind::In | OperatorKind::NotIn => match expected {
                serde_json::Value::Array(_) => Ok(()),
                other => Err(self.shape_error(format!(
                    "expected an array of candidate values, got {}",
                    json_type_name(other)
                ))),
            },
            OperatorKind::Between | OperatorKind::NotBetween => {
                let items = match expected {
                    serde_json::Value::Array(items) if items.len() == 2 => items,
                    serde_json::Value::Array(items) => {
                        return Err(self.shape_error(format!(
                            "expected a two-element [min, max] range, got {} elements",
                            items.len()
                        )));
                    }
                    other => {
                        return Err(self.shape_error(format!(
                            "expected a two-element [min, max] range, got {}",
                            json_type_name(other)
                        )));
                    }
                };
                let min = json_decimal(&items[0]).ok_or_else(|| {
                    self.shape_error(format!("range min is not numeric: {}", items[0]))
                })?;
                let max = json_decimal(&items[1]).ok_or_else(|| {
                    self.shape_error(format!("range max is not numeric: {}", items[1]))
                })?;
                if min >= max {
                    return Err(ModelError::InvalidRange {
                        min: min.to_string(),
                        max: max.to_string(),
                    });
                }
                Ok(())
            }
            OperatorKind::Regex => match expected {
                serde_json::Value::String(raw) => compile_pattern(raw).map(|_| ()),
                other => Err(self.shape_error(format!(
                    "expected a delimiter-wrapped pattern string, got {}",
                    json_type_name(other)
                ))),
            },
            OperatorKind::GreaterThan
            | OperatorKind::GreaterThanOrEqual
            | OperatorKind::LessThan
            | OperatorKind::LessThanOrEqual => {
                if json_decimal(expected).is_none() {
                    return Err(self.shape_error(format!(
                        "expected a number or numeric string, got {}",
                        json_type_name(expected)
                    )));
                }
                Ok(())
            }
            OperatorKind::StartsWith | OperatorKind::EndsWith => match expected {
                serde_json::Value::String(_) => Ok(()),
                other => Err(self.shape_error(format!(
                    "expected a string prefix/suffix, got {}",
                    json_type_name(other)
                ))),
            },
            OperatorKind::Contains => match expected {
                serde_json::Value::Object(_) => Err(self
                    .shape_error("expected a scalar needle, got object".to_string())),
                _ => Ok(()),
            },
            // Equality compares any shapes; existence ignores the expected
            // value; custom operators own their contract.
            OperatorKind::Equals
            | OperatorKind::NotEquals
            | OperatorKind::Exists
            | OperatorKind::NotExists
            | OperatorKind::Custom(_) => Ok(()),
        }
    }

    fn shape_error(&self, message: String) -> ModelError {
        ModelError::InvalidExpectedValue {
            operator: self.name(),
            message,
        }
    }
}

impl fmt::Display for OperatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Compile a delimiter-wrapped pattern (`/pat/flags`) into a regex.
///
/// Supported flags: `i` (case-insensitive), `m` (multi-line), `s`
/// (dot matches newline). Anything else, or a pattern that the regex
/// engine rejects, is a build-time error.
pub fn compile_pattern(raw: &str) -> Result<regex::Regex, ModelError> {
    let invalid = |message: String| ModelError::InvalidPattern {
        pattern: raw.to_string(),
        message,
    };

    let rest = raw
        .strip_prefix('/')
        .ok_or_else(|| invalid("pattern must be wrapped in '/' delimiters".to_string()))?;
    let close = rest
        .rfind('/')
        .ok_or_else(|| invalid("missing closing '/' delimiter".to_string()))?;
    let (pattern, flags) = rest.split_at(close);
    let flags = &flags[1..];

    for flag in flags.chars() {
        if !matches!(flag, 'i' | 'm' | 's') {
            return Err(invalid(format!("unsupported flag '{}'", flag)));
        }
    }

    let source = if flags.is_empty() {
        pattern.to_string()
    } else {
        format!("(?{}){}", flags, pattern)
    };
    regex::Regex::new(&source).map_err(|e| invalid(e.to_string()))
}

fn json_type_name(json: &serde_json::Value) -> &'static str {
    match json {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

// ──────────────────────────────────────────────
// Tests
// ──────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_known_operators() {
        assert_eq!(OperatorKind::parse(">="), OperatorKind::GreaterThanOrEqual);
        assert_eq!(OperatorKind::parse("eq"), OperatorKind::Equals);
        assert_eq!(OperatorKind::parse("not_between"), OperatorKind::NotBetween);
        assert_eq!(OperatorKind::parse("matches"), OperatorKind::Regex);
    }

    #[test]
    fn parse_unknown_becomes_custom() {
        assert_eq!(
            OperatorKind::parse("foo_bar"),
            OperatorKind::Custom("foo_bar".to_string())
        );
        assert_eq!(
            OperatorKind::parse("custom:fraud_check"),
            OperatorKind::Custom("fraud_check".to_string())
        );
    }

    #[test]
    fn name_round_trips() {
        for op in [
            OperatorKind::Equals,
            OperatorKind::Between,
            OperatorKind::NotExists,
            OperatorKind::Custom("fraud_check".to_string()),
        ] {
            assert_eq!(OperatorKind::parse(&op.name()), op);
        }
    }

    #[test]
    fn in_requires_array() {
        let op = OperatorKind::In;
        assert!(op.validate_shape(&serde_json::json!(["a", "b"])).is_ok());
        assert!(op.validate_shape(&serde_json::json!("a")).is_err());
    }

    #[test]
    fn between_requires_strictly_ordered_pair() {
        let op = OperatorKind::Between;
        assert!(op.validate_shape(&serde_json::json!([18, 65])).is_ok());
        assert!(op.validate_shape(&serde_json::json!(["18", "65.5"])).is_ok());
        assert!(op.validate_shape(&serde_json::json!([65, 18])).is_err());
        assert!(op.validate_shape(&serde_json::json!([18, 18])).is_err());
        assert!(op.validate_shape(&serde_json::json!([18])).is_err());
        assert!(op.validate_shape(&serde_json::json!([18, "abc"])).is_err());
    }

    #[test]
    fn comparison_requires_numeric_expected() {
        let op = OperatorKind::GreaterThanOrEqual;
        assert!(op.validate_shape(&serde_json::json!(3000)).is_ok());
        assert!(op.validate_shape(&serde_json::json!("3000")).is_ok());
        assert!(op.validate_shape(&serde_json::json!("high")).is_err());
    }

    #[test]
    fn regex_pattern_validated_at_build_time() {
        let op = OperatorKind::Regex;
        assert!(op.validate_shape(&serde_json::json!("/^[A-Z]{2}\\d+$/")).is_ok());
        assert!(op.validate_shape(&serde_json::json!("/hello/i")).is_ok());
        // Undelimited, bad flag, and unparsable patterns all fail.
        assert!(op.validate_shape(&serde_json::json!("^[A-Z]+$")).is_err());
        assert!(op.validate_shape(&serde_json::json!("/hello/z")).is_err());
        assert!(op.validate_shape(&serde_json::json!("/([a-z/")).is_err());
    }

    #[test]
    fn compiled_pattern_applies_flags() {
        let re = compile_pattern("/^ok$/i").unwrap();
        assert!(re.is_match("OK"));
        let re = compile_pattern("/^ok$/").unwrap();
        assert!(!re.is_match("OK"));
    }

    #[test]
    fn custom_accepts_any_shape() {
        let op = OperatorKind::Custom("fraud_check".to_string());
        assert!(op.validate_shape(&serde_json::json!({"level": 3})).is_ok());
    }
}
