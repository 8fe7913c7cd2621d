use std::fmt;

/// Build-time model errors: a criteria or rule that cannot be constructed.
///
/// These are configuration problems. They surface when a criteria is
/// assembled or saved, never as a silently failed rule at evaluation time.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelError {
    /// The expected value's shape does not match what the operator requires.
    InvalidExpectedValue { operator: String, message: String },
    /// A regex rule carries an invalid or undelimited pattern.
    InvalidPattern { pattern: String, message: String },
    /// A between/not-between range is not strictly ordered.
    InvalidRange { min: String, max: String },
    /// Rule weight must be a positive integer.
    InvalidWeight { weight: i64 },
    /// Scoring method name not recognized.
    UnknownScoringMethod { name: String },
    /// Passing threshold is not a number.
    InvalidThreshold { value: String },
    /// Criteria metadata carries an unreadable well-known section.
    InvalidMetadata { message: String },
    /// Criteria must carry a non-empty name.
    EmptyName,
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelError::InvalidExpectedValue { operator, message } => {
                write!(f, "invalid expected value for operator '{}': {}", operator, message)
            }
            ModelError::InvalidPattern { pattern, message } => {
                write!(f, "invalid regex pattern '{}': {}", pattern, message)
            }
            ModelError::InvalidRange { min, max } => {
                write!(f, "invalid range [{}, {}]: min must be strictly less than max", min, max)
            }
            ModelError::InvalidWeight { weight } => {
                write!(f, "invalid rule weight {}: must be a positive integer", weight)
            }
            ModelError::UnknownScoringMethod { name } => {
                write!(f, "unknown scoring method: {}", name)
            }
            ModelError::InvalidThreshold { value } => {
                write!(f, "invalid passing threshold: {}", value)
            }
            ModelError::InvalidMetadata { message } => {
                write!(f, "invalid criteria metadata: {}", message)
            }
            ModelError::EmptyName => {
                write!(f, "criteria name must not be empty")
            }
        }
    }
}

impl std::error::Error for ModelError {}
