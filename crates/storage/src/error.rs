/// All errors that can be returned by an EligibilityStore implementation.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Criteria not found — no record with the given id or slug.
    #[error("criteria not found: {identifier}")]
    CriteriaNotFound { identifier: String },

    /// Rule not found within the given criteria.
    #[error("rule not found: {rule_id} (criteria {criteria_id})")]
    RuleNotFound {
        criteria_id: String,
        rule_id: String,
    },

    /// A record with a unique key (e.g. criteria slug) already exists.
    #[error("duplicate key: {message}")]
    Duplicate { message: String },

    /// A backend-specific storage error (DB connection, serialization, etc.).
    #[error("storage backend error: {0}")]
    Backend(String),
}
