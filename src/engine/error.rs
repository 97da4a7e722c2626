use ulid::Ulid;

use crate::model::ConflictReport;
use crate::store::StoreError;

#[derive(Debug)]
pub enum EngineError {
    /// Malformed input: empty subject, a record the store refuses, ...
    Validation(String),
    /// Unresolved foreign ids or a section outside the given grade. Holds every failure.
    ReferenceNotFound(Vec<String>),
    /// The booking collides with an existing one. Carries the full report.
    Conflict(ConflictReport),
    /// The store's uniqueness constraint rejected a write that passed the
    /// conflict check. Not retried; resubmit to re-run the check.
    StorageConstraint(String),
    NotFound(Ulid),
    LimitExceeded(&'static str),
    Store(String),
}

impl EngineError {
    /// Short label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::Validation(_) => "validation",
            EngineError::ReferenceNotFound(_) => "reference_not_found",
            EngineError::Conflict(_) => "conflict",
            EngineError::StorageConstraint(_) => "storage_constraint",
            EngineError::NotFound(_) => "not_found",
            EngineError::LimitExceeded(_) => "limit_exceeded",
            EngineError::Store(_) => "store",
        }
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::Validation(msg) => write!(f, "validation failed: {msg}"),
            EngineError::ReferenceNotFound(errors) => {
                write!(f, "invalid references: {}", errors.join("; "))
            }
            EngineError::Conflict(report) => match report.first_message() {
                Some(msg) => f.write_str(msg),
                None => f.write_str("schedule conflict"),
            },
            EngineError::StorageConstraint(msg) => {
                write!(f, "booking rejected by storage constraint, resubmit: {msg}")
            }
            EngineError::NotFound(id) => write!(f, "schedule entry not found: {id}"),
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::Store(e) => write!(f, "store error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::UniqueViolation { .. } => EngineError::StorageConstraint(e.to_string()),
            StoreError::MissingRecord { .. } => EngineError::ReferenceNotFound(vec![e.to_string()]),
            StoreError::InvalidRecord(msg) => EngineError::Validation(msg),
            StoreError::LimitExceeded(msg) => EngineError::LimitExceeded(msg),
            StoreError::Wal(_) => EngineError::Store(e.to_string()),
        }
    }
}
