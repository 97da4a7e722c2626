use ulid::Ulid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A declared uniqueness constraint rejected the write.
    UniqueViolation {
        constraint: &'static str,
        existing: Ulid,
    },
    /// A referenced record does not exist.
    MissingRecord { kind: &'static str, id: Ulid },
    /// The record breaks a declared shape constraint.
    InvalidRecord(String),
    LimitExceeded(&'static str),
    Wal(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::UniqueViolation { constraint, existing } => {
                write!(f, "unique constraint {constraint} violated by {existing}")
            }
            StoreError::MissingRecord { kind, id } => write!(f, "{kind} not found: {id}"),
            StoreError::InvalidRecord(msg) => write!(f, "invalid record: {msg}"),
            StoreError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            StoreError::Wal(e) => write!(f, "WAL error: {e}"),
        }
    }
}

impl std::error::Error for StoreError {}
