#![forbid(unsafe_code)]

use crate::dao::EntityKind;

/// Failure reported by a persistence collaborator.
#[derive(Debug)]
pub enum DaoError {
    Backend(Box<dyn std::error::Error + Send + Sync>),
    Rejected(String),
}

impl DaoError {
    pub fn backend(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Backend(Box::new(err))
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected(message.into())
    }
}

impl std::fmt::Display for DaoError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Backend(err) => write!(f, "backend: {err}"),
            Self::Rejected(message) => write!(f, "rejected: {message}"),
        }
    }
}

impl std::error::Error for DaoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Backend(err) => Some(err.as_ref()),
            Self::Rejected(_) => None,
        }
    }
}

/// Every way a reconciliation call can fail. There is no partial success:
/// any error means the caller must roll back whatever was persisted.
#[derive(Debug)]
pub enum ReconcileError {
    /// The incoming graph is malformed.
    Malformed(String),
    /// The incoming graph references an entity that does not exist.
    NotFound {
        kind: EntityKind,
        external_id: String,
    },
    /// A condition that should never happen; indicates corrupted data or a bug.
    Invariant(String),
    Dao(DaoError),
}

impl ReconcileError {
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed(message.into())
    }

    pub fn invariant(message: impl Into<String>) -> Self {
        Self::Invariant(message.into())
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Invariant(_))
    }

    pub fn kind_str(&self) -> &'static str {
        match self {
            Self::Malformed(_) => "malformed",
            Self::NotFound { .. } => "not_found",
            Self::Invariant(_) => "invariant",
            Self::Dao(_) => "dao",
        }
    }
}

impl std::fmt::Display for ReconcileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Malformed(message) => write!(f, "malformed input: {message}"),
            Self::NotFound { kind, external_id } => {
                write!(f, "unknown {} (external_id={external_id})", kind.as_str())
            }
            Self::Invariant(message) => write!(f, "invariant violated: {message}"),
            Self::Dao(err) => write!(f, "dao: {err}"),
        }
    }
}

impl std::error::Error for ReconcileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Dao(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DaoError> for ReconcileError {
    fn from(value: DaoError) -> Self {
        Self::Dao(value)
    }
}
