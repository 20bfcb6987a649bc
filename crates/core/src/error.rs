use thiserror::Error;

/// Errors surfaced by the record store.
///
/// Backends translate every provider failure into one of the first six
/// variants before returning. The remaining variants are raised locally,
/// before or after a round trip.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DbError {
    /// A create found the key (or table) already present.
    #[error("{entity} already exists: {id}")]
    AlreadyExists { entity: String, id: String },

    /// An update or conditional delete found the key absent.
    #[error("condition failed on {entity}: {id}")]
    ConditionFailed { entity: String, id: String },

    /// A resource that had to exist does not.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    #[error("throttled: {0}")]
    Throttled(String),

    #[error("unavailable: {0}")]
    Unavailable(String),

    /// Anything the backend could not classify. `code` is the provider code, if any.
    #[error("internal error ({code}): {message}")]
    Internal { code: String, message: String },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid record: {0}")]
    InvalidRecord(String),

    #[error("timed out: {0}")]
    Timeout(String),
}

impl DbError {
    /// Builds an `Internal` error with no provider code.
    pub fn internal(message: impl Into<String>) -> Self {
        DbError::Internal {
            code: "Unknown".to_string(),
            message: message.into(),
        }
    }

    /// Returns true if retrying the same request later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DbError::Throttled(_) | DbError::Unavailable(_) | DbError::Timeout(_)
        )
    }

    /// Short, stable name of the variant, for logs and JSON output.
    pub fn kind(&self) -> &'static str {
        match self {
            DbError::AlreadyExists { .. } => "AlreadyExists",
            DbError::ConditionFailed { .. } => "ConditionFailed",
            DbError::NotFound { .. } => "NotFound",
            DbError::Throttled(_) => "Throttled",
            DbError::Unavailable(_) => "Unavailable",
            DbError::Internal { .. } => "Internal",
            DbError::InvalidArgument(_) => "InvalidArgument",
            DbError::InvalidRecord(_) => "InvalidRecord",
            DbError::Timeout(_) => "Timeout",
        }
    }
}

/// Result type for record store operations.
pub type Result<T> = std::result::Result<T, DbError>;
