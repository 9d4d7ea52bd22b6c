/// Error kinds surfaced by the lifecycle services
///
/// | Kind               | Meaning                                   | HTTP |
/// |--------------------|-------------------------------------------|------|
/// | `Validation`       | bad input or undecodable stored payload   | 400  |
/// | `PermissionDenied` | an ACL check refused the action           | 403  |
/// | `NotFound`         | the addressed row does not exist          | 404  |
/// | `Conflict`         | a unique constraint rejected a create     | 409  |
/// | `Infrastructure`   | storage or other internal failure         | 500  |
///
/// Infrastructure messages are for logs only; the API layer replaces them
/// with a generic message before responding.

use crate::auth::AclError;
use crate::store::StoreError;

/// Error returned by every service operation
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("{0}")]
    PermissionDenied(#[from] AclError),

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0} already exists")]
    Conflict(String),

    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}

impl CoreError {
    pub fn not_found(what: impl Into<String>) -> Self {
        CoreError::NotFound(what.into())
    }

    /// Maps a storage error, naming the missing or duplicated entity
    pub fn from_store(err: StoreError, what: &str) -> Self {
        match err {
            StoreError::NotFound => CoreError::NotFound(what.to_string()),
            StoreError::UniqueViolation(_) => CoreError::Conflict(what.to_string()),
            StoreError::Corrupt(msg) => CoreError::Validation(msg),
            other => CoreError::Infrastructure(other.to_string()),
        }
    }
}

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        CoreError::from_store(err, "resource")
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Validation(err.to_string())
    }
}

impl From<validator::ValidationErrors> for CoreError {
    fn from(err: validator::ValidationErrors) -> Self {
        CoreError::Validation(err.to_string())
    }
}

/// Result alias for service operations
pub type CoreResult<T> = Result<T, CoreError>;
