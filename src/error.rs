use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Failures surfaced by a storage backend.
#[derive(Error, Debug)]
pub enum StoreError {
    /// A unique constraint rejected the write. Callers inspect this to recover from races.
    #[error("unique constraint `{constraint}` violated for key `{key}`")]
    UniqueViolation {
        constraint: &'static str,
        key: String,
    },
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[cfg(feature = "storage-rocksdb")]
    #[error("RocksDB error: {0}")]
    RocksDb(#[from] rocksdb::Error),
    #[error("Internal error: {0}")]
    Internal(Box<dyn std::error::Error + Send + Sync>),
}

impl StoreError {
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(Box::new(std::io::Error::other(message.into())))
    }

    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Self::UniqueViolation { .. })
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Failures of a call to the external payment provider.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// The circuit breaker rejected the call without reaching the provider.
    #[error("payment provider unavailable")]
    Unavailable,
    /// The provider answered with a server error or a timeout status.
    #[error("payment provider rejected the charge with status {status}")]
    Rejected { status: u16 },
    #[error("payment provider request failed: {0}")]
    Transport(Box<dyn std::error::Error + Send + Sync>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Forbidden,
    Unauthorized,
    Unexpected,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Validation => "validation",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::Unexpected => "unexpected",
        };
        f.write_str(name)
    }
}

/// Outcome taxonomy returned by the order and payment services.
///
/// Business rejections carry a message safe to show the caller. `Unexpected` may also carry the
/// underlying cause, which is logged but never rendered.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{message}")]
    Unexpected {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl ServiceError {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected {
            message: message.into(),
            source: None,
        }
    }

    pub fn unexpected_from(
        message: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Unexpected {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::Validation(_) => ErrorKind::Validation,
            ServiceError::NotFound(_) => ErrorKind::NotFound,
            ServiceError::Conflict(_) => ErrorKind::Conflict,
            ServiceError::Forbidden(_) => ErrorKind::Forbidden,
            ServiceError::Unauthorized(_) => ErrorKind::Unauthorized,
            ServiceError::Unexpected { .. } => ErrorKind::Unexpected,
        }
    }

    /// Status code an HTTP front end should answer with.
    pub fn http_status(&self) -> u16 {
        match self.kind() {
            ErrorKind::Validation => 400,
            ErrorKind::Unauthorized => 401,
            ErrorKind::Forbidden => 403,
            ErrorKind::NotFound => 404,
            ErrorKind::Conflict => 409,
            ErrorKind::Unexpected => 500,
        }
    }

    /// Whether repeating the same request may produce a different outcome.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self.kind(),
            ErrorKind::Forbidden | ErrorKind::Validation | ErrorKind::Conflict
        )
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        Self::unexpected_from("An unexpected error occurred", err)
    }
}

/// Errors raised while reading the command script.
#[derive(Error, Debug)]
pub enum InputError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Invalid command: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_status_mapping() {
        assert_eq!(ServiceError::NotFound("x".into()).http_status(), 404);
        assert_eq!(ServiceError::Forbidden("x".into()).http_status(), 403);
        assert_eq!(ServiceError::Conflict("x".into()).http_status(), 409);
        assert_eq!(ServiceError::Validation("x".into()).http_status(), 400);
        assert_eq!(ServiceError::Unauthorized("x".into()).http_status(), 401);
        assert_eq!(ServiceError::unexpected("x").http_status(), 500);
    }

    #[test]
    fn test_retryability() {
        assert!(ServiceError::NotFound("x".into()).is_retryable());
        assert!(ServiceError::unexpected("x").is_retryable());
        assert!(!ServiceError::Conflict("x".into()).is_retryable());
        assert!(!ServiceError::Forbidden("x".into()).is_retryable());
        assert!(!ServiceError::Validation("x".into()).is_retryable());
    }

    #[test]
    fn test_store_error_hides_cause_from_message() {
        let err: ServiceError = StoreError::internal("disk on fire").into();
        assert_eq!(err.kind(), ErrorKind::Unexpected);
        assert_eq!(err.to_string(), "An unexpected error occurred");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_kind_serialization() {
        let json = serde_json::to_string(&ErrorKind::NotFound).unwrap();
        assert_eq!(json, "\"not_found\"");
    }
}
