//! Error types for farmnet
//!
//! Every handler returns `Result<_, FarmError>`; the router turns the error
//! into a `{ message }` envelope with the matching status code.

use hyper::StatusCode;
use serde::Serialize;

/// A single field-level validation failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    /// Dotted path of the offending field, e.g. `location.country`
    pub path: String,
    /// Human readable message
    pub msg: String,
    /// Where the field came from (`body` or `query`)
    pub location: &'static str,
}

impl FieldError {
    pub fn body(path: impl Into<String>, msg: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            msg: msg.into(),
            location: "body",
        }
    }

    pub fn query(path: impl Into<String>, msg: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            msg: msg.into(),
            location: "query",
        }
    }
}

/// Main error type for farmnet operations
#[derive(Debug, thiserror::Error)]
pub enum FarmError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Validation failed")]
    Validation(Vec<FieldError>),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("{0}")]
    PayloadTooLarge(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// JSON envelope returned for every error
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<FieldError>>,
}

impl FarmError {
    /// Convert error to HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether the failure is the server's fault (logged, never echoed)
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Build the response envelope. Server-side detail stays in the logs.
    pub fn to_body(&self) -> ErrorBody {
        match self {
            Self::Validation(errors) => ErrorBody {
                message: "Validation failed".into(),
                errors: Some(errors.clone()),
            },
            e if e.is_server_error() => ErrorBody {
                message: "Server error".into(),
                errors: None,
            },
            e => ErrorBody {
                message: e.to_string(),
                errors: None,
            },
        }
    }

    /// Convert to status code and body tuple for HTTP response
    pub fn into_status_code_and_body(self) -> (StatusCode, ErrorBody) {
        (self.status_code(), self.to_body())
    }
}

impl From<std::io::Error> for FarmError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for FarmError {
    fn from(_: serde_json::Error) -> Self {
        Self::BadRequest("Invalid JSON".into())
    }
}

impl From<hyper::Error> for FarmError {
    fn from(err: hyper::Error) -> Self {
        Self::Internal(format!("HTTP error: {}", err))
    }
}

impl From<mongodb::error::Error> for FarmError {
    fn from(err: mongodb::error::Error) -> Self {
        if is_duplicate_key(&err) {
            return Self::Conflict("Duplicate key".into());
        }
        Self::Database(err.to_string())
    }
}

/// E11000: a unique index rejected the write
pub fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    use mongodb::error::{ErrorKind, WriteFailure};

    matches!(
        *err.kind,
        ErrorKind::Write(WriteFailure::WriteError(ref e)) if e.code == 11000
    )
}

impl From<bson::ser::Error> for FarmError {
    fn from(err: bson::ser::Error) -> Self {
        Self::Database(format!("BSON encode: {}", err))
    }
}

impl From<bson::de::Error> for FarmError {
    fn from(err: bson::de::Error) -> Self {
        Self::Database(format!("BSON decode: {}", err))
    }
}

impl From<jsonwebtoken::errors::Error> for FarmError {
    fn from(_: jsonwebtoken::errors::Error) -> Self {
        Self::Unauthorized("Token is not valid".into())
    }
}

impl From<reqwest::Error> for FarmError {
    fn from(err: reqwest::Error) -> Self {
        Self::Upstream(err.to_string())
    }
}

impl From<multer::Error> for FarmError {
    fn from(err: multer::Error) -> Self {
        match err {
            multer::Error::FieldSizeExceeded { .. } | multer::Error::StreamSizeExceeded { .. } => {
                Self::PayloadTooLarge("File too large".into())
            }
            other => Self::BadRequest(other.to_string()),
        }
    }
}

/// Result type alias for farmnet operations
pub type Result<T> = std::result::Result<T, FarmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_body_carries_errors() {
        let err = FarmError::Validation(vec![FieldError::body("name", "Name is required")]);
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

        let body = err.to_body();
        assert_eq!(body.message, "Validation failed");
        assert_eq!(body.errors.unwrap()[0].path, "name");
    }

    #[test]
    fn test_server_errors_are_masked() {
        let err = FarmError::Database("connection reset by peer".into());
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);

        let json = serde_json::to_value(err.to_body()).unwrap();
        assert_eq!(json, serde_json::json!({ "message": "Server error" }));
    }

    #[test]
    fn test_client_errors_echo_message() {
        let err = FarmError::NotFound("Advisory not found".into());
        let (status, body) = err.into_status_code_and_body();
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.message, "Advisory not found");
        assert!(body.errors.is_none());
    }
}
