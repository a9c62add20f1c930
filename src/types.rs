//! Error taxonomy shared across the service
//!
//! Every handler-visible failure maps onto one of these variants, each of
//! which carries a stable `code` string and an HTTP status. Broadcast and
//! notification failures are logged where they happen and never surface
//! through this type.

use hyper::StatusCode;
use thiserror::Error;

/// Service-wide error type
#[derive(Debug, Error)]
pub enum AppError {
    /// Missing or invalid bearer credential
    #[error("authentication required: {0}")]
    AuthenticationRequired(String),

    /// Record absent, or present but the caller may not see it.
    /// Authorization failures on cases are deliberately reported as
    /// NotFound so callers cannot probe for case existence.
    #[error("not found: {0}")]
    NotFound(String),

    /// Malformed input, invalid status transition, or missing resolution
    /// notes on resolve
    #[error("validation error: {0}")]
    Validation(String),

    /// A concurrent mutation won the race for the same record
    #[error("conflict: {0}")]
    Conflict(String),

    /// Store-level failure, retryable from the caller's point of view
    #[error("database error: {0}")]
    Database(String),

    /// Malformed message on the duplex channel
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Bad HTTP request body or headers
    #[error("http error: {0}")]
    Http(String),

    /// Email delivery failure (only seen by the notifier, which logs it)
    #[error("mail error: {0}")]
    Mail(String),
}

impl AppError {
    /// Stable machine-readable code returned in JSON error bodies
    pub fn code(&self) -> &'static str {
        match self {
            AppError::AuthenticationRequired(_) => "AUTH_REQUIRED",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Conflict(_) => "CONFLICT",
            AppError::Database(_) => "STORE_ERROR",
            AppError::Protocol(_) => "PROTOCOL_ERROR",
            AppError::Http(_) => "BAD_REQUEST",
            AppError::Mail(_) => "MAIL_ERROR",
        }
    }

    /// HTTP status this error is reported with
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::AuthenticationRequired(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) | AppError::Http(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Database(_) | AppError::Mail(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Protocol(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        AppError::Database(format!("io: {}", e))
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            AppError::NotFound("case".into()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::Validation("bad".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Conflict("lost race".into()).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::AuthenticationRequired("no token".into()).status(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(AppError::Conflict("x".into()).code(), "CONFLICT");
        assert_eq!(AppError::Database("x".into()).code(), "STORE_ERROR");
        assert_eq!(AppError::Protocol("x".into()).code(), "PROTOCOL_ERROR");
    }
}
