// src/errors/mod.rs
// Error taxonomy shared by services and HTTP handlers

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;
use tracing::{debug, error, warn};

/// Application error type. Services return these; the HTTP layer maps them
/// onto status codes with deliberately generic bodies so a caller cannot
/// tell which authentication check failed.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("authentication error: {0}")]
    Authentication(String),
    #[error("authorization error: {0}")]
    Authorization(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("transient datastore error: {0}")]
    Transient(String),
    #[error("internal error: {0}")]
    Internal(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ApiError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn authentication(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    pub fn authorization(msg: impl Into<String>) -> Self {
        Self::Authorization(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn transient(msg: impl Into<String>) -> Self {
        Self::Transient(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether this error is in the retryable timeout class. Only these are
    /// retried by the tenant transaction wrapper; everything else propagates
    /// on the first attempt.
    pub fn is_timeout_class(&self) -> bool {
        match self {
            ApiError::Transient(_) => true,
            ApiError::Database(err) => is_sqlx_timeout(err),
            _ => false,
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Internal(format!("serialization error: {}", err))
    }
}

/// Timeout classification for sqlx errors. SQLITE_BUSY ("database is
/// locked") is the engine's contention timeout and counts.
pub fn is_sqlx_timeout(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::PoolTimedOut => true,
        sqlx::Error::Io(io) => io.kind() == std::io::ErrorKind::TimedOut,
        sqlx::Error::Database(db) => {
            let msg = db.message().to_lowercase();
            msg.contains("timeout") || msg.contains("database is locked")
        }
        _ => false,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, public_message) = match &self {
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Authentication(_) => {
                (StatusCode::UNAUTHORIZED, "authentication failed".to_string())
            }
            ApiError::Authorization(_) => (StatusCode::FORBIDDEN, "access denied".to_string()),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "not found".to_string()),
            ApiError::Transient(_) | ApiError::Internal(_) | ApiError::Database(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal server error".to_string(),
            ),
        };

        // Full detail stays server-side.
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => warn!("{}", self),
            StatusCode::INTERNAL_SERVER_ERROR => error!("{}", self),
            _ => debug!("{}", self),
        }

        (
            status,
            Json(serde_json::json!({
                "error": public_message
            })),
        )
            .into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_errors_are_timeout_class() {
        assert!(ApiError::transient("tx timeout").is_timeout_class());
        assert!(ApiError::Database(sqlx::Error::PoolTimedOut).is_timeout_class());
    }

    #[test]
    fn other_errors_are_not_timeout_class() {
        assert!(!ApiError::authentication("bad credentials").is_timeout_class());
        assert!(!ApiError::not_found("nope").is_timeout_class());
        assert!(!ApiError::Database(sqlx::Error::RowNotFound).is_timeout_class());
    }
}
