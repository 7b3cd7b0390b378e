//! # API Error Types
//!
//! Structured error type implementing `axum::response::IntoResponse`.
//! Maps log errors to HTTP status codes with a JSON body of the form
//! `{"error": {"code", "message"}}`. Internal error details are logged and
//! never returned to clients.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use nexo_log::LogError;

/// Structured JSON error response body.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

/// Inner error detail.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g. "NOT_FOUND", "BAD_REQUEST").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

/// Application-level error type that implements [`IntoResponse`] for Axum.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Malformed request input (400).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The STH could not gather enough signatures and strict mode is on (503).
    #[error("insufficient signatures: {0}")]
    InsufficientSignatures(String),

    /// Internal server error (500). Message is logged but not returned to client.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Return the HTTP status code and machine-readable error code for this error.
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            Self::InsufficientSignatures(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "INSUFFICIENT_SIGNATURES")
            }
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = match &self {
            Self::Internal(_) => "An internal error occurred".to_string(),
            other => other.to_string(),
        };

        if matches!(&self, Self::Internal(_)) {
            tracing::error!(error = %self, "internal server error");
        }

        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<LogError> for AppError {
    fn from(err: LogError) -> Self {
        match err {
            LogError::Validation(e) => Self::BadRequest(e.to_string()),
            LogError::NoSth => Self::NotFound("No STH found".to_string()),
            LogError::Merkle(e) => Self::NotFound(e.to_string()),
            e @ LogError::InsufficientSignatures { .. } => {
                Self::InsufficientSignatures(e.to_string())
            }
            e @ (LogError::Store(_) | LogError::Canonicalization(_)) => {
                Self::Internal(e.to_string())
            }
        }
    }
}

impl From<nexo_core::ValidationError> for AppError {
    fn from(err: nexo_core::ValidationError) -> Self {
        Self::BadRequest(err.to_string())
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Internal(format!("blocking task failed: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use nexo_core::ValidationError;
    use nexo_crypto::MerkleError;

    async fn body_json(err: AppError) -> (StatusCode, serde_json::Value) {
        let resp = err.into_response();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn validation_maps_to_400() {
        let err: AppError = LogError::Validation(ValidationError::EmptyIdentifier).into();
        assert_eq!(err.status_and_code(), (StatusCode::BAD_REQUEST, "BAD_REQUEST"));
    }

    #[test]
    fn missing_sth_maps_to_404() {
        let err: AppError = LogError::NoSth.into();
        assert_eq!(err.status_and_code().0, StatusCode::NOT_FOUND);
    }

    #[test]
    fn out_of_range_proof_maps_to_404() {
        let err: AppError = LogError::Merkle(MerkleError::LeafIndexOutOfRange { index: 5, size: 2 }).into();
        assert_eq!(err.status_and_code().0, StatusCode::NOT_FOUND);
    }

    #[test]
    fn undersigned_maps_to_503() {
        let err: AppError = LogError::InsufficientSignatures {
            tree_size: 1,
            got: 1,
            required: 2,
        }
        .into();
        assert_eq!(
            err.status_and_code(),
            (StatusCode::SERVICE_UNAVAILABLE, "INSUFFICIENT_SIGNATURES")
        );
    }

    #[test]
    fn store_failure_maps_to_500() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk full");
        let err: AppError = LogError::Store(io.into()).into();
        assert_eq!(err.status_and_code().0, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn internal_message_is_not_leaked() {
        let (status, body) = body_json(AppError::Internal("secret path /var/x".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["code"], "INTERNAL_ERROR");
        assert_eq!(body["error"]["message"], "An internal error occurred");
    }

    #[tokio::test]
    async fn client_error_body_shape() {
        let (status, body) = body_json(AppError::NotFound("No STH found".into())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "NOT_FOUND");
        assert!(body["error"]["message"].as_str().unwrap().contains("No STH found"));
    }
}
