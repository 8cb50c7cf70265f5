//! # API Error Types
//!
//! Structured error type implementing `axum::response::IntoResponse`.
//! Maps [`ServiceError`] onto HTTP status codes and JSON error bodies.
//! Internal error details are logged, never returned.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::service::ServiceError;

/// Structured JSON error response body.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

/// Inner error detail.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "NOT_FOUND", "VALIDATION_ERROR").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Additional details, present only for client errors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Application-level error type that implements [`IntoResponse`] for Axum.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Request validation failed (422).
    #[error("validation error: {0}")]
    Validation(String),

    /// Request could not be parsed or carried out-of-range parameters (400).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Missing or unrecognized credential (401).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated but not permitted (403).
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Conflict with current resource state (409).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Internal server error (500). Message is logged but not returned to client.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Return the HTTP status code and machine-readable error code for this error.
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            Self::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            Self::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
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
                details: None,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::MalformedCredential(_) | ServiceError::BadRequest(_) => {
                Self::BadRequest(err.to_string())
            }
            ServiceError::UnknownCredential | ServiceError::Unauthorized => {
                Self::Unauthorized(err.to_string())
            }
            ServiceError::ForbiddenNotOwner | ServiceError::ForbiddenRole => {
                Self::Forbidden(err.to_string())
            }
            ServiceError::InvalidTransition { .. }
            | ServiceError::AlreadyInStatus { .. }
            | ServiceError::Conflict(_) => Self::Conflict(err.to_string()),
            ServiceError::NotFound(_) => Self::NotFound(err.to_string()),
            ServiceError::Validation(msg) => Self::Validation(msg),
            ServiceError::RollbackFailed(ref msg) => {
                tracing::error!(code = "ROLLBACK_FAILED", error = %msg, "store consistency unknown");
                Self::Internal(err.to_string())
            }
            ServiceError::IllegalStoredState(ref msg) => {
                tracing::error!(code = "ILLEGAL_STORED_STATE", error = %msg, "data integrity fault");
                Self::Internal(err.to_string())
            }
            ServiceError::AtomicUnitFailed(_) | ServiceError::Internal(_) => {
                Self::Internal(err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dph_core::ProjectStatus;
    use http_body_util::BodyExt;

    async fn response_parts(err: AppError) -> (StatusCode, ErrorBody) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: ErrorBody = serde_json::from_slice(&bytes).unwrap();
        (status, body)
    }

    #[test]
    fn status_codes() {
        let cases = [
            (AppError::NotFound("x".into()), StatusCode::NOT_FOUND, "NOT_FOUND"),
            (
                AppError::Validation("x".into()),
                StatusCode::UNPROCESSABLE_ENTITY,
                "VALIDATION_ERROR",
            ),
            (AppError::BadRequest("x".into()), StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            (AppError::Unauthorized("x".into()), StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            (AppError::Forbidden("x".into()), StatusCode::FORBIDDEN, "FORBIDDEN"),
            (AppError::Conflict("x".into()), StatusCode::CONFLICT, "CONFLICT"),
            (
                AppError::Internal("x".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
            ),
        ];
        for (err, status, code) in cases {
            assert_eq!(err.status_and_code(), (status, code), "{err}");
        }
    }

    #[test]
    fn service_errors_map_to_http_taxonomy() {
        let cases: Vec<(ServiceError, StatusCode)> = vec![
            (ServiceError::MalformedCredential("x".into()), StatusCode::BAD_REQUEST),
            (ServiceError::UnknownCredential, StatusCode::UNAUTHORIZED),
            (ServiceError::Unauthorized, StatusCode::UNAUTHORIZED),
            (ServiceError::ForbiddenNotOwner, StatusCode::FORBIDDEN),
            (ServiceError::ForbiddenRole, StatusCode::FORBIDDEN),
            (
                ServiceError::InvalidTransition {
                    from: ProjectStatus::Live,
                    to: ProjectStatus::Pending,
                },
                StatusCode::CONFLICT,
            ),
            (
                ServiceError::AlreadyInStatus {
                    status: ProjectStatus::Draft,
                },
                StatusCode::CONFLICT,
            ),
            (ServiceError::Conflict("x".into()), StatusCode::CONFLICT),
            (ServiceError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (ServiceError::BadRequest("x".into()), StatusCode::BAD_REQUEST),
            (ServiceError::Validation("x".into()), StatusCode::UNPROCESSABLE_ENTITY),
            (
                ServiceError::RollbackFailed("x".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                ServiceError::IllegalStoredState("x".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            let label = err.to_string();
            let (status, _) = AppError::from(err).status_and_code();
            assert_eq!(status, expected, "{label}");
        }
    }

    #[tokio::test]
    async fn into_response_not_found() {
        let (status, body) = response_parts(AppError::NotFound("project 123".into())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.error.code, "NOT_FOUND");
        assert!(body.error.message.contains("project 123"));
        assert!(body.error.details.is_none());
    }

    #[tokio::test]
    async fn into_response_conflict() {
        let (status, body) = response_parts(AppError::Conflict("already exists".into())).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body.error.code, "CONFLICT");
        assert!(body.error.message.contains("already exists"));
    }

    #[tokio::test]
    async fn into_response_internal_hides_details() {
        let err = AppError::from(ServiceError::RollbackFailed("connection reset".into()));
        let (status, body) = response_parts(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error.code, "INTERNAL_ERROR");
        assert!(
            !body.error.message.contains("connection reset"),
            "internal error details must not leak: {}",
            body.error.message
        );
        assert_eq!(body.error.message, "An internal error occurred");
    }

    #[test]
    fn error_body_skips_empty_details() {
        let body = ErrorBody {
            error: ErrorDetail {
                code: "TEST".to_string(),
                message: "test message".to_string(),
                details: None,
            },
        };
        let json = serde_json::to_string(&body).unwrap();
        assert!(json.contains("TEST"));
        assert!(!json.contains("details"));
    }
}
