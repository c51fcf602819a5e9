//! API error types with structured JSON responses.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::clinical::ClinicalError;
use crate::core_state::CoreError;
use crate::gateway::GatewayError;
use crate::identity::IdentityError;
use crate::validation::ValidationErrors;

/// Structured error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<ValidationErrors>,
}

/// API-level errors with HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Authentication required")]
    Unauthorized,
    #[error("Token expired")]
    TokenExpired,
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Username already taken")]
    DuplicateIdentity,
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Validation failed")]
    Validation(ValidationErrors),
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, fields) = match self {
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "AUTH_REQUIRED",
                "Authentication required".to_string(),
                None,
            ),
            ApiError::TokenExpired => (
                StatusCode::UNAUTHORIZED,
                "TOKEN_EXPIRED",
                "Token expired, refresh or re-authenticate".to_string(),
                None,
            ),
            ApiError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "INVALID_CREDENTIALS",
                "No active account found with the given credentials".to_string(),
                None,
            ),
            ApiError::DuplicateIdentity => (
                StatusCode::BAD_REQUEST,
                "DUPLICATE_IDENTITY",
                "Username already taken".to_string(),
                None,
            ),
            ApiError::Forbidden(detail) => (StatusCode::FORBIDDEN, "FORBIDDEN", detail, None),
            ApiError::NotFound(detail) => (StatusCode::NOT_FOUND, "NOT_FOUND", detail, None),
            ApiError::Validation(errors) => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                errors.to_string(),
                Some(errors),
            ),
            ApiError::BadRequest(detail) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", detail, None),
            ApiError::Internal(detail) => {
                tracing::error!(detail = %detail, "API internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
        };

        let body = ErrorBody {
            error: ErrorDetail {
                code,
                message,
                fields,
            },
        };
        (status, Json(body)).into_response()
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<rusqlite::Error> for ApiError {
    fn from(err: rusqlite::Error) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<crate::db::DatabaseError> for ApiError {
    fn from(err: crate::db::DatabaseError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<IdentityError> for ApiError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::DuplicateIdentity => ApiError::DuplicateIdentity,
            IdentityError::InvalidCredentials => ApiError::InvalidCredentials,
            IdentityError::Unauthorized => ApiError::Unauthorized,
            IdentityError::TokenExpired => ApiError::TokenExpired,
            IdentityError::Validation(errors) => ApiError::Validation(errors),
            IdentityError::NotFound => ApiError::NotFound("Not found".into()),
            IdentityError::Database(e) => ApiError::Internal(e.to_string()),
            IdentityError::Crypto(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::NotFound => ApiError::NotFound("Patient not found".into()),
            GatewayError::Validation(errors) => ApiError::Validation(errors),
            GatewayError::Identity(e) => e.into(),
            GatewayError::Database(e) => ApiError::Internal(e.to_string()),
            GatewayError::Qr(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<ClinicalError> for ApiError {
    fn from(err: ClinicalError) -> Self {
        match err {
            ClinicalError::NotFound(entity) => ApiError::NotFound(format!("{entity} not found")),
            ClinicalError::Forbidden => {
                ApiError::Forbidden("Write not permitted for this account".into())
            }
            ClinicalError::Validation(errors) => ApiError::Validation(errors),
            ClinicalError::Database(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}
