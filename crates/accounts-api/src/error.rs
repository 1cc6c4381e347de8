//! API error handling

use accounts_core::AccountError;
use axum::{
    extract::rejection::{JsonRejection, PathRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// API error response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// Error code
    pub code: String,
    /// Human-readable message
    pub message: String,
    /// Additional details; for validation errors, the offending field
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new("BAD_REQUEST", message)
    }

    pub fn internal_error() -> Self {
        Self::new("INTERNAL_ERROR", "Internal server error")
    }
}

/// Application error type
#[derive(Debug)]
pub enum AppError {
    Account(AccountError),
    BadRequest(String),
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Account(err) => account_status(err),
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

fn account_status(err: &AccountError) -> StatusCode {
    match err {
        AccountError::Validation { .. } => StatusCode::BAD_REQUEST,
        AccountError::DuplicateEmail => StatusCode::CONFLICT,
        AccountError::InvalidCredentials
        | AccountError::InvalidToken
        | AccountError::ExpiredToken => StatusCode::UNAUTHORIZED,
        AccountError::Forbidden(_) => StatusCode::FORBIDDEN,
        AccountError::NotFound(_) => StatusCode::NOT_FOUND,
        AccountError::StorageUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        AccountError::Hashing | AccountError::Signing => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn account_body(err: &AccountError) -> ApiError {
    match err {
        AccountError::Validation { field, .. } => {
            ApiError::new("VALIDATION_ERROR", err.to_string()).with_details(field.clone())
        }
        AccountError::DuplicateEmail => ApiError::new("DUPLICATE_EMAIL", err.to_string()),
        AccountError::InvalidCredentials => {
            ApiError::new("INVALID_CREDENTIALS", err.to_string())
        }
        AccountError::InvalidToken => ApiError::new("INVALID_TOKEN", err.to_string()),
        AccountError::ExpiredToken => ApiError::new("EXPIRED_TOKEN", err.to_string()),
        AccountError::Forbidden(_) => ApiError::new("FORBIDDEN", err.to_string()),
        AccountError::NotFound(_) => ApiError::new("NOT_FOUND", err.to_string()),
        AccountError::StorageUnavailable => ApiError::new(
            "STORAGE_UNAVAILABLE",
            "Storage is temporarily unavailable, try again",
        ),
        AccountError::Hashing | AccountError::Signing => ApiError::internal_error(),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error = match self {
            AppError::Account(err) => account_body(&err),
            AppError::BadRequest(msg) => ApiError::bad_request(msg),
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                ApiError::internal_error()
            }
        };

        (status, Json(error)).into_response()
    }
}

impl From<AccountError> for AppError {
    fn from(err: AccountError) -> Self {
        AppError::Account(err)
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(_: PathRejection) -> Self {
        AppError::BadRequest("Invalid user id".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (AccountError::validation("email", "bad"), 400),
            (AccountError::DuplicateEmail, 409),
            (AccountError::InvalidCredentials, 401),
            (AccountError::InvalidToken, 401),
            (AccountError::ExpiredToken, 401),
            (AccountError::Forbidden("x".to_string()), 403),
            (AccountError::NotFound("User".to_string()), 404),
            (AccountError::StorageUnavailable, 503),
            (AccountError::Hashing, 500),
            (AccountError::Signing, 500),
        ];

        for (err, expected) in cases {
            assert_eq!(
                AppError::from(err.clone()).status().as_u16(),
                expected,
                "{err:?}"
            );
        }
        assert_eq!(
            AppError::BadRequest("x".to_string()).status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_validation_body_names_field() {
        let body = account_body(&AccountError::validation("password", "too short"));
        assert_eq!(body.code, "VALIDATION_ERROR");
        assert_eq!(body.details.as_deref(), Some("password"));
    }

    #[test]
    fn test_internal_details_are_hidden() {
        let body = account_body(&AccountError::Hashing);
        assert_eq!(body.code, "INTERNAL_ERROR");
        assert!(body.details.is_none());

        let body = account_body(&AccountError::StorageUnavailable);
        assert!(body.details.is_none());
    }
}
