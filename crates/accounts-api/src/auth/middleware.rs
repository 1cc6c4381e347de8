/// Authentication middleware for protecting routes
///
/// Extracts the bearer token from the Authorization header and asks
/// `AccessControl` for a decision. On success the `Principal` is added to
/// request extensions (for handlers) and to response extensions (for the
/// request logger).
use super::access::{AccessDecision, AuthFailure, Principal};
use crate::audit::{audit_log, extract_ip_address, AuditEvent};
use crate::error::{ApiError, AppError};
use crate::state::AppState;
use accounts_core::{AccountError, Role};
use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use thiserror::Error;

/// Authentication middleware errors
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing Authorization header")]
    MissingAuthHeader,

    #[error("Invalid Authorization header format")]
    InvalidAuthHeader,

    /// Bad token or missing role, rendered like any other account error
    #[error(transparent)]
    Rejected(#[from] AccountError),
}

impl AuthError {
    fn insufficient_role(role: Role) -> Self {
        AuthError::Rejected(AccountError::Forbidden(format!("{role} role required")))
    }
}

impl From<AuthFailure> for AuthError {
    fn from(failure: AuthFailure) -> Self {
        match failure {
            AuthFailure::MissingCredentials => AuthError::MissingAuthHeader,
            AuthFailure::MalformedHeader => AuthError::InvalidAuthHeader,
            AuthFailure::InvalidToken => AccountError::InvalidToken.into(),
            AuthFailure::ExpiredToken => AccountError::ExpiredToken.into(),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match self {
            AuthError::MissingAuthHeader | AuthError::InvalidAuthHeader => (
                StatusCode::UNAUTHORIZED,
                Json(ApiError::new("UNAUTHORIZED", self.to_string())),
            )
                .into_response(),
            AuthError::Rejected(err) => AppError::from(err).into_response(),
        }
    }
}

/// Require a valid token of any role
///
/// # Usage
///
/// ```ignore
/// let protected = Router::new()
///     .route("/users", get(list_users))
///     .route_layer(middleware::from_fn_with_state(state.clone(), require_user));
/// ```
///
/// In handlers, extract the caller with `Extension<Principal>`.
pub async fn require_user(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    authorize(&state, None, request, next).await
}

/// Require a valid token carrying the admin role
pub async fn require_admin(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    authorize(&state, Some(Role::Admin), request, next).await
}

async fn authorize(
    state: &AppState,
    required: Option<Role>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let decision = state.access.decide_headers(request.headers(), required);

    let principal = match decision {
        AccessDecision::Authenticated(principal) => principal,
        AccessDecision::Unauthenticated(failure) => {
            // A missing header is routine; only bad tokens are audited
            if matches!(
                failure,
                AuthFailure::InvalidToken | AuthFailure::ExpiredToken
            ) {
                audit_log(&AuditEvent::InvalidToken {
                    ip_address: extract_ip_address(request.headers()),
                    reason: failure.as_str().to_string(),
                });
            }
            return Err(failure.into());
        }
        AccessDecision::Forbidden(principal) => {
            let role = required.unwrap_or(Role::Admin);
            audit_log(&AuditEvent::AccessDenied {
                user_id: Some(principal.user_id),
                resource: request.uri().path().to_string(),
                required_role: Some(role),
                ip_address: extract_ip_address(request.headers()),
            });
            return Err(AuthError::insufficient_role(role));
        }
    };

    request.extensions_mut().insert(principal);
    let mut response = next.run(request).await;
    response.extensions_mut().insert::<Principal>(principal);
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(error: AuthError) -> (StatusCode, serde_json::Value) {
        let response = error.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_failure_conversion() {
        assert!(matches!(
            AuthError::from(AuthFailure::MissingCredentials),
            AuthError::MissingAuthHeader
        ));
        assert!(matches!(
            AuthError::from(AuthFailure::MalformedHeader),
            AuthError::InvalidAuthHeader
        ));
        assert!(matches!(
            AuthError::from(AuthFailure::ExpiredToken),
            AuthError::Rejected(AccountError::ExpiredToken)
        ));
        assert!(matches!(
            AuthError::from(AuthFailure::InvalidToken),
            AuthError::Rejected(AccountError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn test_unauthenticated_renders_401() {
        let (status, body) = body_json(AuthFailure::InvalidToken.into()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "INVALID_TOKEN");

        let (status, body) = body_json(AuthFailure::ExpiredToken.into()).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "EXPIRED_TOKEN");

        let (status, body) = body_json(AuthError::MissingAuthHeader).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn test_forbidden_renders_403() {
        let (status, body) = body_json(AuthError::insufficient_role(Role::Admin)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["code"], "FORBIDDEN");
        assert_eq!(body["message"], "Forbidden: admin role required");
    }
}
