//! Per-request access decisions
//!
//! Combines token validity with an optional role requirement. Role matching
//! is exact: there is no hierarchy, so an admin-only route rejects users and
//! a user-level route admits both roles only because it requires no role.

use super::jwt::{TokenError, TokenService};
use accounts_core::{Role, UserId};
use axum::http::{header, HeaderMap};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// The authenticated caller, attached to request extensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: UserId,
    pub role: Role,
}

/// Why a request could not be authenticated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    MissingCredentials,
    MalformedHeader,
    InvalidToken,
    ExpiredToken,
}

impl AuthFailure {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthFailure::MissingCredentials => "missing_credentials",
            AuthFailure::MalformedHeader => "malformed_header",
            AuthFailure::InvalidToken => "invalid_token",
            AuthFailure::ExpiredToken => "expired_token",
        }
    }
}

/// Outcome of an access check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
    Authenticated(Principal),
    Unauthenticated(AuthFailure),
    Forbidden(Principal),
}

/// Extract the bearer token from the Authorization header
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthFailure> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthFailure::MissingCredentials)?
        .to_str()
        .map_err(|_| AuthFailure::MalformedHeader)?;

    let (scheme, token) = value
        .split_once(' ')
        .ok_or(AuthFailure::MalformedHeader)?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthFailure::MalformedHeader);
    }

    let token = token.trim();
    if token.is_empty() {
        return Err(AuthFailure::MalformedHeader);
    }
    Ok(token)
}

/// Access decision function backed by the token service
#[derive(Debug, Clone)]
pub struct AccessControl {
    tokens: Arc<TokenService>,
}

impl AccessControl {
    pub fn new(tokens: Arc<TokenService>) -> Self {
        Self { tokens }
    }

    /// Decide on a presented bearer token and an optional required role
    pub fn decide(&self, bearer: Option<&str>, required: Option<Role>) -> AccessDecision {
        let Some(token) = bearer else {
            return AccessDecision::Unauthenticated(AuthFailure::MissingCredentials);
        };

        let principal = match self.tokens.verify(token) {
            Ok((user_id, role)) => Principal { user_id, role },
            Err(TokenError::Expired) => {
                return AccessDecision::Unauthenticated(AuthFailure::ExpiredToken)
            }
            Err(_) => return AccessDecision::Unauthenticated(AuthFailure::InvalidToken),
        };

        match required {
            Some(role) if principal.role != role => AccessDecision::Forbidden(principal),
            _ => AccessDecision::Authenticated(principal),
        }
    }

    /// Decide directly from request headers
    pub fn decide_headers(&self, headers: &HeaderMap, required: Option<Role>) -> AccessDecision {
        match bearer_token(headers) {
            Ok(token) => self.decide(Some(token), required),
            Err(failure) => AccessDecision::Unauthenticated(failure),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use accounts_core::AuthConfig;
    use axum::http::HeaderValue;

    fn access() -> (AccessControl, Arc<TokenService>) {
        let tokens = Arc::new(TokenService::new(&AuthConfig {
            jwt_secret: "test-secret".to_string(),
            ..Default::default()
        }));
        (AccessControl::new(tokens.clone()), tokens)
    }

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_bearer_token_extraction() {
        assert_eq!(bearer_token(&headers("Bearer abc.def.ghi")), Ok("abc.def.ghi"));
        assert_eq!(bearer_token(&headers("bearer abc")), Ok("abc"));
        assert_eq!(
            bearer_token(&HeaderMap::new()),
            Err(AuthFailure::MissingCredentials)
        );
        assert_eq!(
            bearer_token(&headers("Basic dXNlcjpwYXNz")),
            Err(AuthFailure::MalformedHeader)
        );
        assert_eq!(
            bearer_token(&headers("Bearer")),
            Err(AuthFailure::MalformedHeader)
        );
        assert_eq!(
            bearer_token(&headers("Bearer   ")),
            Err(AuthFailure::MalformedHeader)
        );
    }

    #[test]
    fn test_missing_token_is_unauthenticated() {
        let (access, _) = access();
        assert_eq!(
            access.decide(None, None),
            AccessDecision::Unauthenticated(AuthFailure::MissingCredentials)
        );
        assert_eq!(
            access.decide(None, Some(Role::Admin)),
            AccessDecision::Unauthenticated(AuthFailure::MissingCredentials)
        );
    }

    #[test]
    fn test_valid_token_without_role_requirement() {
        let (access, tokens) = access();
        let token = tokens.issue(3, Role::User).unwrap().token;

        assert_eq!(
            access.decide(Some(&token), None),
            AccessDecision::Authenticated(Principal {
                user_id: 3,
                role: Role::User
            })
        );
    }

    #[test]
    fn test_role_requirement_is_exact() {
        let (access, tokens) = access();
        let user = tokens.issue(3, Role::User).unwrap().token;
        let admin = tokens.issue(4, Role::Admin).unwrap().token;

        assert_eq!(
            access.decide(Some(&user), Some(Role::Admin)),
            AccessDecision::Forbidden(Principal {
                user_id: 3,
                role: Role::User
            })
        );
        assert_eq!(
            access.decide(Some(&admin), Some(Role::Admin)),
            AccessDecision::Authenticated(Principal {
                user_id: 4,
                role: Role::Admin
            })
        );
        // No hierarchy: admin does not satisfy a user-only requirement
        assert!(matches!(
            access.decide(Some(&admin), Some(Role::User)),
            AccessDecision::Forbidden(_)
        ));
    }

    #[test]
    fn test_invalid_and_expired_tokens() {
        let (access, tokens) = access();
        assert_eq!(
            access.decide(Some("garbage"), None),
            AccessDecision::Unauthenticated(AuthFailure::InvalidToken)
        );

        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_secs();
        let expired = tokens
            .issue_at(3, Role::User, now - 2 * tokens.ttl_secs())
            .unwrap()
            .token;
        assert_eq!(
            access.decide(Some(&expired), None),
            AccessDecision::Unauthenticated(AuthFailure::ExpiredToken)
        );
    }

    #[test]
    fn test_decide_headers() {
        let (access, tokens) = access();
        let token = tokens.issue(8, Role::Admin).unwrap().token;

        assert!(matches!(
            access.decide_headers(&headers(&format!("Bearer {token}")), Some(Role::Admin)),
            AccessDecision::Authenticated(_)
        ));
        assert_eq!(
            access.decide_headers(&headers(&format!("Token {token}")), None),
            AccessDecision::Unauthenticated(AuthFailure::MalformedHeader)
        );
    }
}
