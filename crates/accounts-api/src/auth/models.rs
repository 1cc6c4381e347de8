//! Request and response bodies for account endpoints
//!
//! Input rules are declared with `validator` derives; `validate_fields`
//! turns a failed validation into a single `AccountError::Validation`
//! naming the offending field.

use accounts_core::{AccountError, UserPublic};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::{Validate, ValidationErrors};

/// User registration request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    #[validate(length(min = 2, message = "must be at least 2 characters"))]
    pub name: String,
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    #[validate(length(min = 6, message = "must be at least 6 characters"))]
    pub password: String,
}

/// User login request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "is required"))]
    pub password: String,
}

/// Successful login
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    pub token: String,
    /// Always "Bearer"
    pub token_type: String,
    /// Seconds until the token expires
    pub expires_in: u64,
    pub user: UserPublic,
}

/// Profile update request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct UpdateUserRequest {
    #[validate(length(min = 2, message = "must be at least 2 characters"))]
    pub name: String,
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
}

/// Role change request; the role is parsed at the handler
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdateRoleRequest {
    /// "admin" or "user"
    pub role: String,
}

/// Plain confirmation message
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Role change confirmation with the updated user
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RoleChangeResponse {
    pub message: String,
    pub user: UserPublic,
}

/// Validate a request, reporting the first failing field in `order`
///
/// Fields not listed in `order` are reported after the listed ones.
pub fn validate_fields<T: Validate>(request: &T, order: &[&str]) -> Result<(), AccountError> {
    match request.validate() {
        Ok(()) => Ok(()),
        Err(errors) => Err(first_invalid_field(&errors, order)),
    }
}

fn first_invalid_field(errors: &ValidationErrors, order: &[&str]) -> AccountError {
    let mut failures: Vec<(usize, String, String)> = errors
        .field_errors()
        .into_iter()
        .map(|(field, errs)| {
            let field = field.to_string();
            let rank = order
                .iter()
                .position(|f| *f == field)
                .unwrap_or(order.len());
            let message = errs
                .first()
                .and_then(|e| e.message.as_ref().map(|m| m.to_string()))
                .unwrap_or_else(|| "is invalid".to_string());
            (rank, field, message)
        })
        .collect();
    failures.sort();

    match failures.into_iter().next() {
        Some((_, field, message)) => AccountError::validation(field, message),
        None => AccountError::validation("request", "is invalid"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORDER: &[&str] = &["name", "email", "password"];

    fn register(name: &str, email: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            name: name.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    fn field_of(err: AccountError) -> String {
        match err {
            AccountError::Validation { field, .. } => field,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_valid_registration() {
        assert!(validate_fields(&register("Ana", "ana@x.com", "secret1"), ORDER).is_ok());
    }

    #[test]
    fn test_each_rule_names_its_field() {
        let err = validate_fields(&register("A", "ana@x.com", "secret1"), ORDER).unwrap_err();
        assert_eq!(field_of(err), "name");

        let err = validate_fields(&register("Ana", "not-an-email", "secret1"), ORDER).unwrap_err();
        assert_eq!(field_of(err), "email");

        let err = validate_fields(&register("Ana", "ana@x.com", "12345"), ORDER).unwrap_err();
        assert_eq!(field_of(err), "password");
    }

    #[test]
    fn test_first_failure_follows_field_order() {
        let err = validate_fields(&register("A", "bad", "1"), ORDER).unwrap_err();
        assert_eq!(field_of(err), "name");

        let err = validate_fields(&register("Ana", "bad", "1"), ORDER).unwrap_err();
        assert_eq!(field_of(err), "email");
    }

    #[test]
    fn test_validation_message_is_kept() {
        let err = validate_fields(&register("Ana", "ana@x.com", "12345"), ORDER).unwrap_err();
        assert_eq!(
            err,
            AccountError::validation("password", "must be at least 6 characters")
        );
    }

    #[test]
    fn test_update_request_rules() {
        let ok = UpdateUserRequest {
            name: "Ana Maria".to_string(),
            email: "ana.maria@x.com".to_string(),
        };
        assert!(validate_fields(&ok, &["name", "email"]).is_ok());

        let bad = UpdateUserRequest {
            name: "Ana".to_string(),
            email: "nope".to_string(),
        };
        let err = validate_fields(&bad, &["name", "email"]).unwrap_err();
        assert_eq!(field_of(err), "email");
    }
}
