//! Accounts Core - Domain models, errors, and persistence traits
//!
//! This crate defines the core abstractions shared by the accounts service:
//! - User records and their public projection
//! - The closed role enumeration
//! - The account error taxonomy surfaced to the transport layer
//! - The `UserDirectory` persistence trait (in-memory and PostgreSQL)
//! - Configuration management

pub mod config;
pub mod directory;
pub mod postgres;

pub use config::{
    AppConfig, AuthConfig, ConfigError, DatabaseConfig, LogFormat, LoggingConfig,
    PasswordConfig, RateLimitConfig, ServerConfig,
};
pub use directory::{DirectoryError, MemoryDirectory, UserDirectory};
pub use postgres::PgUserDirectory;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use utoipa::ToSchema;

/// Numeric user identifier assigned by the directory
pub type UserId = i64;

// ============================================================================
// Error Types
// ============================================================================

/// Errors produced by account operations
///
/// Every persistence failure is re-classified into one of these variants
/// before it reaches the transport layer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AccountError {
    #[error("Invalid {field}: {message}")]
    Validation { field: String, message: String },

    #[error("Email already registered")]
    DuplicateEmail,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token has expired")]
    ExpiredToken,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Storage unavailable")]
    StorageUnavailable,

    #[error("Password hashing failed")]
    Hashing,

    #[error("Token signing failed")]
    Signing,
}

impl AccountError {
    /// Build a validation error for a named input field
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Whether the caller may retry the same request unchanged
    pub fn is_retryable(&self) -> bool {
        matches!(self, AccountError::StorageUnavailable)
    }
}

pub type Result<T> = std::result::Result<T, AccountError>;

// ============================================================================
// Roles
// ============================================================================

/// User role
///
/// Closed set: anything else is rejected when parsed at the boundary.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[default]
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a role string is not one of the known roles
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "user" => Ok(Role::User),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

// ============================================================================
// Users
// ============================================================================

/// Stored user record
///
/// The password hash is never serialized.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Convert to the client-facing representation
    pub fn to_public(&self) -> UserPublic {
        UserPublic {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
            role: self.role,
            created_at: self.created_at,
        }
    }
}

/// A user that has not been persisted yet
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

impl NewUser {
    /// New account with the default role
    pub fn new(name: String, email: String, password_hash: String) -> Self {
        Self {
            name,
            email,
            password_hash,
            role: Role::default(),
        }
    }
}

/// Public user representation (safe for API responses)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct UserPublic {
    #[schema(value_type = i64)]
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// Normalize an email address for storage and lookup
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parsing() {
        assert_eq!("admin".parse::<Role>(), Ok(Role::Admin));
        assert_eq!("user".parse::<Role>(), Ok(Role::User));
        assert_eq!(
            "superuser".parse::<Role>(),
            Err(UnknownRole("superuser".to_string()))
        );
        // Exact match only
        assert!("Admin".parse::<Role>().is_err());
    }

    #[test]
    fn test_role_default_and_serde() {
        assert_eq!(Role::default(), Role::User);
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"admin\"");
        let role: Role = serde_json::from_str("\"user\"").unwrap();
        assert_eq!(role, Role::User);
        assert!(serde_json::from_str::<Role>("\"root\"").is_err());
    }

    #[test]
    fn test_user_never_serializes_hash() {
        let now = Utc::now();
        let user = User {
            id: 1,
            name: "Ana".to_string(),
            email: "ana@x.com".to_string(),
            password_hash: "$argon2id$secret".to_string(),
            role: Role::User,
            created_at: now,
            updated_at: now,
        };

        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("password_hash"));
        assert!(!json.contains("argon2id"));

        let public = serde_json::to_value(user.to_public()).unwrap();
        assert_eq!(public["id"], 1);
        assert_eq!(public["email"], "ana@x.com");
        assert!(public.get("password").is_none());
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Ana@X.com "), "ana@x.com");
    }

    #[test]
    fn test_retryable_errors() {
        assert!(AccountError::StorageUnavailable.is_retryable());
        assert!(!AccountError::Hashing.is_retryable());
        assert!(!AccountError::Signing.is_retryable());
        assert!(!AccountError::DuplicateEmail.is_retryable());
    }
}
