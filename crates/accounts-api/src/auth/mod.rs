//! Authentication and authorization module
//!
//! - Token issuance and validation (HS256 JWT)
//! - Password hashing with Argon2id
//! - Per-request access decisions and the middleware applying them
//! - The account service orchestrating registration, login, and profile
//!   management
//! - Request and response bodies

pub mod access;
pub mod jwt;
pub mod middleware;
pub mod models;
pub mod password;
pub mod service;

pub use access::{bearer_token, AccessControl, AccessDecision, AuthFailure, Principal};
pub use jwt::{Claims, IssuedToken, TokenError, TokenService};
pub use middleware::{require_admin, require_user, AuthError};
pub use models::{
    LoginRequest, LoginResponse, MessageResponse, RegisterRequest, RoleChangeResponse,
    UpdateRoleRequest, UpdateUserRequest,
};
pub use password::{PasswordError, PasswordHasher};
pub use service::AccountService;
