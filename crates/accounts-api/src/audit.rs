//! Audit trail for account and access events
//!
//! Registrations, logins, role changes, deletions, and access control
//! failures are logged at INFO level with the "audit" target so they can be
//! filtered and routed separately from application logs.
//!
//! Events carry identifiers and outcome codes only. Passwords, hashes,
//! signing keys, and tokens never appear here.

use accounts_core::{Role, UserId};
use axum::http::HeaderMap;
use chrono::Utc;
use serde::Serialize;
use tracing::info;

/// Security-relevant outcomes worth keeping apart from request logs
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum AuditEvent {
    /// Successful user registration
    RegistrationSuccess {
        user_id: UserId,
        email: String,
        role: Role,
    },

    /// Failed registration attempt
    RegistrationFailure { email: String, reason: String },

    /// Successful user login
    LoginSuccess { user_id: UserId, email: String },

    /// Failed login attempt; the reason is never echoed to the client
    LoginFailure { email: String, reason: String },

    /// Role changed by an administrator
    RoleChanged {
        target_id: UserId,
        changed_by: Option<UserId>,
        new_role: Role,
    },

    /// Account removed by its owner
    AccountDeleted { user_id: UserId },

    /// Access denied due to role or ownership
    AccessDenied {
        user_id: Option<UserId>,
        resource: String,
        required_role: Option<Role>,
        ip_address: Option<String>,
    },

    /// Invalid or expired token presented
    InvalidToken {
        ip_address: Option<String>,
        reason: String,
    },

    /// Request rejected by the rate limiter
    RateLimited { client: String, path: String },
}

impl AuditEvent {
    /// Short event name, also the serialized `event_type`
    pub fn name(&self) -> &'static str {
        match self {
            AuditEvent::RegistrationSuccess { .. } => "registration_success",
            AuditEvent::RegistrationFailure { .. } => "registration_failure",
            AuditEvent::LoginSuccess { .. } => "login_success",
            AuditEvent::LoginFailure { .. } => "login_failure",
            AuditEvent::RoleChanged { .. } => "role_changed",
            AuditEvent::AccountDeleted { .. } => "account_deleted",
            AuditEvent::AccessDenied { .. } => "access_denied",
            AuditEvent::InvalidToken { .. } => "invalid_token",
            AuditEvent::RateLimited { .. } => "rate_limited",
        }
    }

    fn summary(&self) -> &'static str {
        match self {
            AuditEvent::RegistrationSuccess { .. } => "Registration successful",
            AuditEvent::RegistrationFailure { .. } => "Registration failed",
            AuditEvent::LoginSuccess { .. } => "Login successful",
            AuditEvent::LoginFailure { .. } => "Login failed",
            AuditEvent::RoleChanged { .. } => "Role changed",
            AuditEvent::AccountDeleted { .. } => "Account deleted",
            AuditEvent::AccessDenied { .. } => "Access denied",
            AuditEvent::InvalidToken { .. } => "Invalid token",
            AuditEvent::RateLimited { .. } => "Rate limit exceeded",
        }
    }

    /// Primary subject of the event, when one is known
    fn subject(&self) -> Option<UserId> {
        match self {
            AuditEvent::RegistrationSuccess { user_id, .. }
            | AuditEvent::LoginSuccess { user_id, .. }
            | AuditEvent::AccountDeleted { user_id } => Some(*user_id),
            AuditEvent::RoleChanged { target_id, .. } => Some(*target_id),
            AuditEvent::AccessDenied { user_id, .. } => *user_id,
            _ => None,
        }
    }
}

/// Emit an event on the `audit` target
///
/// The whole event goes out as JSON in the `event` field; `event_type` and
/// `user_id` are repeated as top-level fields for filtering.
pub fn audit_log(event: &AuditEvent) {
    let payload = match serde_json::to_string(event) {
        Ok(json) => json,
        Err(e) => format!("{{\"event_type\":\"{}\",\"error\":\"{e}\"}}", event.name()),
    };

    info!(
        target: "audit",
        timestamp = %Utc::now().to_rfc3339(),
        event_type = event.name(),
        user_id = ?event.subject(),
        event = %payload,
        "{}",
        event.summary()
    );
}

/// Client address as reported by a fronting proxy
///
/// The first `X-Forwarded-For` hop wins over `X-Real-IP`. The socket peer
/// address is not visible here; see `middleware::rate_limit::client_key`.
pub fn extract_ip_address(headers: &HeaderMap) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next());
    let real_ip = headers
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok());

    [forwarded, real_ip]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|candidate| !candidate.is_empty())
        .map(str::to_string)
}
