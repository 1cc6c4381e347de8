//! Admin-only handlers
//!
//! Both routes sit behind `require_admin`.

use crate::audit::{audit_log, AuditEvent};
use crate::auth::{MessageResponse, Principal, RoleChangeResponse, UpdateRoleRequest};
use crate::error::AppError;
use crate::state::AppState;
use accounts_core::{AccountError, Role, UserId};
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    Extension, Json,
};
use std::sync::Arc;

/// Delete the caller's own account
///
/// Requires the admin role and the id must be the caller's own.
#[utoipa::path(
    delete,
    path = "/admin/{id}",
    tag = "admin",
    security(("bearer_auth" = [])),
    params(("id" = i64, Path, description = "User id; must be the caller's own")),
    responses(
        (status = 200, description = "User deleted", body = MessageResponse),
        (status = 401, description = "Missing or invalid token", body = crate::error::ApiError),
        (status = 403, description = "Not an admin, or not the caller's account", body = crate::error::ApiError),
        (status = 404, description = "User not found", body = crate::error::ApiError),
    )
)]
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    id: Result<Path<UserId>, PathRejection>,
) -> Result<Json<MessageResponse>, AppError> {
    let Path(id) = id?;
    state.accounts.delete(principal.user_id, id).await?;

    Ok(Json(MessageResponse::new("User deleted successfully")))
}

/// Change a user's role
#[utoipa::path(
    put,
    path = "/admin/users/{id}/role",
    tag = "admin",
    security(("bearer_auth" = [])),
    params(("id" = i64, Path, description = "Target user id")),
    request_body = UpdateRoleRequest,
    responses(
        (status = 200, description = "Role updated", body = RoleChangeResponse),
        (status = 400, description = "Unknown role", body = crate::error::ApiError),
        (status = 401, description = "Missing or invalid token", body = crate::error::ApiError),
        (status = 403, description = "Not an admin", body = crate::error::ApiError),
        (status = 404, description = "User not found", body = crate::error::ApiError),
    )
)]
pub async fn update_role(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    id: Result<Path<UserId>, PathRejection>,
    payload: Result<Json<UpdateRoleRequest>, JsonRejection>,
) -> Result<Json<RoleChangeResponse>, AppError> {
    let Path(id) = id?;
    let Json(request) = payload?;

    let role = request
        .role
        .parse::<Role>()
        .map_err(|e| AccountError::validation("role", e.to_string()))?;

    let user = state.accounts.update_role(id, role).await?;

    audit_log(&AuditEvent::RoleChanged {
        target_id: user.id,
        changed_by: Some(principal.user_id),
        new_role: user.role,
    });

    Ok(Json(RoleChangeResponse {
        message: "User role updated successfully".to_string(),
        user,
    }))
}
