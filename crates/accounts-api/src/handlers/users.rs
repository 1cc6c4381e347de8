//! User profile handlers

use crate::auth::{Principal, UpdateUserRequest};
use crate::error::AppError;
use crate::state::AppState;
use accounts_core::{UserId, UserPublic};
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    Extension, Json,
};
use std::sync::Arc;

/// List all users
///
/// Also served at `/users/get-all`.
#[utoipa::path(
    get,
    path = "/users",
    tag = "users",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "All users ordered by id", body = [UserPublic]),
        (status = 401, description = "Missing or invalid token", body = crate::error::ApiError),
    )
)]
pub async fn list_users(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<UserPublic>>, AppError> {
    Ok(Json(state.accounts.get_all().await?))
}

#[utoipa::path(
    get,
    path = "/users/{id}",
    tag = "users",
    security(("bearer_auth" = [])),
    params(("id" = i64, Path, description = "User id")),
    responses(
        (status = 200, description = "User found", body = UserPublic),
        (status = 400, description = "Non-numeric id", body = crate::error::ApiError),
        (status = 401, description = "Missing or invalid token", body = crate::error::ApiError),
        (status = 404, description = "User not found", body = crate::error::ApiError),
    )
)]
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    id: Result<Path<UserId>, PathRejection>,
) -> Result<Json<UserPublic>, AppError> {
    let Path(id) = id?;
    Ok(Json(state.accounts.get_by_id(id).await?))
}

/// Update the caller's own name and email
#[utoipa::path(
    put,
    path = "/users/{id}",
    tag = "users",
    security(("bearer_auth" = [])),
    params(("id" = i64, Path, description = "User id; must be the caller's own")),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "User updated", body = UserPublic),
        (status = 400, description = "Invalid input", body = crate::error::ApiError),
        (status = 401, description = "Missing or invalid token", body = crate::error::ApiError),
        (status = 403, description = "Not the caller's account", body = crate::error::ApiError),
        (status = 404, description = "User not found", body = crate::error::ApiError),
        (status = 409, description = "Email already registered", body = crate::error::ApiError),
    )
)]
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    id: Result<Path<UserId>, PathRejection>,
    payload: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> Result<Json<UserPublic>, AppError> {
    let Path(id) = id?;
    let Json(request) = payload?;

    let user = state
        .accounts
        .update(principal.user_id, id, request)
        .await?;
    Ok(Json(user))
}
