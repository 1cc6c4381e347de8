//! Registration and login handlers

use crate::auth::{LoginRequest, LoginResponse, RegisterRequest};
use crate::error::AppError;
use crate::state::AppState;
use accounts_core::UserPublic;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

/// Register a new user account
///
/// New users always get the `user` role.
///
/// # Request Body
///
/// * `name` - Display name, at least 2 characters
/// * `email` - Valid email address, unique after lowercasing
/// * `password` - At least 6 characters
#[utoipa::path(
    post,
    path = "/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered successfully", body = UserPublic),
        (status = 400, description = "Invalid input", body = crate::error::ApiError),
        (status = 409, description = "Email already registered", body = crate::error::ApiError),
        (status = 429, description = "Too many requests", body = crate::error::ApiError),
        (status = 503, description = "Storage unavailable", body = crate::error::ApiError),
    )
)]
pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(request) = payload?;
    let user = state.accounts.register(request).await?;

    Ok((StatusCode::CREATED, Json(user)))
}

/// Login with email and password
///
/// Returns a bearer token. Unknown email and wrong password are reported
/// identically.
#[utoipa::path(
    post,
    path = "/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 401, description = "Invalid credentials", body = crate::error::ApiError),
        (status = 429, description = "Too many requests", body = crate::error::ApiError),
        (status = 503, description = "Storage unavailable", body = crate::error::ApiError),
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, AppError> {
    let Json(request) = payload?;
    let response = state.accounts.login(request).await?;

    Ok(Json(response))
}
