//! OpenAPI document assembled from handler annotations

use crate::auth::{
    LoginRequest, LoginResponse, MessageResponse, RegisterRequest, RoleChangeResponse,
    UpdateRoleRequest, UpdateUserRequest,
};
use crate::error::ApiError;
use crate::handlers::{admin, auth, health, users};
use accounts_core::{Role, UserPublic};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

/// Every path is also served under the `/api` prefix
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Accounts API",
        description = "User registration, authentication, and role-based access control"
    ),
    paths(
        auth::register_handler,
        auth::login_handler,
        users::list_users,
        users::get_user,
        users::update_user,
        admin::delete_user,
        admin::update_role,
        health::health_check,
        health::prometheus_metrics,
    ),
    components(schemas(
        RegisterRequest,
        LoginRequest,
        LoginResponse,
        UpdateUserRequest,
        UpdateRoleRequest,
        MessageResponse,
        RoleChangeResponse,
        UserPublic,
        Role,
        ApiError,
        health::HealthResponse,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth", description = "Registration and login"),
        (name = "users", description = "User profiles"),
        (name = "admin", description = "Administrative operations"),
        (name = "health", description = "Liveness and metrics"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}
