//! API route definitions

use crate::auth::{require_admin, require_user};
use crate::handlers::{admin, auth, users};
use crate::state::AppState;
use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;

/// Account routes, mounted both at the root and under `/api`
pub fn api_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/register", post(auth::register_handler))
        .route("/login", post(auth::login_handler));

    // Any authenticated user
    let user_routes = Router::new()
        .route("/users", get(users::list_users))
        .route("/users/get-all", get(users::list_users))
        .route("/users/:id", get(users::get_user).put(users::update_user))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_user));

    // Admin role required
    let admin_routes = Router::new()
        .route("/admin/:id", delete(admin::delete_user))
        .route("/admin/users/:id/role", put(admin::update_role))
        .route_layer(middleware::from_fn_with_state(state, require_admin));

    Router::new()
        .merge(public_routes)
        .merge(user_routes)
        .merge(admin_routes)
}
