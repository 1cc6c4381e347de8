//! Accounts API - HTTP server
//!
//! User registration, login, profile management, and role-based access
//! control over REST. Every request passes, from the outside in, through
//! security headers, CORS, request logging, and the per-client rate limiter;
//! protected routes then pass the access check.

pub mod audit;
pub mod auth;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod state;

use crate::handlers::health;
use crate::middleware::{
    rate_limit_middleware, request_log_middleware, security_headers_middleware,
};
use crate::openapi::ApiDoc;
use crate::state::AppState;
use axum::{
    http::{header, HeaderValue, Method},
    routing::get,
    Router,
};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Build the full application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let api = routes::api_routes(state.clone());

    Router::new()
        .merge(api.clone())
        .nest("/api", api)
        .route("/health", get(health::health_check))
        .route("/metrics", get(health::prometheus_metrics))
        .merge(SwaggerUi::new("/swagger").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            request_log_middleware,
        ))
        .layer(cors_layer(&state.config.server.cors_origins))
        .layer(axum::middleware::from_fn(security_headers_middleware))
        .with_state(state)
}

/// Permissive CORS unless explicit origins are configured
fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

/// Configuration for in-process tests: fast hashing, a fixed secret, and a
/// rate limit high enough not to interfere
#[cfg(any(test, feature = "test-utils"))]
pub fn testing_config() -> accounts_core::AppConfig {
    let mut config = accounts_core::AppConfig::default();
    config.auth.jwt_secret = "test-secret".to_string();
    config.password = accounts_core::PasswordConfig {
        memory_cost: 1024,
        time_cost: 1,
        parallelism: 1,
    };
    config.rate_limit.capacity = 10_000;
    config
}

/// Router backed by an in-memory directory, plus its state
#[cfg(any(test, feature = "test-utils"))]
pub fn create_router_for_testing(
    config: accounts_core::AppConfig,
) -> Result<(Router, Arc<AppState>), state::StateError> {
    let directory = Arc::new(accounts_core::MemoryDirectory::new());
    let state = Arc::new(AppState::new(config, directory)?);
    Ok((create_router(state.clone()), state))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cors_layer_builds_for_both_modes() {
        let _permissive = cors_layer(&[]);
        let _restricted = cors_layer(&[
            "https://app.example.com".to_string(),
            "bad\norigin".to_string(),
        ]);
    }

    #[test]
    fn test_router_for_testing_builds() {
        let (_router, state) = create_router_for_testing(testing_config()).unwrap();
        assert_eq!(state.rate_limiter.tracked(), 0);
    }
}
