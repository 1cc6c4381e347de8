//! Request logging and metrics middleware
//!
//! Logs one line per request with method, path, client ip, status, latency,
//! and the authenticated user id when there is one. Severity follows the
//! status class: 5xx at error, 4xx at warn, everything else at info.

use super::rate_limit::client_key;
use crate::auth::Principal;
use crate::state::AppState;
use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

pub async fn request_log_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let ip = client_key(
        request.headers(),
        peer,
        state.config.server.trust_proxy_headers,
    );

    let response = next.run(request).await;

    let elapsed = start.elapsed();
    let status = response.status();
    let user_id = response.extensions().get::<Principal>().map(|p| p.user_id);
    let duration_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);

    state.metrics.observe(
        method.as_str(),
        &normalize_endpoint(&path),
        status.as_u16(),
        elapsed.as_secs_f64(),
    );

    if status.is_server_error() {
        error!(
            method = %method,
            path = %path,
            ip = %ip,
            status = status.as_u16(),
            duration_ms,
            user_id = ?user_id,
            "Request failed"
        );
    } else if status.is_client_error() {
        warn!(
            method = %method,
            path = %path,
            ip = %ip,
            status = status.as_u16(),
            duration_ms,
            user_id = ?user_id,
            "Request rejected"
        );
    } else {
        info!(
            method = %method,
            path = %path,
            ip = %ip,
            status = status.as_u16(),
            duration_ms,
            user_id = ?user_id,
            "Request completed"
        );
    }

    response
}

/// Collapse numeric id segments so metrics group by route
fn normalize_endpoint(path: &str) -> String {
    path.split('/')
        .map(|seg| if is_numeric(seg) { ":id" } else { seg })
        .collect::<Vec<_>>()
        .join("/")
}

fn is_numeric(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_endpoint() {
        assert_eq!(normalize_endpoint("/users/123"), "/users/:id");
        assert_eq!(normalize_endpoint("/api/users/7"), "/api/users/:id");
        assert_eq!(
            normalize_endpoint("/admin/users/42/role"),
            "/admin/users/:id/role"
        );
        assert_eq!(normalize_endpoint("/users/get-all"), "/users/get-all");
        assert_eq!(normalize_endpoint("/health"), "/health");
    }

    #[test]
    fn test_is_numeric() {
        assert!(is_numeric("123"));
        assert!(!is_numeric("abc"));
        assert!(!is_numeric("12a"));
        assert!(!is_numeric(""));
    }
}
