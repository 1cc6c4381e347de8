//! HTTP middleware: rate limiting, request logging, and security headers

pub mod rate_limit;
pub mod request_log;
pub mod security_headers;

pub use rate_limit::{client_key, rate_limit_middleware, RateLimitError, RateLimiter};
pub use request_log::request_log_middleware;
pub use security_headers::security_headers_middleware;
