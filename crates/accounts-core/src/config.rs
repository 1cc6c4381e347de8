//! Accounts Configuration Management
//!
//! Handles configuration from environment variables and TOML files,
//! with sensible defaults for development.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Development signing secret, rejected by `validate` when `strict` is set
pub const DEV_JWT_SECRET: &str = "development-secret-key-change-in-production";

/// Upper bound on session token lifetime (30 days)
pub const MAX_TOKEN_TTL_SECS: u64 = 30 * 24 * 60 * 60;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Server configuration
    pub server: ServerConfig,

    /// Session token signing
    pub auth: AuthConfig,

    /// Password hashing work factor
    pub password: PasswordConfig,

    /// Per-client request throttling
    pub rate_limit: RateLimitConfig,

    /// User directory storage
    pub database: DatabaseConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Load from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileReadError {
            path: path.clone(),
            source: e,
        })?;

        Self::from_toml_str(&content).map_err(|message| ConfigError::ParseError { path, message })
    }

    fn from_toml_str(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }

    /// Merge with environment variables (env takes precedence)
    pub fn with_env_override(mut self) -> Result<Self, ConfigError> {
        self.apply_env()?;
        Ok(self)
    }

    fn apply_env(&mut self) -> Result<(), ConfigError> {
        // Server
        if let Ok(host) = std::env::var("API_HOST") {
            self.server.host = host;
        }
        if let Some(port) = env_parse("API_PORT")? {
            self.server.port = port;
        }
        if let Ok(origins) = std::env::var("CORS_ORIGINS") {
            self.server.cors_origins = origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Some(trust) = env_parse("TRUST_PROXY_HEADERS")? {
            self.server.trust_proxy_headers = trust;
        }

        // Auth
        if let Ok(secret) = std::env::var("JWT_SECRET") {
            self.auth.jwt_secret = secret;
        }
        if let Some(ttl) = env_parse("JWT_TTL_SECS")? {
            self.auth.token_ttl_secs = ttl;
        }
        if let Ok(issuer) = std::env::var("JWT_ISSUER") {
            self.auth.issuer = issuer;
        }

        // Password hashing
        if let Some(memory) = env_parse("ARGON2_MEMORY_KIB")? {
            self.password.memory_cost = memory;
        }
        if let Some(iterations) = env_parse("ARGON2_ITERATIONS")? {
            self.password.time_cost = iterations;
        }
        if let Some(parallelism) = env_parse("ARGON2_PARALLELISM")? {
            self.password.parallelism = parallelism;
        }

        // Rate limiting
        if let Some(enabled) = env_parse("RATE_LIMIT_ENABLED")? {
            self.rate_limit.enabled = enabled;
        }
        if let Some(capacity) = env_parse("RATE_LIMIT_CAPACITY")? {
            self.rate_limit.capacity = capacity;
        }
        if let Some(refill) = env_parse("RATE_LIMIT_REFILL_PER_SEC")? {
            self.rate_limit.refill_per_sec = refill;
        }

        // Database
        if let Ok(url) = std::env::var("DATABASE_URL") {
            if !url.trim().is_empty() {
                self.database.url = Some(url);
            }
        }
        if let Some(pool_size) = env_parse("DATABASE_POOL_SIZE")? {
            self.database.pool_size = pool_size;
        }
        if let Some(timeout) = env_parse("DATABASE_TIMEOUT_MS")? {
            self.database.timeout_ms = timeout;
        }

        // Logging
        if let Ok(level) = std::env::var("LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = env_parse("LOG_FORMAT")? {
            self.logging.format = format;
        }

        Ok(())
    }

    /// Check values that would make the service misbehave at runtime
    ///
    /// With `strict` set, the development signing secret is refused.
    pub fn validate(&self, strict: bool) -> Result<(), ConfigError> {
        if self.auth.jwt_secret.is_empty() {
            return Err(ConfigError::MissingRequired("JWT_SECRET".to_string()));
        }
        if strict && self.auth.jwt_secret == DEV_JWT_SECRET {
            return Err(ConfigError::InvalidValue {
                key: "JWT_SECRET".to_string(),
                value: "<development default>".to_string(),
            });
        }
        if self.auth.token_ttl_secs == 0 || self.auth.token_ttl_secs > MAX_TOKEN_TTL_SECS {
            return Err(invalid("JWT_TTL_SECS", self.auth.token_ttl_secs));
        }
        if self.rate_limit.capacity == 0 {
            return Err(invalid("RATE_LIMIT_CAPACITY", 0));
        }
        let refill = self.rate_limit.refill_per_sec;
        if refill.is_nan() || refill <= 0.0 {
            return Err(invalid("RATE_LIMIT_REFILL_PER_SEC", refill));
        }
        if self.database.timeout_ms == 0 {
            return Err(invalid("DATABASE_TIMEOUT_MS", 0));
        }
        Ok(())
    }
}

fn invalid(key: &str, value: impl ToString) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}

/// Parse an optional environment variable, failing on malformed values
fn env_parse<T: FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                value: raw,
            }),
        Err(_) => Ok(None),
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Allowed origins for CORS (empty allows any origin)
    pub cors_origins: Vec<String>,

    /// Key clients by X-Forwarded-For / X-Real-IP instead of the socket
    /// peer. Only safe behind a proxy that overwrites those headers.
    pub trust_proxy_headers: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            cors_origins: vec![],
            trust_proxy_headers: false,
        }
    }
}

/// Session token configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HMAC signing secret, loaded once at startup
    pub jwt_secret: String,

    /// Token lifetime in seconds
    pub token_ttl_secs: u64,

    /// Issuer claim written into and required from every token
    pub issuer: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: DEV_JWT_SECRET.to_string(),
            token_ttl_secs: 3 * 60 * 60,
            issuer: "accounts-api".to_string(),
        }
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"<redacted>")
            .field("token_ttl_secs", &self.token_ttl_secs)
            .field("issuer", &self.issuer)
            .finish()
    }
}

/// Argon2id work factor
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PasswordConfig {
    /// Memory cost in KiB (default: 19456 = 19 MiB)
    pub memory_cost: u32,
    /// Iterations (default: 2)
    pub time_cost: u32,
    /// Lanes (default: 1)
    pub parallelism: u32,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            memory_cost: 19 * 1024,
            time_cost: 2,
            parallelism: 1,
        }
    }
}

/// Token bucket parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Disable to admit every request
    pub enabled: bool,

    /// Bucket capacity (burst size)
    pub capacity: u32,

    /// Tokens added per second
    pub refill_per_sec: f64,

    /// How often buckets that have refilled completely are evicted
    pub sweep_interval_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: 5,
            refill_per_sec: 1.0,
            sweep_interval_secs: 60,
        }
    }
}

impl RateLimitConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

/// User directory storage configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL; the in-memory directory is used when unset
    pub url: Option<String>,

    /// PostgreSQL connection pool size
    pub pool_size: u32,

    /// Upper bound for a single storage call in milliseconds
    pub timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            pool_size: 10,
            timeout_ms: 3000,
        }
    }
}

impl DatabaseConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("url", &self.url.as_ref().map(|_| "<redacted>"))
            .field("pool_size", &self.pool_size)
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when RUST_LOG is unset
    pub level: String,

    /// Output format
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "accounts_api=info,accounts_core=info,audit=info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            _ => Err(invalid("LOG_FORMAT", s)),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.rate_limit.capacity, 5);
        assert_eq!(config.rate_limit.refill_per_sec, 1.0);
        assert!(config.database.url.is_none());
        assert!(config.validate(false).is_ok());
    }

    #[test]
    fn test_strict_rejects_dev_secret() {
        let config = AppConfig::default();
        assert!(matches!(
            config.validate(true),
            Err(ConfigError::InvalidValue { .. })
        ));

        let mut config = AppConfig::default();
        config.auth.jwt_secret = "a-real-secret-of-reasonable-length-000".to_string();
        assert!(config.validate(true).is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let mut config = AppConfig::default();
        config.rate_limit.capacity = 0;
        assert!(config.validate(false).is_err());

        let mut config = AppConfig::default();
        config.rate_limit.refill_per_sec = 0.0;
        assert!(config.validate(false).is_err());

        let mut config = AppConfig::default();
        config.auth.token_ttl_secs = 0;
        assert!(config.validate(false).is_err());

        let mut config = AppConfig::default();
        config.auth.token_ttl_secs = u64::MAX;
        assert!(config.validate(false).is_err());

        let mut config = AppConfig::default();
        config.auth.jwt_secret.clear();
        assert!(matches!(
            config.validate(false),
            Err(ConfigError::MissingRequired(_))
        ));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = AppConfig::from_toml_str(
            r#"
            [server]
            port = 9090

            [rate_limit]
            capacity = 10
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.rate_limit.capacity, 10);
        assert_eq!(config.rate_limit.refill_per_sec, 1.0);
        assert_eq!(config.auth.issuer, "accounts-api");
        assert!(!config.server.trust_proxy_headers);
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let mut config = AppConfig::default();
        config.auth.jwt_secret = "super-secret-value".to_string();
        config.database.url = Some("postgres://u:hunter2@db/accounts".to_string());

        let debug = format!("{config:?}");
        assert!(!debug.contains("super-secret-value"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_log_format_parse() {
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("PRETTY".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert!("xml".parse::<LogFormat>().is_err());
    }
}
