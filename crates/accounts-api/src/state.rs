//! Application state management

use crate::auth::{AccessControl, AccountService, PasswordError, PasswordHasher, TokenService};
use crate::metrics::ApiMetrics;
use crate::middleware::{RateLimitError, RateLimiter};
use accounts_core::{AppConfig, UserDirectory};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

/// Failures while assembling application state
#[derive(Debug, Error)]
pub enum StateError {
    #[error("password hasher: {0}")]
    Password(#[from] PasswordError),

    #[error("metrics registry: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error("rate limiter: {0}")]
    RateLimit(#[from] RateLimitError),
}

/// Application state shared across handlers
#[derive(Debug)]
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,
    /// Server start time
    pub start_time: Instant,
    pub accounts: AccountService,
    pub access: AccessControl,
    pub rate_limiter: Arc<RateLimiter>,
    pub metrics: ApiMetrics,
}

impl AppState {
    /// Build state from configuration and a user directory
    pub fn new(config: AppConfig, directory: Arc<dyn UserDirectory>) -> Result<Self, StateError> {
        let tokens = Arc::new(TokenService::new(&config.auth));
        let hasher = PasswordHasher::new(&config.password)?;
        let accounts = AccountService::new(
            directory,
            hasher,
            tokens.clone(),
            config.database.timeout(),
        )?;

        Ok(Self {
            access: AccessControl::new(tokens),
            rate_limiter: Arc::new(RateLimiter::new(&config.rate_limit)?),
            metrics: ApiMetrics::new()?,
            accounts,
            start_time: Instant::now(),
            config,
        })
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use accounts_core::{MemoryDirectory, PasswordConfig};

    #[test]
    fn test_state_rejects_bad_work_factor() {
        let config = AppConfig {
            password: PasswordConfig {
                memory_cost: 1,
                time_cost: 0,
                parallelism: 1,
            },
            ..Default::default()
        };

        let result = AppState::new(config, Arc::new(MemoryDirectory::new()));
        assert!(matches!(result, Err(StateError::Password(_))));
    }

    #[test]
    fn test_state_rejects_empty_rate_limit() {
        let mut config = AppConfig::default();
        config.rate_limit.capacity = 0;

        let result = AppState::new(config, Arc::new(MemoryDirectory::new()));
        assert!(matches!(result, Err(StateError::RateLimit(_))));
    }
}
