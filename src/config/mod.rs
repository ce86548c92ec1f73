//! Application configuration module
//!
//! This module provides type-safe configuration loading from environment variables
//! using the `config` and `dotenvy` crates. Configuration is loaded with the
//! `PAIRLINK` prefix and nested values use double underscores as separators.
//!
//! # Example
//!
//! ```no_run
//! use pairlink::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//!
//! println!("Server running on {:?}", config.server.socket_addr());
//! ```

mod auth;
mod error;
mod rate_limit;
mod redis;
mod relay;
mod server;

pub use self::redis::RedisConfig;
pub use auth::AuthConfig;
pub use error::{ConfigError, ValidationError};
pub use rate_limit::RateLimitConfig;
pub use relay::RelayConfig;
pub use server::{Environment, ServerConfig};

use serde::Deserialize;

/// Root application configuration
///
/// Load using [`AppConfig::load()`] which reads from environment variables.
#[derive(Debug, Deserialize)]
pub struct AppConfig {
    /// Server configuration (bind address, environment, origins, identity)
    #[serde(default)]
    pub server: ServerConfig,

    /// Shared store. Without it the relay runs as a single process on
    /// in-memory adapters.
    pub redis: Option<RedisConfig>,

    /// Session token signing
    pub auth: AuthConfig,

    /// Connection and fleet timing
    #[serde(default)]
    pub relay: RelayConfig,

    /// Handshake rate limiting
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// This function:
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with `PAIRLINK` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    /// 4. Deserializes into typed configuration structs
    ///
    /// # Environment Variable Format
    ///
    /// - `PAIRLINK__SERVER__PORT=8080` -> `server.port = 8080`
    /// - `PAIRLINK__REDIS__URL=...` -> `redis.url = ...`
    /// - `PAIRLINK__AUTH__SESSION_TOKEN_SECRET=...` -> `auth.session_token_secret = ...`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Required environment variables are missing
    /// - Values cannot be parsed into expected types
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (development)
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("PAIRLINK")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if any configuration value is invalid.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        if let Some(redis) = &self.redis {
            redis.validate()?;
        }
        self.auth.validate()?;
        self.relay.validate()?;
        self.rate_limit.validate()?;
        Ok(())
    }

    /// Check if running in production environment
    pub fn is_production(&self) -> bool {
        self.server.is_production()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Mutex to ensure tests don't run in parallel (env vars are global)
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const VARS: &[&str] = &[
        "PAIRLINK__AUTH__SESSION_TOKEN_SECRET",
        "PAIRLINK__REDIS__URL",
        "PAIRLINK__SERVER__PORT",
        "PAIRLINK__SERVER__ENVIRONMENT",
        "PAIRLINK__SERVER__INSTANCE_ID",
        "PAIRLINK__RELAY__OUTBOUND_QUEUE_CAPACITY",
        "PAIRLINK__RATE_LIMIT__HANDSHAKES_PER_WINDOW",
    ];

    fn set_minimal_env() {
        env::set_var("PAIRLINK__AUTH__SESSION_TOKEN_SECRET", "test-secret-0123456789");
    }

    fn clear_env() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    fn test_load_from_environment() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        set_minimal_env();
        env::set_var("PAIRLINK__REDIS__URL", "redis://localhost:6379");
        let result = AppConfig::load();
        clear_env();

        assert!(result.is_ok(), "Failed to load config: {:?}", result.err());
        let config = result.unwrap();
        assert_eq!(config.redis.unwrap().url, "redis://localhost:6379");
        assert_eq!(config.auth.session_token_ttl_secs, 600);
    }

    #[test]
    fn test_redis_is_optional() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        set_minimal_env();
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert!(config.redis.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_secret_fails_to_load() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        let result = AppConfig::load();

        assert!(result.is_err());
    }

    #[test]
    fn test_nested_overrides() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        set_minimal_env();
        env::set_var("PAIRLINK__SERVER__PORT", "9000");
        env::set_var("PAIRLINK__SERVER__ENVIRONMENT", "production");
        env::set_var("PAIRLINK__SERVER__INSTANCE_ID", "relay-a");
        env::set_var("PAIRLINK__RELAY__OUTBOUND_QUEUE_CAPACITY", "16");
        env::set_var("PAIRLINK__RATE_LIMIT__HANDSHAKES_PER_WINDOW", "5");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.server.port, 9000);
        assert!(config.is_production());
        assert_eq!(config.server.server_id().as_str(), "relay-a");
        assert_eq!(config.relay.outbound_queue_capacity, 16);
        assert_eq!(config.rate_limit.handshakes_per_window, 5);
        assert_eq!(config.relay.keepalive_interval_secs, 30);
    }

    #[test]
    fn test_validate_rejects_bad_redis_url() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        set_minimal_env();
        env::set_var("PAIRLINK__REDIS__URL", "http://localhost:6379");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.validate(), Err(ValidationError::InvalidRedisUrl));
    }
}
