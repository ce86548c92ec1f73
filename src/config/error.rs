//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Invalid port number")]
    InvalidPort,

    #[error("Invalid bind address: {0}")]
    InvalidBindAddress(String),

    #[error("Invalid Redis URL format")]
    InvalidRedisUrl,

    #[error("Invalid Redis timeout")]
    InvalidTimeout,

    #[error("Session token secret must be at least {0} bytes")]
    SecretTooShort(usize),

    #[error("Session token TTL must be positive")]
    InvalidTokenTtl,

    #[error("Outbound queue capacity must be positive")]
    InvalidQueueCapacity,

    #[error("Server heartbeat interval must be shorter than the server TTL")]
    HeartbeatNotBelowTtl,

    #[error("Keepalive interval must be shorter than the read timeout")]
    KeepaliveNotBelowReadTimeout,

    #[error("Relay timing value must be positive: {0}")]
    InvalidRelayTiming(&'static str),

    #[error("Rate limit must allow at least one handshake per window")]
    InvalidRateLimit,
}
