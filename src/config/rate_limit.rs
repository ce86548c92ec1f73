//! Handshake rate limit configuration

use serde::Deserialize;

use super::error::ValidationError;
use crate::ports::RateLimitPolicy;

/// Per-IP handshake rate limit
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_handshakes_per_window")]
    pub handshakes_per_window: u32,

    #[serde(default = "default_window")]
    pub window_secs: u32,
}

impl RateLimitConfig {
    pub fn policy(&self) -> RateLimitPolicy {
        RateLimitPolicy::new(self.handshakes_per_window, self.window_secs)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.handshakes_per_window == 0 || self.window_secs == 0 {
            return Err(ValidationError::InvalidRateLimit);
        }
        Ok(())
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            handshakes_per_window: default_handshakes_per_window(),
            window_secs: default_window(),
        }
    }
}

fn default_handshakes_per_window() -> u32 {
    60
}

fn default_window() -> u32 {
    60
}
