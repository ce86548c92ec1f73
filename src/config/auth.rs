//! Session token configuration

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use crate::adapters::auth::MIN_SECRET_LEN;

/// Session token configuration (HMAC-SHA256)
#[derive(Debug, Deserialize)]
pub struct AuthConfig {
    /// Key shared by every relay process for signing handshake tokens
    pub session_token_secret: SecretString,

    /// How long an issued token stays valid, in seconds
    #[serde(default = "default_session_token_ttl")]
    pub session_token_ttl_secs: u64,
}

impl AuthConfig {
    /// Get token TTL as Duration
    pub fn session_token_ttl(&self) -> Duration {
        Duration::from_secs(self.session_token_ttl_secs)
    }

    /// A fresh handle on the signing key.
    pub fn session_token_secret(&self) -> SecretString {
        SecretString::new(self.session_token_secret.expose_secret().clone())
    }

    /// Validate session token configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        let secret = self.session_token_secret.expose_secret();
        if secret.is_empty() {
            return Err(ValidationError::MissingRequired("AUTH__SESSION_TOKEN_SECRET"));
        }
        if secret.len() < MIN_SECRET_LEN {
            return Err(ValidationError::SecretTooShort(MIN_SECRET_LEN));
        }
        if self.session_token_ttl_secs == 0 {
            return Err(ValidationError::InvalidTokenTtl);
        }
        Ok(())
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_token_secret: SecretString::new(String::new()),
            session_token_ttl_secs: default_session_token_ttl(),
        }
    }
}

fn default_session_token_ttl() -> u64 {
    600
}
