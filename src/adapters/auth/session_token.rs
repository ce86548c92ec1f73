//! HMAC-signed session tokens.
//!
//! A token is `<sid>:<exp>:<mac>` where `sid` is a random UUID, `exp` the
//! unix second after which the token is refused, and `mac` the hex-encoded
//! HMAC-SHA256 of `<sid>:<exp>` under the shared secret. Every process in
//! the fleet configured with the same secret accepts tokens minted by any
//! other, so no token state is stored anywhere.

use std::time::Duration;

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::domain::foundation::Timestamp;
use crate::ports::{HandshakeAuthorizer, IssuedToken, SessionTokenIssuer};

type HmacSha256 = Hmac<Sha256>;

/// Shortest secret accepted for signing.
pub const MIN_SECRET_LEN: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionTokenError {
    #[error("session token secret must be at least {MIN_SECRET_LEN} bytes")]
    SecretTooShort,
}

/// Why a token was refused. Only surfaced in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenRejection {
    Malformed,
    Expired,
    BadSignature,
}

pub struct HmacSessionTokens {
    secret: SecretString,
    ttl: Duration,
}

impl std::fmt::Debug for HmacSessionTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HmacSessionTokens")
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl HmacSessionTokens {
    pub fn new(secret: SecretString, ttl: Duration) -> Result<Self, SessionTokenError> {
        if secret.expose_secret().len() < MIN_SECRET_LEN {
            return Err(SessionTokenError::SecretTooShort);
        }
        Ok(Self { secret, ttl })
    }

    /// Mint a token valid until `now + ttl`.
    pub fn issue_at(&self, now: Timestamp) -> IssuedToken {
        let expires_at = now.plus_secs(self.ttl.as_secs());
        let body = format!("{}:{}", Uuid::new_v4(), expires_at.as_unix_secs());
        let token = format!("{}:{}", body, hex::encode(self.sign(&body)));
        IssuedToken { token, expires_at }
    }

    /// Check a token against the clock reading `now`.
    pub fn verify_at(&self, token: &str, now: Timestamp) -> Result<(), TokenRejection> {
        let mut parts = token.split(':');
        let (Some(sid), Some(exp), Some(mac), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(TokenRejection::Malformed);
        };
        if sid.is_empty() {
            return Err(TokenRejection::Malformed);
        }

        let exp: u64 = exp.parse().map_err(|_| TokenRejection::Malformed)?;
        if now.as_unix_secs() > exp {
            return Err(TokenRejection::Expired);
        }

        let presented = hex::decode(mac).map_err(|_| TokenRejection::Malformed)?;
        let expected = self.sign(&format!("{}:{}", sid, exp));
        if presented.len() != expected.len() || !bool::from(expected.ct_eq(&presented)) {
            return Err(TokenRejection::BadSignature);
        }
        Ok(())
    }

    fn sign(&self, body: &str) -> Vec<u8> {
        // HMAC takes keys of any length, so keying cannot fail.
        let mut mac = match HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes()) {
            Ok(mac) => mac,
            Err(_) => return Vec::new(),
        };
        mac.update(body.as_bytes());
        mac.finalize().into_bytes().to_vec()
    }
}

impl SessionTokenIssuer for HmacSessionTokens {
    fn issue(&self) -> IssuedToken {
        self.issue_at(Timestamp::now())
    }
}

impl HandshakeAuthorizer for HmacSessionTokens {
    fn is_authorized(&self, token: &str) -> bool {
        match self.verify_at(token, Timestamp::now()) {
            Ok(()) => true,
            Err(reason) => {
                tracing::debug!(?reason, "session token rejected");
                false
            }
        }
    }
}
