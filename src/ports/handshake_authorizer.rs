//! Session token ports consumed at the WebSocket handshake.
//!
//! The relay core only needs a yes/no answer for each handshake. How tokens
//! are minted and checked is up to the adapter.

use serde::Serialize;

use crate::domain::foundation::Timestamp;

/// Gate consulted before upgrading a connection.
pub trait HandshakeAuthorizer: Send + Sync {
    /// Whether `token` admits a connection right now.
    fn is_authorized(&self, token: &str) -> bool;
}

/// Mints short-lived tokens handed to clients before they connect.
pub trait SessionTokenIssuer: Send + Sync {
    fn issue(&self) -> IssuedToken;
}

/// A freshly minted token and when it stops being accepted.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
    pub token: String,
    #[serde(skip)]
    pub expires_at: Timestamp,
}
