//! HTTP DTOs for the session token endpoint.

use serde::Serialize;

use crate::ports::IssuedToken;

/// Response for `GET /session/new`.
#[derive(Debug, Clone, Serialize)]
pub struct SessionTokenResponse {
    pub token: String,
}

impl From<IssuedToken> for SessionTokenResponse {
    fn from(issued: IssuedToken) -> Self {
        Self {
            token: issued.token,
        }
    }
}
