//! HTTP handlers for the session token endpoint.

use std::sync::Arc;

use axum::{extract::State, Json};

use crate::ports::SessionTokenIssuer;

use super::dto::SessionTokenResponse;

#[derive(Clone)]
pub struct SessionTokenState {
    pub issuer: Arc<dyn SessionTokenIssuer>,
}

impl SessionTokenState {
    pub fn new(issuer: Arc<dyn SessionTokenIssuer>) -> Self {
        Self { issuer }
    }
}

/// GET /session/new - Mint a short-lived token for the WebSocket handshake.
pub async fn issue_session_token(
    State(state): State<SessionTokenState>,
) -> Json<SessionTokenResponse> {
    let issued = state.issuer.issue();
    tracing::debug!(expires_at = issued.expires_at.as_unix_secs(), "issued session token");
    Json(issued.into())
}
