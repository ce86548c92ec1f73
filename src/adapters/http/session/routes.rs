//! HTTP routes for the session token endpoint.

use axum::{routing::get, Router};

use super::handlers::{issue_session_token, SessionTokenState};

/// Creates the session token router.
pub fn session_routes(state: SessionTokenState) -> Router {
    Router::new()
        .route("/session/new", get(issue_session_token))
        .with_state(state)
}
